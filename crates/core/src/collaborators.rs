//! Contracts for the collaborators the ledger consumes.
//!
//! Patient records, group membership, goal assessments and the notification sink are owned
//! by other parts of the clinic system. The core talks to them only through these traits;
//! file-backed implementations live in [`crate::repositories`].

use crate::error::LedgerResult;
use crate::goals::{GoalAssessment, PatientGoal};
use crate::patient::Patient;
use chrono::{DateTime, NaiveDate, Utc};
use ledger_ids::{GoalId, GroupId, PatientId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Source of patient lifecycle records.
pub trait PatientDirectory: Send + Sync {
    /// Re-reads records maintained outside this process. Defaults to a no-op.
    fn refresh(&self) -> LedgerResult<()> {
        Ok(())
    }

    /// Returns the patient, or `NotFound`.
    fn get(&self, id: &PatientId) -> LedgerResult<Patient>;

    fn list(&self) -> LedgerResult<Vec<Patient>>;

    /// Records the cancellation date. Fails with `InvalidState` if one is already set or the
    /// patient is not eligible on `date`.
    fn set_cancellation_date(&self, id: &PatientId, date: NaiveDate) -> LedgerResult<Patient>;

    /// Discharged patients that have not been cancelled yet.
    fn discharged_pending_cancellation(&self) -> LedgerResult<Vec<Patient>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|p| p.discharge_date.is_some() && p.cancellation_date.is_none())
            .collect())
    }
}

/// Source of group membership lists.
pub trait GroupDirectory: Send + Sync {
    /// Re-reads membership maintained outside this process. Defaults to a no-op.
    fn refresh(&self) -> LedgerResult<()> {
        Ok(())
    }

    /// Active members of an active group, in roster order. Unknown groups are `NotFound`.
    fn active_members(&self, group: &GroupId) -> LedgerResult<Vec<PatientId>>;
}

/// Source of goal definitions and assessment history.
pub trait GoalSource: Send + Sync {
    /// Re-reads goals and assessments maintained outside this process. Defaults to a no-op.
    fn refresh(&self) -> LedgerResult<()> {
        Ok(())
    }

    fn goals_for_patient(&self, patient: &PatientId) -> LedgerResult<Vec<PatientGoal>>;

    fn assessments_for_goal(&self, goal: &GoalId) -> LedgerResult<Vec<GoalAssessment>>;
}

/// Emitted once when a patient is cancelled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationEvent {
    pub patient_id: PatientId,
    pub patient_name: String,
    pub discharge_date: NaiveDate,
    pub cancellation_date: NaiveDate,
    pub cancelled_at: DateTime<Utc>,
}

/// Sink for cancellation notifications.
pub trait CancellationNotifier: Send + Sync {
    fn notify(&self, event: &CancellationEvent) -> LedgerResult<()>;
}

/// Writes cancellation events to the log.
#[derive(Clone, Debug, Default)]
pub struct TracingNotifier;

impl CancellationNotifier for TracingNotifier {
    fn notify(&self, event: &CancellationEvent) -> LedgerResult<()> {
        tracing::info!(
            patient_id = %event.patient_id,
            discharge_date = %event.discharge_date,
            cancellation_date = %event.cancellation_date,
            "patient cancelled automatically; no further attendance or notes will be generated"
        );
        Ok(())
    }
}

/// Publishes cancellation events to in-process subscribers.
///
/// Sending with no subscribers is not an error: nobody is listening yet.
#[derive(Clone, Debug)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<CancellationEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CancellationEvent> {
        self.sender.subscribe()
    }
}

impl CancellationNotifier for BroadcastNotifier {
    fn notify(&self, event: &CancellationEvent) -> LedgerResult<()> {
        if self.sender.send(event.clone()).is_err() {
            tracing::debug!(patient_id = %event.patient_id, "no cancellation subscribers");
        }
        TracingNotifier.notify(event)
    }
}
