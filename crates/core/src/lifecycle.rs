//! Automatic patient cancellation after discharge.
//!
//! The monitor scans discharged patients on a fixed interval and cancels every patient whose
//! grace period has elapsed. The cancellation date is written at most once per patient, and
//! it is the only idempotence anchor: a patient that already carries a cancellation date is
//! never touched again, so repeated or interrupted scans cannot emit duplicate events.
//!
//! Monitor bookkeeping (last run, last fully successful run, counters) is persisted to a YAML
//! snapshot so it survives restarts.

use crate::collaborators::{CancellationEvent, CancellationNotifier, PatientDirectory};
use crate::error::LedgerResult;
use crate::patient::Patient;
use crate::repositories::shared::{SnapshotFormat, SnapshotStore};
use chrono::{DateTime, Utc};
use ledger_ids::PatientId;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Persisted monitor bookkeeping.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorState {
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    /// Boundary of the most recent run in which no patient failed.
    #[serde(default)]
    pub last_successful_scan: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_runs: u64,
    #[serde(default)]
    pub total_cancelled: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanFailure {
    pub patient_id: PatientId,
    pub message: String,
}

/// Outcome of one scan.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub reference_time: DateTime<Utc>,
    /// Discharged, not yet cancelled patients examined.
    pub scanned: usize,
    pub cancelled: Vec<PatientId>,
    /// Patients still inside the grace period, or cancelled by a concurrent scan.
    pub skipped: usize,
    pub failed: Vec<ScanFailure>,
}

pub fn open_monitor_state(path: impl Into<PathBuf>) -> LedgerResult<SnapshotStore<MonitorState>> {
    SnapshotStore::open(path, SnapshotFormat::Yaml)
}

pub struct LifecycleMonitor {
    patients: Arc<dyn PatientDirectory>,
    notifier: Arc<dyn CancellationNotifier>,
    state: SnapshotStore<MonitorState>,
    interval: Duration,
}

impl LifecycleMonitor {
    pub fn new(
        patients: Arc<dyn PatientDirectory>,
        notifier: Arc<dyn CancellationNotifier>,
        state: SnapshotStore<MonitorState>,
        interval: Duration,
    ) -> Self {
        Self {
            patients,
            notifier,
            state,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn status(&self) -> LedgerResult<MonitorState> {
        self.state.read(|s| s.clone())
    }

    /// Runs one scan with `now` as the reference time.
    ///
    /// Per-patient failures are logged and reported in the summary; they do not stop the scan
    /// and are retried on the next run. Only a failure to list patients aborts the run.
    pub fn run_once(&self, now: DateTime<Utc>) -> LedgerResult<ScanSummary> {
        if let Err(e) = self.patients.refresh() {
            tracing::warn!(error = %e, "failed to refresh patient records; scanning cached copy");
        }

        let today = now.date_naive();
        let candidates = self.patients.discharged_pending_cancellation()?;
        let mut summary = ScanSummary {
            reference_time: now,
            scanned: candidates.len(),
            cancelled: Vec::new(),
            skipped: 0,
            failed: Vec::new(),
        };

        for patient in candidates {
            if !patient.is_due_for_cancellation(today) {
                summary.skipped += 1;
                continue;
            }

            let updated = match self.patients.set_cancellation_date(&patient.id, today) {
                Ok(updated) => updated,
                Err(_) if self.cancelled_elsewhere(&patient.id) => {
                    tracing::debug!(patient_id = %patient.id, "patient already cancelled by a concurrent scan");
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(patient_id = %patient.id, error = %e, "failed to cancel patient; will retry next run");
                    summary.failed.push(ScanFailure {
                        patient_id: patient.id,
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            summary.cancelled.push(updated.id);

            let (Some(discharge_date), Some(cancellation_date)) =
                (updated.discharge_date, updated.cancellation_date)
            else {
                continue;
            };
            let event = CancellationEvent {
                patient_id: updated.id,
                patient_name: updated.full_name.clone(),
                discharge_date,
                cancellation_date,
                cancelled_at: now,
            };
            // The cancellation is already committed; a lost notification is not retried.
            if let Err(e) = self.notifier.notify(&event) {
                tracing::error!(patient_id = %updated.id, error = %e, "failed to deliver cancellation notification");
            }
        }

        let cancelled = summary.cancelled.len() as u64;
        let clean = summary.failed.is_empty();
        let persisted = self.state.update(|state| {
            state.last_run = Some(now);
            state.total_runs += 1;
            state.total_cancelled += cancelled;
            if clean {
                state.last_successful_scan = Some(now);
            }
            Ok(())
        });
        if let Err(e) = persisted {
            tracing::warn!(error = %e, "failed to persist lifecycle monitor state");
        }

        tracing::info!(
            scanned = summary.scanned,
            cancelled = summary.cancelled.len(),
            skipped = summary.skipped,
            failed = summary.failed.len(),
            "lifecycle scan finished"
        );
        Ok(summary)
    }

    fn cancelled_elsewhere(&self, id: &PatientId) -> bool {
        matches!(
            self.patients.get(id),
            Ok(Patient {
                cancellation_date: Some(_),
                ..
            })
        )
    }

    /// Scans on every interval tick until `shutdown` resolves.
    ///
    /// The first scan runs immediately. Scans run on the blocking pool since storage is
    /// synchronous file I/O.
    pub async fn run<F>(self: Arc<Self>, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        match self.status() {
            Ok(MonitorState {
                last_successful_scan: Some(at),
                ..
            }) => tracing::info!(last_successful_scan = %at, "lifecycle monitor resuming"),
            Ok(_) => tracing::info!("lifecycle monitor starting with no previous scan"),
            Err(e) => tracing::warn!(error = %e, "failed to read lifecycle monitor state"),
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("lifecycle monitor stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let monitor = Arc::clone(&self);
                    match tokio::task::spawn_blocking(move || monitor.run_once(Utc::now())).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => tracing::error!(error = %e, "lifecycle scan failed"),
                        Err(e) => tracing::error!(error = %e, "lifecycle scan task panicked"),
                    }
                }
            }
        }
    }
}
