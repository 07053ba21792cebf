//! Absence justification.
//!
//! Justifications annotate an absence after the fact. They live next to the attendance
//! records in the ledger snapshot but never modify a record, so the record's lock state does
//! not matter here: a locked absence can still be justified, and a reason can be removed at
//! any time.

use crate::context::CallerContext;
use crate::error::{LedgerError, LedgerResult};
use crate::repositories::attendance::{AttendanceStatus, LedgerStore};
use chrono::{DateTime, NaiveDate, Utc};
use ledger_ids::{AttendanceId, ReasonId};
use ledger_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonType {
    MedicalAppointment,
    FamilyTrip,
    #[serde(alias = "hospitalization")]
    Hospitalized,
}

impl ReasonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonType::MedicalAppointment => "medical_appointment",
            ReasonType::FamilyTrip => "family_trip",
            ReasonType::Hospitalized => "hospitalized",
        }
    }
}

impl fmt::Display for ReasonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasonType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "medical_appointment" => Ok(ReasonType::MedicalAppointment),
            "family_trip" => Ok(ReasonType::FamilyTrip),
            "hospitalized" | "hospitalization" => Ok(ReasonType::Hospitalized),
            other => Err(LedgerError::Validation(format!(
                "reasonType must be one of medical_appointment, family_trip, hospitalized; got '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceReason {
    pub id: ReasonId,
    pub attendance_id: AttendanceId,
    pub reason_type: ReasonType,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: Option<NonEmptyText>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct JustifyAbsence {
    pub attendance_id: AttendanceId,
    pub reason_type: ReasonType,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Attaches and removes absence reasons.
#[derive(Clone, Debug)]
pub struct AbsenceJustifier {
    store: Arc<LedgerStore>,
}

impl AbsenceJustifier {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self { store }
    }

    /// Appends a reason to an absent attendance record.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Validation`] if `end_date` precedes `start_date`.
    /// - [`LedgerError::NotFound`] if the record does not exist.
    /// - [`LedgerError::InvalidState`] if the record's status is not Absent.
    pub fn justify(&self, ctx: &CallerContext, request: JustifyAbsence) -> LedgerResult<AbsenceReason> {
        if let Some(end) = request.end_date {
            if end < request.start_date {
                return Err(LedgerError::Validation(format!(
                    "endDate {} is before startDate {}",
                    end, request.start_date
                )));
            }
        }

        let reason = self.store.update(|state| {
            let record = state
                .records
                .iter()
                .find(|r| r.id == request.attendance_id)
                .ok_or_else(|| LedgerError::not_found("attendance record", request.attendance_id))?;

            if record.status != AttendanceStatus::Absent {
                return Err(LedgerError::InvalidState(format!(
                    "only absences can be justified; attendance record {} has status {}",
                    record.id, record.status
                )));
            }

            let reason = AbsenceReason {
                id: ReasonId::new(),
                attendance_id: record.id,
                reason_type: request.reason_type,
                start_date: request.start_date,
                end_date: request.end_date,
                notes: request.notes.filter(|n| !n.trim().is_empty()),
                created_by: ctx.actor.clone(),
                created_at: ctx.at,
            };
            state.reasons.push(reason.clone());
            Ok(reason)
        })?;

        tracing::info!(
            reason_id = %reason.id,
            attendance_id = %reason.attendance_id,
            reason_type = %reason.reason_type,
            "absence justified"
        );
        Ok(reason)
    }

    /// Reasons attached to a record, most recent start date first.
    pub fn reasons_for(&self, attendance_id: &AttendanceId) -> LedgerResult<Vec<AbsenceReason>> {
        let (exists, mut reasons) = self.store.read(|state| {
            (
                state.records.iter().any(|r| r.id == *attendance_id),
                state
                    .reasons
                    .iter()
                    .filter(|r| r.attendance_id == *attendance_id)
                    .cloned()
                    .collect::<Vec<_>>(),
            )
        })?;
        if !exists {
            return Err(LedgerError::not_found("attendance record", attendance_id));
        }
        reasons.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(reasons)
    }

    /// Deletes a reason regardless of the owning record's lock state.
    pub fn remove_reason(&self, reason_id: &ReasonId) -> LedgerResult<AbsenceReason> {
        let removed = self.store.update(|state| {
            let idx = state
                .reasons
                .iter()
                .position(|r| r.id == *reason_id)
                .ok_or_else(|| LedgerError::not_found("absence reason", reason_id))?;
            Ok(state.reasons.remove(idx))
        })?;

        tracing::info!(reason_id = %removed.id, attendance_id = %removed.attendance_id, "absence reason removed");
        Ok(removed)
    }
}
