//! Patient lifecycle record as seen by the ledger.
//!
//! Patients are created by the intake collaborator. Within the ledger core the only field
//! that is ever written is `cancellation_date`, and only by the lifecycle monitor.

use crate::constants::CANCELLATION_GRACE_DAYS;
use chrono::{Days, NaiveDate};
use ledger_ids::PatientId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: PatientId,
    #[serde(default)]
    pub full_name: String,
    pub admission_date: NaiveDate,
    #[serde(default)]
    pub discharge_date: Option<NaiveDate>,
    #[serde(default)]
    pub cancellation_date: Option<NaiveDate>,
}

impl Patient {
    /// First calendar day on which the patient may be cancelled, if discharged.
    pub fn cancellation_cutoff(&self) -> Option<NaiveDate> {
        self.discharge_date
            .and_then(|d| d.checked_add_days(Days::new(CANCELLATION_GRACE_DAYS)))
    }

    /// True when the patient is discharged, not yet cancelled, and the grace period has
    /// elapsed on `today`.
    pub fn is_due_for_cancellation(&self, today: NaiveDate) -> bool {
        self.cancellation_date.is_none()
            && self
                .cancellation_cutoff()
                .is_some_and(|cutoff| today >= cutoff)
    }
}
