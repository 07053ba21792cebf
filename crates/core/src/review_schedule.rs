//! Master Treatment Plan Review (MTPR) due dates.
//!
//! The first review is due 18 days after admission and every 30 days after that. A due date
//! that falls on a Sunday moves to the Monday; the move never carries into later dates, which
//! keep counting from the unshifted date. Generation stops at the first date past the cutoff,
//! which is the earlier of the discharge date and admission + 180 days. The cutoff itself is
//! still a valid due date.

use crate::constants::{FIRST_REVIEW_OFFSET_DAYS, REVIEW_HORIZON_DAYS, REVIEW_INTERVAL_DAYS};
use crate::patient::Patient;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use ledger_ids::PatientId;
use serde::Serialize;

/// One due date in a review sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDue {
    /// 1-based position in the sequence.
    pub sequence_number: u32,
    pub due_date: NaiveDate,
}

/// A due date bound to a patient.
///
/// Derived on demand and never stored. `generated` is always `false` here; whether a review
/// document exists is tracked by the document collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledReviewDate {
    pub patient_id: PatientId,
    pub sequence_number: u32,
    pub due_date: NaiveDate,
    pub generated: bool,
}

/// Restartable iterator over review due dates.
#[derive(Clone, Debug)]
pub struct ReviewDates {
    next_base: Option<NaiveDate>,
    cutoff: NaiveDate,
    sequence: u32,
}

impl ReviewDates {
    pub fn new(admission: NaiveDate, discharge: Option<NaiveDate>) -> Self {
        let horizon = admission
            .checked_add_days(Days::new(REVIEW_HORIZON_DAYS))
            .unwrap_or(NaiveDate::MAX);
        let cutoff = discharge.map_or(horizon, |d| d.min(horizon));

        Self {
            next_base: admission.checked_add_days(Days::new(FIRST_REVIEW_OFFSET_DAYS)),
            cutoff,
            sequence: 0,
        }
    }
}

impl Iterator for ReviewDates {
    type Item = ReviewDue;

    fn next(&mut self) -> Option<Self::Item> {
        let base = self.next_base?;
        let due = skip_sunday(base)?;
        if due > self.cutoff {
            self.next_base = None;
            return None;
        }

        self.next_base = base.checked_add_days(Days::new(REVIEW_INTERVAL_DAYS));
        self.sequence += 1;
        Some(ReviewDue {
            sequence_number: self.sequence,
            due_date: due,
        })
    }
}

fn skip_sunday(date: NaiveDate) -> Option<NaiveDate> {
    if date.weekday() == Weekday::Sun {
        date.succ_opt()
    } else {
        Some(date)
    }
}

/// All review due dates for the given admission and optional discharge.
pub fn compute_review_dates(admission: NaiveDate, discharge: Option<NaiveDate>) -> Vec<ReviewDue> {
    ReviewDates::new(admission, discharge).collect()
}

/// Review schedule of a stored patient.
pub fn schedule_for(patient: &Patient) -> Vec<ScheduledReviewDate> {
    ReviewDates::new(patient.admission_date, patient.discharge_date)
        .map(|due| ScheduledReviewDate {
            patient_id: patient.id,
            sequence_number: due.sequence_number,
            due_date: due.due_date,
            generated: false,
        })
        .collect()
}
