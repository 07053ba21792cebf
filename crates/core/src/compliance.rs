//! Goal compliance reporting and review readiness.
//!
//! A report is a read-only aggregate over a patient's goal assessment history and attendance.
//! It never writes anything.

use crate::collaborators::{GoalSource, PatientDirectory};
use crate::constants::{MIN_DAYS_BEFORE_REVIEW, MIN_REVIEW_ATTENDANCE_PERCENT, REQUIRED_GOALS_FOR_REVIEW};
use crate::error::{LedgerError, LedgerResult};
use crate::goals::{GoalAssessment, PatientGoal, ProgressLevel};
use crate::repositories::attendance::{round_to_hundredths, AttendanceLedger, AttendanceStats};
use chrono::NaiveDate;
use ledger_ids::{GoalId, PatientId};
use serde::Serialize;
use std::sync::Arc;

/// Direction of the two most recent assessments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Trend {
    Improving,
    Stable,
    Declining,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    pub goal_id: GoalId,
    pub goal_number: u32,
    pub goal_text: String,
    pub current_progress: ProgressLevel,
    pub percentage_complete: u8,
    pub last_assessment_date: Option<NaiveDate>,
    pub total_assessments: usize,
    pub has_recent_assessment: bool,
    pub trend: Trend,
}

impl GoalProgress {
    fn from_history(goal: &PatientGoal, mut history: Vec<GoalAssessment>, today: NaiveDate, window_days: u32) -> Self {
        history.sort_by_key(|a| a.assessment_date);
        let latest = history.last();
        let last_assessment_date = latest.map(|a| a.assessment_date);

        let trend = match history.as_slice() {
            [.., prior, latest] => {
                match latest.percentage_complete.cmp(&prior.percentage_complete) {
                    std::cmp::Ordering::Greater => Trend::Improving,
                    std::cmp::Ordering::Equal => Trend::Stable,
                    std::cmp::Ordering::Less => Trend::Declining,
                }
            }
            _ => Trend::Unknown,
        };

        GoalProgress {
            goal_id: goal.id,
            goal_number: goal.goal_number,
            goal_text: goal.goal_text.clone(),
            current_progress: latest.map_or(ProgressLevel::NotStarted, |a| a.progress_level),
            percentage_complete: latest.map_or(0, |a| a.percentage_complete.value()),
            last_assessment_date,
            total_assessments: history.len(),
            has_recent_assessment: last_assessment_date
                .is_some_and(|d| (today - d).num_days() <= i64::from(window_days)),
            trend,
        }
    }

    /// Reasons this goal needs attention; empty when it does not.
    fn attention_reasons(&self, window_days: u32) -> Vec<String> {
        let mut reasons = Vec::new();
        match self.current_progress {
            ProgressLevel::Regression => reasons.push(format!(
                "regression recorded ({}% complete)",
                self.percentage_complete
            )),
            ProgressLevel::NoProgress => reasons.push("no progress recorded".to_string()),
            _ => {}
        }
        if !self.has_recent_assessment {
            reasons.push(match self.last_assessment_date {
                Some(date) => format!("no assessment in the last {} days (last on {})", window_days, date),
                None => "never assessed".to_string(),
            });
        }
        reasons
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub patient_id: PatientId,
    pub report_date: NaiveDate,
    pub total_goals: usize,
    pub goals_achieved: usize,
    pub goals_in_progress: usize,
    pub goals_not_started: usize,
    pub goals_with_regression: usize,
    pub goals_with_no_progress: usize,
    pub overall_completion_percentage: f64,
    pub needs_attention: bool,
    pub last_review_date: Option<NaiveDate>,
    pub recommendations: Vec<String>,
    pub goals: Vec<GoalProgress>,
    pub attendance: AttendanceStats,
}

/// Whether an MTPR may be generated for a review period.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReadiness {
    pub patient_id: PatientId,
    pub can_generate: bool,
    pub days_since_admission: i64,
    pub attendance_rate: f64,
    pub total_goals: usize,
    pub blockers: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct ComplianceAggregator {
    patients: Arc<dyn PatientDirectory>,
    goals: Arc<dyn GoalSource>,
    ledger: AttendanceLedger,
    recency_window_days: u32,
}

impl ComplianceAggregator {
    pub fn new(
        patients: Arc<dyn PatientDirectory>,
        goals: Arc<dyn GoalSource>,
        ledger: AttendanceLedger,
        recency_window_days: u32,
    ) -> Self {
        Self {
            patients,
            goals,
            ledger,
            recency_window_days,
        }
    }

    /// Builds the compliance report for a patient as of `today`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] if the patient is unknown.
    /// - [`LedgerError::InvalidState`] if the patient has no goals configured.
    pub fn build_report(&self, patient_id: &PatientId, today: NaiveDate) -> LedgerResult<ComplianceReport> {
        self.refresh_sources();
        self.report_as_of(patient_id, today)
    }

    /// Re-reads patient and goal data. A failed refresh keeps the previously loaded copy.
    fn refresh_sources(&self) {
        if let Err(e) = self.patients.refresh() {
            tracing::warn!(error = %e, "failed to refresh patient records; using cached copy");
        }
        if let Err(e) = self.goals.refresh() {
            tracing::warn!(error = %e, "failed to refresh goal assessments; using cached copy");
        }
    }

    fn report_as_of(&self, patient_id: &PatientId, today: NaiveDate) -> LedgerResult<ComplianceReport> {
        self.patients.get(patient_id)?;
        let goals = self.goals.goals_for_patient(patient_id)?;
        if goals.is_empty() {
            return Err(LedgerError::InvalidState(format!(
                "patient {} has no treatment goals configured",
                patient_id
            )));
        }

        let window = self.recency_window_days;
        let mut progress = Vec::with_capacity(goals.len());
        for goal in &goals {
            let history = self.goals.assessments_for_goal(&goal.id)?;
            progress.push(GoalProgress::from_history(goal, history, today, window));
        }

        let count = |level: ProgressLevel| progress.iter().filter(|g| g.current_progress == level).count();
        let overall = progress
            .iter()
            .map(|g| f64::from(g.percentage_complete))
            .sum::<f64>()
            / progress.len() as f64;

        let recommendations: Vec<String> = progress
            .iter()
            .filter_map(|g| {
                let reasons = g.attention_reasons(window);
                (!reasons.is_empty()).then(|| {
                    format!("Goal {} ({}): {}", g.goal_number, g.goal_id, reasons.join("; "))
                })
            })
            .collect();

        let report = ComplianceReport {
            patient_id: *patient_id,
            report_date: today,
            total_goals: progress.len(),
            goals_achieved: count(ProgressLevel::Achieved),
            goals_in_progress: count(ProgressLevel::InProgress),
            goals_not_started: count(ProgressLevel::NotStarted),
            goals_with_regression: count(ProgressLevel::Regression),
            goals_with_no_progress: count(ProgressLevel::NoProgress),
            overall_completion_percentage: round_to_hundredths(overall),
            needs_attention: !recommendations.is_empty(),
            last_review_date: progress.iter().filter_map(|g| g.last_assessment_date).max(),
            recommendations,
            goals: progress,
            attendance: self.ledger.patient_stats(patient_id, None, None)?,
        };

        tracing::debug!(
            patient_id = %patient_id,
            total_goals = report.total_goals,
            needs_attention = report.needs_attention,
            "compliance report built"
        );
        Ok(report)
    }

    /// Checks the preconditions for generating a review over `[period_start, period_end]`.
    pub fn review_readiness(
        &self,
        patient_id: &PatientId,
        period_start: NaiveDate,
        period_end: NaiveDate,
        today: NaiveDate,
    ) -> LedgerResult<ReviewReadiness> {
        self.refresh_sources();
        let patient = self.patients.get(patient_id)?;
        let stats = self
            .ledger
            .patient_stats(patient_id, Some(period_start), Some(period_end))?;
        let total_goals = self.goals.goals_for_patient(patient_id)?.len();
        let days_since_admission = (today - patient.admission_date).num_days();

        let mut blockers = Vec::new();
        if days_since_admission < MIN_DAYS_BEFORE_REVIEW {
            blockers.push(format!(
                "only {} days since admission; at least {} required",
                days_since_admission, MIN_DAYS_BEFORE_REVIEW
            ));
        }
        if stats.attendance_rate < MIN_REVIEW_ATTENDANCE_PERCENT {
            blockers.push(format!(
                "attendance {}% is below the required {}%",
                stats.attendance_rate, MIN_REVIEW_ATTENDANCE_PERCENT
            ));
        }
        if total_goals < REQUIRED_GOALS_FOR_REVIEW {
            blockers.push(format!(
                "{} goals configured; {} required",
                total_goals, REQUIRED_GOALS_FOR_REVIEW
            ));
        }

        let mut warnings = Vec::new();
        if total_goals > 0 && self.report_as_of(patient_id, today)?.needs_attention {
            warnings.push("one or more goals need attention".to_string());
        }

        Ok(ReviewReadiness {
            patient_id: *patient_id,
            can_generate: blockers.is_empty(),
            days_since_admission,
            attendance_rate: stats.attendance_rate,
            total_goals,
            blockers,
            warnings,
        })
    }
}
