use ledger_core::{
    AbsenceReason, AttendanceRecord, AttendanceStats, CancellationEvent, ComplianceReport, GoalProgress,
    GroupAttendanceEntry, GroupDayAttendance, LockAllSummary, MonitorState, ReviewReadiness,
    ScanSummary, ScheduledReviewDate,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn date_string(date: chrono::NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn timestamp_string(at: chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339()
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Structured error body returned for every failed request.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: ErrorDetail,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

// ============================================================================
// ATTENDANCE
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendanceReq {
    pub period_id: String,
    pub patient_id: String,
    /// `YYYY-MM-DD`
    pub attendance_date: String,
    /// `P`, `A` or `D`
    pub status: String,
    pub units_attended: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecordRes {
    pub id: String,
    pub period_id: String,
    pub patient_id: String,
    pub attendance_date: String,
    pub status: String,
    pub units_attended: f64,
    pub is_locked: bool,
    pub locked_at: Option<String>,
    pub locked_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&AttendanceRecord> for AttendanceRecordRes {
    fn from(r: &AttendanceRecord) -> Self {
        Self {
            id: r.id.to_string(),
            period_id: r.period_id.to_string(),
            patient_id: r.patient_id.to_string(),
            attendance_date: date_string(r.attendance_date),
            status: r.status.code().to_string(),
            units_attended: r.units_attended.value(),
            is_locked: r.is_locked,
            locked_at: r.locked_at.map(timestamp_string),
            locked_by: r.locked_by.as_ref().map(|a| a.to_string()),
            created_at: timestamp_string(r.created_at),
            updated_at: timestamp_string(r.updated_at),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceListRes {
    pub records: Vec<AttendanceRecordRes>,
}

impl From<&[AttendanceRecord]> for AttendanceListRes {
    fn from(records: &[AttendanceRecord]) -> Self {
        Self {
            records: records.iter().map(AttendanceRecordRes::from).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LockFailureRes {
    pub attendance_id: String,
    pub reason: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LockAllRes {
    pub locked: Vec<String>,
    pub already_locked: usize,
    pub failed: Vec<LockFailureRes>,
}

impl From<&LockAllSummary> for LockAllRes {
    fn from(s: &LockAllSummary) -> Self {
        Self {
            locked: s.locked.iter().map(|id| id.to_string()).collect(),
            already_locked: s.already_locked,
            failed: s
                .failed
                .iter()
                .map(|f| LockFailureRes {
                    attendance_id: f.attendance_id.to_string(),
                    reason: f.reason.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStatsRes {
    pub total_days: usize,
    pub present: usize,
    pub absent: usize,
    pub discharge: usize,
    pub total_units: f64,
    pub attendance_rate: f64,
}

impl From<&AttendanceStats> for AttendanceStatsRes {
    fn from(s: &AttendanceStats) -> Self {
        Self {
            total_days: s.total_days,
            present: s.present,
            absent: s.absent,
            discharge: s.discharge,
            total_units: s.total_units,
            attendance_rate: s.attendance_rate,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupAttendanceEntryRes {
    pub attendance_id: Option<String>,
    pub patient_id: String,
    pub status: String,
    pub units_attended: f64,
    pub is_locked: bool,
    pub absence_reason: Option<AbsenceReasonRes>,
    pub synthesized: bool,
}

impl From<&GroupAttendanceEntry> for GroupAttendanceEntryRes {
    fn from(e: &GroupAttendanceEntry) -> Self {
        Self {
            attendance_id: e.attendance_id.map(|id| id.to_string()),
            patient_id: e.patient_id.to_string(),
            status: e.status.code().to_string(),
            units_attended: e.units_attended.value(),
            is_locked: e.is_locked,
            absence_reason: e.absence_reason.as_ref().map(AbsenceReasonRes::from),
            synthesized: e.synthesized,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupDaySummaryRes {
    pub total_patients: usize,
    pub present_count: usize,
    pub absent_count: usize,
    pub discharge_count: usize,
    pub attendance_rate: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupDayAttendanceRes {
    pub group_id: String,
    pub date: String,
    pub day_of_week: String,
    pub entries: Vec<GroupAttendanceEntryRes>,
    pub summary: GroupDaySummaryRes,
}

impl From<&GroupDayAttendance> for GroupDayAttendanceRes {
    fn from(g: &GroupDayAttendance) -> Self {
        Self {
            group_id: g.group_id.to_string(),
            date: date_string(g.date),
            day_of_week: g.day_of_week.to_string(),
            entries: g.entries.iter().map(GroupAttendanceEntryRes::from).collect(),
            summary: GroupDaySummaryRes {
                total_patients: g.summary.total_patients,
                present_count: g.summary.present_count,
                absent_count: g.summary.absent_count,
                discharge_count: g.summary.discharge_count,
                attendance_rate: g.summary.attendance_rate,
            },
        }
    }
}

// ============================================================================
// ABSENCE REASONS
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JustifyAbsenceReq {
    pub attendance_id: String,
    /// `medical_appointment`, `family_trip` or `hospitalized`
    pub reason_type: String,
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceReasonRes {
    pub id: String,
    pub attendance_id: String,
    pub reason_type: String,
    pub start_date: String,
    pub end_date: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
}

impl From<&AbsenceReason> for AbsenceReasonRes {
    fn from(r: &AbsenceReason) -> Self {
        Self {
            id: r.id.to_string(),
            attendance_id: r.attendance_id.to_string(),
            reason_type: r.reason_type.as_str().to_string(),
            start_date: date_string(r.start_date),
            end_date: r.end_date.map(date_string),
            notes: r.notes.clone(),
            created_by: r.created_by.as_ref().map(|a| a.to_string()),
            created_at: timestamp_string(r.created_at),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceReasonListRes {
    pub reasons: Vec<AbsenceReasonRes>,
}

// ============================================================================
// REVIEWS AND COMPLIANCE
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDateRes {
    pub sequence_number: u32,
    pub due_date: String,
    pub generated: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewScheduleRes {
    pub patient_id: String,
    pub admission_date: String,
    pub discharge_date: Option<String>,
    pub dates: Vec<ReviewDateRes>,
}

impl From<&ScheduledReviewDate> for ReviewDateRes {
    fn from(d: &ScheduledReviewDate) -> Self {
        Self {
            sequence_number: d.sequence_number,
            due_date: date_string(d.due_date),
            generated: d.generated,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgressRes {
    pub goal_id: String,
    pub goal_number: u32,
    pub goal_text: String,
    pub current_progress: String,
    pub percentage_complete: u8,
    pub last_assessment_date: Option<String>,
    pub total_assessments: usize,
    pub has_recent_assessment: bool,
    pub trend: String,
}

impl From<&GoalProgress> for GoalProgressRes {
    fn from(g: &GoalProgress) -> Self {
        Self {
            goal_id: g.goal_id.to_string(),
            goal_number: g.goal_number,
            goal_text: g.goal_text.clone(),
            current_progress: g.current_progress.as_str().to_string(),
            percentage_complete: g.percentage_complete,
            last_assessment_date: g.last_assessment_date.map(date_string),
            total_assessments: g.total_assessments,
            has_recent_assessment: g.has_recent_assessment,
            trend: format!("{:?}", g.trend),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReportRes {
    pub patient_id: String,
    pub report_date: String,
    pub total_goals: usize,
    pub goals_achieved: usize,
    pub goals_in_progress: usize,
    pub goals_not_started: usize,
    pub goals_with_regression: usize,
    pub goals_with_no_progress: usize,
    pub overall_completion_percentage: f64,
    pub needs_attention: bool,
    pub last_review_date: Option<String>,
    pub recommendations: Vec<String>,
    pub goals: Vec<GoalProgressRes>,
    pub attendance: AttendanceStatsRes,
}

impl From<&ComplianceReport> for ComplianceReportRes {
    fn from(r: &ComplianceReport) -> Self {
        Self {
            patient_id: r.patient_id.to_string(),
            report_date: date_string(r.report_date),
            total_goals: r.total_goals,
            goals_achieved: r.goals_achieved,
            goals_in_progress: r.goals_in_progress,
            goals_not_started: r.goals_not_started,
            goals_with_regression: r.goals_with_regression,
            goals_with_no_progress: r.goals_with_no_progress,
            overall_completion_percentage: r.overall_completion_percentage,
            needs_attention: r.needs_attention,
            last_review_date: r.last_review_date.map(date_string),
            recommendations: r.recommendations.clone(),
            goals: r.goals.iter().map(GoalProgressRes::from).collect(),
            attendance: AttendanceStatsRes::from(&r.attendance),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReadinessRes {
    pub patient_id: String,
    pub can_generate: bool,
    pub days_since_admission: i64,
    pub attendance_rate: f64,
    pub total_goals: usize,
    pub blockers: Vec<String>,
    pub warnings: Vec<String>,
}

impl From<&ReviewReadiness> for ReviewReadinessRes {
    fn from(r: &ReviewReadiness) -> Self {
        Self {
            patient_id: r.patient_id.to_string(),
            can_generate: r.can_generate,
            days_since_admission: r.days_since_admission,
            attendance_rate: r.attendance_rate,
            total_goals: r.total_goals,
            blockers: r.blockers.clone(),
            warnings: r.warnings.clone(),
        }
    }
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanFailureRes {
    pub patient_id: String,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummaryRes {
    pub reference_time: String,
    pub scanned: usize,
    pub cancelled: Vec<String>,
    pub skipped: usize,
    pub failed: Vec<ScanFailureRes>,
}

impl From<&ScanSummary> for ScanSummaryRes {
    fn from(s: &ScanSummary) -> Self {
        Self {
            reference_time: timestamp_string(s.reference_time),
            scanned: s.scanned,
            cancelled: s.cancelled.iter().map(|id| id.to_string()).collect(),
            skipped: s.skipped,
            failed: s
                .failed
                .iter()
                .map(|f| ScanFailureRes {
                    patient_id: f.patient_id.to_string(),
                    message: f.message.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatusRes {
    pub last_run: Option<String>,
    pub last_successful_scan: Option<String>,
    pub total_runs: u64,
    pub total_cancelled: u64,
    pub interval_secs: u64,
}

impl MonitorStatusRes {
    pub fn new(state: &MonitorState, interval_secs: u64) -> Self {
        Self {
            last_run: state.last_run.map(timestamp_string),
            last_successful_scan: state.last_successful_scan.map(timestamp_string),
            total_runs: state.total_runs,
            total_cancelled: state.total_cancelled,
            interval_secs,
        }
    }
}

/// Payload of a `cancellation` server-sent event.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancellationEventRes {
    pub patient_id: String,
    pub patient_name: String,
    pub discharge_date: String,
    pub cancellation_date: String,
    pub cancelled_at: String,
}

impl From<&CancellationEvent> for CancellationEventRes {
    fn from(e: &CancellationEvent) -> Self {
        Self {
            patient_id: e.patient_id.to_string(),
            patient_name: e.patient_name.clone(),
            discharge_date: date_string(e.discharge_date),
            cancellation_date: date_string(e.cancellation_date),
            cancelled_at: timestamp_string(e.cancelled_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use ledger_core::{AttendanceStatus, PatientId};

    #[test]
    fn test_record_serialises_camel_case_with_status_code() {
        let at = Utc.with_ymd_and_hms(2025, 9, 22, 16, 0, 0).unwrap();
        let record = AttendanceRecord {
            id: Default::default(),
            period_id: Default::default(),
            patient_id: PatientId::new(),
            attendance_date: NaiveDate::from_ymd_opt(2025, 9, 22).unwrap(),
            status: AttendanceStatus::Discharge,
            units_attended: ledger_core::Units::new(2.5).unwrap(),
            is_locked: false,
            locked_at: None,
            locked_by: None,
            created_at: at,
            updated_at: at,
        };

        let json = serde_json::to_value(AttendanceRecordRes::from(&record)).unwrap();

        assert_eq!(json["status"], "D");
        assert_eq!(json["attendanceDate"], "2025-09-22");
        assert_eq!(json["unitsAttended"], 2.5);
        assert_eq!(json["isLocked"], false);
        assert_eq!(json["patientId"].as_str().unwrap().len(), 32);
    }
}
