//! Request handlers.
//!
//! Handlers parse path, query and body strings into domain types, call the core service and
//! convert the result into an `api-shared` DTO. Core calls are synchronous; like the rest of
//! the server they run on the request task.

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use api_shared::{
    AbsenceReasonListRes, AbsenceReasonRes, AttendanceListRes, AttendanceRecordRes,
    AttendanceStatsRes, CancellationEventRes, ComplianceReportRes, ErrorRes, GroupDayAttendanceRes, HealthRes, HealthService,
    JustifyAbsenceReq, LockAllRes, MarkAttendanceReq, MonitorStatusRes, ReviewDateRes,
    ReviewReadinessRes, ReviewScheduleRes, ScanSummaryRes,
};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use chrono::{NaiveDate, Utc};
use ledger_core::{
    schedule_for, AttendanceId, AttendanceStatus, CallerContext, GroupId, JustifyAbsence,
    LedgerError, MarkAttendance, NonEmptyText, PatientDirectory, PatientId, PeriodId, ReasonId,
    ReasonType, Units,
};
use serde::Deserialize;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use utoipa::IntoParams;

/// Header carrying the acting user's identifier.
pub const ACTOR_HEADER: &str = "x-actor-id";

fn caller(headers: &HeaderMap) -> ApiResult<CallerContext> {
    let actor = match headers.get(ACTOR_HEADER) {
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| ApiError::BadRequest(format!("{} must be valid text", ACTOR_HEADER)))?;
            Some(NonEmptyText::new(raw).map_err(LedgerError::from)?)
        }
        None => None,
    };
    Ok(CallerContext::new(actor, Utc::now()))
}

fn parse_date(field: &str, value: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("{} must be a YYYY-MM-DD date; got '{}'", field, value)))
}

fn parse_optional_date(field: &str, value: Option<&str>) -> ApiResult<Option<NaiveDate>> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| parse_date(field, v))
        .transpose()
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StatsQuery {
    /// Inclusive lower bound, `YYYY-MM-DD`.
    pub start_date: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`.
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReadinessQuery {
    pub period_start: String,
    pub period_end: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint used by monitoring and load balancers.
#[axum::debug_handler]
pub async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

// ============================================================================
// ATTENDANCE
// ============================================================================

#[utoipa::path(
    post,
    path = "/attendance",
    request_body = MarkAttendanceReq,
    responses(
        (status = 200, description = "Attendance record created or updated", body = AttendanceRecordRes),
        (status = 400, description = "Malformed status, units, date or id", body = ErrorRes),
        (status = 403, description = "The record for this key is locked", body = ErrorRes),
        (status = 409, description = "Concurrent write to the ledger", body = ErrorRes)
    )
)]
/// Create the record for `(periodId, patientId, attendanceDate)` or overwrite it while unlocked.
#[axum::debug_handler]
pub async fn mark_attendance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MarkAttendanceReq>,
) -> ApiResult<Json<AttendanceRecordRes>> {
    let ctx = caller(&headers)?;
    let mark = MarkAttendance {
        period_id: PeriodId::parse(&req.period_id).map_err(LedgerError::from)?,
        patient_id: PatientId::parse(&req.patient_id).map_err(LedgerError::from)?,
        attendance_date: parse_date("attendanceDate", &req.attendance_date)?,
        status: req.status.parse::<AttendanceStatus>()?,
        units_attended: Units::new(req.units_attended).map_err(LedgerError::from)?,
    };

    let record = state.services.ledger.mark_attendance(&ctx, mark)?;
    Ok(Json(AttendanceRecordRes::from(&record)))
}

#[utoipa::path(
    get,
    path = "/attendance/{id}",
    params(("id" = String, Path, description = "Attendance record id")),
    responses(
        (status = 200, description = "Attendance record", body = AttendanceRecordRes),
        (status = 404, description = "Unknown record", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn get_attendance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AttendanceRecordRes>> {
    let id = AttendanceId::parse(&id).map_err(LedgerError::from)?;
    let record = state.services.ledger.get(&id)?;
    Ok(Json(AttendanceRecordRes::from(&record)))
}

#[utoipa::path(
    patch,
    path = "/attendance/{id}/lock",
    params(("id" = String, Path, description = "Attendance record id")),
    responses(
        (status = 200, description = "Record locked (or already locked)", body = AttendanceRecordRes),
        (status = 404, description = "Unknown record", body = ErrorRes)
    )
)]
/// Lock a record. Locking is irreversible; locking a locked record changes nothing.
#[axum::debug_handler]
pub async fn lock_attendance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<AttendanceRecordRes>> {
    let ctx = caller(&headers)?;
    let id = AttendanceId::parse(&id).map_err(LedgerError::from)?;
    let record = state.services.ledger.lock(&ctx, &id)?;
    Ok(Json(AttendanceRecordRes::from(&record)))
}

#[utoipa::path(
    get,
    path = "/attendance/period/{period_id}",
    params(("period_id" = String, Path, description = "Scheduling period id")),
    responses(
        (status = 200, description = "Records of the period ordered by date", body = AttendanceListRes)
    )
)]
#[axum::debug_handler]
pub async fn list_by_period(
    State(state): State<AppState>,
    Path(period_id): Path<String>,
) -> ApiResult<Json<AttendanceListRes>> {
    let period = PeriodId::parse(&period_id).map_err(LedgerError::from)?;
    let records = state.services.ledger.by_period(&period)?;
    Ok(Json(AttendanceListRes::from(records.as_slice())))
}

#[utoipa::path(
    get,
    path = "/attendance/period/{period_id}/patient/{patient_id}",
    params(
        ("period_id" = String, Path, description = "Scheduling period id"),
        ("patient_id" = String, Path, description = "Patient id")
    ),
    responses(
        (status = 200, description = "The patient's records in the period", body = AttendanceListRes)
    )
)]
#[axum::debug_handler]
pub async fn list_by_period_and_patient(
    State(state): State<AppState>,
    Path((period_id, patient_id)): Path<(String, String)>,
) -> ApiResult<Json<AttendanceListRes>> {
    let period = PeriodId::parse(&period_id).map_err(LedgerError::from)?;
    let patient = PatientId::parse(&patient_id).map_err(LedgerError::from)?;
    let records = state.services.ledger.by_period_and_patient(&period, &patient)?;
    Ok(Json(AttendanceListRes::from(records.as_slice())))
}

#[utoipa::path(
    post,
    path = "/attendance/period/{period_id}/lock-all",
    params(("period_id" = String, Path, description = "Scheduling period id")),
    responses(
        (status = 200, description = "Per-record lock outcome", body = LockAllRes)
    )
)]
/// Lock every unlocked record of a period. Individual failures are reported, not fatal.
#[axum::debug_handler]
pub async fn lock_period(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(period_id): Path<String>,
) -> ApiResult<Json<LockAllRes>> {
    let ctx = caller(&headers)?;
    let period = PeriodId::parse(&period_id).map_err(LedgerError::from)?;
    let summary = state.services.ledger.lock_all(&ctx, &period)?;
    Ok(Json(LockAllRes::from(&summary)))
}

#[utoipa::path(
    get,
    path = "/attendance/patient/{patient_id}/stats",
    params(
        ("patient_id" = String, Path, description = "Patient id"),
        StatsQuery
    ),
    responses(
        (status = 200, description = "Attendance totals and rate", body = AttendanceStatsRes),
        (status = 400, description = "Malformed or inverted date range", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn patient_stats(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<AttendanceStatsRes>> {
    let patient = PatientId::parse(&patient_id).map_err(LedgerError::from)?;
    let from = parse_optional_date("startDate", query.start_date.as_deref())?;
    let to = parse_optional_date("endDate", query.end_date.as_deref())?;
    let stats = state.services.ledger.patient_stats(&patient, from, to)?;
    Ok(Json(AttendanceStatsRes::from(&stats)))
}

#[utoipa::path(
    get,
    path = "/attendance/group/{group_id}/date/{date}",
    params(
        ("group_id" = String, Path, description = "Group id"),
        ("date" = String, Path, description = "Calendar date, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Every active member's attendance, unmarked members reported absent", body = GroupDayAttendanceRes),
        (status = 404, description = "Unknown group", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn group_day(
    State(state): State<AppState>,
    Path((group_id, date)): Path<(String, String)>,
) -> ApiResult<Json<GroupDayAttendanceRes>> {
    let group = GroupId::parse(&group_id).map_err(LedgerError::from)?;
    let date = parse_date("date", &date)?;
    let view = state
        .services
        .ledger
        .by_group_and_date(state.services.groups.as_ref(), &group, date)?;
    Ok(Json(GroupDayAttendanceRes::from(&view)))
}

// ============================================================================
// ABSENCE REASONS
// ============================================================================

#[utoipa::path(
    post,
    path = "/attendance/absence/justify",
    request_body = JustifyAbsenceReq,
    responses(
        (status = 201, description = "Absence reason attached", body = AbsenceReasonRes),
        (status = 400, description = "Record is not an absence, or malformed input", body = ErrorRes),
        (status = 404, description = "Unknown attendance record", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn justify_absence(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<JustifyAbsenceReq>,
) -> ApiResult<(StatusCode, Json<AbsenceReasonRes>)> {
    let ctx = caller(&headers)?;
    let request = JustifyAbsence {
        attendance_id: AttendanceId::parse(&req.attendance_id).map_err(LedgerError::from)?,
        reason_type: req.reason_type.parse::<ReasonType>()?,
        start_date: parse_date("startDate", &req.start_date)?,
        end_date: parse_optional_date("endDate", req.end_date.as_deref())?,
        notes: req.notes,
    };

    let reason = state.services.justifier.justify(&ctx, request)?;
    Ok((StatusCode::CREATED, Json(AbsenceReasonRes::from(&reason))))
}

#[utoipa::path(
    get,
    path = "/attendance/{id}/absence-reasons",
    params(("id" = String, Path, description = "Attendance record id")),
    responses(
        (status = 200, description = "Reasons, most recent start date first", body = AbsenceReasonListRes),
        (status = 404, description = "Unknown record", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn list_absence_reasons(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AbsenceReasonListRes>> {
    let id = AttendanceId::parse(&id).map_err(LedgerError::from)?;
    let reasons = state.services.justifier.reasons_for(&id)?;
    Ok(Json(AbsenceReasonListRes {
        reasons: reasons.iter().map(AbsenceReasonRes::from).collect(),
    }))
}

#[utoipa::path(
    delete,
    path = "/attendance/absence/{reason_id}",
    params(("reason_id" = String, Path, description = "Absence reason id")),
    responses(
        (status = 204, description = "Reason removed"),
        (status = 404, description = "Unknown reason", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn remove_absence_reason(
    State(state): State<AppState>,
    Path(reason_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = ReasonId::parse(&reason_id).map_err(LedgerError::from)?;
    state.services.justifier.remove_reason(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// REVIEWS AND COMPLIANCE
// ============================================================================

#[utoipa::path(
    get,
    path = "/goals/compliance/{patient_id}",
    params(("patient_id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Goal compliance report", body = ComplianceReportRes),
        (status = 400, description = "Patient has no goals configured", body = ErrorRes),
        (status = 404, description = "Unknown patient", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn compliance_report(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<Json<ComplianceReportRes>> {
    let patient = PatientId::parse(&patient_id).map_err(LedgerError::from)?;
    let report = state.services.compliance.build_report(&patient, today())?;
    Ok(Json(ComplianceReportRes::from(&report)))
}

#[utoipa::path(
    get,
    path = "/reviews/patient/{patient_id}/dates",
    params(("patient_id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "MTPR due dates", body = ReviewScheduleRes),
        (status = 404, description = "Unknown patient", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn review_dates(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<Json<ReviewScheduleRes>> {
    let id = PatientId::parse(&patient_id).map_err(LedgerError::from)?;
    if let Err(e) = state.services.patients.refresh() {
        tracing::warn!(error = %e, "failed to refresh patient records; using cached copy");
    }
    let patient = state.services.patients.get(&id)?;
    let dates = schedule_for(&patient);
    Ok(Json(ReviewScheduleRes {
        patient_id: patient.id.to_string(),
        admission_date: patient.admission_date.to_string(),
        discharge_date: patient.discharge_date.map(|d| d.to_string()),
        dates: dates.iter().map(ReviewDateRes::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/reviews/patient/{patient_id}/readiness",
    params(
        ("patient_id" = String, Path, description = "Patient id"),
        ReadinessQuery
    ),
    responses(
        (status = 200, description = "Whether an MTPR may be generated for the period", body = ReviewReadinessRes),
        (status = 404, description = "Unknown patient", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn review_readiness(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    Query(query): Query<ReadinessQuery>,
) -> ApiResult<Json<ReviewReadinessRes>> {
    let patient = PatientId::parse(&patient_id).map_err(LedgerError::from)?;
    let start = parse_date("periodStart", &query.period_start)?;
    let end = parse_date("periodEnd", &query.period_end)?;
    let readiness = state
        .services
        .compliance
        .review_readiness(&patient, start, end, today())?;
    Ok(Json(ReviewReadinessRes::from(&readiness)))
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[utoipa::path(
    post,
    path = "/lifecycle/scan",
    responses(
        (status = 200, description = "Result of an immediate lifecycle scan", body = ScanSummaryRes)
    )
)]
/// Run one lifecycle scan now, outside the regular interval.
#[axum::debug_handler]
pub async fn run_scan(State(state): State<AppState>) -> ApiResult<Json<ScanSummaryRes>> {
    let summary = state.services.monitor.run_once(Utc::now())?;
    Ok(Json(ScanSummaryRes::from(&summary)))
}

#[utoipa::path(
    get,
    path = "/lifecycle/status",
    responses(
        (status = 200, description = "Persisted lifecycle monitor state", body = MonitorStatusRes)
    )
)]
#[axum::debug_handler]
pub async fn monitor_status(State(state): State<AppState>) -> ApiResult<Json<MonitorStatusRes>> {
    let status = state.services.monitor.status()?;
    Ok(Json(MonitorStatusRes::new(
        &status,
        state.services.monitor.interval().as_secs(),
    )))
}

#[utoipa::path(
    get,
    path = "/lifecycle/events",
    responses(
        (status = 200, description = "Stream of `cancellation` events, one per automatically cancelled patient", content_type = "text/event-stream", body = CancellationEventRes)
    )
)]
/// Server-sent events for patients cancelled by the lifecycle monitor.
#[axum::debug_handler]
pub async fn cancellation_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = BroadcastStream::new(state.services.notifier.subscribe()).filter_map(|received| {
        match received {
            Ok(event) => Some(
                Event::default()
                    .event("cancellation")
                    .json_data(CancellationEventRes::from(&event)),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "cancellation event subscriber fell behind");
                None
            }
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}
