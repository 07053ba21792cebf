//! # API REST
//!
//! REST API for the attendance ledger.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, error status codes)
//!
//! Uses `api-shared` for wire types and `ledger-core` for all domain behaviour.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod handlers;

use api_shared::{
    AbsenceReasonListRes, AbsenceReasonRes, AttendanceListRes, AttendanceRecordRes,
    AttendanceStatsRes, CancellationEventRes, ComplianceReportRes, ErrorDetail, ErrorRes, GoalProgressRes,
    GroupAttendanceEntryRes, GroupDayAttendanceRes, GroupDaySummaryRes, HealthRes,
    JustifyAbsenceReq, LockAllRes, LockFailureRes, MarkAttendanceReq, MonitorStatusRes,
    ReviewDateRes, ReviewReadinessRes, ReviewScheduleRes, ScanFailureRes, ScanSummaryRes,
};
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use ledger_core::LedgerServices;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state for the REST API server.
///
/// Holds every ledger service; cloning is cheap since services share their stores.
#[derive(Clone)]
pub struct AppState {
    pub services: LedgerServices,
}

impl AppState {
    pub fn new(services: LedgerServices) -> Self {
        Self { services }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::mark_attendance,
        handlers::get_attendance,
        handlers::lock_attendance,
        handlers::list_by_period,
        handlers::list_by_period_and_patient,
        handlers::lock_period,
        handlers::patient_stats,
        handlers::group_day,
        handlers::justify_absence,
        handlers::list_absence_reasons,
        handlers::remove_absence_reason,
        handlers::compliance_report,
        handlers::review_dates,
        handlers::review_readiness,
        handlers::run_scan,
        handlers::monitor_status,
        handlers::cancellation_events,
    ),
    components(schemas(
        HealthRes,
        ErrorRes,
        ErrorDetail,
        MarkAttendanceReq,
        AttendanceRecordRes,
        AttendanceListRes,
        LockAllRes,
        LockFailureRes,
        AttendanceStatsRes,
        GroupDayAttendanceRes,
        GroupAttendanceEntryRes,
        GroupDaySummaryRes,
        JustifyAbsenceReq,
        AbsenceReasonRes,
        AbsenceReasonListRes,
        ComplianceReportRes,
        GoalProgressRes,
        ReviewScheduleRes,
        ReviewDateRes,
        ReviewReadinessRes,
        ScanSummaryRes,
        ScanFailureRes,
        MonitorStatusRes,
        CancellationEventRes,
    ))
)]
pub struct ApiDoc;

/// Builds the full router, including Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/attendance", post(handlers::mark_attendance))
        .route("/attendance/:id", get(handlers::get_attendance))
        .route("/attendance/:id/lock", patch(handlers::lock_attendance))
        .route(
            "/attendance/:id/absence-reasons",
            get(handlers::list_absence_reasons),
        )
        .route("/attendance/period/:period_id", get(handlers::list_by_period))
        .route(
            "/attendance/period/:period_id/patient/:patient_id",
            get(handlers::list_by_period_and_patient),
        )
        .route(
            "/attendance/period/:period_id/lock-all",
            post(handlers::lock_period),
        )
        .route(
            "/attendance/patient/:patient_id/stats",
            get(handlers::patient_stats),
        )
        .route(
            "/attendance/group/:group_id/date/:date",
            get(handlers::group_day),
        )
        .route("/attendance/absence/justify", post(handlers::justify_absence))
        .route(
            "/attendance/absence/:reason_id",
            delete(handlers::remove_absence_reason),
        )
        .route("/goals/compliance/:patient_id", get(handlers::compliance_report))
        .route("/reviews/patient/:patient_id/dates", get(handlers::review_dates))
        .route(
            "/reviews/patient/:patient_id/readiness",
            get(handlers::review_readiness),
        )
        .route("/lifecycle/scan", post(handlers::run_scan))
        .route("/lifecycle/status", get(handlers::monitor_status))
        .route("/lifecycle/events", get(handlers::cancellation_events))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::NaiveDate;
    use ledger_core::{
        CoreConfig, GoalBook, GroupId, GroupMember, GroupRecord, Patient, PatientId, PeriodId,
    };
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_stream::StreamExt;
    use tower::ServiceExt;

    struct TestApp {
        app: Router,
        patients: Vec<PatientId>,
        group: GroupId,
    }

    fn test_app() -> TestApp {
        let patients: Vec<PatientId> = (0..3).map(|_| PatientId::new()).collect();
        let group = GroupId::new();
        let records = patients
            .iter()
            .map(|id| Patient {
                id: *id,
                full_name: "Test Patient".into(),
                admission_date: NaiveDate::from_ymd_opt(2025, 9, 18).unwrap(),
                discharge_date: None,
                cancellation_date: None,
            })
            .collect();
        let groups = vec![GroupRecord {
            id: group,
            name: "Morning PHP".into(),
            is_active: true,
            members: patients
                .iter()
                .map(|id| GroupMember {
                    patient_id: *id,
                    is_active: true,
                })
                .collect(),
        }];
        let config = Arc::new(CoreConfig::with_defaults(PathBuf::from("unused")));
        let services = LedgerServices::in_memory(config, records, groups, GoalBook::default());

        TestApp {
            app: router(AppState::new(services)),
            patients,
            group,
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-actor-id", "therapist-7")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn mark_body(period: &PeriodId, patient: &PatientId, status: &str) -> Value {
        let units = if status == "P" { 4.0 } else { 0.0 };
        json!({
            "periodId": period.to_string(),
            "patientId": patient.to_string(),
            "attendanceDate": "2025-09-22",
            "status": status,
            "unitsAttended": units,
        })
    }

    #[tokio::test]
    async fn test_health() {
        let t = test_app();
        let (status, json) = send(&t.app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn test_mark_lock_then_mark_is_forbidden() {
        let t = test_app();
        let period = PeriodId::new();

        let (status, created) = send(
            &t.app,
            post_json("/attendance", mark_body(&period, &t.patients[0], "P")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = created["id"].as_str().unwrap().to_string();

        let lock = Request::builder()
            .method("PATCH")
            .uri(format!("/attendance/{}/lock", id))
            .header("x-actor-id", "therapist-7")
            .body(Body::empty())
            .unwrap();
        let (status, locked) = send(&t.app, lock).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(locked["isLocked"], true);
        assert_eq!(locked["lockedBy"], "therapist-7");

        let (status, err) = send(
            &t.app,
            post_json("/attendance", mark_body(&period, &t.patients[0], "A")),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(err["error"]["code"], "LOCKED");

        let (_, stored) = send(&t.app, get(&format!("/attendance/{}", id))).await;
        assert_eq!(stored["status"], "P");
    }

    #[tokio::test]
    async fn test_justify_present_record_is_rejected() {
        let t = test_app();
        let (_, created) = send(
            &t.app,
            post_json("/attendance", mark_body(&PeriodId::new(), &t.patients[0], "P")),
        )
        .await;

        let (status, err) = send(
            &t.app,
            post_json(
                "/attendance/absence/justify",
                json!({
                    "attendanceId": created["id"],
                    "reasonType": "medical_appointment",
                    "startDate": "2025-09-22",
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"]["code"], "INVALID_STATE");
    }

    #[tokio::test]
    async fn test_justify_and_remove_absence_reason() {
        let t = test_app();
        let (_, created) = send(
            &t.app,
            post_json("/attendance", mark_body(&PeriodId::new(), &t.patients[1], "A")),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, reason) = send(
            &t.app,
            post_json(
                "/attendance/absence/justify",
                json!({
                    "attendanceId": id,
                    "reasonType": "family_trip",
                    "startDate": "2025-09-22",
                    "endDate": "2025-09-26",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(reason["createdBy"], "therapist-7");

        let (_, listed) = send(&t.app, get(&format!("/attendance/{}/absence-reasons", id))).await;
        assert_eq!(listed["reasons"].as_array().unwrap().len(), 1);

        let remove = Request::builder()
            .method("DELETE")
            .uri(format!("/attendance/absence/{}", reason["id"].as_str().unwrap()))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&t.app, remove).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_group_day_synthesizes_unmarked_patient() {
        let t = test_app();
        let period = PeriodId::new();
        send(&t.app, post_json("/attendance", mark_body(&period, &t.patients[0], "P"))).await;
        send(&t.app, post_json("/attendance", mark_body(&period, &t.patients[1], "P"))).await;

        let (status, view) = send(
            &t.app,
            get(&format!("/attendance/group/{}/date/2025-09-22", t.group)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["dayOfWeek"], "Monday");
        let entries = view["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2]["status"], "A");
        assert_eq!(entries[2]["unitsAttended"], 0.0);
        assert_eq!(entries[2]["isLocked"], false);
        assert_eq!(entries[2]["synthesized"], true);
        assert_eq!(view["summary"]["attendanceRate"], 66.67);
    }

    #[tokio::test]
    async fn test_malformed_ids_and_statuses_are_validation_errors() {
        let t = test_app();

        let (status, err) = send(&t.app, get("/attendance/period/not-a-uuid")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"]["code"], "VALIDATION");

        let (status, err) = send(
            &t.app,
            post_json("/attendance", mark_body(&PeriodId::new(), &t.patients[0], "X")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"]["code"], "VALIDATION");
    }

    #[tokio::test]
    async fn test_compliance_without_goals_is_invalid_state() {
        let t = test_app();
        let (status, err) = send(
            &t.app,
            get(&format!("/goals/compliance/{}", t.patients[0])),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"]["code"], "INVALID_STATE");

        let (status, _) = send(
            &t.app,
            get(&format!("/goals/compliance/{}", PatientId::new())),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_review_dates_for_stored_patient() {
        let t = test_app();
        let (status, schedule) = send(
            &t.app,
            get(&format!("/reviews/patient/{}/dates", t.patients[0])),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let dates = schedule["dates"].as_array().unwrap();
        assert_eq!(dates[0]["dueDate"], "2025-10-06");
        assert_eq!(dates[1]["dueDate"], "2025-11-05");
    }

    #[tokio::test]
    async fn test_lifecycle_scan_and_status() {
        let t = test_app();
        let scan = Request::builder()
            .method("POST")
            .uri("/lifecycle/scan")
            .body(Body::empty())
            .unwrap();

        let (status, summary) = send(&t.app, scan).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["scanned"], 0);

        let (_, state) = send(&t.app, get("/lifecycle/status")).await;
        assert_eq!(state["totalRuns"], 1);
        assert_eq!(state["intervalSecs"], 3600);
    }

    #[tokio::test]
    async fn test_openapi_document_served() {
        let t = test_app();
        let (status, doc) = send(&t.app, get("/api-docs/openapi.json")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(doc["paths"]["/attendance"].is_object());
    }

    #[tokio::test]
    async fn test_cancellation_events_streamed_after_scan() {
        let patient = Patient {
            id: PatientId::new(),
            full_name: "Rosa Vega".into(),
            admission_date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            discharge_date: Some(NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()),
            cancellation_date: None,
        };
        let config = Arc::new(CoreConfig::with_defaults(PathBuf::from("unused")));
        let services =
            LedgerServices::in_memory(config, vec![patient.clone()], Vec::new(), GoalBook::default());
        let app = router(AppState::new(services));

        let response = app.clone().oneshot(get("/lifecycle/events")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");
        let mut events = response.into_body().into_data_stream();

        let scan = Request::builder()
            .method("POST")
            .uri("/lifecycle/scan")
            .body(Body::empty())
            .unwrap();
        let (_, summary) = send(&app, scan).await;
        assert_eq!(summary["cancelled"][0], patient.id.to_string());

        let chunk = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let frame = String::from_utf8(chunk.to_vec()).unwrap();
        assert!(frame.contains("event: cancellation"));
        assert!(frame.contains(&patient.id.to_string()));
        assert!(frame.contains("\"dischargeDate\":\"2025-01-10\""));
    }
}
