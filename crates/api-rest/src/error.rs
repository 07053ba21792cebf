//! Error mapping for the REST surface.
//!
//! Every failure is returned as `{ "error": { "code", "message" } }`. Storage failures are
//! logged with their detail and reported to the client as a generic internal error.

use api_shared::{ErrorDetail, ErrorRes};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ledger_core::LedgerError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("invalid request: {0}")]
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "VALIDATION", detail.clone()),
            ApiError::Ledger(err) => match err {
                LedgerError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION", err.to_string()),
                LedgerError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
                LedgerError::Locked(_) => (StatusCode::FORBIDDEN, "LOCKED", err.to_string()),
                LedgerError::InvalidState(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_STATE", err.to_string())
                }
                LedgerError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT", err.to_string()),
                _ => {
                    tracing::error!(error = %err, "ledger storage error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL",
                        "An internal error occurred".to_string(),
                    )
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let body = ErrorRes {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use ledger_core::AttendanceId;

    async fn code_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_locked_maps_to_403() {
        let (status, json) = code_of(LedgerError::Locked(AttendanceId::new()).into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"]["code"], "LOCKED");
    }

    #[tokio::test]
    async fn test_conflict_maps_to_409() {
        let (status, _) = code_of(LedgerError::Conflict("revision moved".into()).into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_storage_errors_hide_detail() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let (status, json) = code_of(LedgerError::FileWrite(io).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }
}
