//! Error handling: transport-level status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use urlguard_core::ValidationError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    /// Malformed input: bad hostname, bad port, bad path.
    Validation(String),

    /// Requested URL exceeds the configured maximum length.
    UrlTooLong(String),

    /// The checker has no initialized sources yet.
    NotReady,

    /// The overall request deadline elapsed before the merge completed.
    CheckTimeout(u64),

    /// Anything unexpected.
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::UrlTooLong(msg) => (StatusCode::URI_TOO_LONG, msg.clone()),
            AppError::NotReady => (
                StatusCode::SERVICE_UNAVAILABLE,
                String::from("url checker not ready"),
            ),
            AppError::CheckTimeout(secs) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("url check timed out after {secs} seconds"),
            ),
            AppError::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    String::from("failed to check url"),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(error: ValidationError) -> Self {
        match error {
            ValidationError::UrlTooLong { .. } => AppError::UrlTooLong(error.to_string()),
            _ => AppError::Validation(error.to_string()),
        }
    }
}
