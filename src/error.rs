use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::ConfigError;
use crate::lifecycle::LifecycleError;
use crate::telemetry::TelemetryError;

/// Top-level application error, aggregating startup and lifecycle failures.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server error: {0}")]
    Server(#[from] axum::Error),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Lifecycle(err) => lifecycle_status(err),
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Status mapping used by collaborators embedding lifecycle errors in HTTP
/// responses: absent rows 404, guard failures 403, duplicate/terminal/
/// deadline conflicts 409, unreachable blob storage 503 (retryable), and
/// integrity violations 500 (a bug, not a user condition).
fn lifecycle_status(err: &LifecycleError) -> StatusCode {
    match err {
        LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
        LifecycleError::Forbidden(_) => StatusCode::FORBIDDEN,
        LifecycleError::Conflict(_) => StatusCode::CONFLICT,
        LifecycleError::Integrity(_) => StatusCode::INTERNAL_SERVER_ERROR,
        LifecycleError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
