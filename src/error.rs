//! Error taxonomy for the orchestrator core.
//!
//! User-visible endpoints translate internal errors into this taxonomy so
//! every failure mode gets a stable `{error, details?}` response shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized")]
    Auth,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("launch error: {0}")]
    Launch(String),

    #[error("notify error: {0}")]
    Notify(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            OrchestratorError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", Some(msg.clone()))
            }
            OrchestratorError::Auth => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            OrchestratorError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, "not_found", Some(msg.clone()))
            }
            OrchestratorError::Storage(e) => {
                tracing::error!(error = %e, "storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
            }
            OrchestratorError::Launch(msg) => {
                tracing::error!(error = %msg, "launch error");
                (StatusCode::INTERNAL_SERVER_ERROR, "launch_error", Some(msg.clone()))
            }
            OrchestratorError::Notify(msg) => {
                tracing::error!(error = %msg, "notify error");
                (StatusCode::INTERNAL_SERVER_ERROR, "notify_error", Some(msg.clone()))
            }
        };

        (status, Json(ErrorBody { error: error.to_string(), details })).into_response()
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
