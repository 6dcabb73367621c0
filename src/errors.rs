use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("authentication failed: {0}")]
    AuthFailed(&'static str),

    #[error("no pending run task for this run_id")]
    RunNotFound,

    #[error("downstream error: {0}")]
    Downstream(String),

    #[error("store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::MissingField(field) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "missing_field",
                format!("missing required field: {}", field),
            ),
            AppError::AuthFailed(reason) => {
                tracing::warn!("Rejected intake request: {}", reason);
                (
                    StatusCode::FORBIDDEN,
                    "authentication_error",
                    "signature_rejected",
                    (*reason).to_string(),
                )
            }
            AppError::RunNotFound => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                "run_not_found",
                "no pending run task for this run_id; possibly already finalized or expired"
                    .to_string(),
            ),
            AppError::Downstream(e) => {
                tracing::error!("Downstream call failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "downstream_error",
                    "downstream_failed",
                    e.clone(),
                )
            }
            AppError::Store(e) => {
                tracing::error!("Token store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "store_error",
                    "internal server error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
