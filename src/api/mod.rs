use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub mod handlers;

/// Header carrying the hex HMAC-SHA512 of the raw intake body.
pub const SIGNATURE_HEADER: &str = "x-tfc-task-signature";

/// Build the relay router. Only the intake endpoint is authenticated;
/// the approve/reject links are themselves the capability.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/run-task-check", post(handlers::run_task_check))
        .route("/approve", get(handlers::approve))
        .route("/reject", get(handlers::reject))
        .route("/healthz", get(|| async { "ok" }))
}
