use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
};
use serde::Deserialize;

use crate::broker::{IntakeOutcome, IntakeRequest, Outcome, RunMeta, DEFAULT_RUN_ID};
use crate::errors::AppError;
use crate::AppState;

// ── Request DTOs ─────────────────────────────────────────────

/// Intake payload as the run platform sends it. Unknown fields are
/// ignored; a malformed body behaves like an empty one and fails the
/// required-field check.
#[derive(Debug, Default, Deserialize)]
pub struct RunTaskPayload {
    pub access_token: Option<String>,
    pub task_result_callback_url: Option<String>,
    pub run_id: Option<String>,
    pub is_speculative: Option<bool>,
    pub run_created_by: Option<String>,
    pub run_message: Option<String>,
    pub vcs_pull_request_url: Option<String>,
    pub vcs_commit_url: Option<String>,
    pub workspace_app_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveParams {
    pub run_id: Option<String>,
}

// ── Handlers ─────────────────────────────────────────────────

/// POST /run-task-check — authenticated intake.
///
/// The signature covers the exact raw body, so the body is taken as
/// bytes and parsed only after the gate passes.
pub async fn run_task_check(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<String, AppError> {
    let signature = headers
        .get(super::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    state.authenticator.verify(&body, signature)?;

    let payload: RunTaskPayload = serde_json::from_slice(&body).unwrap_or_default();

    let req = IntakeRequest {
        run_id: payload
            .run_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| DEFAULT_RUN_ID.to_string()),
        access_token: payload.access_token.unwrap_or_default(),
        callback_url: payload.task_result_callback_url.unwrap_or_default(),
        is_speculative: payload.is_speculative.unwrap_or(false),
        meta: RunMeta {
            run_created_by: payload.run_created_by,
            run_message: payload.run_message,
            vcs_pull_request_url: payload.vcs_pull_request_url,
            vcs_commit_url: payload.vcs_commit_url,
            workspace_app_url: payload.workspace_app_url,
        },
    };
    let run_id = req.run_id.clone();

    match state.broker.intake(req).await? {
        IntakeOutcome::AutoResolved => {
            Ok(format!("Run {} Auto-approved (non-speculative run).", run_id))
        }
        IntakeOutcome::Pending { .. } => {
            Ok("Run task received. Posted message to Teams.".to_string())
        }
    }
}

/// GET /approve?run_id=… — consume the pending approval as "passed".
pub async fn approve(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResolveParams>,
) -> Result<String, AppError> {
    let run_id = require_run_id(params)?;
    state.broker.resolve(&run_id, Outcome::Approved).await?;
    Ok(format!("Run {} APPROVED. You can close this page.", run_id))
}

/// GET /reject?run_id=… — consume the pending approval as "failed".
pub async fn reject(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResolveParams>,
) -> Result<String, AppError> {
    let run_id = require_run_id(params)?;
    state.broker.resolve(&run_id, Outcome::Rejected).await?;
    Ok(format!("Run {} REJECTED. You can close this page.", run_id))
}

fn require_run_id(params: ResolveParams) -> Result<String, AppError> {
    params
        .run_id
        .filter(|id| !id.is_empty())
        .ok_or(AppError::MissingField("run_id"))
}
