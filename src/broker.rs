//! Approval token lifecycle.
//!
//! Intake stores a one-shot mapping from a run id to its bearer token
//! and callback URL, then notifies the channel. Approve/reject consume
//! that mapping exactly once and report the disposition back to the
//! run. The entry is deleted before the callback goes out, so a failed
//! callback never resurrects a consumable token.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::notification::{CallbackDispatch, NotificationDispatch, RunStatus};
use crate::store::TokenStore;

/// Run id used when the platform omits one from the payload.
pub const DEFAULT_RUN_ID: &str = "unknown-run-id";

/// The sole persisted entity: what we need to finish a run later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingApproval {
    pub access_token: String,
    pub callback_url: String,
}

/// Passthrough metadata forwarded into the notification message,
/// never validated or stored.
#[derive(Debug, Clone, Default)]
pub struct RunMeta {
    pub run_created_by: Option<String>,
    pub run_message: Option<String>,
    pub vcs_pull_request_url: Option<String>,
    pub vcs_commit_url: Option<String>,
    pub workspace_app_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IntakeRequest {
    pub run_id: String,
    pub access_token: String,
    pub callback_url: String,
    pub is_speculative: bool,
    pub meta: RunMeta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Bypass policy passed the run straight through; nothing stored.
    AutoResolved,
    /// Stored and notified; waiting on a human to follow a link.
    Pending {
        approve_link: String,
        reject_link: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Approved,
    Rejected,
}

impl Outcome {
    fn status(self) -> RunStatus {
        match self {
            Outcome::Approved => RunStatus::Passed,
            Outcome::Rejected => RunStatus::Failed,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Outcome::Approved => "approved",
            Outcome::Rejected => "rejected",
        }
    }
}

pub struct ApprovalBroker {
    store: Arc<dyn TokenStore>,
    notifier: Arc<dyn NotificationDispatch>,
    callback: Arc<dyn CallbackDispatch>,
    base_public_url: String,
    ttl: Duration,
    filter_speculative_plans_only: bool,
}

impl ApprovalBroker {
    pub fn new(
        store: Arc<dyn TokenStore>,
        notifier: Arc<dyn NotificationDispatch>,
        callback: Arc<dyn CallbackDispatch>,
        base_public_url: String,
        ttl: Duration,
        filter_speculative_plans_only: bool,
    ) -> Self {
        Self {
            store,
            notifier,
            callback,
            base_public_url,
            ttl,
            filter_speculative_plans_only,
        }
    }

    /// Register a run for approval.
    ///
    /// Auto-passes non-speculative runs when the bypass policy is on;
    /// otherwise stores the token under `run_id` (a later intake for
    /// the same id overwrites) and posts the approval message.
    pub async fn intake(&self, req: IntakeRequest) -> Result<IntakeOutcome, AppError> {
        if req.access_token.is_empty() {
            return Err(AppError::MissingField("access_token"));
        }
        if req.callback_url.is_empty() {
            return Err(AppError::MissingField("task_result_callback_url"));
        }

        if self.filter_speculative_plans_only && !req.is_speculative {
            let message = format!("Run {} auto-approved (non-speculative run).", req.run_id);
            self.callback
                .patch(&req.callback_url, &req.access_token, RunStatus::Passed, &message)
                .await
                .map_err(|e| AppError::Downstream(e.to_string()))?;
            tracing::info!(run_id = %req.run_id, "Auto-approved non-speculative run");
            return Ok(IntakeOutcome::AutoResolved);
        }

        let approval = PendingApproval {
            access_token: req.access_token.clone(),
            callback_url: req.callback_url.clone(),
        };
        self.store.put(&req.run_id, &approval, self.ttl).await?;

        let approve_link = format!("{}/approve?run_id={}", self.base_public_url, req.run_id);
        let reject_link = format!("{}/reject?run_id={}", self.base_public_url, req.run_id);

        // Dispatch failure leaves the stored entry in place: the links
        // in the undelivered message remain valid until the TTL fires.
        let text = approval_message(&req, &approve_link, &reject_link);
        self.notifier
            .send(&text)
            .await
            .map_err(|e| AppError::Downstream(e.to_string()))?;

        tracing::info!(run_id = %req.run_id, "Stored pending approval and notified channel");
        Ok(IntakeOutcome::Pending {
            approve_link,
            reject_link,
        })
    }

    /// Consume the pending approval for `run_id` and report `outcome`.
    ///
    /// Unknown, expired, and already-consumed ids are indistinguishable
    /// and all return [`AppError::RunNotFound`].
    pub async fn resolve(&self, run_id: &str, outcome: Outcome) -> Result<(), AppError> {
        let approval = self
            .store
            .take(run_id)
            .await?
            .ok_or(AppError::RunNotFound)?;

        let message = format!("Run {} {} via Teams link.", run_id, outcome.verb());
        self.callback
            .patch(
                &approval.callback_url,
                &approval.access_token,
                outcome.status(),
                &message,
            )
            .await
            .map_err(|e| AppError::Downstream(e.to_string()))?;

        tracing::info!(run_id, outcome = outcome.verb(), "Resolved pending approval");
        Ok(())
    }
}

/// Markdown body for the channel message. Metadata lines are included
/// only when present; a PR link wins over a commit link.
fn approval_message(req: &IntakeRequest, approve_link: &str, reject_link: &str) -> String {
    let mut lines = vec![format!("Run ID: **{}** needs approval.", req.run_id)];

    if let Some(by) = req.meta.run_created_by.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("Triggered by: **{}**", by));
    }

    let spec_label = if req.is_speculative { "Yes" } else { "No" };
    lines.push(format!("Speculative?: **{}**", spec_label));

    if let Some(msg) = req.meta.run_message.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("Run Message: {}", msg));
    }

    if let Some(ws) = req.meta.workspace_app_url.as_deref() {
        lines.push(format!("[Open Workspace]({})", ws));
    }

    if let Some(pr) = req.meta.vcs_pull_request_url.as_deref() {
        lines.push(format!("[View Pull Request]({})", pr));
    } else if let Some(commit) = req.meta.vcs_commit_url.as_deref() {
        lines.push(format!("[View Commit]({})", commit));
    }

    lines.push(format!("[Approve]({}) | [Reject]({})", approve_link, reject_link));
    lines.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> IntakeRequest {
        IntakeRequest {
            run_id: "run-ABC123".into(),
            access_token: "tok".into(),
            callback_url: "https://app.example.com/task-results/1".into(),
            is_speculative: true,
            meta: RunMeta {
                run_created_by: Some("jdoe".into()),
                run_message: Some("Triggered via UI".into()),
                vcs_pull_request_url: Some("https://github.example.com/pr/7".into()),
                vcs_commit_url: Some("https://github.example.com/commit/abc".into()),
                workspace_app_url: Some("https://app.example.com/ws/demo".into()),
            },
        }
    }

    #[test]
    fn message_includes_metadata_and_links() {
        let text = approval_message(
            &request(),
            "https://relay.example.com/approve?run_id=run-ABC123",
            "https://relay.example.com/reject?run_id=run-ABC123",
        );
        assert!(text.contains("**run-ABC123**"));
        assert!(text.contains("Triggered by: **jdoe**"));
        assert!(text.contains("Speculative?: **Yes**"));
        assert!(text.contains("Run Message: Triggered via UI"));
        assert!(text.contains("[Open Workspace](https://app.example.com/ws/demo)"));
        assert!(text.contains("[Approve](https://relay.example.com/approve?run_id=run-ABC123)"));
        assert!(text.contains("[Reject](https://relay.example.com/reject?run_id=run-ABC123)"));
    }

    #[test]
    fn pull_request_link_wins_over_commit_link() {
        let text = approval_message(&request(), "/approve?run_id=r", "/reject?run_id=r");
        assert!(text.contains("[View Pull Request]"));
        assert!(!text.contains("[View Commit]"));

        let mut req = request();
        req.meta.vcs_pull_request_url = None;
        let text = approval_message(&req, "/approve?run_id=r", "/reject?run_id=r");
        assert!(text.contains("[View Commit]"));
    }

    #[test]
    fn absent_metadata_lines_are_omitted() {
        let req = IntakeRequest {
            run_id: "r1".into(),
            access_token: "t".into(),
            callback_url: "u".into(),
            is_speculative: false,
            meta: RunMeta::default(),
        };
        let text = approval_message(&req, "/approve?run_id=r1", "/reject?run_id=r1");
        assert!(!text.contains("Triggered by"));
        assert!(!text.contains("Run Message"));
        assert!(!text.contains("Open Workspace"));
        assert!(text.contains("Speculative?: **No**"));
    }

    #[test]
    fn outcome_mapping() {
        assert_eq!(Outcome::Approved.status(), RunStatus::Passed);
        assert_eq!(Outcome::Rejected.status(), RunStatus::Failed);
        assert_eq!(Outcome::Approved.verb(), "approved");
        assert_eq!(Outcome::Rejected.verb(), "rejected");
    }
}
