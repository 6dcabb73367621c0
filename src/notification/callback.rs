use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::{CallbackDispatch, RunStatus};

/// PATCHes a run's task-result callback with the final disposition.
/// The run platform expects a JSON:API body and a bearer token scoped
/// to that one run.
#[derive(Clone)]
pub struct RunTaskCallback {
    client: reqwest::Client,
}

impl RunTaskCallback {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for RunTaskCallback {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallbackDispatch for RunTaskCallback {
    async fn patch(
        &self,
        callback_url: &str,
        access_token: &str,
        status: RunStatus,
        message: &str,
    ) -> anyhow::Result<()> {
        let body = json!({
            "data": {
                "type": "task-results",
                "attributes": {
                    "status": status.as_str(),
                    "message": message,
                }
            }
        });

        let resp = self
            .client
            .patch(callback_url)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_TYPE, "application/vnd.api+json")
            .body(serde_json::to_vec(&body)?)
            .send()
            .await
            .context("failed to reach run callback")?;

        let resp_status = resp.status();
        if !resp_status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "run callback returned error: status={}, body={}",
                resp_status,
                body
            );
        }

        tracing::info!(status = status.as_str(), "Reported run disposition");
        Ok(())
    }
}
