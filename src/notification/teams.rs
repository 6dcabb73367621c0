use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;

use super::NotificationDispatch;

/// Posts Markdown messages to a Teams incoming webhook.
#[derive(Clone)]
pub struct TeamsNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl TeamsNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }
}

#[async_trait]
impl NotificationDispatch for TeamsNotifier {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        let url = match &self.webhook_url {
            Some(u) => u,
            None => {
                tracing::debug!("No Teams webhook URL configured, skipping notification");
                return Ok(());
            }
        };

        let message = TeamsMessage {
            text: text.to_string(),
        };

        let resp = self
            .client
            .post(url)
            .json(&message)
            .send()
            .await
            .context("failed to send Teams notification")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Teams returned error: status={}, body={}", status, body);
        }

        tracing::info!("Posted approval message to Teams");
        Ok(())
    }
}

#[derive(Serialize)]
struct TeamsMessage {
    text: String,
}
