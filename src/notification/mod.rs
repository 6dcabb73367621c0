//! Outbound collaborators: the chat notification channel and the run
//! platform's result callback. The broker depends on these traits, not
//! on the wire formats.

use async_trait::async_trait;

pub mod callback;
pub mod teams;

/// Final disposition reported back to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Passed,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Passed => "passed",
            RunStatus::Failed => "failed",
        }
    }
}

/// Posts a human-readable message to the notification channel.
#[async_trait]
pub trait NotificationDispatch: Send + Sync {
    async fn send(&self, text: &str) -> anyhow::Result<()>;
}

/// Reports a run's final disposition to its callback address.
#[async_trait]
pub trait CallbackDispatch: Send + Sync {
    async fn patch(
        &self,
        callback_url: &str,
        access_token: &str,
        status: RunStatus,
        message: &str,
    ) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::RunStatus;

    #[test]
    fn status_maps_to_wire_strings() {
        assert_eq!(RunStatus::Passed.as_str(), "passed");
        assert_eq!(RunStatus::Failed.as_str(), "failed");
    }
}
