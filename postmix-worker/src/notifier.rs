//! Webhook notifier
//!
//! Posts [`StatusEvent`]s to the configured endpoint. Delivery is best-effort:
//! failures are logged and swallowed so a job's outcome never depends on them.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};

use postmix_common::StatusEvent;

const USER_AGENT: &str = concat!("postmix-worker/", env!("CARGO_PKG_VERSION"));

/// Notification failure; never propagated out of [`Notifier::notify`]
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Webhook returned status {0}")]
    Status(u16),
}

/// Sink for status events
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one event. Must not fail.
    async fn notify(&self, event: &StatusEvent);
}

/// Notifier posting JSON to a single webhook URL
pub struct WebhookNotifier {
    http_client: reqwest::Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, NotifyError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            webhook_url: webhook_url.into(),
        })
    }

    /// Single delivery attempt
    pub async fn post(&self, event: &StatusEvent) -> Result<(), NotifyError> {
        let response = self
            .http_client
            .post(&self.webhook_url)
            .json(event)
            .send()
            .await
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &StatusEvent) {
        match self.post(event).await {
            Ok(()) => info!(
                song_id = event.song_id,
                action = event.action.as_str(),
                "Webhook notified successfully"
            ),
            Err(e) => error!(
                song_id = event.song_id,
                action = event.action.as_str(),
                error = %e,
                "Failed to notify webhook"
            ),
        }
    }
}
