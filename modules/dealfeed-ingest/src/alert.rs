use async_trait::async_trait;
use tracing::{info, warn};

use telegram_client::TelegramClient;

/// Side channel for operator notifications. Delivery is best-effort:
/// implementations must never let a failed alert affect pipeline outcome.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, text: &str);
}

/// Sends alerts to an admin chat via the Bot API.
pub struct TelegramAlerter {
    client: TelegramClient,
    chat_id: i64,
}

impl TelegramAlerter {
    pub fn new(client: TelegramClient, chat_id: i64) -> Self {
        Self { client, chat_id }
    }
}

#[async_trait]
impl AlertSink for TelegramAlerter {
    async fn notify(&self, text: &str) {
        if let Err(e) = self.client.send_message(self.chat_id, text).await {
            warn!(error = %e, "alert delivery failed");
        }
    }
}

/// Used when no alert chat is configured.
pub struct NoopAlerter;

#[async_trait]
impl AlertSink for NoopAlerter {
    async fn notify(&self, text: &str) {
        info!(alert = text, "alert (no sink configured)");
    }
}
