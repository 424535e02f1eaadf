pub mod error;
pub mod types;

pub use error::{Result, TelegramError};
pub use types::{ApiResponse, Chat, FileInfo, Message, MessageEntity, PhotoSize, Update};

use std::time::Duration;

use tracing::debug;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Long-poll wait passed to getUpdates, in seconds.
const POLL_TIMEOUT_SECS: u64 = 25;

pub struct TelegramClient {
    client: reqwest::Client,
    token: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Self {
        // Request timeout must outlast the long-poll wait.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            token: token.to_string(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{TELEGRAM_API_BASE}/bot{}/{method}", self.token)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(TelegramError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiResponse<T> = resp.json().await?;
        if !envelope.ok {
            return Err(TelegramError::NotOk(
                envelope.description.unwrap_or_default(),
            ));
        }
        envelope
            .result
            .ok_or_else(|| TelegramError::NotOk("missing result".to_string()))
    }

    /// Fetch updates after `offset` via long polling. Pass
    /// `last_update_id + 1` to acknowledge everything already seen.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>> {
        let mut body = serde_json::json!({
            "timeout": POLL_TIMEOUT_SECS,
            "allowed_updates": ["message", "channel_post", "edited_channel_post"],
        });
        if let Some(off) = offset {
            body["offset"] = serde_json::json!(off);
        }
        let updates: Vec<Update> = self.call("getUpdates", body).await?;
        debug!(count = updates.len(), "getUpdates batch");
        Ok(updates)
    }

    /// Send a plain-text message to a chat.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let body = serde_json::json!({ "chat_id": chat_id, "text": text });
        let _: Message = self.call("sendMessage", body).await?;
        Ok(())
    }

    /// Resolve a file_id to a downloadable URL via getFile.
    pub async fn file_url(&self, file_id: &str) -> Result<String> {
        let body = serde_json::json!({ "file_id": file_id });
        let info: FileInfo = self.call("getFile", body).await?;
        let path = info
            .file_path
            .ok_or_else(|| TelegramError::NotOk("getFile returned no file_path".to_string()))?;
        Ok(format!(
            "{TELEGRAM_API_BASE}/file/bot{}/{path}",
            self.token
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_format() {
        let client = TelegramClient::new("123456:ABC-DEF");
        assert_eq!(
            client.api_url("getUpdates"),
            "https://api.telegram.org/bot123456:ABC-DEF/getUpdates"
        );
    }
}
