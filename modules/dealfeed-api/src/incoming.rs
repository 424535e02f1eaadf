//! Normalization of Bot API updates into pipeline messages.

use chrono::{DateTime, Utc};
use tracing::warn;

use dealfeed_common::{EntitySpan, RawMessage};
use telegram_client::{TelegramClient, Update};

/// Turn an update into a pipeline message. Returns None for updates that
/// carry nothing to process. Photo links are resolved best-effort: a
/// failed getFile never blocks the message.
pub async fn raw_message(update: &Update, client: &TelegramClient) -> Option<RawMessage> {
    let post = update.post()?;
    let text = post.text_content().to_string();
    if text.is_empty() && post.largest_photo().is_none() {
        return None;
    }

    let entities = post
        .active_entities()
        .iter()
        .map(|e| EntitySpan {
            kind: e.kind.clone(),
            offset: e.offset,
            length: e.length,
            url: e.url.clone(),
        })
        .collect();

    let photo_url = match post.largest_photo() {
        Some(photo) => match client.file_url(&photo.file_id).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, "photo link resolution failed");
                None
            }
        },
        None => None,
    };

    Some(RawMessage {
        channel_id: post.chat.id,
        channel_title: post.chat.title.clone(),
        message_id: post.message_id,
        text,
        entities,
        photo_url,
        timestamp: DateTime::from_timestamp(post.date, 0).unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(value: serde_json::Value) -> Update {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn maps_channel_post_fields() {
        let client = TelegramClient::new("unused");
        let u = update(serde_json::json!({
            "update_id": 1,
            "channel_post": {
                "message_id": 99,
                "date": 1700000000,
                "chat": { "id": -1002955338551i64, "type": "channel", "title": "Prime Picks" },
                "text": "Deal https://amzn.to/abc",
                "entities": [{ "type": "url", "offset": 5, "length": 19 }]
            }
        }));

        let raw = raw_message(&u, &client).await.unwrap();
        assert_eq!(raw.channel_id, -1002955338551);
        assert_eq!(raw.channel_title.as_deref(), Some("Prime Picks"));
        assert_eq!(raw.message_id, 99);
        assert_eq!(raw.entities.len(), 1);
        assert_eq!(raw.photo_url, None);
        assert_eq!(raw.timestamp.timestamp(), 1700000000);
    }

    #[tokio::test]
    async fn empty_updates_are_dropped() {
        let client = TelegramClient::new("unused");
        let u = update(serde_json::json!({
            "update_id": 2,
            "channel_post": {
                "message_id": 100,
                "date": 1700000000,
                "chat": { "id": -1, "type": "channel" }
            }
        }));
        assert!(raw_message(&u, &client).await.is_none());

        let no_post = update(serde_json::json!({ "update_id": 3 }));
        assert!(raw_message(&no_post, &client).await.is_none());
    }
}
