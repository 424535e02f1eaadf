use serde::{Deserialize, Serialize};

/// Envelope every Bot API method returns.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub description: Option<String>,
    pub result: Option<T>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub channel_post: Option<Message>,
    pub edited_channel_post: Option<Message>,
}

impl Update {
    /// The post payload of this update, whichever field carried it.
    /// Edited posts are treated as redeliveries.
    pub fn post(&self) -> Option<&Message> {
        self.channel_post
            .as_ref()
            .or(self.edited_channel_post.as_ref())
            .or(self.message.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub message_id: i64,
    pub date: i64,
    pub chat: Chat,
    pub text: Option<String>,
    pub caption: Option<String>,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
    #[serde(default)]
    pub caption_entities: Vec<MessageEntity>,
    pub photo: Option<Vec<PhotoSize>>,
}

impl Message {
    /// Message text, falling back to the media caption.
    pub fn text_content(&self) -> &str {
        self.text
            .as_deref()
            .or(self.caption.as_deref())
            .unwrap_or("")
    }

    /// Entities for whichever of text/caption is in use.
    pub fn active_entities(&self) -> &[MessageEntity] {
        if self.text.is_some() {
            &self.entities
        } else {
            &self.caption_entities
        }
    }

    /// file_id of the largest attached photo rendition, if any.
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photo
            .as_deref()?
            .iter()
            .max_by_key(|p| p.width * p.height)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    pub title: Option<String>,
    pub username: Option<String>,
}

/// A span annotation in message text. Offsets are UTF-16 code units.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: usize,
    pub length: usize,
    /// Target for `text_link` entities.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileInfo {
    pub file_id: String,
    pub file_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_channel_post_update() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 7,
            "channel_post": {
                "message_id": 42,
                "date": 1700000000,
                "chat": { "id": -1002955338551i64, "type": "channel", "title": "Prime Picks" },
                "text": "Deal https://amzn.to/abc",
                "entities": [{ "type": "url", "offset": 5, "length": 20 }]
            }
        }))
        .unwrap();

        let post = update.post().unwrap();
        assert_eq!(post.message_id, 42);
        assert_eq!(post.chat.id, -1002955338551);
        assert_eq!(post.active_entities()[0].kind, "url");
    }

    #[test]
    fn edited_post_counts_as_post() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 8,
            "edited_channel_post": {
                "message_id": 42,
                "date": 1700000100,
                "chat": { "id": -100, "type": "channel" },
                "text": "edited"
            }
        }))
        .unwrap();
        assert_eq!(update.post().unwrap().text_content(), "edited");
    }

    #[test]
    fn caption_falls_back_for_photo_posts() {
        let msg: Message = serde_json::from_value(serde_json::json!({
            "message_id": 1,
            "date": 1700000000,
            "chat": { "id": -100, "type": "channel" },
            "caption": "Photo deal",
            "caption_entities": [{ "type": "url", "offset": 0, "length": 5 }],
            "photo": [
                { "file_id": "small", "width": 90, "height": 90 },
                { "file_id": "big", "width": 800, "height": 800 }
            ]
        }))
        .unwrap();

        assert_eq!(msg.text_content(), "Photo deal");
        assert_eq!(msg.active_entities().len(), 1);
        assert_eq!(msg.largest_photo().unwrap().file_id, "big");
    }
}
