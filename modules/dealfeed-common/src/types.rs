use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Page slug used when a message arrives from a channel the registry
/// does not know.
pub const FALLBACK_PAGE_SLUG: &str = "fallback";

/// Image used for catalog items persisted without any usable image.
pub const PLACEHOLDER_IMAGE_URL: &str = "https://placehold.co/300x300?text=Product";

// --- Affiliate strategies ---

/// How a product URL is rewritten for a given channel. Tagged so channel
/// registry files can spell strategies out in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AffiliateStrategy {
    /// Set fixed query parameters on the product URL itself.
    TagInjection { params: Vec<(String, String)> },
    /// Wrap the product URL inside a redirector endpoint.
    RedirectWrapper {
        endpoint: String,
        url_param: String,
        #[serde(default)]
        extra: Vec<(String, String)>,
    },
    /// Append a literal token (already `key=value` form) to the URL.
    SuffixToken { token: String },
    /// Several candidate strategies; the first one is applied.
    MultiPlatform { candidates: Vec<AffiliateStrategy> },
    /// Leave the URL untouched (curated channels post pre-tagged links).
    Passthrough,
}

// --- Channels ---

/// Static description of one monitored Telegram channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Telegram chat id (negative for channels).
    pub chat_id: i64,
    pub page_name: String,
    pub page_slug: String,
    /// Affiliate network label stored on persisted items.
    pub platform: String,
    pub strategy: AffiliateStrategy,
}

// --- Incoming messages ---

/// A text span annotated by Telegram. Offsets are UTF-16 code units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySpan {
    pub kind: String,
    pub offset: usize,
    pub length: usize,
    pub url: Option<String>,
}

/// A channel post normalized from a Telegram update, before any processing.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub channel_id: i64,
    pub channel_title: Option<String>,
    pub message_id: i64,
    pub text: String,
    pub entities: Vec<EntitySpan>,
    /// Direct link to the largest attached photo, resolved by the
    /// transport before the message enters the pipeline.
    pub photo_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

// --- Extraction ---

/// Product fields scraped from a page. Every field is independent; an
/// empty product is a valid result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedProduct {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Display string with separators but no symbol (e.g. "1,299");
    /// the currency travels in its own field.
    pub price: Option<String>,
    pub original_price: Option<String>,
    pub currency: Option<String>,
    pub image_url: Option<String>,
}

impl ExtractedProduct {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.price.is_none()
            && self.original_price.is_none()
            && self.image_url.is_none()
    }
}

// --- Persistence inputs ---

/// Parameters for inserting a staging row. Written before any network work
/// so the raw message survives a crash.
#[derive(Debug, Clone)]
pub struct NewStagingRecord {
    pub channel_id: i64,
    pub channel_name: String,
    pub page_slug: String,
    pub message_id: i64,
    pub original_text: String,
    pub extracted_urls: Vec<String>,
    pub image_url: Option<String>,
    pub telegram_timestamp: DateTime<Utc>,
}

/// Parameters for inserting a catalog item.
#[derive(Debug, Clone)]
pub struct NewCatalogItem {
    pub title: String,
    pub description: String,
    pub price: Option<String>,
    pub original_price: Option<String>,
    pub currency: String,
    pub image_url: Option<String>,
    pub affiliate_url: String,
    pub category: String,
    pub display_pages: Vec<String>,
    pub is_featured: bool,
    pub is_service: bool,
    pub is_ai_app: bool,
    pub source_staging_id: Option<Uuid>,
    pub affiliate_platform: String,
    pub discount_percent: Option<i32>,
}

// --- Slugs ---

/// Normalize a page name into a slug: lowercase, runs of non-alphanumerics
/// collapse to a single hyphen, no leading or trailing hyphen.
pub fn normalize_slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_hyphen = true;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_hyphen = false;
        } else if !last_hyphen {
            out.push('-');
            last_hyphen = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}
