//! The ingestion pipeline: route, parse, stage, then resolve and persist
//! each product. The staging write happens before any network work so a
//! crash never loses the raw message.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use dealfeed_common::{
    NewCatalogItem, NewStagingRecord, RawMessage, Result, PLACEHOLDER_IMAGE_URL,
};

use crate::affiliate;
use crate::alert::AlertSink;
use crate::categorize;
use crate::extract::{self, prices};
use crate::fetch::PageFetcher;
use crate::parser::{self, MessageItem, ParsedMessage};
use crate::resolver;
use crate::router::{ChannelRegistry, Route};
use crate::store::CatalogStore;

pub const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_MS: u64 = 200;
const RETRY_JITTER_MS: u64 = 100;

const GENERIC_TITLE: &str = "Product from Telegram";

/// What `process` did with one message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOutcome {
    pub staging_id: Option<Uuid>,
    pub items_inserted: usize,
    pub items_failed: usize,
    pub matched_channel: bool,
}

pub struct Pipeline {
    store: Arc<dyn CatalogStore>,
    fetcher: Arc<dyn PageFetcher>,
    alerts: Arc<dyn AlertSink>,
    registry: ChannelRegistry,
    default_currency: String,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        fetcher: Arc<dyn PageFetcher>,
        alerts: Arc<dyn AlertSink>,
        registry: ChannelRegistry,
        default_currency: String,
    ) -> Self {
        Self {
            store,
            fetcher,
            alerts,
            registry,
            default_currency,
        }
    }

    pub async fn process(&self, msg: &RawMessage) -> Result<ProcessOutcome> {
        let route = self
            .registry
            .resolve(msg.channel_id, msg.channel_title.as_deref());
        if !route.matched {
            warn!(
                channel_id = msg.channel_id,
                title = msg.channel_title.as_deref().unwrap_or(""),
                "message from unrecognized channel, using fallback page"
            );
            self.alerts
                .notify(&format!(
                    "Unrecognized channel {} ({}); message {} quarantined to '{}'",
                    msg.channel_id,
                    msg.channel_title.as_deref().unwrap_or("untitled"),
                    msg.message_id,
                    route.config.page_slug
                ))
                .await;
        }

        let parsed = parser::parse(msg);
        let urls: Vec<String> = parsed.items.iter().map(|i| i.url.clone()).collect();

        let staging = NewStagingRecord {
            channel_id: msg.channel_id,
            channel_name: route.config.page_name.clone(),
            page_slug: route.config.page_slug.clone(),
            message_id: msg.message_id,
            original_text: msg.text.clone(),
            extracted_urls: urls,
            image_url: msg.photo_url.clone(),
            telegram_timestamp: msg.timestamp,
        };

        let staging_id = match with_retry("insert_staging", || self.store.insert_staging(&staging))
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.alerts
                    .notify(&format!(
                        "Failed to stage message {} from channel {}: {e}",
                        msg.message_id, msg.channel_id
                    ))
                    .await;
                return Err(e);
            }
        };

        let mut outcome = ProcessOutcome {
            staging_id: Some(staging_id),
            matched_channel: route.matched,
            ..Default::default()
        };
        let mut errors: Vec<String> = Vec::new();

        if parsed.items.is_empty() {
            // Text-only deal: persist what the message itself gave us.
            let item = self.fallback_item(msg, &parsed, &route, staging_id);
            self.insert_item(&item, &mut outcome, &mut errors).await;
        } else {
            for entry in &parsed.items {
                let item = self
                    .build_item(msg, &parsed, entry, &route, staging_id)
                    .await;
                self.insert_item(&item, &mut outcome, &mut errors).await;
            }
        }

        let processed = outcome.items_inserted > 0;
        let error_text = (!errors.is_empty()).then(|| errors.join("; "));
        if let Err(e) = self
            .store
            .mark_staging(staging_id, processed, error_text.as_deref())
            .await
        {
            warn!(staging_id = %staging_id, error = %e, "failed to mark staging row");
        }

        if outcome.items_failed > 0 {
            self.alerts
                .notify(&format!(
                    "{}/{} items failed for message {} on '{}'",
                    outcome.items_failed,
                    outcome.items_failed + outcome.items_inserted,
                    msg.message_id,
                    route.config.page_slug
                ))
                .await;
        }

        info!(
            staging_id = %staging_id,
            inserted = outcome.items_inserted,
            failed = outcome.items_failed,
            page = %route.config.page_slug,
            "message processed"
        );
        Ok(outcome)
    }

    /// Resolve one URL, scrape it, and assemble the catalog item. Never
    /// fails: an unreachable page degrades to message-derived fields.
    async fn build_item(
        &self,
        msg: &RawMessage,
        parsed: &ParsedMessage,
        entry: &MessageItem,
        route: &Route,
        staging_id: Uuid,
    ) -> NewCatalogItem {
        let resolution = resolver::resolve(self.fetcher.as_ref(), &entry.url).await;
        let hostname = resolution.hostname();
        let product = extract::extract(
            &resolution.body,
            &resolution.final_url,
            &hostname,
            &self.default_currency,
        );

        let affiliate_url = affiliate::convert(&resolution.final_url, &route.config.strategy);

        let title = entry
            .title
            .clone()
            .or_else(|| product.title.clone())
            .or_else(|| parsed.title.clone())
            .unwrap_or_else(|| {
                if hostname.is_empty() {
                    GENERIC_TITLE.to_string()
                } else {
                    format!("Product from {hostname}")
                }
            });

        // Page and message each come pre-ordered, but mixing one side's
        // price with the other's original can still invert the pair.
        let (price, original_price) = prices::order_pair(
            product.price.clone().or_else(|| parsed.price.clone()),
            product
                .original_price
                .clone()
                .or_else(|| parsed.original_price.clone()),
        );
        let discount_percent = match (&price, &original_price) {
            (Some(p), Some(o)) => prices::discount_percent(p, o).or(parsed.discount_percent),
            _ => parsed.discount_percent,
        };
        let currency = product
            .currency
            .clone()
            .or_else(|| parsed.currency.clone())
            .unwrap_or_else(|| self.default_currency.clone());

        let description = self.describe(product.description.as_deref(), parsed);
        let image_url = product
            .image_url
            .clone()
            .or_else(|| msg.photo_url.clone())
            .unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_string());

        let cat = categorize::categorize(
            &title,
            &description,
            &route.config.page_slug,
            &route.config.platform,
        );

        NewCatalogItem {
            title,
            description,
            price,
            original_price,
            currency,
            image_url: Some(image_url),
            affiliate_url,
            category: cat.category,
            display_pages: cat.display_pages,
            is_featured: cat.is_featured,
            is_service: cat.is_service,
            is_ai_app: cat.is_ai_app,
            source_staging_id: Some(staging_id),
            affiliate_platform: route.config.platform.clone(),
            discount_percent,
        }
    }

    /// Item for a message that carried no URL at all.
    fn fallback_item(
        &self,
        msg: &RawMessage,
        parsed: &ParsedMessage,
        route: &Route,
        staging_id: Uuid,
    ) -> NewCatalogItem {
        let title = parsed
            .title
            .clone()
            .unwrap_or_else(|| GENERIC_TITLE.to_string());
        let description = self.describe(None, parsed);
        let image_url = msg
            .photo_url
            .clone()
            .unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_string());

        let cat = categorize::categorize(
            &title,
            &description,
            &route.config.page_slug,
            &route.config.platform,
        );

        NewCatalogItem {
            title,
            description,
            price: parsed.price.clone(),
            original_price: parsed.original_price.clone(),
            currency: parsed
                .currency
                .clone()
                .unwrap_or_else(|| self.default_currency.clone()),
            image_url: Some(image_url),
            affiliate_url: String::new(),
            category: cat.category,
            display_pages: cat.display_pages,
            is_featured: cat.is_featured,
            is_service: cat.is_service,
            is_ai_app: cat.is_ai_app,
            source_staging_id: Some(staging_id),
            affiliate_platform: route.config.platform.clone(),
            discount_percent: parsed.discount_percent,
        }
    }

    fn describe(&self, scraped: Option<&str>, parsed: &ParsedMessage) -> String {
        let base = scraped
            .map(str::to_string)
            .or_else(|| parsed.description.clone())
            .unwrap_or_default();
        match &parsed.discount_line {
            Some(line) if base.is_empty() => line.clone(),
            Some(line) => format!("{base}\n{line}"),
            None => base,
        }
    }

    /// Insert one item, retrying transient storage errors. A failure is
    /// recorded but never aborts the remaining items of the message.
    async fn insert_item(
        &self,
        item: &NewCatalogItem,
        outcome: &mut ProcessOutcome,
        errors: &mut Vec<String>,
    ) {
        match with_retry("insert_item", || self.store.insert_item(item)).await {
            Ok(_) => outcome.items_inserted += 1,
            Err(e) => {
                warn!(title = %item.title, error = %e, "item insert failed");
                outcome.items_failed += 1;
                errors.push(format!("{}: {e}", item.title));
            }
        }
    }
}

/// Retry a storage operation on transient errors with exponential backoff
/// and jitter. Permanent errors surface immediately.
async fn with_retry<T, F, Fut>(op: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt + 1 < RETRY_ATTEMPTS => {
                let backoff = RETRY_BASE_MS * 3u64.pow(attempt)
                    + rand::rng().random_range(0..RETRY_JITTER_MS);
                warn!(op, attempt, backoff_ms = backoff, error = %e, "transient failure, retrying");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dealfeed_common::FALLBACK_PAGE_SLUG;

    use crate::testutil::{CountingAlerter, MemoryCatalogStore, ScriptedFetcher};

    const AMAZON_HTML: &str = r#"
        <span id="productTitle">Sony WH-1000XM5 Wireless Headphones</span>
        <div class="a-price"><span class="a-offscreen">₹24,990</span></div>
        <div class="a-price a-text-price"><span class="a-offscreen">₹34,990</span></div>
        <script>"hiRes":"https://m.media-amazon.example/I/sony.jpg"</script>
    "#;

    fn msg(channel_id: i64, text: &str) -> RawMessage {
        RawMessage {
            channel_id,
            channel_title: None,
            message_id: 7,
            text: text.to_string(),
            entities: Vec::new(),
            photo_url: None,
            timestamp: Utc::now(),
        }
    }

    fn pipeline(
        store: Arc<MemoryCatalogStore>,
        fetcher: ScriptedFetcher,
        alerts: Arc<CountingAlerter>,
    ) -> Pipeline {
        Pipeline::new(
            store,
            Arc::new(fetcher),
            alerts,
            ChannelRegistry::default(),
            "INR".to_string(),
        )
    }

    #[tokio::test]
    async fn happy_path_stages_then_inserts() {
        let store = Arc::new(MemoryCatalogStore::new());
        let alerts = Arc::new(CountingAlerter::new());
        let fetcher = ScriptedFetcher::new()
            .redirect("https://amzn.to/xyz", "https://www.amazon.in/dp/B0ABCDEFGH")
            .page("https://www.amazon.in/dp/B0ABCDEFGH", 200, AMAZON_HTML);
        let p = pipeline(store.clone(), fetcher, alerts.clone());

        let out = p
            .process(&msg(-1002955338551, "Deal @ ₹24,990\nhttps://amzn.to/xyz"))
            .await
            .unwrap();

        assert!(out.matched_channel);
        assert_eq!(out.items_inserted, 1);
        assert_eq!(out.items_failed, 0);
        assert_eq!(store.staged_count(), 1);
        assert_eq!(store.item_count(), 1);
        assert_eq!(alerts.count(), 0);

        let items = store.items.lock().unwrap();
        let item = &items[0];
        assert_eq!(item.title, "Sony WH-1000XM5 Wireless Headphones");
        assert_eq!(item.price.as_deref(), Some("24,990"));
        assert_eq!(item.original_price.as_deref(), Some("34,990"));
        assert_eq!(item.discount_percent, Some(29));
        assert!(item.affiliate_url.contains("tag=pickntrust03-21"));
        assert_eq!(item.affiliate_platform, "amazon");
        assert!(item.is_featured);
        assert!(item.display_pages.contains(&"prime-picks".to_string()));
        assert_eq!(item.source_staging_id, out.staging_id);

        let staging = store.staging.lock().unwrap();
        assert!(staging[0].processed);
        assert_eq!(staging[0].error, None);
        assert_eq!(
            staging[0].record.extracted_urls,
            vec!["https://amzn.to/xyz".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_staging_failures_are_retried() {
        let store = Arc::new(MemoryCatalogStore::new());
        store.fail_staging_transiently(2);
        let alerts = Arc::new(CountingAlerter::new());
        let fetcher =
            ScriptedFetcher::new().page("https://shop.example/p/steel-bottle", 200, "<html></html>");
        let p = pipeline(store.clone(), fetcher, alerts.clone());

        let out = p
            .process(&msg(-1003029983162, "https://shop.example/p/steel-bottle"))
            .await
            .unwrap();

        assert_eq!(store.staged_count(), 1);
        assert_eq!(out.items_inserted, 1);
        assert_eq!(alerts.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn staging_failure_after_retries_surfaces() {
        let store = Arc::new(MemoryCatalogStore::new());
        store.fail_staging_transiently(RETRY_ATTEMPTS as usize);
        let alerts = Arc::new(CountingAlerter::new());
        let p = pipeline(store.clone(), ScriptedFetcher::new(), alerts.clone());

        let result = p.process(&msg(-1003029983162, "https://x.example/p")).await;

        assert!(result.is_err());
        assert_eq!(store.staged_count(), 0);
        assert_eq!(store.item_count(), 0);
        assert_eq!(alerts.count(), 1);
    }

    #[tokio::test]
    async fn unknown_channel_is_quarantined_with_alert() {
        let store = Arc::new(MemoryCatalogStore::new());
        let alerts = Arc::new(CountingAlerter::new());
        let fetcher = ScriptedFetcher::new().page("https://shop.example/p/1", 200, "");
        let p = pipeline(store.clone(), fetcher, alerts.clone());

        let out = p
            .process(&msg(-999, "Mystery deal\nhttps://shop.example/p/1"))
            .await
            .unwrap();

        assert!(!out.matched_channel);
        assert_eq!(alerts.count(), 1);
        let staging = store.staging.lock().unwrap();
        assert_eq!(staging[0].record.page_slug, FALLBACK_PAGE_SLUG);
        // Passthrough strategy: URL survives untouched.
        let items = store.items.lock().unwrap();
        assert_eq!(items[0].affiliate_url, "https://shop.example/p/1");
    }

    #[tokio::test]
    async fn message_without_urls_yields_fallback_item() {
        let store = Arc::new(MemoryCatalogStore::new());
        let alerts = Arc::new(CountingAlerter::new());
        let p = pipeline(store.clone(), ScriptedFetcher::new(), alerts.clone());

        let mut m = msg(-1002991047787, "Wireless Earbuds Combo\nPrice: ₹799");
        m.photo_url = None;
        let out = p.process(&m).await.unwrap();

        assert_eq!(out.items_inserted, 1);
        let items = store.items.lock().unwrap();
        assert_eq!(items[0].title, "Wireless Earbuds Combo");
        assert_eq!(items[0].price.as_deref(), Some("799"));
        assert_eq!(items[0].image_url.as_deref(), Some(PLACEHOLDER_IMAGE_URL));
        assert_eq!(items[0].affiliate_url, "");
    }

    #[tokio::test]
    async fn multi_item_messages_pair_titles_per_url() {
        let store = Arc::new(MemoryCatalogStore::new());
        let alerts = Arc::new(CountingAlerter::new());
        let fetcher = ScriptedFetcher::new()
            .page("https://shop.example/p/a", 200, "")
            .page("https://shop.example/p/b", 200, "");
        let p = pipeline(store.clone(), fetcher, alerts.clone());

        let text = "Boat Airdopes Earbuds\nhttps://shop.example/p/a\n\nMi Power Bank 20000mAh\nhttps://shop.example/p/b";
        let out = p.process(&msg(-1003017626269, text)).await.unwrap();

        assert_eq!(out.items_inserted, 2);
        let items = store.items.lock().unwrap();
        assert_eq!(items[0].title, "Boat Airdopes Earbuds");
        assert_eq!(items[1].title, "Mi Power Bank 20000mAh");
        // earnkaro channel wraps every URL.
        assert!(items[0]
            .affiliate_url
            .starts_with("https://earnkaro.com/api/redirect?url="));
    }

    #[tokio::test(start_paused = true)]
    async fn item_failures_are_isolated_per_url() {
        let store = Arc::new(MemoryCatalogStore::new());
        store.fail_items_permanently(1);
        let alerts = Arc::new(CountingAlerter::new());
        let fetcher = ScriptedFetcher::new()
            .page("https://shop.example/p/a", 200, "")
            .page("https://shop.example/p/b", 200, "");
        let p = pipeline(store.clone(), fetcher, alerts.clone());

        let text = "First Gadget Deal\nhttps://shop.example/p/a\nSecond Gadget Deal\nhttps://shop.example/p/b";
        let out = p.process(&msg(-1003029983162, text)).await.unwrap();

        assert_eq!(out.items_inserted, 1);
        assert_eq!(out.items_failed, 1);
        assert_eq!(store.item_count(), 1);
        assert_eq!(alerts.count(), 1);

        let staging = store.staging.lock().unwrap();
        assert!(staging[0].processed);
        assert!(staging[0].error.as_deref().unwrap().contains("First Gadget Deal"));
    }

    #[tokio::test]
    async fn merged_price_pair_stays_ordered() {
        let store = Arc::new(MemoryCatalogStore::new());
        let alerts = Arc::new(CountingAlerter::new());
        // Page gives only a selling price, message only a (lower) regular
        // price; the merged pair must not persist inverted.
        let fetcher = ScriptedFetcher::new().page(
            "https://shop.example/p/kettle",
            200,
            r#"<span class="price-item price-item--sale">₹1,999</span>"#,
        );
        let p = pipeline(store.clone(), fetcher, alerts.clone());

        let text = "Premium Kettle Combo\nReg @ 999\nhttps://shop.example/p/kettle";
        let out = p.process(&msg(-1003029983162, text)).await.unwrap();

        assert_eq!(out.items_inserted, 1);
        let items = store.items.lock().unwrap();
        assert_eq!(items[0].price.as_deref(), Some("999"));
        assert_eq!(items[0].original_price.as_deref(), Some("1,999"));
        assert_eq!(items[0].discount_percent, Some(50));
    }

    #[tokio::test]
    async fn unreachable_page_still_persists_message_fields() {
        let store = Arc::new(MemoryCatalogStore::new());
        let alerts = Arc::new(CountingAlerter::new());
        // Fetcher knows no URLs: resolution fails with status 0.
        let p = pipeline(store.clone(), ScriptedFetcher::new(), alerts.clone());

        let text = "Smart Watch Strap Deal\n₹299 ₹999\nhttps://dead.example/p/1";
        let out = p.process(&msg(-1003029983162, text)).await.unwrap();

        assert_eq!(out.items_inserted, 1);
        let items = store.items.lock().unwrap();
        assert_eq!(items[0].title, "Smart Watch Strap Deal");
        assert_eq!(items[0].price.as_deref(), Some("299"));
        assert_eq!(items[0].original_price.as_deref(), Some("999"));
        assert_eq!(items[0].discount_percent, Some(70));
        assert_eq!(items[0].image_url.as_deref(), Some(PLACEHOLDER_IMAGE_URL));
    }
}
