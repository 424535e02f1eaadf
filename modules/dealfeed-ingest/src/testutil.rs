//! In-memory fakes for pipeline and resolver tests. No network, no
//! database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use dealfeed_common::{DealfeedError, NewCatalogItem, NewStagingRecord, Result};

use crate::alert::AlertSink;
use crate::fetch::{FetchResponse, PageFetcher};
use crate::store::CatalogStore;

// --- fetcher ---

/// Fetcher that replays a fixed URL -> response table. Unknown URLs fail
/// like an unreachable host.
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: HashMap<String, FetchResponse>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, status: u16, body: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            FetchResponse {
                status,
                location: None,
                body: body.to_string(),
            },
        );
        self
    }

    pub fn redirect(mut self, url: &str, location: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            FetchResponse {
                status: 302,
                location: Some(location.to_string()),
                body: String::new(),
            },
        );
        self
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| DealfeedError::Network(format!("no route to {url}")))
    }
}

// --- store ---

#[derive(Debug, Clone)]
pub struct StagedRow {
    pub id: Uuid,
    pub record: NewStagingRecord,
    pub processed: bool,
    pub error: Option<String>,
}

/// Vec-backed store with injectable failures for retry tests.
#[derive(Default)]
pub struct MemoryCatalogStore {
    pub staging: Mutex<Vec<StagedRow>>,
    pub items: Mutex<Vec<NewCatalogItem>>,
    transient_staging_failures: AtomicUsize,
    transient_item_failures: AtomicUsize,
    permanent_item_failures: AtomicUsize,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` staging inserts fail with a transient error.
    pub fn fail_staging_transiently(&self, n: usize) {
        self.transient_staging_failures.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` item inserts fail with a transient error.
    pub fn fail_items_transiently(&self, n: usize) {
        self.transient_item_failures.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` item inserts fail permanently.
    pub fn fail_items_permanently(&self, n: usize) {
        self.permanent_item_failures.store(n, Ordering::SeqCst);
    }

    pub fn staged_count(&self) -> usize {
        self.staging.lock().unwrap().len()
    }

    pub fn item_count(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn insert_staging(&self, rec: &NewStagingRecord) -> Result<Uuid> {
        if Self::take_failure(&self.transient_staging_failures) {
            return Err(DealfeedError::TransientStorage("injected".into()));
        }
        let id = Uuid::new_v4();
        self.staging.lock().unwrap().push(StagedRow {
            id,
            record: rec.clone(),
            processed: false,
            error: None,
        });
        Ok(id)
    }

    async fn mark_staging(&self, id: Uuid, processed: bool, error: Option<&str>) -> Result<()> {
        let mut rows = self.staging.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| DealfeedError::PermanentStorage(format!("no staging row {id}")))?;
        row.processed = processed;
        row.error = error.map(String::from);
        Ok(())
    }

    async fn insert_item(&self, item: &NewCatalogItem) -> Result<Uuid> {
        if Self::take_failure(&self.transient_item_failures) {
            return Err(DealfeedError::TransientStorage("injected".into()));
        }
        if Self::take_failure(&self.permanent_item_failures) {
            return Err(DealfeedError::PermanentStorage("injected".into()));
        }
        self.items.lock().unwrap().push(item.clone());
        Ok(Uuid::new_v4())
    }
}

// --- alerts ---

/// Records every alert it receives.
#[derive(Default)]
pub struct CountingAlerter {
    pub messages: Mutex<Vec<String>>,
}

impl CountingAlerter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl AlertSink for CountingAlerter {
    async fn notify(&self, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }
}
