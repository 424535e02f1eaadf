use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use dealfeed_common::{NewCatalogItem, NewStagingRecord, Result};

/// Durable persistence for the pipeline. Staging writes happen before any
/// network work; catalog writes happen after extraction.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_staging(&self, rec: &NewStagingRecord) -> Result<Uuid>;
    async fn mark_staging(&self, id: Uuid, processed: bool, error: Option<&str>) -> Result<()>;
    async fn insert_item(&self, item: &NewCatalogItem) -> Result<Uuid>;
}

/// A row from the staging_records table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StagingRow {
    pub id: Uuid,
    pub channel_id: i64,
    pub channel_name: String,
    pub page_slug: String,
    pub message_id: i64,
    pub original_text: String,
    pub extracted_urls: serde_json::Value,
    pub image_url: Option<String>,
    pub is_processed: bool,
    pub is_posted: bool,
    pub processing_error: Option<String>,
    pub telegram_timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// A row from the catalog_items table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CatalogItemRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: Option<String>,
    pub original_price: Option<String>,
    pub currency: String,
    pub image_url: Option<String>,
    pub affiliate_url: String,
    pub category: String,
    pub display_pages: serde_json::Value,
    pub is_featured: bool,
    pub is_service: bool,
    pub is_ai_app: bool,
    pub source_staging_id: Option<Uuid>,
    pub affiliate_platform: String,
    pub status: String,
    pub visibility: String,
    pub processing_status: String,
    pub discount_percent: Option<i32>,
    pub created_at: DateTime<Utc>,
}

pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded SQL migrations. Called once at startup so a fresh
    /// database is usable without manual schema setup.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| dealfeed_common::DealfeedError::PermanentStorage(e.to_string()))?;
        Ok(())
    }

    /// Most recent staging rows for a channel, newest first.
    pub async fn staging_for_channel(&self, channel_id: i64, limit: i64) -> Result<Vec<StagingRow>> {
        let rows = sqlx::query_as::<_, StagingRow>(
            r#"
            SELECT * FROM staging_records
            WHERE channel_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(channel_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Catalog items produced from one staging row.
    pub async fn items_for_staging(&self, staging_id: Uuid) -> Result<Vec<CatalogItemRow>> {
        let rows = sqlx::query_as::<_, CatalogItemRow>(
            r#"
            SELECT * FROM catalog_items
            WHERE source_staging_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(staging_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn insert_staging(&self, rec: &NewStagingRecord) -> Result<Uuid> {
        let urls = serde_json::to_value(&rec.extracted_urls).unwrap_or_default();
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO staging_records
                (channel_id, channel_name, page_slug, message_id, original_text,
                 extracted_urls, image_url, telegram_timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(rec.channel_id)
        .bind(&rec.channel_name)
        .bind(&rec.page_slug)
        .bind(rec.message_id)
        .bind(&rec.original_text)
        .bind(&urls)
        .bind(&rec.image_url)
        .bind(rec.telegram_timestamp)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn mark_staging(&self, id: Uuid, processed: bool, error: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE staging_records
            SET is_processed = $2,
                processing_error = $3,
                processed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(processed)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_item(&self, item: &NewCatalogItem) -> Result<Uuid> {
        let pages = serde_json::to_value(&item.display_pages).unwrap_or_default();
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO catalog_items
                (title, description, price, original_price, currency, image_url,
                 affiliate_url, category, display_pages, is_featured, is_service,
                 is_ai_app, source_staging_id, affiliate_platform, discount_percent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING id
            "#,
        )
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.price)
        .bind(&item.original_price)
        .bind(&item.currency)
        .bind(&item.image_url)
        .bind(&item.affiliate_url)
        .bind(&item.category)
        .bind(&pages)
        .bind(item.is_featured)
        .bind(item.is_service)
        .bind(item.is_ai_app)
        .bind(item.source_staging_id)
        .bind(&item.affiliate_platform)
        .bind(item.discount_percent)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }
}
