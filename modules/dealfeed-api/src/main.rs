use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dealfeed_common::{Config, Transport};
use dealfeed_ingest::alert::{AlertSink, NoopAlerter, TelegramAlerter};
use dealfeed_ingest::fetch::HttpFetcher;
use dealfeed_ingest::{ChannelRegistry, PgCatalogStore, Pipeline};
use telegram_client::TelegramClient;

mod incoming;
mod poller;
mod webhook;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dealfeed=info".parse()?))
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = PgCatalogStore::new(pool);
    store.migrate().await?;

    let registry = match &config.channels_file {
        Some(path) => {
            info!(path, "loading channel registry from file");
            ChannelRegistry::from_json_file(path)?
        }
        None => ChannelRegistry::default(),
    };
    info!(channels = registry.len(), "channel registry ready");

    let telegram = Arc::new(TelegramClient::new(&config.bot_token));
    let alerts: Arc<dyn AlertSink> = match config.alert_chat_id {
        Some(chat_id) => Arc::new(TelegramAlerter::new(
            TelegramClient::new(&config.bot_token),
            chat_id,
        )),
        None => Arc::new(NoopAlerter),
    };

    let pipeline = Arc::new(Pipeline::new(
        Arc::new(store),
        Arc::new(HttpFetcher::new()),
        alerts,
        registry,
        config.default_currency.clone(),
    ));

    match config.transport {
        Transport::Poll => poller::run(telegram, pipeline).await,
        Transport::Webhook => webhook::serve(&config, telegram, pipeline).await,
    }
}
