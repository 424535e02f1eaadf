//! Long-poll transport for environments without a public HTTPS endpoint.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use dealfeed_ingest::Pipeline;
use telegram_client::TelegramClient;

use crate::incoming;

const ERROR_BACKOFF: Duration = Duration::from_secs(5);

pub async fn run(telegram: Arc<TelegramClient>, pipeline: Arc<Pipeline>) -> Result<()> {
    info!("long-poll transport started");
    let mut offset: Option<i64> = None;

    loop {
        match telegram.get_updates(offset).await {
            Ok(updates) => {
                for update in updates {
                    // Acknowledge before processing: a poisoned message must
                    // not wedge the feed on restart.
                    offset = Some(update.update_id + 1);
                    if let Some(raw) = incoming::raw_message(&update, &telegram).await {
                        if let Err(e) = pipeline.process(&raw).await {
                            error!(
                                update_id = update.update_id,
                                channel_id = raw.channel_id,
                                error = %e,
                                "processing failed"
                            );
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "getUpdates failed, backing off");
                tokio::time::sleep(ERROR_BACKOFF).await;
            }
        }
    }
}
