//! Webhook transport: Telegram POSTs updates to /webhook/{token}. The
//! handler acknowledges immediately and processes in the background, so
//! slow product pages never make Telegram re-deliver.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info};

use dealfeed_common::Config;
use dealfeed_ingest::Pipeline;
use telegram_client::{TelegramClient, Update};

use crate::incoming;

pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub telegram: Arc<TelegramClient>,
    pub webhook_secret: String,
}

pub async fn serve(
    config: &Config,
    telegram: Arc<TelegramClient>,
    pipeline: Arc<Pipeline>,
) -> Result<()> {
    let state = Arc::new(AppState {
        pipeline,
        telegram,
        webhook_secret: config.webhook_secret.clone(),
    });

    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/health", get(health))
        .route("/webhook/{token}", post(receive_update))
        .with_state(state)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("webhook transport listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn receive_update(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(update): Json<Update>,
) -> impl IntoResponse {
    if !constant_time_eq(token.as_bytes(), state.webhook_secret.as_bytes()) {
        return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "ok": false })));
    }

    if let Some(raw) = incoming::raw_message(&update, &state.telegram).await {
        let pipeline = state.pipeline.clone();
        tokio::spawn(async move {
            if let Err(e) = pipeline.process(&raw).await {
                error!(
                    channel_id = raw.channel_id,
                    message_id = raw.message_id,
                    error = %e,
                    "processing failed"
                );
            }
        });
    }

    (StatusCode::OK, Json(serde_json::json!({ "ok": true })))
}

/// Constant-time comparison to prevent timing attacks on the path token.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
