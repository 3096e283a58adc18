//! Webhook HTTP server.
//!
//! Every response is `200 OK`: a non-200 makes Telegram redeliver the update.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::bot::{Database, Dispatcher, Update};

pub const HEALTH_TEXT: &str = "Evil Ban Checker is running.";

pub struct AppState {
    pub database: Database,
    pub dispatcher: Dispatcher,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/webhook", post(webhook))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve until Ctrl-C.
pub async fn run(addr: &str, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Starting webhook server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn health() -> &'static str {
    HEALTH_TEXT
}

async fn webhook(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> &'static str {
    // Oversized or unreadable bodies are acknowledged like malformed ones
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            debug!("Ignoring unreadable webhook body: {e}");
            return "OK";
        }
    };

    let Some(update) = Update::parse(&body) else {
        debug!("Ignoring unparseable webhook body ({} bytes)", body.len());
        return "OK";
    };

    let store = match state.database.open() {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open store: {e}");
            return "OK";
        }
    };

    if let Err(e) = state.dispatcher.handle(&store, update).await {
        error!("Failed to handle update: {e}");
    }

    "OK"
}
