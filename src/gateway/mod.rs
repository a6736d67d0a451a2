//! HTTP gateway: the game page plus its JSON and SSE endpoints.

pub mod api;
pub mod error;
pub mod page;

pub use error::ApiError;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::providers::{create_backend, InferenceRelay};
use crate::sessions::{create_session_store, SessionManager};

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub manager: SessionManager,
    pub relay: InferenceRelay,
    pub cookie_name: Arc<str>,
}

impl AppState {
    pub fn new(manager: SessionManager, relay: InferenceRelay, cookie_name: &str) -> Self {
        Self {
            manager,
            relay,
            cookie_name: Arc::from(cookie_name),
        }
    }

    /// Wire the store and backend described by `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = create_session_store(&config.storage).await?;
        let backend = create_backend(&config.ollama);
        Ok(Self::new(
            SessionManager::new(store),
            InferenceRelay::new(backend),
            &config.gateway.cookie_name,
        ))
    }
}

pub fn build_router(state: AppState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/", get(api::handle_index))
        .route("/ask", post(api::handle_ask))
        .route("/reset", post(api::handle_reset))
        .route("/ask-stream", post(api::handle_ask_stream))
        .route("/test-backend", get(api::handle_test_backend))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `host:port` and serve until Ctrl-C.
pub async fn run_gateway(host: &str, port: u16, config: Config) -> Result<()> {
    let state = AppState::from_config(&config).await?;
    tracing::info!(
        store = state.manager.store().name(),
        backend = state.relay.endpoint(),
        model = state.relay.model(),
        "Gateway state ready"
    );
    let app = build_router(state, config.gateway.body_limit_bytes);

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind gateway to {host}:{port}"))?;
    let local_addr = listener
        .local_addr()
        .context("Failed to read bound gateway address")?;

    tracing::info!("GuessMaster listening on http://{local_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Gateway server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping gateway");
}
