//! HTTP server exposing the gateway
//!
//! Routes:
//! - `GET /health` liveness check
//! - `POST /api/chat` one persona turn, as JSON or a server-sent event stream
//! - `GET /api/provider` the backend requests would currently use
//! - `POST /api/conversation/stats` token savings of the conversation window

mod handlers;

pub use handlers::{ChatRequest, ChatResponse, PROVIDER_HEADER, StatsRequest};

use axum::{
    Json, Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::{PulseError, Result};
use crate::gateway::Gateway;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Fallback gateway, built once at startup
    pub gateway: Arc<Gateway>,
}

/// The pulse HTTP server
pub struct PulseServer {
    config: ServerConfig,
    gateway: Arc<Gateway>,
}

impl PulseServer {
    pub fn new(config: ServerConfig, gateway: Arc<Gateway>) -> Self {
        Self { config, gateway }
    }

    /// Bind the listen address and serve until a shutdown signal arrives
    pub async fn serve(&self) -> Result<()> {
        let app = create_router(Arc::new(AppState {
            gateway: Arc::clone(&self.gateway),
        }));

        let addr: SocketAddr = self
            .config
            .listen_addr
            .parse()
            .map_err(|e| PulseError::Config(format!("Invalid listen address: {e}")))?;

        tracing::info!("Starting pulse server on {addr}");
        tracing::info!(
            "Backend order: [{}] then offline",
            self.gateway.backend_names().join(", ")
        );

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| PulseError::Server(format!("Failed to bind to {addr}: {e}")))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| PulseError::Server(format!("Server error: {e}")))?;

        tracing::info!("Pulse server shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(handlers::chat_handler))
        .route("/api/provider", get(handlers::provider_handler))
        .route("/api/conversation/stats", post(handlers::stats_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
