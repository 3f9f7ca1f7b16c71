//! API server for the webhook service

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::routes::{
    create_webhook, delete_webhook, dispatch_event, get_webhook, health_check, list_webhooks,
    metrics_handler, request_password_reset, send_otp, update_webhook, verify_otp, AppState,
    SharedState,
};
use crate::config::{Config, ServerConfig};
use crate::metrics;
use crate::otp::{LogNotifier, OtpService};
use crate::webhooks::{Dispatcher, HttpDeliveryClient, InMemoryRegistry};

/// Build the router over the given state
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/webhooks", post(create_webhook).get(list_webhooks))
        .route("/webhooks/events", post(dispatch_event))
        .route(
            "/webhooks/{id}",
            get(get_webhook).put(update_webhook).delete(delete_webhook),
        )
        .route("/auth/otp", post(send_otp))
        .route("/auth/otp/verify", post(verify_otp))
        .route("/auth/reset-password", post(request_password_reset))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Application state wired with the in-memory registry and HTTP delivery
pub fn default_state(config: &Config) -> SharedState {
    let registry = Arc::new(InMemoryRegistry::new());
    let dispatcher = Dispatcher::new(
        registry.clone(),
        Arc::new(HttpDeliveryClient::new()),
        config.delivery.clone(),
    );

    Arc::new(AppState {
        registry,
        dispatcher: Arc::new(dispatcher),
        otp: OtpService::new(Arc::new(LogNotifier), config.otp.clone()),
    })
}

/// How often expired codes and tokens are swept
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// API server
pub struct ApiServer {
    config: Config,
}

impl ApiServer {
    /// Create a new API server with configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Start the API server and run until Ctrl-C
    pub async fn start(self) -> Result<()> {
        metrics::init().context("Failed to initialize metrics")?;

        let listener = bind_listener(&self.config.server).await?;
        info!("Starting API server on {}", listener.local_addr()?);

        let state = default_state(&self.config);
        let sweeper = tokio::spawn(purge_loop(state.clone()));
        let app = build_router(state);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("API server error")?;

        sweeper.abort();
        info!("API server stopped");
        Ok(())
    }
}

/// Bind the configured `host:port`; host names are resolved
pub async fn bind_listener(server: &ServerConfig) -> Result<TcpListener> {
    let addr = server.bind_addr();
    TcpListener::bind(addr.as_str())
        .await
        .with_context(|| format!("Failed to bind API server on {}", addr))
}

async fn purge_loop(state: SharedState) {
    let mut interval = tokio::time::interval(PURGE_INTERVAL);
    loop {
        interval.tick().await;
        state.otp.purge_expired().await;
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler, keep serving
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
