//! # Initialization
//!
//! Process bootstrap: rustls setup, tracing, metrics registration and the
//! metrics/probe server.

use crate::config::ControllerConfig;
use crate::controller::server::{bind, start_server, ServerState};
use crate::observability;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Install ring as the process-wide rustls crypto provider
///
/// Must run before the Kubernetes client opens its first connection.
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }
}

/// Set up the global tracing subscriber
///
/// `RUST_LOG` wins over `LOG_LEVEL` when both are set.
pub fn init_tracing(settings: &ControllerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(settings.log_filter()));

    let result = if settings.json_logs() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };
    if let Err(e) = result {
        eprintln!("Tracing subscriber already initialized: {e}");
    }

    info!("Starting kube-secret-pipe");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
}

/// Register metrics and, when enabled, serve `/metrics`, `/healthz` and `/readyz`
pub async fn start_observability(settings: &ControllerConfig) -> Result<Arc<ServerState>> {
    observability::metrics::register_metrics().context("Failed to register metrics")?;

    let server_state = Arc::new(ServerState::default());
    if !settings.enable_metrics {
        info!("Metrics and probe server disabled");
        return Ok(server_state);
    }

    let listener = bind(settings.metrics_port)
        .await
        .with_context(|| format!("Failed to bind HTTP server on port {}", settings.metrics_port))?;
    let state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if let Err(e) = start_server(listener, state).await {
            error!("HTTP server error: {}", e);
        }
    });

    Ok(server_state)
}
