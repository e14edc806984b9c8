//! mirage server entry point.
//!
//! Boots the HTTP proxy with configuration loaded from the environment.
//! Logs are written as JSON to stderr.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use mirage_core::{AppConfig, CacheStore};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod orchestrator;
mod routes;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let addr = config.bind_addr()?;
    let state = handler::AppState::from_config(&config)?;

    if let Some(period) = config.cache_sweep_interval() {
        tokio::spawn(sweep_expired(Arc::clone(state.cache()), period));
    }

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, cache_ttl_secs = config.cache_ttl_secs, "Starting mirage proxy");

    axum::serve(listener, handler::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("mirage proxy stopped");
    Ok(())
}

/// Evict expired cache entries every `period` for the life of the process.
async fn sweep_expired(cache: Arc<CacheStore>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        cache.purge_expired();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
