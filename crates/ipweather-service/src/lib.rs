//! Request pipeline and HTTP boundary for IpWeather.
//!
//! Wires the rate limiter, cache and provider resolver around a per-request
//! record store connection.

pub mod cache;
pub mod client_ip;
pub mod http;
pub mod orchestrator;
pub mod rate_limit;

pub use cache::CacheManager;
pub use client_ip::extract_client_ip;
pub use http::{routes, serve, AppState};
pub use orchestrator::{RequestOrchestrator, Resolution};
pub use rate_limit::RateLimiter;

use anyhow::{Context, Result};
use ipweather_core::Config;
use ipweather_providers::ProviderResolver;
use ipweather_store::SqliteConnector;
use std::sync::Arc;

/// Build the SQLite-backed service from `config`.
pub fn build_state(config: &Config) -> Result<AppState<SqliteConnector>> {
    let connector = SqliteConnector::new(&config.store.database_path).with_context(|| {
        format!(
            "Failed to open record store at {}",
            config.store.database_path.display()
        )
    })?;

    let resolver = ProviderResolver::from_config(&config.providers)?;
    tracing::info!("Weather sources: {}", resolver.source_names().join(" -> "));

    let orchestrator = RequestOrchestrator::new(
        RateLimiter::new(&config.rate_limit),
        CacheManager::new(&config.cache),
        resolver,
    );
    Ok(AppState::new(orchestrator, Arc::new(connector)))
}

/// Serve HTTP with `config` until Ctrl-C.
pub async fn run(config: &Config) -> Result<()> {
    let state = build_state(config)?;
    let addr = config.server.socket_addr()?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        tracing::info!("Shutdown requested");
    };

    serve(state, addr, shutdown)
        .await
        .with_context(|| format!("Failed to bind {}", addr))
}
