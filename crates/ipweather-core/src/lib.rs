pub mod config;
pub mod error;
pub mod model;

pub use config::{
    CacheConfig, Config, FallbackConfig, AmapConfig, ProvidersConfig, RateLimitConfig,
    ServerConfig, StoreConfig, ValidationResult,
};
pub use error::{
    ConfigError, DatabaseError, NetworkError, ReqwestErrorExt, RusqliteErrorExt, ServiceError,
};
pub use model::{window_start, CacheEntry, RequestLogEntry, WeatherResult, FAILED_BOTH_SOURCES};

use anyhow::Result;

/// Initialize logging for the service
pub fn init() -> Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("IpWeather core initialized");
    Ok(())
}
