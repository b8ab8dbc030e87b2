//! Ordered provider chain.

use ipweather_core::{ProvidersConfig, WeatherResult};
use std::sync::Arc;

use crate::amap::AmapSource;
use crate::fallback::FallbackSource;
use crate::source::{build_http_client, ProviderResult, WeatherSource};

/// Tries each source in order and returns the first success.
///
/// Later sources are never contacted once an earlier one succeeds.
#[derive(Clone)]
pub struct ProviderResolver {
    sources: Vec<Arc<dyn WeatherSource>>,
}

impl ProviderResolver {
    pub fn new(sources: Vec<Arc<dyn WeatherSource>>) -> Self {
        Self { sources }
    }

    /// AMap first, then ipinfo + WeatherAPI, sharing one HTTP client.
    pub fn from_config(config: &ProvidersConfig) -> ProviderResult<Self> {
        let client = build_http_client(config.timeout())?;
        let primary = AmapSource::new(Arc::clone(&client), &config.amap);
        let fallback = FallbackSource::new(client, &config.fallback);
        Ok(Self::new(vec![Arc::new(primary), Arc::new(fallback)]))
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Weather for `ip`, or `None` when every source failed.
    pub async fn resolve(&self, ip: &str) -> Option<WeatherResult> {
        for source in &self.sources {
            match source.fetch(ip).await {
                Ok(result) => {
                    tracing::info!("Resolved weather for {} via {}", ip, source.name());
                    return Some(result);
                }
                Err(e) => {
                    tracing::warn!("Source {} failed for {}: {}", source.name(), ip, e);
                }
            }
        }
        tracing::error!("All weather sources failed for {}", ip);
        None
    }
}

impl std::fmt::Debug for ProviderResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderResolver")
            .field("sources", &self.source_names())
            .finish()
    }
}
