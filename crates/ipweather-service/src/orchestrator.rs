//! Request pipeline: rate check, cache check, resolve, record.

use chrono::{DateTime, Utc};
use ipweather_core::{RequestLogEntry, ServiceError, WeatherResult};
use ipweather_providers::ProviderResolver;
use ipweather_store::{RecordStore, StoreClient};

use crate::cache::CacheManager;
use crate::rate_limit::RateLimiter;

/// Outcome of a request that produced weather.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub result: WeatherResult,
    pub from_cache: bool,
}

/// Runs one request through the pipeline.
///
/// Steps run strictly in order. Every request that passes the rate check
/// writes exactly one log entry; a rejected request writes none.
#[derive(Debug, Clone)]
pub struct RequestOrchestrator {
    rate_limiter: RateLimiter,
    cache: CacheManager,
    resolver: ProviderResolver,
}

impl RequestOrchestrator {
    pub fn new(rate_limiter: RateLimiter, cache: CacheManager, resolver: ProviderResolver) -> Self {
        Self {
            rate_limiter,
            cache,
            resolver,
        }
    }

    /// Handle a request from `ip` at `now` against `store`.
    ///
    /// Store failures abort the request with `ServiceError::Database`.
    pub async fn handle<S: RecordStore + 'static>(
        &self,
        store: &StoreClient<S>,
        ip: &str,
        now: DateTime<Utc>,
    ) -> Result<Resolution, ServiceError> {
        if self.rate_limiter.is_rate_limited(store, ip, now).await? {
            return Err(ServiceError::RateLimitExceeded);
        }

        if let Some(result) = self.cache.get_cache(store, ip, now).await? {
            tracing::info!("Cache hit for {}", ip);
            store
                .insert_log(RequestLogEntry::cache_hit(ip, now, result.clone()))
                .await?;
            return Ok(Resolution {
                result,
                from_cache: true,
            });
        }

        match self.resolver.resolve(ip).await {
            Some(result) => {
                self.cache.update_cache(store, ip, now, result.clone()).await?;
                store
                    .insert_log(RequestLogEntry::fresh(ip, now, result.clone()))
                    .await?;
                Ok(Resolution {
                    result,
                    from_cache: false,
                })
            }
            None => {
                store.insert_log(RequestLogEntry::failure(ip, now)).await?;
                Err(ServiceError::UpstreamUnavailable)
            }
        }
    }
}
