//! Per-IP result cache with a freshness window.

use chrono::{DateTime, Utc};
use ipweather_core::{window_start, CacheConfig, CacheEntry, WeatherResult};
use ipweather_store::{RecordStore, StoreClient, StoreResult};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CacheManager {
    duration: Duration,
}

impl CacheManager {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            duration: config.duration(),
        }
    }

    /// Cached result for `ip` if it was written after `now - duration`.
    ///
    /// Stale and absent entries both return `None`.
    pub async fn get_cache<S: RecordStore + 'static>(
        &self,
        store: &StoreClient<S>,
        ip: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<WeatherResult>> {
        let cutoff = window_start(now, self.duration);
        let entry = store.get_cache_entry(ip).await?;
        Ok(entry
            .filter(|e| e.cached_at > cutoff)
            .map(|e| e.response_data))
    }

    /// Overwrite the cache entry for `ip`.
    pub async fn update_cache<S: RecordStore + 'static>(
        &self,
        store: &StoreClient<S>,
        ip: &str,
        now: DateTime<Utc>,
        result: WeatherResult,
    ) -> StoreResult<()> {
        store.upsert_cache_entry(CacheEntry::new(ip, now, result)).await
    }
}
