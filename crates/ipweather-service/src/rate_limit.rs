//! Per-IP rate limiting against the request log.

use chrono::{DateTime, Utc};
use ipweather_core::{window_start, RateLimitConfig};
use ipweather_store::{RecordStore, StoreClient, StoreResult};
use std::time::Duration;

/// Counts an IP's logged requests in a trailing window.
///
/// The check reads the log only and keeps no counter of its own, so
/// concurrent requests from one IP can overshoot the limit slightly.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: config.window(),
            max_requests: config.max_requests,
        }
    }

    /// True when `ip` already has `max_requests` or more entries after `now - window`.
    pub async fn is_rate_limited<S: RecordStore + 'static>(
        &self,
        store: &StoreClient<S>,
        ip: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let since = window_start(now, self.window);
        let count = store.count_recent_logs(ip, since).await?;
        if count >= self.max_requests {
            tracing::info!(
                "Rate limit hit for {}: {} requests in the last {}s",
                ip,
                count,
                self.window.as_secs()
            );
            return Ok(true);
        }
        Ok(false)
    }
}
