//! Data model shared by the store, providers and request pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error text recorded in the request log when every provider failed.
pub const FAILED_BOTH_SOURCES: &str = "Failed both sources";

/// Weather near a client, as served to callers and stored in the cache.
///
/// `weather` and `temperature` are `None` when the city was resolved but the
/// provider had no usable conditions. They serialize as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherResult {
    pub city: String,
    pub weather: Option<String>,
    pub temperature: Option<String>,
}

impl WeatherResult {
    pub fn new(
        city: impl Into<String>,
        weather: Option<String>,
        temperature: Option<String>,
    ) -> Self {
        Self {
            city: city.into(),
            weather,
            temperature,
        }
    }

    /// A result with a resolved city but no weather detail.
    pub fn city_only(city: impl Into<String>) -> Self {
        Self::new(city, None, None)
    }
}

/// One row of the request audit log. Never updated once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLogEntry {
    pub ip: String,
    pub timestamp: DateTime<Utc>,
    pub response_data: Option<WeatherResult>,
    pub from_cache: bool,
    pub error: Option<String>,
}

impl RequestLogEntry {
    /// Entry for a request answered from the cache.
    pub fn cache_hit(ip: impl Into<String>, timestamp: DateTime<Utc>, result: WeatherResult) -> Self {
        Self {
            ip: ip.into(),
            timestamp,
            response_data: Some(result),
            from_cache: true,
            error: None,
        }
    }

    /// Entry for a request answered by a live provider fetch.
    pub fn fresh(ip: impl Into<String>, timestamp: DateTime<Utc>, result: WeatherResult) -> Self {
        Self {
            ip: ip.into(),
            timestamp,
            response_data: Some(result),
            from_cache: false,
            error: None,
        }
    }

    /// Entry for a request where no provider produced a result.
    pub fn failure(ip: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            ip: ip.into(),
            timestamp,
            response_data: None,
            from_cache: false,
            error: Some(FAILED_BOTH_SOURCES.to_string()),
        }
    }
}

/// Cached result for one IP. At most one exists per IP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub ip: String,
    pub cached_at: DateTime<Utc>,
    pub response_data: WeatherResult,
}

impl CacheEntry {
    pub fn new(ip: impl Into<String>, cached_at: DateTime<Utc>, response_data: WeatherResult) -> Self {
        Self {
            ip: ip.into(),
            cached_at,
            response_data,
        }
    }
}

/// Start of a trailing window ending at `now`.
///
/// Saturates at the earliest representable instant rather than overflowing,
/// so an absurdly large window simply covers all history.
pub fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|w| now.checked_sub_signed(w))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
