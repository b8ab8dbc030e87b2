//! Record store trait and error types.
//!
//! This module defines the `RecordStore` capability used by the request
//! pipeline, and the `StoreConnector` that hands out one store per request.

use chrono::{DateTime, Utc};
use ipweather_core::{CacheEntry, DatabaseError, RequestLogEntry, ServiceError};
use thiserror::Error;

/// Errors that can occur during record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure.
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl StoreError {
    /// Create a serialization error for a malformed stored record.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Database(DatabaseError::Serialization(message.into()))
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => ServiceError::Database(e),
        }
    }
}

/// Result type for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for request logs and per-IP cache entries.
///
/// Pure storage: no freshness or limit policy lives here.
///
/// Note: Implementations don't need to be Sync - the StoreClient wrapper handles
/// thread-safe access via Mutex.
pub trait RecordStore: Send {
    /// Append a request log entry.
    fn insert_log(&self, entry: &RequestLogEntry) -> StoreResult<()>;

    /// Get the cache entry for an IP, fresh or not.
    ///
    /// Returns `None` if the IP has never been cached.
    fn get_cache_entry(&self, ip: &str) -> StoreResult<Option<CacheEntry>>;

    /// Insert or replace the cache entry for `entry.ip`.
    fn upsert_cache_entry(&self, entry: &CacheEntry) -> StoreResult<()>;

    /// Count log entries for `ip` with a timestamp strictly after `since`.
    fn count_recent_logs(&self, ip: &str, since: DateTime<Utc>) -> StoreResult<u64>;
}

/// Opens record stores on demand.
///
/// The HTTP layer acquires one store per request and drops it when the
/// request completes, whatever the outcome.
pub trait StoreConnector: Send + Sync + 'static {
    type Store: RecordStore + 'static;

    /// Open a store handle.
    ///
    /// # Errors
    /// Returns `StoreError::Database` if the underlying database can't be opened.
    fn connect(&self) -> StoreResult<Self::Store>;
}
