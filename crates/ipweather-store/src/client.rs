//! Async handle over a blocking record store.
//!
//! `StoreClient` moves every store call onto tokio's blocking pool so a slow
//! SQLite write never stalls the async workers serving other requests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ipweather_core::{CacheEntry, DatabaseError, RequestLogEntry};
use parking_lot::Mutex;

use crate::backend::{RecordStore, StoreConnector, StoreError, StoreResult};

/// Async, cloneable handle to one record store.
pub struct StoreClient<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for StoreClient<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: RecordStore + 'static> StoreClient<S> {
    /// Wrap an already-open store.
    pub fn new(store: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Open a store through `connector` without blocking the async runtime.
    pub async fn connect<C>(connector: Arc<C>) -> StoreResult<Self>
    where
        C: StoreConnector<Store = S>,
    {
        let store = tokio::task::spawn_blocking(move || connector.connect())
            .await
            .map_err(|e| StoreError::Database(DatabaseError::TaskFailed(e.to_string())))??;
        Ok(Self::new(store))
    }

    async fn run<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> StoreResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let store = inner.lock();
            op(&store)
        })
        .await
        .map_err(|e| StoreError::Database(DatabaseError::TaskFailed(e.to_string())))?
    }

    /// Append a request log entry.
    pub async fn insert_log(&self, entry: RequestLogEntry) -> StoreResult<()> {
        self.run(move |store| store.insert_log(&entry)).await
    }

    /// Get the cache entry for an IP, fresh or not.
    pub async fn get_cache_entry(&self, ip: &str) -> StoreResult<Option<CacheEntry>> {
        let ip = ip.to_string();
        self.run(move |store| store.get_cache_entry(&ip)).await
    }

    /// Insert or replace the cache entry for `entry.ip`.
    pub async fn upsert_cache_entry(&self, entry: CacheEntry) -> StoreResult<()> {
        self.run(move |store| store.upsert_cache_entry(&entry)).await
    }

    /// Count log entries for `ip` strictly after `since`.
    pub async fn count_recent_logs(&self, ip: &str, since: DateTime<Utc>) -> StoreResult<u64> {
        let ip = ip.to_string();
        self.run(move |store| store.count_recent_logs(&ip, since)).await
    }

    /// Run a synchronous closure against the underlying store.
    ///
    /// Intended for inspection in tests and maintenance tooling.
    pub fn with_store<T>(&self, f: impl FnOnce(&S) -> T) -> T {
        f(&self.inner.lock())
    }
}
