//! SQLite-based record store implementation.
//!
//! This module provides `SqliteRecordStore`, a local SQLite implementation of
//! the `RecordStore` trait, and `SqliteConnector` which opens one connection
//! per request against a shared database file.

use chrono::{DateTime, Utc};
use ipweather_core::{
    CacheEntry, DatabaseError, RequestLogEntry, RusqliteErrorExt, WeatherResult,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::{RecordStore, StoreConnector, StoreError, StoreResult};

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.into_database_error())
    }
}

/// SQLite-based record storage.
pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    /// Create a record store at the given path.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let store = Self::open(path)?;
        store.init_schema()?;
        Ok(store)
    }

    /// Open an existing database without touching the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| {
            StoreError::Database(DatabaseError::ConnectionFailed(format!(
                "{}: {}",
                path.as_ref().display(),
                e
            )))
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }

    /// Create an in-memory record store (for testing).
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> StoreResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS request_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ip TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                response_data TEXT NULL,
                from_cache INTEGER NOT NULL DEFAULT 0,
                error TEXT NULL
            );

            CREATE TABLE IF NOT EXISTS ip_cache (
                ip TEXT PRIMARY KEY,
                cached_at INTEGER NOT NULL,
                response_data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_request_logs_ip_timestamp ON request_logs(ip, timestamp);
            "#,
        )?;
        Ok(())
    }

    /// Get all log entries for an IP, oldest first.
    pub fn logs_for_ip(&self, ip: &str) -> StoreResult<Vec<RequestLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT ip, timestamp, response_data, from_cache, error
             FROM request_logs
             WHERE ip = ?1
             ORDER BY timestamp ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![ip], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i32>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (ip, timestamp_ns, response_json, from_cache, error) = row?;
            entries.push(RequestLogEntry {
                ip,
                timestamp: from_nanos(timestamp_ns),
                response_data: response_json.as_deref().map(decode_result).transpose()?,
                from_cache: from_cache != 0,
                error,
            });
        }
        Ok(entries)
    }

    /// Get the total number of log entries.
    pub fn log_count(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM request_logs", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

impl RecordStore for SqliteRecordStore {
    fn insert_log(&self, entry: &RequestLogEntry) -> StoreResult<()> {
        let response_json = entry.response_data.as_ref().map(encode_result).transpose()?;
        let timestamp_ns = to_nanos(entry.timestamp)?;

        self.conn.execute(
            r#"
            INSERT INTO request_logs (ip, timestamp, response_data, from_cache, error)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                entry.ip,
                timestamp_ns,
                response_json,
                entry.from_cache as i32,
                entry.error,
            ],
        )?;

        tracing::debug!("Logged request for {} (from_cache={})", entry.ip, entry.from_cache);
        Ok(())
    }

    fn get_cache_entry(&self, ip: &str) -> StoreResult<Option<CacheEntry>> {
        let row = self
            .conn
            .query_row(
                "SELECT ip, cached_at, response_data FROM ip_cache WHERE ip = ?1",
                params![ip],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((ip, cached_at_ns, response_json)) => Ok(Some(CacheEntry {
                ip,
                cached_at: from_nanos(cached_at_ns),
                response_data: decode_result(&response_json)?,
            })),
            None => Ok(None),
        }
    }

    fn upsert_cache_entry(&self, entry: &CacheEntry) -> StoreResult<()> {
        let response_json = encode_result(&entry.response_data)?;
        let cached_at_ns = to_nanos(entry.cached_at)?;

        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO ip_cache (ip, cached_at, response_data)
            VALUES (?1, ?2, ?3)
            "#,
            params![entry.ip, cached_at_ns, response_json],
        )?;

        tracing::debug!("Cached result for {}", entry.ip);
        Ok(())
    }

    fn count_recent_logs(&self, ip: &str, since: DateTime<Utc>) -> StoreResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM request_logs WHERE ip = ?1 AND timestamp > ?2",
            params![ip, bound_nanos(since)],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

/// Opens a fresh `SqliteRecordStore` per request against one database file.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
}

impl SqliteConnector {
    /// Prepare the database at `path`, creating its directory and schema.
    pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create {}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        // Schema is created once here; per-request connections skip it.
        SqliteRecordStore::new(&path)?;
        tracing::info!("Record store ready at {}", path.display());

        Ok(Self { path })
    }
}

impl StoreConnector for SqliteConnector {
    type Store = SqliteRecordStore;

    fn connect(&self) -> StoreResult<SqliteRecordStore> {
        SqliteRecordStore::open(&self.path)
    }
}

fn encode_result(result: &WeatherResult) -> StoreResult<String> {
    serde_json::to_string(result).map_err(|e| StoreError::serialization(e.to_string()))
}

fn decode_result(json: &str) -> StoreResult<WeatherResult> {
    serde_json::from_str(json).map_err(|e| StoreError::serialization(e.to_string()))
}

// Timestamps are stored as whole nanoseconds so stored values compare
// exactly against window bounds computed from the same clock.
fn to_nanos(ts: DateTime<Utc>) -> StoreResult<i64> {
    ts.timestamp_nanos_opt()
        .ok_or_else(|| StoreError::serialization(format!("timestamp out of range: {}", ts)))
}

/// Query bound for `ts`, clamped to the representable range.
fn bound_nanos(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_nanos_opt().unwrap_or(if ts.timestamp() < 0 {
        i64::MIN
    } else {
        i64::MAX
    })
}

fn from_nanos(ns: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(ns)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use chrono::TimeZone;

    fn create_test_store() -> SqliteRecordStore {
        SqliteRecordStore::in_memory().expect("Failed to create in-memory store")
    }

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 30, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs as i64)
    }

    fn beijing() -> WeatherResult {
        WeatherResult::new("Beijing", Some("Sunny".into()), Some("25".into()))
    }

    #[test]
    fn test_insert_and_read_logs() {
        let store = create_test_store();

        store
            .insert_log(&RequestLogEntry::fresh("1.2.3.4", at(0), beijing()))
            .unwrap();
        store
            .insert_log(&RequestLogEntry::failure("1.2.3.4", at(5)))
            .unwrap();

        let logs = store.logs_for_ip("1.2.3.4").unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].response_data, Some(beijing()));
        assert!(!logs[0].from_cache);
        assert!(logs[1].response_data.is_none());
        assert_eq!(logs[1].error.as_deref(), Some("Failed both sources"));
        assert_eq!(logs[1].timestamp, at(5));
    }

    #[test]
    fn test_count_recent_logs_is_strict_and_per_ip() {
        let store = create_test_store();

        for secs in [0, 10, 20] {
            store
                .insert_log(&RequestLogEntry::fresh("1.2.3.4", at(secs), beijing()))
                .unwrap();
        }
        store
            .insert_log(&RequestLogEntry::fresh("5.6.7.8", at(15), beijing()))
            .unwrap();

        // Entry exactly at `since` is excluded
        assert_eq!(store.count_recent_logs("1.2.3.4", at(10)).unwrap(), 1);
        assert_eq!(store.count_recent_logs("1.2.3.4", at(0)).unwrap(), 2);
        assert_eq!(
            store
                .count_recent_logs("1.2.3.4", DateTime::<Utc>::MIN_UTC)
                .unwrap(),
            3
        );
        assert_eq!(store.count_recent_logs("9.9.9.9", at(0)).unwrap(), 0);
    }

    #[test]
    fn test_count_recent_logs_within_one_millisecond() {
        let store = create_test_store();
        let logged = at(0) + chrono::Duration::microseconds(500);

        store
            .insert_log(&RequestLogEntry::fresh("1.2.3.4", logged, beijing()))
            .unwrap();

        let before = at(0) + chrono::Duration::microseconds(100);
        let after = at(0) + chrono::Duration::microseconds(900);
        assert_eq!(store.count_recent_logs("1.2.3.4", before).unwrap(), 1);
        assert_eq!(store.count_recent_logs("1.2.3.4", after).unwrap(), 0);
        assert_eq!(store.logs_for_ip("1.2.3.4").unwrap()[0].timestamp, logged);
    }

    #[test]
    fn test_cached_at_keeps_sub_millisecond_precision() {
        let store = create_test_store();
        let cached_at = at(0) + chrono::Duration::nanoseconds(123_456_789);

        store
            .upsert_cache_entry(&CacheEntry::new("1.2.3.4", cached_at, beijing()))
            .unwrap();

        assert_eq!(store.get_cache_entry("1.2.3.4").unwrap().unwrap().cached_at, cached_at);
    }

    #[test]
    fn test_get_cache_entry_missing() {
        let store = create_test_store();
        assert!(store.get_cache_entry("1.2.3.4").unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces_existing_entry() {
        let store = create_test_store();

        store
            .upsert_cache_entry(&CacheEntry::new("1.2.3.4", at(0), beijing()))
            .unwrap();
        let replacement = WeatherResult::new("Shanghai", Some("Rain".into()), Some("18".into()));
        store
            .upsert_cache_entry(&CacheEntry::new("1.2.3.4", at(30), replacement.clone()))
            .unwrap();

        let entry = store.get_cache_entry("1.2.3.4").unwrap().unwrap();
        assert_eq!(entry.cached_at, at(30));
        assert_eq!(entry.response_data, replacement);

        let rows: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM ip_cache", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_cache_preserves_null_fields() {
        let store = create_test_store();
        let partial = WeatherResult::city_only("Beijing");

        store
            .upsert_cache_entry(&CacheEntry::new("1.2.3.4", at(0), partial.clone()))
            .unwrap();

        let entry = store.get_cache_entry("1.2.3.4").unwrap().unwrap();
        assert_eq!(entry.response_data, partial);
        assert!(entry.response_data.weather.is_none());
        assert!(entry.response_data.temperature.is_none());
    }

    #[test]
    fn test_malformed_cached_json_is_an_error() {
        let store = create_test_store();
        store
            .conn
            .execute(
                "INSERT INTO ip_cache (ip, cached_at, response_data) VALUES ('1.2.3.4', 0, 'not json')",
                [],
            )
            .unwrap();

        let result = store.get_cache_entry("1.2.3.4");
        assert!(matches!(
            result,
            Err(StoreError::Database(DatabaseError::Serialization(_)))
        ));
    }

    #[test]
    fn test_connector_shares_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let connector = SqliteConnector::new(dir.path().join("data").join("ipweather.db")).unwrap();

        let first = connector.connect().unwrap();
        first
            .insert_log(&RequestLogEntry::fresh("1.2.3.4", at(0), beijing()))
            .unwrap();
        drop(first);

        let second = connector.connect().unwrap();
        assert_eq!(second.log_count().unwrap(), 1);
    }
}
