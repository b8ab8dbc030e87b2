//! Record store for IpWeather: request audit log and per-IP result cache.

pub mod backend;
pub mod client;
pub mod sqlite;

pub use backend::{RecordStore, StoreConnector, StoreError, StoreResult};
pub use client::StoreClient;
pub use sqlite::{SqliteConnector, SqliteRecordStore};
