//! Integration tests for the `/weather` endpoint using warp's test harness.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ipweather_core::{
    CacheConfig, DatabaseError, RateLimitConfig, WeatherResult, FAILED_BOTH_SOURCES,
};
use ipweather_providers::{ProviderError, ProviderResolver, ProviderResult, WeatherSource};
use ipweather_service::{routes, AppState, CacheManager, RateLimiter, RequestOrchestrator};
use ipweather_store::{
    SqliteConnector, SqliteRecordStore, StoreConnector, StoreError, StoreResult,
};
use tempfile::TempDir;

struct StubSource {
    result: Option<WeatherResult>,
    calls: AtomicUsize,
}

impl StubSource {
    fn new(result: Option<WeatherResult>) -> Arc<Self> {
        Arc::new(Self {
            result,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherSource for StubSource {
    fn name(&self) -> &str {
        "stub"
    }

    async fn fetch(&self, _ip: &str) -> ProviderResult<WeatherResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .ok_or_else(|| ProviderError::data("stub", "no data"))
    }
}

/// Connector for a database that cannot be opened.
struct UnavailableConnector;

impl StoreConnector for UnavailableConnector {
    type Store = SqliteRecordStore;

    fn connect(&self) -> StoreResult<SqliteRecordStore> {
        Err(StoreError::Database(DatabaseError::ConnectionFailed(
            "unable to open database file".into(),
        )))
    }
}

fn orchestrator(sources: Vec<Arc<dyn WeatherSource>>, max_requests: u64) -> RequestOrchestrator {
    RequestOrchestrator::new(
        RateLimiter::new(&RateLimitConfig {
            window_secs: 60,
            max_requests,
        }),
        CacheManager::new(&CacheConfig { duration_secs: 600 }),
        ProviderResolver::new(sources),
    )
}

/// Test fixture holding the temp database alive for the test's duration.
struct Fixture {
    _dir: TempDir,
    db_path: std::path::PathBuf,
    state: Arc<AppState<SqliteConnector>>,
}

impl Fixture {
    fn new(sources: Vec<Arc<dyn WeatherSource>>, max_requests: u64) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("data").join("ipweather.db");
        let connector = SqliteConnector::new(&db_path).unwrap();

        Self {
            _dir: dir,
            db_path,
            state: Arc::new(AppState::new(
                orchestrator(sources, max_requests),
                Arc::new(connector),
            )),
        }
    }

    fn logs_for(&self, ip: &str) -> Vec<ipweather_core::RequestLogEntry> {
        SqliteRecordStore::open(&self.db_path)
            .unwrap()
            .logs_for_ip(ip)
            .unwrap()
    }
}

fn beijing() -> WeatherResult {
    WeatherResult::new("Beijing", Some("Sunny".into()), Some("25".into()))
}

fn peer() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 40000))
}

fn body_json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_weather_success_then_cache_hit() {
    let primary = StubSource::new(Some(beijing()));
    let fixture = Fixture::new(vec![primary.clone()], 10);
    let filter = routes(Arc::clone(&fixture.state));

    let first = warp::test::request()
        .method("GET")
        .path("/weather")
        .header("x-forwarded-for", "1.2.3.4, 10.0.0.1")
        .remote_addr(peer())
        .reply(&filter)
        .await;

    assert_eq!(first.status(), 200);
    assert_eq!(
        body_json(first.body()),
        serde_json::json!({ "city": "Beijing", "weather": "Sunny", "temperature": "25" })
    );

    let second = warp::test::request()
        .path("/weather")
        .header("x-forwarded-for", "1.2.3.4")
        .remote_addr(peer())
        .reply(&filter)
        .await;

    assert_eq!(second.status(), 200);
    assert_eq!(second.body(), first.body());
    assert_eq!(primary.calls(), 1);

    let logs = fixture.logs_for("1.2.3.4");
    assert_eq!(logs.len(), 2);
    assert!(!logs[0].from_cache);
    assert!(logs[1].from_cache);
}

#[tokio::test]
async fn test_partial_weather_serializes_nulls() {
    let fixture = Fixture::new(vec![StubSource::new(Some(WeatherResult::city_only("Beijing")))], 10);
    let filter = routes(Arc::clone(&fixture.state));

    let resp = warp::test::request()
        .path("/weather")
        .header("x-real-ip", "1.2.3.4")
        .remote_addr(peer())
        .reply(&filter)
        .await;

    assert_eq!(resp.status(), 200);
    assert_eq!(
        body_json(resp.body()),
        serde_json::json!({ "city": "Beijing", "weather": null, "temperature": null })
    );
}

#[tokio::test]
async fn test_rate_limit_returns_403() {
    let fixture = Fixture::new(vec![StubSource::new(None)], 2);
    let filter = routes(Arc::clone(&fixture.state));

    for _ in 0..2 {
        let resp = warp::test::request()
            .path("/weather")
            .remote_addr(peer())
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), 502);
    }

    let resp = warp::test::request()
        .path("/weather")
        .remote_addr(peer())
        .reply(&filter)
        .await;

    assert_eq!(resp.status(), 403);
    assert_eq!(
        body_json(resp.body()),
        serde_json::json!({ "error": "Rate limit exceeded" })
    );
    assert_eq!(fixture.logs_for("127.0.0.1").len(), 2);
}

#[tokio::test]
async fn test_both_sources_failing_returns_502() {
    let fixture = Fixture::new(vec![StubSource::new(None), StubSource::new(None)], 10);
    let filter = routes(Arc::clone(&fixture.state));

    let resp = warp::test::request()
        .path("/weather")
        .header("x-forwarded-for", "8.8.8.8")
        .remote_addr(peer())
        .reply(&filter)
        .await;

    assert_eq!(resp.status(), 502);
    assert_eq!(
        body_json(resp.body()),
        serde_json::json!({ "error": "Unable to retrieve weather from both sources" })
    );

    let logs = fixture.logs_for("8.8.8.8");
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].error.as_deref(), Some(FAILED_BOTH_SOURCES));
    assert!(logs[0].response_data.is_none());
}

#[tokio::test]
async fn test_missing_client_address_returns_400() {
    let fixture = Fixture::new(vec![StubSource::new(Some(beijing()))], 10);
    let filter = routes(Arc::clone(&fixture.state));

    let resp = warp::test::request().path("/weather").reply(&filter).await;

    assert_eq!(resp.status(), 400);
    assert_eq!(
        body_json(resp.body()),
        serde_json::json!({ "error": "Unable to determine client address" })
    );
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let fixture = Fixture::new(vec![StubSource::new(Some(beijing()))], 10);
    let filter = routes(Arc::clone(&fixture.state));

    let resp = warp::test::request()
        .path("/forecast")
        .remote_addr(peer())
        .reply(&filter)
        .await;

    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_store_unavailable_returns_500() {
    let primary = StubSource::new(Some(beijing()));
    let state = Arc::new(AppState::new(
        orchestrator(vec![primary.clone()], 10),
        Arc::new(UnavailableConnector),
    ));
    let filter = routes(state);

    let resp = warp::test::request()
        .path("/weather")
        .header("x-forwarded-for", "1.2.3.4")
        .remote_addr(peer())
        .reply(&filter)
        .await;

    assert_eq!(resp.status(), 500);
    assert_eq!(
        body_json(resp.body()),
        serde_json::json!({ "error": "Internal server error" })
    );
    assert_eq!(primary.calls(), 0);
}
