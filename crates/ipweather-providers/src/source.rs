//! Provider pipeline trait, errors and shared HTTP plumbing.

use async_trait::async_trait;
use ipweather_core::{NetworkError, ReqwestErrorExt, WeatherResult};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = "IpWeather/0.1.0";
const PAYLOAD_SNIPPET_CHARS: usize = 200;

/// Why a provider pipeline step produced no result.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The remote call itself failed (network, timeout, non-2xx status).
    #[error("{step} request failed: {source}")]
    Transport {
        step: &'static str,
        #[source]
        source: NetworkError,
    },

    /// The call succeeded but the payload lacked what the step needs.
    #[error("{step} returned unusable data: {detail}")]
    Data { step: &'static str, detail: String },

    #[error("Provider configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    pub fn transport(step: &'static str, err: reqwest::Error) -> Self {
        Self::Transport {
            step,
            source: err.into_network_error(),
        }
    }

    pub fn data(step: &'static str, detail: impl Into<String>) -> Self {
        Self::Data {
            step,
            detail: detail.into(),
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// One vendor's geolocation → weather pipeline.
///
/// A source either yields a complete `WeatherResult` or fails as a whole.
/// It never touches the record store.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Short identifier used in logs (e.g. "amap").
    fn name(&self) -> &str;

    /// Resolve the weather near `ip`.
    async fn fetch(&self, ip: &str) -> ProviderResult<WeatherResult>;
}

/// Build the HTTP client shared by all sources.
///
/// The timeout bounds every remote call; a timeout surfaces as a transport failure.
pub fn build_http_client(timeout: Duration) -> ProviderResult<Arc<Client>> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ProviderError::Configuration(format!("Failed to create HTTP client: {}", e)))?;
    Ok(Arc::new(client))
}

/// Send a request and read the body, treating non-2xx statuses as transport failures.
pub(crate) async fn fetch_text(step: &'static str, request: RequestBuilder) -> ProviderResult<String> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::transport(step, e))?;

    let response = response
        .error_for_status()
        .map_err(|e| ProviderError::transport(step, e))?;

    response
        .text()
        .await
        .map_err(|e| ProviderError::transport(step, e))
}

/// Join a base URL and a fixed path without doubling slashes.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Non-empty trimmed string, or `None` for anything else (including `[]`).
pub(crate) fn non_empty_string(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Text form of a string or numeric field. Strings pass through unchanged,
/// empty included; AMap's `[]` placeholder and other shapes are `None`.
pub(crate) fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Truncated payload for diagnostic logs.
pub(crate) fn snippet(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(PAYLOAD_SNIPPET_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
