//! Fallback provider: ipinfo city lookup followed by WeatherAPI current conditions.
//!
//! Unlike the primary pipeline, both steps are all-or-nothing.

use async_trait::async_trait;
use ipweather_core::{FallbackConfig, WeatherResult};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::sync::Arc;

use crate::source::{
    endpoint, fetch_text, snippet, ProviderError, ProviderResult, WeatherSource,
};

const IPINFO_STEP: &str = "ipinfo lookup";
const WEATHERAPI_STEP: &str = "weatherapi lookup";

#[derive(Debug, Deserialize)]
struct IpinfoResponse {
    #[serde(default)]
    data: Option<IpinfoData>,
}

#[derive(Debug, Deserialize)]
struct IpinfoData {
    #[serde(default)]
    city: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WeatherApiResponse {
    current: WeatherApiCurrent,
}

#[derive(Debug, Deserialize)]
struct WeatherApiCurrent {
    temp_c: f64,
    condition: WeatherApiCondition,
}

#[derive(Debug, Deserialize)]
struct WeatherApiCondition {
    text: String,
}

#[derive(Debug, Clone)]
pub struct FallbackSource {
    client: Arc<Client>,
    ipinfo_base_url: String,
    weatherapi_key: String,
    weatherapi_base_url: String,
}

impl FallbackSource {
    pub fn new(client: Arc<Client>, config: &FallbackConfig) -> Self {
        Self {
            client,
            ipinfo_base_url: config.ipinfo_base_url.clone(),
            weatherapi_key: config.weatherapi_key.clone(),
            weatherapi_base_url: config.weatherapi_base_url.clone(),
        }
    }

    fn ipinfo_url(&self, ip: &str) -> ProviderResult<Url> {
        let mut url = Url::parse(&self.ipinfo_base_url).map_err(|e| {
            ProviderError::Configuration(format!("ipinfo base URL '{}': {}", self.ipinfo_base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ProviderError::Configuration(format!(
                    "ipinfo base URL '{}' cannot take a path",
                    self.ipinfo_base_url
                ))
            })?
            .pop_if_empty()
            .extend(["widget", "demo", ip]);
        Ok(url)
    }

    /// Look up the city name for an IP.
    pub async fn locate(&self, ip: &str) -> ProviderResult<String> {
        let request = self.client.get(self.ipinfo_url(ip)?);

        let body = fetch_text(IPINFO_STEP, request).await.map_err(|e| {
            tracing::warn!("[FALLBACK] ipinfo request failed for {}: {}", ip, e);
            e
        })?;

        let parsed: IpinfoResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::warn!("[FALLBACK] ipinfo returned invalid JSON for {}: raw = {}", ip, snippet(&body));
            ProviderError::data(IPINFO_STEP, format!("invalid JSON: {}", e))
        })?;

        parsed
            .data
            .and_then(|d| d.city)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                tracing::warn!("[FALLBACK] ipinfo returned no city for {}", ip);
                ProviderError::data(IPINFO_STEP, "missing city")
            })
    }

    /// Current conditions for a city name.
    pub async fn current(&self, city: &str) -> ProviderResult<WeatherResult> {
        let request = self
            .client
            .get(endpoint(&self.weatherapi_base_url, "v1/current.json"))
            .query(&[
                ("key", self.weatherapi_key.as_str()),
                ("q", city),
                ("aqi", "no"),
            ]);

        let body = fetch_text(WEATHERAPI_STEP, request).await.map_err(|e| {
            tracing::warn!("[FALLBACK] WeatherAPI request failed for {}: {}", city, e);
            e
        })?;

        let parsed: WeatherApiResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(
                "[FALLBACK] WeatherAPI response unusable for {}: raw = {}",
                city,
                snippet(&body)
            );
            ProviderError::data(WEATHERAPI_STEP, e.to_string())
        })?;

        Ok(WeatherResult::new(
            city,
            Some(parsed.current.condition.text),
            Some(parsed.current.temp_c.to_string()),
        ))
    }
}

#[async_trait]
impl WeatherSource for FallbackSource {
    fn name(&self) -> &str {
        "ipinfo+weatherapi"
    }

    async fn fetch(&self, ip: &str) -> ProviderResult<WeatherResult> {
        let city = self.locate(ip).await?;
        self.current(&city).await
    }
}
