//! Primary provider: AMap IP location followed by AMap live weather.
//!
//! A missing city or adcode fails the pipeline. Missing weather detail does
//! not: the result keeps the city with null conditions.

use async_trait::async_trait;
use ipweather_core::{AmapConfig, WeatherResult};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::source::{
    endpoint, fetch_text, non_empty_string, snippet, text_value, ProviderError, ProviderResult,
    WeatherSource,
};

const IP_STEP: &str = "amap ip lookup";
const WEATHER_STEP: &str = "amap weather lookup";

// AMap reports unknown fields as `[]`, so keep them untyped until checked.
#[derive(Debug, Deserialize)]
struct AmapIpResponse {
    #[serde(default)]
    city: Value,
    #[serde(default)]
    adcode: Value,
}

#[derive(Debug, Deserialize)]
struct AmapWeatherResponse {
    #[serde(default)]
    lives: Vec<AmapLive>,
}

#[derive(Debug, Deserialize)]
struct AmapLive {
    #[serde(default)]
    weather: Value,
    #[serde(default)]
    temperature: Value,
}

/// City and district code for an IP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmapLocation {
    pub city: String,
    pub adcode: String,
}

#[derive(Debug, Clone)]
pub struct AmapSource {
    client: Arc<Client>,
    api_key: String,
    base_url: String,
}

impl AmapSource {
    pub fn new(client: Arc<Client>, config: &AmapConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        }
    }

    /// Look up the city and adcode for an IP.
    pub async fn locate(&self, ip: &str) -> ProviderResult<AmapLocation> {
        let request = self
            .client
            .get(endpoint(&self.base_url, "v3/ip"))
            .query(&[("key", self.api_key.as_str()), ("ip", ip)]);

        let body = fetch_text(IP_STEP, request).await.map_err(|e| {
            tracing::warn!("[AMAP] Failed to fetch IP location for {}: {}", ip, e);
            e
        })?;

        let parsed: AmapIpResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::warn!("[AMAP] Failed to decode JSON for {}: raw = {}", ip, snippet(&body));
            ProviderError::data(IP_STEP, format!("invalid JSON: {}", e))
        })?;

        match (non_empty_string(&parsed.city), non_empty_string(&parsed.adcode)) {
            (Some(city), Some(adcode)) => {
                tracing::info!("[AMAP] Got city = {}, adcode = {} for {}", city, adcode, ip);
                Ok(AmapLocation { city, adcode })
            }
            _ => {
                tracing::warn!("[AMAP] Missing city or adcode for {}: raw = {}", ip, snippet(&body));
                Err(ProviderError::data(IP_STEP, "missing city or adcode"))
            }
        }
    }

    /// Current conditions for an adcode as `(weather, temperature)`.
    ///
    /// Only a failed call is an error; an unusable payload yields `(None, None)`.
    pub async fn live_conditions(
        &self,
        location: &AmapLocation,
    ) -> ProviderResult<(Option<String>, Option<String>)> {
        let request = self
            .client
            .get(endpoint(&self.base_url, "v3/weather/weatherInfo"))
            .query(&[("key", self.api_key.as_str()), ("city", location.adcode.as_str())]);

        let body = fetch_text(WEATHER_STEP, request).await.map_err(|e| {
            tracing::warn!(
                "[AMAP] Failed to fetch weather for {} ({}): {}",
                location.city,
                location.adcode,
                e
            );
            e
        })?;

        let live = serde_json::from_str::<AmapWeatherResponse>(&body)
            .ok()
            .and_then(|parsed| parsed.lives.into_iter().next());

        match live {
            Some(live) => Ok((text_value(&live.weather), text_value(&live.temperature))),
            None => {
                tracing::warn!(
                    "[AMAP] Weather response missing or invalid: raw = {}",
                    snippet(&body)
                );
                Ok((None, None))
            }
        }
    }
}

#[async_trait]
impl WeatherSource for AmapSource {
    fn name(&self) -> &str {
        "amap"
    }

    async fn fetch(&self, ip: &str) -> ProviderResult<WeatherResult> {
        let location = self.locate(ip).await?;
        let (weather, temperature) = self.live_conditions(&location).await?;
        Ok(WeatherResult::new(location.city, weather, temperature))
    }
}
