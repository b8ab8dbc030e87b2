use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

/// Environment variable overriding `providers.amap.api_key`.
pub const AMAP_KEY_ENV: &str = "AMAP_API_KEY";
/// Environment variable overriding `providers.fallback.weatherapi_key`.
pub const WEATHERAPI_KEY_ENV: &str = "WEATHERAPI_KEY";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Per-IP request limits
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Per-IP result cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Upstream geolocation/weather providers
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Record store location
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:8080)
    #[serde(default = "default_address")]
    pub address: String,
}

fn default_address() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

impl ServerConfig {
    /// Parse the configured bind address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.address
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("server.address '{}': {}", self.address, e)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Trailing window in seconds (default: 60)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Requests allowed per IP inside the window (default: 10)
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_requests() -> u64 {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Freshness window in seconds (default: 600)
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
}

fn default_duration_secs() -> u64 {
    600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
        }
    }
}

impl CacheConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Per-call timeout in seconds (default: 5)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Primary provider (AMap)
    #[serde(default)]
    pub amap: AmapConfig,

    /// Fallback provider (ipinfo + WeatherAPI)
    #[serde(default)]
    pub fallback: FallbackConfig,
}

fn default_timeout_secs() -> u64 {
    5
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            amap: AmapConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

impl ProvidersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmapConfig {
    /// AMap web service key (overridden by AMAP_API_KEY)
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_amap_url")]
    pub base_url: String,
}

fn default_amap_url() -> String {
    "https://restapi.amap.com".to_string()
}

impl Default for AmapConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_amap_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_ipinfo_url")]
    pub ipinfo_base_url: String,

    /// WeatherAPI key (overridden by WEATHERAPI_KEY)
    #[serde(default)]
    pub weatherapi_key: String,

    #[serde(default = "default_weatherapi_url")]
    pub weatherapi_base_url: String,
}

fn default_ipinfo_url() -> String {
    "https://ipinfo.io".to_string()
}

fn default_weatherapi_url() -> String {
    "https://api.weatherapi.com".to_string()
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            ipinfo_base_url: default_ipinfo_url(),
            weatherapi_key: String::new(),
            weatherapi_base_url: default_weatherapi_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ipweather")
        .join("ipweather.db")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl Config {
    /// Load configuration and apply environment overrides.
    ///
    /// An explicit path must exist. Without one, the default location is used
    /// and a default file is written there if it doesn't exist yet.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.display().to_string()));
                }
                Self::load_from_file(path)?
            }
            None => {
                let path = Self::config_path()?;
                if path.exists() {
                    Self::load_from_file(&path)?
                } else {
                    let config = Self::default();
                    config.save(&path)?;
                    tracing::info!("Wrote default configuration to {}", path.display());
                    config
                }
            }
        };

        config.apply_env();
        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated(explicit_path: Option<&Path>) -> Result<(Self, ValidationResult), ConfigError> {
        let config = Self::load(explicit_path)?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Override API keys from the environment when set and non-empty.
    pub fn apply_env(&mut self) {
        if let Some(key) = env_value(AMAP_KEY_ENV) {
            self.providers.amap.api_key = key;
        }
        if let Some(key) = env_value(WEATHERAPI_KEY_ENV) {
            self.providers.fallback.weatherapi_key = key;
        }
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if let Err(e) = self.server.socket_addr() {
            result.add_error("server.address", e.to_string());
        }

        if self.rate_limit.window_secs == 0 {
            result.add_error("rate_limit.window_secs", "Window must be greater than 0");
        }
        if self.rate_limit.max_requests == 0 {
            result.add_error(
                "rate_limit.max_requests",
                "Max requests must be greater than 0 (every request would be rejected)",
            );
        }

        if self.cache.duration_secs == 0 {
            result.add_warning("cache.duration_secs", "Caching disabled (0 seconds)");
        }

        if self.providers.timeout_secs == 0 {
            result.add_error("providers.timeout_secs", "Timeout must be greater than 0");
        }

        validate_url(&self.providers.amap.base_url, "providers.amap.base_url", &mut result);
        validate_url(
            &self.providers.fallback.ipinfo_base_url,
            "providers.fallback.ipinfo_base_url",
            &mut result,
        );
        validate_url(
            &self.providers.fallback.weatherapi_base_url,
            "providers.fallback.weatherapi_base_url",
            &mut result,
        );

        if self.providers.amap.api_key.is_empty() {
            result.add_warning(
                "providers.amap.api_key",
                format!("AMap key not configured (set {})", AMAP_KEY_ENV),
            );
        }
        if self.providers.fallback.weatherapi_key.is_empty() {
            result.add_warning(
                "providers.fallback.weatherapi_key",
                format!("WeatherAPI key not configured (set {})", WEATHERAPI_KEY_ENV),
            );
        }

        result
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure config directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default path of the configuration file
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound("platform config directory".to_string()))?
            .join("ipweather");

        Ok(config_dir.join("config.toml"))
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Validate a base URL field
fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
    match Url::parse(url_str) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                result.add_error(
                    field_name,
                    format!("URL must use http or https scheme, got: {}", url.scheme()),
                );
            }

            if url.host().is_none() {
                result.add_error(field_name, "URL must have a host");
            }

            if url.port() == Some(0) {
                result.add_error(field_name, "Port cannot be 0");
            }
        }
        Err(e) => {
            result.add_error(field_name, format!("Invalid URL: {}", e));
        }
    }
}
