//! Weather providers for IpWeather
//!
//! Resolves an IP address to city weather through AMap, falling back to
//! ipinfo + WeatherAPI.

pub mod amap;
pub mod fallback;
pub mod resolver;
pub mod source;

pub use amap::{AmapLocation, AmapSource};
pub use fallback::FallbackSource;
pub use resolver::ProviderResolver;
pub use source::{build_http_client, ProviderError, ProviderResult, WeatherSource};
