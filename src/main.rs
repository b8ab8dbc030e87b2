use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use ipweather_core::Config;

/// IP geolocation weather service.
#[derive(Parser)]
#[command(name = "ipweather")]
#[command(version)]
#[command(about = "Serves current weather for the caller's IP address")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    ipweather_core::init()?;

    let (config, _) = Config::load_validated(args.config.as_deref())?;

    tracing::info!(
        "IpWeather starting: limit {} per {}s, cache {}s",
        config.rate_limit.max_requests,
        config.rate_limit.window_secs,
        config.cache.duration_secs
    );

    ipweather_service::run(&config).await
}
