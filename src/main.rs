//! Intraday screener service entry point.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use intraday_screener::config::AppConfig;
use intraday_screener::ScreenerService;

const DEFAULT_CONFIG_PATH: &str = "config/screener.json";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = if std::path::Path::new(&config_path).exists() {
        AppConfig::load(&config_path)?
    } else {
        tracing::warn!(path = %config_path, "Config file not found, using defaults");
        let config = AppConfig::default();
        config.validate()?;
        config
    };

    tracing::info!("intraday-screener v{}", env!("CARGO_PKG_VERSION"));

    ScreenerService::new(config)?.start().await
}
