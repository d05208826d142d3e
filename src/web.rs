#![cfg(not(tarpaulin_include))]

use forecast_grid::app;
use forecast_grid::config::{AppConfig, init_logging};

/// Main entry point for the forecast web server
///
/// Configuration comes from the environment (`FORECAST_CONFIG`,
/// `FORECAST_STORAGE_DIR`, `FORECAST_BIND`, `FORECAST_LOG`). Without a
/// storage directory every version lives in memory only.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    init_logging(&config)?;

    app::run(config).await
}
