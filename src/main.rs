#![cfg(not(tarpaulin_include))]

use sheetgenius::app;
use sheetgenius::config::AppConfig;

/// Main entry point for the SheetGenius web application
///
/// Reads configuration from the environment (and `.env`), then serves the
/// paywall, upload form and processing endpoint until stopped.
///
/// # Environment
/// * `BIND_ADDR` - Listen address, `127.0.0.1:3000` by default
/// * `EMAIL_ADDRESS`, `EMAIL_PASSWORD` - Operator mail account; without them
///   reports are download-only
/// * `RUST_LOG` - Log filter, `info` by default
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env();
    app::run(config).await
}
