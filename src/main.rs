#![cfg(not(tarpaulin_include))]

use sheet_search::app;
use sheet_search::config::Config;

/// Main entry point for the web application
///
/// Reads the configuration from the environment (`SEARCH_ADDR`,
/// `SEARCH_DATA_DIR`, `ADMIN_USERNAME`, `ADMIN_PASSWORD`) and serves the
/// dashboard until the process is stopped.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env();
    app::run(config).await
}
