//! Data Manager Server - Main entry point

use anyhow::Result;
use dm_common::logging::{init_logging, LogConfig};
use dm_server::{api, config::Config};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with configuration from environment
    let log_config = LogConfig::builder()
        .log_file_prefix("dm-server")
        .filter_directives("dm_server=debug,dm_engine=info,tower_http=debug,reqwest=warn")
        .build();

    // Environment variables take precedence
    let log_config = log_config.merge_env()?;

    let _guard = init_logging(&log_config)?;

    info!("Starting Data Manager Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    api::serve(config).await
}
