//! dm CLI - Main entry point

use clap::Parser;
use dm_cli::{commands, Cli, Commands};
use dm_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use dm_engine::{RestConnector, TransferService, TransferSettings};
use std::process;
use std::sync::Arc;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with command output on stdout
    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .console_stderr(true)
        .log_file_prefix("dm-cli")
        .filter_directives("reqwest=warn,hyper=warn")
        .build();

    // Environment variables take precedence
    let log_config = log_config.merge_env().unwrap_or_else(|e| {
        eprintln!("Ignoring invalid logging environment: {e}");
        LogConfig::default()
    });

    // The CLI works without logging
    let _guard = init_logging(&log_config).ok();

    let service = TransferService::new(Arc::new(RestConnector), TransferSettings::default());

    if let Err(e) = execute_command(&service, cli.command).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(service: &TransferService, command: Commands) -> dm_cli::Result<()> {
    match command {
        Commands::Ping { cluster } => commands::ping::run(service, &cluster.endpoint()?).await,
        Commands::Indices { cluster } => commands::indices::run(service, &cluster.endpoint()?).await,
        Commands::Transfer {
            source,
            target,
            indices,
            options,
        } => {
            commands::transfer::run(
                service,
                source.endpoint()?,
                target.endpoint()?,
                indices,
                options.options(),
            )
            .await?;
            Ok(())
        },
        Commands::Export {
            source,
            output,
            indices,
            options,
        } => {
            commands::export::run(service, source.endpoint()?, indices, output, options.options())
                .await?;
            Ok(())
        },
        Commands::Import {
            input,
            target,
            indices,
            options,
        } => {
            commands::import::run(service, input, target.endpoint()?, indices, options.options())
                .await?;
            Ok(())
        },
    }
}
