//! Configuration management

use dm_engine::{BatchLimits, TransferSettings};
use serde::{Deserialize, Serialize};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

// ============================================================================
// Transfer Configuration Constants
// ============================================================================

/// Default byte ceiling of one bulk request (5 MiB).
pub const DEFAULT_BULK_MAX_BYTES: usize = dm_engine::transfer::MAX_BATCH_BYTES;

/// Default document ceiling of one bulk request.
pub const DEFAULT_BULK_MAX_DOCS: usize = dm_engine::transfer::MAX_BATCH_DOCS;

/// Default scroll keep-alive between page fetches.
pub const DEFAULT_SCROLL_KEEP_ALIVE: &str = dm_engine::DEFAULT_SCROLL_KEEP_ALIVE;

/// Scroll page size applied to requests that do not set one.
pub const DEFAULT_BATCH_SIZE: usize = dm_common::types::DEFAULT_BATCH_SIZE;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub transfer: TransferConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Transfer engine tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    pub max_bulk_bytes: usize,
    pub max_bulk_docs: usize,
    pub scroll_keep_alive: String,
    pub default_batch_size: usize,
}

impl TransferConfig {
    pub fn engine_settings(&self) -> TransferSettings {
        TransferSettings::default()
            .with_batch_limits(BatchLimits::new(self.max_bulk_bytes, self.max_bulk_docs))
            .with_scroll_keep_alive(self.scroll_keep_alive.clone())
    }
}

/// Parse `key` from the environment, falling back to `default` when unset
///
/// A value that is set but does not parse is a configuration error.
fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value '{raw}' for {key}: {e}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("DM_HOST").unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_parse("DM_PORT", DEFAULT_SERVER_PORT)?,
                shutdown_timeout_secs: env_parse(
                    "DM_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                )?,
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: env_parse("CORS_ALLOW_CREDENTIALS", true)?,
            },
            transfer: TransferConfig {
                max_bulk_bytes: env_parse("DM_BULK_MAX_BYTES", DEFAULT_BULK_MAX_BYTES)?,
                max_bulk_docs: env_parse("DM_BULK_MAX_DOCS", DEFAULT_BULK_MAX_DOCS)?,
                scroll_keep_alive: std::env::var("DM_SCROLL_KEEP_ALIVE")
                    .unwrap_or_else(|_| DEFAULT_SCROLL_KEEP_ALIVE.to_string()),
                default_batch_size: env_parse("DM_DEFAULT_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.transfer.max_bulk_bytes == 0 || self.transfer.max_bulk_docs == 0 {
            anyhow::bail!("Bulk ceilings must be greater than 0");
        }

        if self.transfer.default_batch_size == 0 {
            anyhow::bail!("Default batch size must be greater than 0");
        }

        if !is_duration(&self.transfer.scroll_keep_alive) {
            anyhow::bail!(
                "Scroll keep-alive '{}' is not a duration such as 30s, 1m or 2h",
                self.transfer.scroll_keep_alive
            );
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

/// Cluster time units: a positive integer followed by `ms`, `s`, `m`, `h` or `d`
fn is_duration(value: &str) -> bool {
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (amount, unit) = value.split_at(split);
    !amount.is_empty()
        && amount.parse::<u64>().map_or(false, |n| n > 0)
        && matches!(unit, "ms" | "s" | "m" | "h" | "d")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
            transfer: TransferConfig {
                max_bulk_bytes: DEFAULT_BULK_MAX_BYTES,
                max_bulk_docs: DEFAULT_BULK_MAX_DOCS,
                scroll_keep_alive: DEFAULT_SCROLL_KEEP_ALIVE.to_string(),
                default_batch_size: DEFAULT_BATCH_SIZE,
            },
        }
    }
}
