//! Data Manager Server Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! HTTP control surface for the transfer engine.
//!
//! # Overview
//!
//! - **Transfers**: submit operations, poll their live records, cancel and clear them
//! - **Clusters**: connection tests, cluster identity, index listing and document browsing
//! - **Configuration**: environment-based configuration loaded through `dotenvy`
//! - **Middleware**: CORS and request tracing
//!
//! Operations run on background tasks inside [`dm_engine::TransferService`]; the
//! handlers never block on a transfer.
//!
//! # Example
//!
//! ```no_run
//! use dm_server::{api, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     api::serve(config).await
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod middleware;

pub use error::{AppError, AppResult};
