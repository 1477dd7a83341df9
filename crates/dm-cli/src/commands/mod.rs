//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function taking the
//! [`TransferService`](dm_engine::TransferService) it should drive.

pub mod export;
pub mod import;
pub mod indices;
pub mod ping;
pub mod transfer;
