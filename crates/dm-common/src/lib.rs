//! Data Manager Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, error handling, and logging for the Data Manager workspace.
//!
//! # Overview
//!
//! This crate provides the vocabulary every other workspace member speaks:
//!
//! - **Types**: cluster endpoints, index descriptors, documents, transfer operations
//!   and progress events
//! - **Export**: the logical schema of the export file and its atomic read/write
//! - **Error Handling**: the shared [`DmError`] and [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by environment variables
//!
//! # Example
//!
//! ```no_run
//! use dm_common::types::{ClusterEndpoint, TransferRequest};
//!
//! let source = ClusterEndpoint::new("es-prod.internal", 9200).with_tls(true);
//! let target = ClusterEndpoint::new("os-staging.internal", 9200);
//! let request = TransferRequest::cluster_to_cluster(source, target, vec!["logs-2024".into()]);
//! request.validate().unwrap();
//! ```

pub mod error;
pub mod export;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{DmError, Result};
