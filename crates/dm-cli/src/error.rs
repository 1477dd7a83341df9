//! Error types for the dm CLI
//!
//! Every variant renders as a user-facing message with a hint on what to try next.

use dm_engine::{ClusterError, TransferError};
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// Cluster URL could not be turned into an endpoint
    #[error("Invalid cluster URL: {0}. Expected http(s)://[user:pass@]host[:port].")]
    InvalidEndpoint(String),

    /// A direct cluster call failed
    #[error("Cluster request failed: {0}. Check that the cluster is running and the URL and credentials are correct.")]
    Cluster(#[from] ClusterError),

    /// The engine refused the request before starting it
    #[error("{0}")]
    Transfer(#[from] TransferError),

    /// The operation ran and ended in FAILED
    #[error("Transfer {id} failed: {message}")]
    TransferFailed { id: String, message: String },

    #[error("Transfer {0} was cancelled")]
    Cancelled(String),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
