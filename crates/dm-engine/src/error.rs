//! Error types for the transfer engine
//!
//! Two layers: [`ClusterError`] describes what went wrong talking to one
//! cluster, [`TransferError`] classifies it for the operation that hit it
//! (connectivity and transfer faults are fatal, metadata faults are not).

use dm_common::DmError;
use thiserror::Error;

/// Result type alias for cluster calls
pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

/// Result type alias for transfer operations
pub type Result<T> = std::result::Result<T, TransferError>;

/// Failure of a single cluster call
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("cannot reach {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("authentication rejected by {endpoint} (HTTP {status})")]
    Authentication { endpoint: String, status: u16 },

    #[error("cluster {0} is unavailable")]
    Unavailable(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("{operation} failed with HTTP {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("index '{0}' already exists")]
    IndexAlreadyExists(String),

    #[error("index '{0}' not found")]
    IndexNotFound(String),

    #[error("unexpected response to {operation}: {reason}")]
    UnexpectedResponse { operation: String, reason: String },
}

impl ClusterError {
    /// True when the endpoint could not be reached or refused the credentials
    pub fn is_connectivity(&self) -> bool {
        match self {
            ClusterError::Connection { .. }
            | ClusterError::Authentication { .. }
            | ClusterError::Unavailable(_)
            | ClusterError::InvalidEndpoint(_) => true,
            ClusterError::Status { status, .. } => *status == 502 || *status == 503,
            _ => false,
        }
    }

    pub fn unexpected(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// Failure of a transfer operation
#[derive(Error, Debug)]
pub enum TransferError {
    /// Cannot reach or authenticate to an endpoint
    #[error("{context}: {source}")]
    Connectivity {
        context: String,
        #[source]
        source: ClusterError,
    },

    /// Reading or writing documents or metadata failed
    #[error("{context}: {source}")]
    Transfer {
        context: String,
        #[source]
        source: ClusterError,
    },

    /// Index already exists, alias creation failed; logged and skipped
    #[error("{0}")]
    NonFatalMetadata(String),

    #[error("export file error: {0}")]
    File(#[from] DmError),

    #[error("invalid transfer request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl TransferError {
    /// Classify a cluster failure, prefixing it with what the engine was doing
    pub fn from_cluster(source: ClusterError, context: impl Into<String>) -> Self {
        let context = context.into();
        if source.is_connectivity() {
            TransferError::Connectivity { context, source }
        } else {
            TransferError::Transfer { context, source }
        }
    }

    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransferError::NonFatalMetadata(_))
    }
}

/// Attach operation context to cluster results
pub trait ClusterContext<T> {
    fn during<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ClusterContext<T> for ClusterResult<T> {
    fn during<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| TransferError::from_cluster(e, context()))
    }
}
