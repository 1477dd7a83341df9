//! Common types used across the Data Manager
//!
//! Split by concern: connection targets, index/document payloads, transfer
//! operations, and the progress snapshots emitted while an operation runs.

mod endpoint;
mod index;
mod operation;
mod progress;

pub use endpoint::{ClusterEndpoint, ClusterKind, DEFAULT_TIMEOUT_MS};
pub use index::{AliasDefinition, ClusterInfo, Document, IndexDescriptor, IndexInfo};
pub use operation::{
    generate_operation_id, TransferMode, TransferOperation, TransferOptions, TransferRequest,
    TransferStatus, DEFAULT_BATCH_SIZE,
};
pub use progress::{transfer_percentage, ProgressEvent};
