//! Data Manager transfer engine
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Moves documents between Elasticsearch and OpenSearch clusters, or between a
//! cluster and an export file.
//!
//! # Overview
//!
//! - **Cluster**: the [`ClusterClient`] capability trait with a REST adapter and
//!   an in-memory adapter
//! - **Transfer**: cursor reading, bulk batching and writing, metadata
//!   replication, per-operation orchestration and the operation registry
//! - **Settings**: engine tunables shared by every operation
//!
//! # Example
//!
//! ```no_run
//! use dm_common::types::{ClusterEndpoint, TransferRequest};
//! use dm_engine::{RestConnector, TransferService, TransferSettings};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), dm_engine::TransferError> {
//! let service = TransferService::new(Arc::new(RestConnector), TransferSettings::default());
//! let id = service.submit(TransferRequest::cluster_to_cluster(
//!     ClusterEndpoint::new("es-prod.internal", 9200),
//!     ClusterEndpoint::new("os-staging.internal", 9200),
//!     vec!["logs-2024".into()],
//! ))?;
//! let finished = service.wait(&id).await;
//! # Ok(())
//! # }
//! ```

pub mod cluster;
pub mod error;
pub mod settings;
pub mod transfer;

pub use cluster::{
    BulkItemFailure, BulkOutcome, ClusterClient, ClusterConnector, MemoryCluster, MemoryConnector,
    RestClusterClient, RestConnector, ScrollPage, SearchPage,
};
pub use error::{ClusterError, ClusterResult, Result, TransferError};
pub use settings::{TransferSettings, DEFAULT_SCROLL_KEEP_ALIVE};
pub use transfer::{
    BatchLimits, OperationRegistry, ProgressEmitter, ProgressSink, TransferOrchestrator,
    TransferService,
};
