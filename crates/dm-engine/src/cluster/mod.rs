//! Cluster capability surface
//!
//! The transfer engine only ever talks to a cluster through [`ClusterClient`].
//! Two adapters implement it:
//!
//! - [`RestClusterClient`]: the HTTP API shared by Elasticsearch and OpenSearch
//! - [`MemoryCluster`]: an in-process cluster used by tests and dry runs
//!
//! A [`ClusterConnector`] turns a [`ClusterEndpoint`] into a client, which lets the
//! orchestrator stay unaware of which adapter it is driving.

mod memory;
mod rest;

pub use memory::{FaultPoint, MemoryCluster, MemoryConnector, MemoryStats, ScrollGate};
pub use rest::{RestClusterClient, RestConnector, SERVER_MANAGED_SETTINGS};

use crate::error::ClusterResult;
use async_trait::async_trait;
use dm_common::types::{
    AliasDefinition, ClusterEndpoint, ClusterInfo, Document, IndexInfo,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One page of a scroll cursor
#[derive(Debug, Clone, Default)]
pub struct ScrollPage {
    /// Token for the next page; `None` once the server dropped the cursor
    pub scroll_id: Option<String>,
    pub documents: Vec<Document>,
    /// Total hits reported by the server for the whole cursor, if known
    pub total_hits: Option<u64>,
}

/// A document the target refused inside an otherwise accepted bulk call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItemFailure {
    pub id: String,
    pub status: u16,
    pub reason: String,
}

/// Per-document result of one bulk call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub succeeded: u64,
    pub failures: Vec<BulkItemFailure>,
}

impl BulkOutcome {
    pub fn failed(&self) -> u64 {
        self.failures.len() as u64
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// One page of a search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub total: u64,
    pub page: usize,
    pub size: usize,
    pub documents: Vec<Document>,
}

/// Everything the engine needs from a cluster
#[async_trait]
pub trait ClusterClient: Send + Sync {
    fn endpoint(&self) -> &ClusterEndpoint;

    /// Fails when the cluster cannot be reached or rejects the credentials
    async fn ping(&self) -> ClusterResult<()>;

    async fn cluster_info(&self) -> ClusterResult<ClusterInfo>;

    /// All indices sorted by name
    async fn list_indices(&self) -> ClusterResult<Vec<IndexInfo>>;

    async fn index_exists(&self, index: &str) -> ClusterResult<bool>;

    /// Create an index; an existing one yields [`ClusterError::IndexAlreadyExists`]
    ///
    /// [`ClusterError::IndexAlreadyExists`]: crate::error::ClusterError::IndexAlreadyExists
    async fn create_index(
        &self,
        index: &str,
        settings: Option<&Value>,
        mappings: Option<&Value>,
    ) -> ClusterResult<()>;

    async fn delete_index(&self, index: &str) -> ClusterResult<()>;

    /// The index settings blob (the object under `settings`)
    async fn get_settings(&self, index: &str) -> ClusterResult<Option<Value>>;

    /// The index mappings blob (the object under `mappings`)
    async fn get_mappings(&self, index: &str) -> ClusterResult<Option<Value>>;

    async fn get_aliases(&self, index: &str) -> ClusterResult<BTreeMap<String, AliasDefinition>>;

    async fn put_alias(
        &self,
        index: &str,
        alias: &str,
        definition: &AliasDefinition,
    ) -> ClusterResult<()>;

    async fn count_documents(&self, index: &str) -> ClusterResult<u64>;

    /// Start a match-all scroll over `index`
    async fn open_scroll(
        &self,
        index: &str,
        page_size: usize,
        keep_alive: &str,
    ) -> ClusterResult<ScrollPage>;

    async fn continue_scroll(&self, scroll_id: &str, keep_alive: &str) -> ClusterResult<ScrollPage>;

    async fn clear_scroll(&self, scroll_id: &str) -> ClusterResult<()>;

    /// Upsert `documents` into `index` in one call
    async fn bulk_index(&self, index: &str, documents: &[Document]) -> ClusterResult<BulkOutcome>;

    /// Query-string search when `query` is set, match-all otherwise; `page` is zero based
    async fn search_documents(
        &self,
        index: &str,
        query: Option<&str>,
        page: usize,
        size: usize,
    ) -> ClusterResult<SearchPage>;

    async fn get_document(&self, index: &str, id: &str) -> ClusterResult<Option<Document>>;
}

/// Builds clients for endpoints
pub trait ClusterConnector: Send + Sync {
    fn connect(&self, endpoint: &ClusterEndpoint) -> ClusterResult<Arc<dyn ClusterClient>>;
}
