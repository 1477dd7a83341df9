//! Read-only cluster calls

use crate::error::{AppError, AppResult};
use dm_common::types::{ClusterEndpoint, ClusterInfo, Document, IndexInfo};
use dm_engine::{ClusterClient, ClusterError, SearchPage, TransferService};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default page size of document searches
pub const DEFAULT_SEARCH_SIZE: usize = 20;

/// Largest page a single search may request
pub const MAX_SEARCH_SIZE: usize = 1000;

/// Outcome of a connection test
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResult {
    pub reachable: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDocumentsQuery {
    pub endpoint: ClusterEndpoint,
    pub index: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_search_size")]
    pub size: usize,
}

fn default_search_size() -> usize {
    DEFAULT_SEARCH_SIZE
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDocumentQuery {
    pub endpoint: ClusterEndpoint,
    pub index: String,
    pub id: String,
}

fn client(service: &TransferService, endpoint: &ClusterEndpoint) -> AppResult<Arc<dyn ClusterClient>> {
    endpoint
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    Ok(service.connect(endpoint)?)
}

/// Unreachable clusters are a normal answer here, not an error
pub async fn ping(service: &TransferService, endpoint: &ClusterEndpoint) -> AppResult<PingResult> {
    endpoint
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let outcome = match service.connect(endpoint) {
        Ok(client) => client.ping().await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(()) => Ok(PingResult {
            reachable: true,
            message: format!("Connected to {endpoint}"),
        }),
        Err(ClusterError::InvalidEndpoint(message)) => Err(AppError::Validation(message)),
        Err(e) => {
            tracing::info!(endpoint = %endpoint.base_url(), error = %e, "Cluster ping failed");
            Ok(PingResult {
                reachable: false,
                message: e.to_string(),
            })
        },
    }
}

pub async fn info(service: &TransferService, endpoint: &ClusterEndpoint) -> AppResult<ClusterInfo> {
    Ok(client(service, endpoint)?.cluster_info().await?)
}

pub async fn indices(service: &TransferService, endpoint: &ClusterEndpoint) -> AppResult<Vec<IndexInfo>> {
    Ok(client(service, endpoint)?.list_indices().await?)
}

pub async fn search(service: &TransferService, query: &SearchDocumentsQuery) -> AppResult<SearchPage> {
    if query.size == 0 || query.size > MAX_SEARCH_SIZE {
        return Err(AppError::Validation(format!(
            "size must be between 1 and {MAX_SEARCH_SIZE}"
        )));
    }

    let text = query
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty());

    Ok(client(service, &query.endpoint)?
        .search_documents(&query.index, text, query.page, query.size)
        .await?)
}

pub async fn document(service: &TransferService, query: &GetDocumentQuery) -> AppResult<Document> {
    client(service, &query.endpoint)?
        .get_document(&query.index, &query.id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Document '{}' not found in index '{}'",
                query.id, query.index
            ))
        })
}
