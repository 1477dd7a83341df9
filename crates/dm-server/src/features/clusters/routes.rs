//! Cluster routes

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use dm_common::types::ClusterEndpoint;

use super::queries::{self, GetDocumentQuery, SearchDocumentsQuery};
use crate::api::{response::ApiResponse, AppState};
use crate::error::AppResult;

/// Create cluster routes
pub fn clusters_routes() -> Router<AppState> {
    Router::new()
        .route("/ping", post(ping_cluster))
        .route("/info", post(cluster_info))
        .route("/indices", post(list_indices))
        .route("/search", post(search_documents))
        .route("/document", post(get_document))
}

/// Test connectivity
///
/// POST /clusters/ping
async fn ping_cluster(
    State(state): State<AppState>,
    Json(endpoint): Json<ClusterEndpoint>,
) -> AppResult<Response> {
    let result = queries::ping(&state.service, &endpoint).await?;
    Ok(ApiResponse::ok(result).into_response())
}

/// POST /clusters/info
async fn cluster_info(
    State(state): State<AppState>,
    Json(endpoint): Json<ClusterEndpoint>,
) -> AppResult<Response> {
    let info = queries::info(&state.service, &endpoint).await?;
    Ok(ApiResponse::ok(info).into_response())
}

/// List indices sorted by name
///
/// POST /clusters/indices
async fn list_indices(
    State(state): State<AppState>,
    Json(endpoint): Json<ClusterEndpoint>,
) -> AppResult<Response> {
    let indices = queries::indices(&state.service, &endpoint).await?;
    Ok(ApiResponse::ok(indices).into_response())
}

/// Page through the documents of one index
///
/// POST /clusters/search
async fn search_documents(
    State(state): State<AppState>,
    Json(query): Json<SearchDocumentsQuery>,
) -> AppResult<Response> {
    let page = queries::search(&state.service, &query).await?;
    Ok(ApiResponse::ok(page).into_response())
}

/// POST /clusters/document
async fn get_document(
    State(state): State<AppState>,
    Json(query): Json<GetDocumentQuery>,
) -> AppResult<Response> {
    let document = queries::document(&state.service, &query).await?;
    Ok(ApiResponse::ok(document).into_response())
}
