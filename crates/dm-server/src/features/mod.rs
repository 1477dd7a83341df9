//! Feature modules implementing the Data Manager API
//!
//! Each feature is a vertical slice with its own routes. Write operations live in
//! `commands`, read operations in `queries`.
//!
//! # Features
//!
//! - **transfers**: submit, inspect, cancel and clear transfer operations
//! - **clusters**: connection testing and index browsing for a cluster endpoint

pub mod clusters;
pub mod transfers;

use crate::api::AppState;
use axum::Router;

/// Creates the API router with all feature routes mounted
///
/// - `/transfers` - Transfer operation control
/// - `/clusters` - Cluster connectivity and metadata
pub fn router(state: AppState) -> Router<()> {
    Router::new()
        .nest("/transfers", transfers::transfers_routes().with_state(state.clone()))
        .nest("/clusters", clusters::clusters_routes().with_state(state))
}
