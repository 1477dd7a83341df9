//! Cluster connectivity and browsing
//!
//! Every route takes a [`ClusterEndpoint`](dm_common::types::ClusterEndpoint) in
//! the body, so credentials never appear in URLs or access logs.

pub mod queries;
pub mod routes;

pub use routes::clusters_routes;
