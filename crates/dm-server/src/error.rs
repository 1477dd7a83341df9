//! Server-specific error types

use crate::api::response::ErrorResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dm_engine::{ClusterError, TransferError};
use thiserror::Error;

/// Result type alias for handlers
pub type AppResult<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    /// A cluster the request pointed at failed or could not be reached
    #[error("{0}")]
    Cluster(#[from] ClusterError),

    #[error("{0}")]
    Internal(String),
}

impl From<TransferError> for AppError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::InvalidRequest(message) => AppError::Validation(message),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, "NOT_FOUND", message),
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message),
            AppError::Cluster(err) => {
                tracing::warn!(error = %err, "Cluster call failed");
                let status = match err {
                    ClusterError::InvalidEndpoint(_) => StatusCode::BAD_REQUEST,
                    ClusterError::IndexNotFound(_) => StatusCode::NOT_FOUND,
                    _ => StatusCode::BAD_GATEWAY,
                };
                (status, "CLUSTER_ERROR", err.to_string())
            },
            AppError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            },
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}
