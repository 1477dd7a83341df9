//! Write operations on transfers

use crate::error::{AppError, AppResult};
use dm_common::types::{TransferOperation, TransferRequest};
use dm_engine::TransferService;
use serde_json::{Map, Value};

/// Turn a raw request body into a [`TransferRequest`]
///
/// Bodies that do not set `options.batchSize` get the server's configured page
/// size instead of the library default.
pub fn prepare_request(mut body: Value, default_batch_size: usize) -> AppResult<TransferRequest> {
    let Some(fields) = body.as_object_mut() else {
        return Err(AppError::Validation("request body must be a JSON object".to_string()));
    };

    let options = fields
        .entry("options")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(options) = options.as_object_mut() {
        options
            .entry("batchSize")
            .or_insert_with(|| Value::from(default_batch_size));
    }

    serde_json::from_value(body)
        .map_err(|e| AppError::Validation(format!("invalid transfer request: {e}")))
}

/// Validate, register and start an operation; returns its id
pub fn submit(service: &TransferService, request: TransferRequest) -> AppResult<String> {
    let operation_id = service.submit(request)?;
    tracing::info!(operation_id = %operation_id, "Transfer submitted");
    Ok(operation_id)
}

/// Request cancellation; yields the snapshot and whether the request was accepted
pub fn cancel(service: &TransferService, id: &str) -> AppResult<(TransferOperation, bool)> {
    let accepted = service
        .cancel(id)
        .ok_or_else(|| AppError::NotFound(format!("Operation '{id}' not found")))?;
    let operation = service
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Operation '{id}' not found")))?;
    Ok((operation, accepted))
}

/// Drop every finished operation; returns how many were removed
pub fn clear_finished(service: &TransferService) -> usize {
    let removed = service.clear_terminal();
    tracing::info!(removed, "Cleared finished transfers");
    removed
}
