//! Read operations on transfers

use crate::error::{AppError, AppResult};
use dm_common::types::TransferOperation;
use dm_engine::TransferService;

pub fn get(service: &TransferService, id: &str) -> AppResult<TransferOperation> {
    service
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Operation '{id}' not found")))
}

/// All known operations, oldest first
pub fn list(service: &TransferService) -> Vec<TransferOperation> {
    service.list()
}
