//! `dm import` command implementation

use super::transfer::execute;
use crate::error::Result;
use dm_common::types::{ClusterEndpoint, TransferOperation, TransferOptions, TransferRequest};
use dm_engine::TransferService;
use std::path::PathBuf;

/// Load the export file at `input` into `target`
///
/// An empty `indices` list imports every index in the file.
pub async fn run(
    service: &TransferService,
    input: PathBuf,
    target: ClusterEndpoint,
    indices: Vec<String>,
    options: TransferOptions,
) -> Result<TransferOperation> {
    let request = TransferRequest::file_to_cluster(input, target, indices).with_options(options);
    execute(service, request).await
}
