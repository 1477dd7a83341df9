//! `dm export` command implementation

use super::transfer::execute;
use crate::error::Result;
use dm_common::types::{ClusterEndpoint, TransferOperation, TransferOptions, TransferRequest};
use dm_engine::TransferService;
use std::path::PathBuf;

/// Write `indices` of `source` to the export file at `output`
pub async fn run(
    service: &TransferService,
    source: ClusterEndpoint,
    indices: Vec<String>,
    output: PathBuf,
    options: TransferOptions,
) -> Result<TransferOperation> {
    let request = TransferRequest::cluster_to_file(source, indices, output).with_options(options);
    execute(service, request).await
}
