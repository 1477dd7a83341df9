//! `dm transfer` command implementation
//!
//! Also hosts [`execute`], which `export` and `import` share: submit, follow the
//! progress stream until the operation ends, print a summary.

use crate::error::{CliError, Result};
use crate::progress::TransferProgress;
use chrono::Utc;
use dm_common::types::{
    ClusterEndpoint, ProgressEvent, TransferOperation, TransferOptions, TransferRequest,
    TransferStatus,
};
use dm_engine::TransferService;
use tokio::sync::broadcast::{self, error::RecvError};

/// Copy `indices` from `source` to `target`
pub async fn run(
    service: &TransferService,
    source: ClusterEndpoint,
    target: ClusterEndpoint,
    indices: Vec<String>,
    options: TransferOptions,
) -> Result<TransferOperation> {
    let request = TransferRequest::cluster_to_cluster(source, target, indices).with_options(options);
    execute(service, request).await
}

/// Run one request to its end
///
/// The first Ctrl-C requests a cooperative cancel; the operation still drains
/// its current batch and releases its cursor before the command returns.
pub async fn execute(service: &TransferService, request: TransferRequest) -> Result<TransferOperation> {
    let mut events = service.subscribe();
    let id = service.submit(request)?;
    tracing::info!(operation_id = %id, "Transfer started");

    let progress = TransferProgress::new(&id);
    follow(service, &id, &mut events, &progress).await;

    let operation = service
        .wait(&id)
        .await
        .ok_or_else(|| anyhow::anyhow!("operation {id} disappeared from the registry"))?;

    print_summary(&operation);
    outcome(operation)
}

async fn follow(
    service: &TransferService,
    id: &str,
    events: &mut broadcast::Receiver<ProgressEvent>,
    progress: &TransferProgress,
) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if progress.apply(&event) {
                        return;
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Progress display fell behind");
                },
                Err(RecvError::Closed) => return,
            },
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                if service.cancel(id) == Some(true) {
                    progress.bar().println("Cancelling, waiting for the current batch to finish...");
                }
            },
        }
    }
}

fn print_summary(operation: &TransferOperation) {
    let now = Utc::now();
    println!();
    println!("Operation:  {}", operation.operation_id);
    println!("Status:     {}", operation.status);
    println!(
        "Indices:    {}/{}",
        operation.completed_indices, operation.total_indices
    );
    println!(
        "Documents:  {} transferred, {} failed",
        operation.processed_documents, operation.failed_documents
    );
    println!("Duration:   {}", operation.duration(now));
    if let Some(path) = &operation.export_file_path {
        println!("File:       {}", path.display());
    }
}

/// Map the final record to the command result
pub fn outcome(operation: TransferOperation) -> Result<TransferOperation> {
    match operation.status {
        TransferStatus::Completed => Ok(operation),
        TransferStatus::Cancelled => Err(CliError::Cancelled(operation.operation_id)),
        TransferStatus::Failed => Err(CliError::TransferFailed {
            message: operation
                .error_message
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
            id: operation.operation_id,
        }),
        other => Err(CliError::Other(anyhow::anyhow!(
            "operation {} stopped in state {}",
            operation.operation_id,
            other
        ))),
    }
}
