//! Execution of one transfer operation
//!
//! The orchestrator is the single writer of an operation's record. It walks the
//! requested indices strictly in order, one scroll page at a time:
//!
//! ```text
//! IndexReplicator -> CursorReader -> BulkBatcher -> BulkWriter -> progress event
//! ```
//!
//! Any fatal fault ends the operation as FAILED with the fault's message; nothing
//! already written is rolled back. Cancellation is cooperative and observed
//! between indices and before each page fetch.

use super::batcher::BulkBatcher;
use super::cursor::CursorReader;
use super::export_file::{load_envelope, store_envelope};
use super::progress::ProgressEmitter;
use super::registry::OperationHandle;
use super::replicator::IndexReplicator;
use super::writer::BulkWriter;
use crate::cluster::{ClusterClient, ClusterConnector};
use crate::error::{ClusterContext, Result, TransferError};
use crate::settings::TransferSettings;
use chrono::Utc;
use dm_common::export::{ExportEnvelope, IndexRecord};
use dm_common::types::{
    ClusterEndpoint, ClusterInfo, Document, ProgressEvent, TransferMode, TransferOperation,
    TransferStatus,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// How a document loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drain {
    Exhausted,
    Cancelled,
}

/// Drives operations from PENDING to a terminal status
pub struct TransferOrchestrator {
    connector: Arc<dyn ClusterConnector>,
    settings: TransferSettings,
}

impl TransferOrchestrator {
    pub fn new(connector: Arc<dyn ClusterConnector>, settings: TransferSettings) -> Self {
        Self {
            connector,
            settings,
        }
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    /// Run the operation behind `handle` to completion and return its final status
    pub async fn run(&self, handle: Arc<OperationHandle>, emitter: ProgressEmitter) -> TransferStatus {
        let plan = handle.snapshot();
        let span = info_span!(
            "transfer",
            operation_id = %plan.operation_id,
            mode = %plan.mode
        );
        self.execute(plan, &handle, &emitter).instrument(span).await
    }

    async fn execute(
        &self,
        plan: TransferOperation,
        handle: &OperationHandle,
        emitter: &ProgressEmitter,
    ) -> TransferStatus {
        let run = Run { handle, emitter };

        if !handle.update(|op| op.transition(TransferStatus::Running, Utc::now())) {
            let status = handle.status();
            warn!(status = %status, "Operation is not pending, refusing to start");
            return status;
        }
        info!(indices = plan.indices.len(), "Transfer started");
        run.emit(format!("{} started", plan.mode.display_name()));

        let outcome = match plan.mode {
            TransferMode::ClusterToCluster => self.cluster_to_cluster(&plan, &run).await,
            TransferMode::ClusterToFile => self.cluster_to_file(&plan, &run).await,
            TransferMode::FileToCluster => self.file_to_cluster(&plan, &run).await,
        };

        run.finish(outcome)
    }

    async fn cluster_to_cluster(&self, plan: &TransferOperation, run: &Run<'_>) -> Result<()> {
        let source = self.connect(required(&plan.source, "source", plan)?, "source").await?;
        let target = self.connect(required(&plan.target, "target", plan)?, "target").await?;
        let counts = run.count_totals(source.as_ref(), &plan.indices).await?;
        let replicator = IndexReplicator::new(&plan.options);

        for (index, expected) in plan.indices.iter().zip(counts) {
            if run.cancelled() {
                info!(index = %index, "Cancellation observed before index");
                return Ok(());
            }
            run.handle.update(|op| op.begin_index(index, expected));
            run.emit(format!("Transferring index {index}"));

            let descriptor = replicator.capture(source.as_ref(), index).await?;
            replicator.create_index(target.as_ref(), &descriptor).await?;

            let mut reader = self.reader(&source, index, plan.options.batch_size);
            let writer = BulkWriter::new(Arc::clone(&target), index.as_str());
            let drained = self.copy_index(run, &mut reader, &writer).await;
            reader.release().await;
            if drained? == Drain::Cancelled {
                info!(index = %index, "Cancellation observed mid-index");
                return Ok(());
            }

            replicator
                .replicate_aliases(target.as_ref(), index, &descriptor.aliases)
                .await;
            run.finish_index(index);
        }

        Ok(())
    }

    async fn cluster_to_file(&self, plan: &TransferOperation, run: &Run<'_>) -> Result<()> {
        let path = plan
            .export_file_path
            .clone()
            .ok_or_else(|| missing(plan, "an export file path"))?;
        let source = self.connect(required(&plan.source, "source", plan)?, "source").await?;
        let cluster_info = source_identity(source.as_ref()).await?;
        let counts = run.count_totals(source.as_ref(), &plan.indices).await?;
        let replicator = IndexReplicator::new(&plan.options);
        let mut envelope = ExportEnvelope::new(cluster_info);

        for (index, expected) in plan.indices.iter().zip(counts) {
            if run.cancelled() {
                info!(index = %index, "Cancellation observed before index, export file not written");
                return Ok(());
            }
            run.handle.update(|op| op.begin_index(index, expected));
            run.emit(format!("Exporting index {index}"));

            let descriptor = replicator.capture(source.as_ref(), index).await?;

            let mut reader = self.reader(&source, index, plan.options.batch_size);
            let mut documents = Vec::new();
            let drained = collect_index(run, &mut reader, &mut documents).await;
            reader.release().await;
            if drained? == Drain::Cancelled {
                info!(index = %index, "Cancellation observed mid-index, export file not written");
                return Ok(());
            }

            debug!(index = %index, documents = documents.len(), "Index captured for export");
            envelope.indices.push(IndexRecord::new(descriptor, documents));
            run.finish_index(index);
        }

        run.emit(format!("Writing export file {}", path.display()));
        store_envelope(path, envelope).await
    }

    async fn file_to_cluster(&self, plan: &TransferOperation, run: &Run<'_>) -> Result<()> {
        let path = plan
            .export_file_path
            .clone()
            .ok_or_else(|| missing(plan, "an export file path"))?;
        let envelope = load_envelope(path).await?;
        let records = select_records(envelope, &plan.indices)?;
        let target = self.connect(required(&plan.target, "target", plan)?, "target").await?;
        let replicator = IndexReplicator::new(&plan.options);

        run.handle.update(|op| {
            op.total_indices = records.len();
            op.total_documents = records.iter().map(|r| r.documents.len() as u64).sum();
        });

        for record in records {
            let IndexRecord {
                descriptor,
                documents,
                ..
            } = record;
            let index = descriptor.name.as_str();

            if run.cancelled() {
                info!(index = %index, "Cancellation observed before index");
                return Ok(());
            }
            run.handle
                .update(|op| op.begin_index(index, documents.len() as u64));
            run.emit(format!("Importing index {index}"));

            if descriptor.has_schema() {
                replicator.create_index(target.as_ref(), &descriptor).await?;
            }

            let writer = BulkWriter::new(Arc::clone(&target), index);
            let mut remaining = documents.into_iter();
            loop {
                if run.cancelled() {
                    info!(index = %index, "Cancellation observed mid-index");
                    return Ok(());
                }
                let chunk: Vec<Document> = remaining.by_ref().take(plan.options.batch_size).collect();
                if chunk.is_empty() {
                    break;
                }
                self.write_page(run, &writer, chunk).await?;
            }

            replicator
                .replicate_aliases(target.as_ref(), index, &descriptor.aliases)
                .await;
            run.finish_index(index);
        }

        Ok(())
    }

    /// Build a client and make sure the endpoint answers
    async fn connect(
        &self,
        endpoint: &ClusterEndpoint,
        role: &str,
    ) -> Result<Arc<dyn ClusterClient>> {
        let client = self
            .connector
            .connect(endpoint)
            .during(|| format!("Connecting to {role} cluster {endpoint}"))?;
        client
            .ping()
            .await
            .during(|| format!("Connecting to {role} cluster {endpoint}"))?;
        debug!(role, endpoint = %endpoint, "Connected");
        Ok(client)
    }

    fn reader(&self, source: &Arc<dyn ClusterClient>, index: &str, page_size: usize) -> CursorReader {
        CursorReader::new(
            Arc::clone(source),
            index,
            page_size,
            self.settings.scroll_keep_alive.as_str(),
        )
    }

    /// Pump every page of `reader` into `writer`; the caller releases the cursor
    async fn copy_index(
        &self,
        run: &Run<'_>,
        reader: &mut CursorReader,
        writer: &BulkWriter,
    ) -> Result<Drain> {
        loop {
            if run.cancelled() {
                return Ok(Drain::Cancelled);
            }
            let page = reader
                .next_batch()
                .await
                .during(|| format!("Reading documents from index {}", reader.index()))?;
            match page {
                Some(documents) => self.write_page(run, writer, documents).await?,
                None => return Ok(Drain::Exhausted),
            }
        }
    }

    /// Re-chunk one page under the bulk ceilings and write each batch
    async fn write_page(&self, run: &Run<'_>, writer: &BulkWriter, page: Vec<Document>) -> Result<()> {
        for batch in BulkBatcher::split(self.settings.batch_limits, page) {
            let outcome = writer
                .write(&batch)
                .await
                .during(|| format!("Writing documents to index {}", writer.index()))?;
            run.record(outcome.succeeded, outcome.failed());
        }
        Ok(())
    }
}

/// Read a whole index into memory for export
async fn collect_index(
    run: &Run<'_>,
    reader: &mut CursorReader,
    documents: &mut Vec<Document>,
) -> Result<Drain> {
    loop {
        if run.cancelled() {
            return Ok(Drain::Cancelled);
        }
        let page = reader
            .next_batch()
            .await
            .during(|| format!("Reading documents from index {}", reader.index()))?;
        let Some(page) = page else {
            return Ok(Drain::Exhausted);
        };
        run.record(page.len() as u64, 0);
        documents.extend(page);
    }
}

/// Source cluster identity for the export envelope
///
/// Only an unreachable source fails the export; any other failure leaves the
/// identity out of the file.
async fn source_identity(source: &dyn ClusterClient) -> Result<Option<ClusterInfo>> {
    match source.cluster_info().await {
        Ok(info) => Ok(Some(info)),
        Err(e) if e.is_connectivity() => Err(TransferError::from_cluster(
            e,
            format!("Reading cluster info of {}", source.endpoint()),
        )),
        Err(e) => {
            warn!(error = %e, "Cluster info unavailable, exporting without it");
            Ok(None)
        }
    }
}

/// The records to import: all of them, or exactly the requested ones in request order
fn select_records(envelope: ExportEnvelope, wanted: &[String]) -> Result<Vec<IndexRecord>> {
    if wanted.is_empty() {
        return Ok(envelope.indices);
    }

    let mut by_name: HashMap<String, IndexRecord> = envelope
        .indices
        .into_iter()
        .map(|record| (record.name().to_string(), record))
        .collect();

    let mut seen = HashSet::new();
    wanted
        .iter()
        .filter(|name| seen.insert(*name))
        .map(|name| {
            by_name.remove(name).ok_or_else(|| {
                TransferError::InvalidRequest(format!("index {name} is not present in the export file"))
            })
        })
        .collect()
}

fn required<'p>(
    endpoint: &'p Option<ClusterEndpoint>,
    role: &str,
    plan: &TransferOperation,
) -> Result<&'p ClusterEndpoint> {
    endpoint
        .as_ref()
        .ok_or_else(|| missing(plan, &format!("a {role} cluster")))
}

fn missing(plan: &TransferOperation, what: &str) -> TransferError {
    TransferError::InvalidRequest(format!("{} requires {what}", plan.mode))
}

/// Per-run access to the record and the observers
struct Run<'a> {
    handle: &'a OperationHandle,
    emitter: &'a ProgressEmitter,
}

impl Run<'_> {
    fn cancelled(&self) -> bool {
        self.handle.is_cancel_requested()
    }

    fn emit(&self, message: String) {
        let event = self
            .handle
            .update(|op| ProgressEvent::snapshot(op, message, Utc::now()));
        self.emitter.emit(&event);
    }

    /// Count every source index up front so progress has totals to report
    async fn count_totals(&self, source: &dyn ClusterClient, indices: &[String]) -> Result<Vec<u64>> {
        let mut counts = Vec::with_capacity(indices.len());
        for index in indices {
            let count = source
                .count_documents(index)
                .await
                .during(|| format!("Counting documents in index {index}"))?;
            counts.push(count);
        }

        let total: u64 = counts.iter().sum();
        self.handle.update(|op| {
            op.total_indices = indices.len();
            op.total_documents = total;
        });
        info!(indices = indices.len(), documents = total, "Counted source documents");
        Ok(counts)
    }

    fn record(&self, succeeded: u64, failed: u64) {
        let event = self.handle.update(|op| {
            op.record_written(succeeded, failed);
            let message = format!(
                "{}: {}/{} documents",
                op.current_index.as_deref().unwrap_or("-"),
                op.current_index_processed,
                op.current_index_documents
            );
            ProgressEvent::snapshot(op, message, Utc::now())
        });
        self.emitter.emit(&event);
    }

    fn finish_index(&self, index: &str) {
        let event = self.handle.update(|op| {
            op.complete_index();
            let message = format!(
                "Completed index {index} ({}/{})",
                op.completed_indices, op.total_indices
            );
            ProgressEvent::snapshot(op, message, Utc::now())
        });
        info!(index = %index, completed = event.completed_indices, total = event.total_indices, "Index complete");
        self.emitter.emit(&event);
    }

    /// Apply the terminal transition under the record's lock
    ///
    /// A fault always wins. Otherwise an accepted cancellation wins over
    /// completion, since the requester was already told it was accepted.
    fn finish(&self, outcome: Result<()>) -> TransferStatus {
        let now = Utc::now();
        let event = self.handle.update(|op| {
            let message = match outcome {
                Err(e) => {
                    let message = e.to_string();
                    op.error_message = Some(message.clone());
                    op.transition(TransferStatus::Failed, now);
                    message
                }
                Ok(()) if op.cancel_requested => {
                    op.transition(TransferStatus::Cancelled, now);
                    "Transfer cancelled".to_string()
                }
                Ok(()) => {
                    op.transition(TransferStatus::Completed, now);
                    op.current_index = None;
                    format!(
                        "Transfer completed: {} documents across {} indices",
                        op.processed_documents, op.completed_indices
                    )
                }
            };
            ProgressEvent::snapshot(op, message, now)
        });

        match event.status {
            TransferStatus::Failed => error!(error = %event.message, "Transfer failed"),
            TransferStatus::Cancelled => warn!(
                processed = event.processed_documents,
                completed_indices = event.completed_indices,
                "Transfer cancelled"
            ),
            _ => info!(
                processed = event.processed_documents,
                failed = event.failed_documents,
                elapsed_ms = event.elapsed_ms,
                "Transfer completed"
            ),
        }

        self.emitter.emit(&event);
        event.status
    }
}
