use crate::cluster::{BulkOutcome, ClusterClient};
use crate::error::ClusterResult;
use dm_common::types::Document;
use std::sync::Arc;
use tracing::{debug, warn};

/// How many rejected documents are spelled out in the logs per batch
const LOGGED_FAILURES: usize = 5;

/// Sends pre-formed batches to one target index
///
/// A batch counts as delivered even when some of its documents were rejected;
/// those are logged and reported in the outcome, never retried.
pub struct BulkWriter {
    client: Arc<dyn ClusterClient>,
    index: String,
}

impl BulkWriter {
    pub fn new(client: Arc<dyn ClusterClient>, index: impl Into<String>) -> Self {
        Self {
            client,
            index: index.into(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub async fn write(&self, batch: &[Document]) -> ClusterResult<BulkOutcome> {
        let outcome = self.client.bulk_index(&self.index, batch).await?;

        if outcome.has_failures() {
            warn!(
                index = %self.index,
                batch_size = batch.len(),
                failed = outcome.failed(),
                "Some documents failed to transfer"
            );
            for failure in outcome.failures.iter().take(LOGGED_FAILURES) {
                debug!(
                    index = %self.index,
                    document_id = %failure.id,
                    status = failure.status,
                    reason = %failure.reason,
                    "Document rejected"
                );
            }
        }

        Ok(outcome)
    }
}
