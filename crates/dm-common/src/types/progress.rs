use super::operation::{TransferOperation, TransferStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Completion percentage from index and in-index progress
///
/// Each index is worth an equal share; the current index contributes the
/// fraction of its expected documents already written, capped at its share so
/// the value never moves backwards when the index completes.
pub fn transfer_percentage(
    completed_indices: usize,
    total_indices: usize,
    index_processed: u64,
    index_total: u64,
) -> f64 {
    if total_indices == 0 {
        return 0.0;
    }

    let within_index = if index_total == 0 || completed_indices >= total_indices {
        0.0
    } else {
        (index_processed as f64 / index_total as f64).min(1.0)
    };

    let raw = (completed_indices as f64 + within_index) / total_indices as f64 * 100.0;
    (raw.min(100.0) * 100.0).floor() / 100.0
}

/// Immutable point-in-time snapshot of an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub operation_id: String,
    pub status: TransferStatus,
    pub message: String,
    pub current_index: Option<String>,
    pub total_indices: usize,
    pub completed_indices: usize,
    pub total_documents: u64,
    pub processed_documents: u64,
    pub failed_documents: u64,
    pub percentage: f64,
    pub elapsed_ms: u64,
    pub estimated_remaining_ms: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn snapshot(op: &TransferOperation, message: impl Into<String>, now: DateTime<Utc>) -> Self {
        let elapsed_ms = op.elapsed(now).num_milliseconds().max(0) as u64;

        Self {
            operation_id: op.operation_id.clone(),
            status: op.status,
            message: message.into(),
            current_index: op.current_index.clone(),
            total_indices: op.total_indices,
            completed_indices: op.completed_indices,
            total_documents: op.total_documents,
            processed_documents: op.processed_documents,
            failed_documents: op.failed_documents,
            percentage: op.percentage(),
            elapsed_ms,
            estimated_remaining_ms: estimate_remaining(op, elapsed_ms),
            timestamp: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Linear extrapolation from the document rate so far
fn estimate_remaining(op: &TransferOperation, elapsed_ms: u64) -> Option<u64> {
    if op.status == TransferStatus::Completed {
        return Some(0);
    }
    if op.status != TransferStatus::Running
        || op.processed_documents == 0
        || op.total_documents <= op.processed_documents
    {
        return None;
    }

    let remaining = (op.total_documents - op.processed_documents) as u128;
    let estimate = elapsed_ms as u128 * remaining / op.processed_documents as u128;
    Some(u64::try_from(estimate).unwrap_or(u64::MAX))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::{ClusterEndpoint, TransferRequest};
    use chrono::Duration;
    use proptest::prelude::*;

    #[test]
    fn test_percentage_examples() {
        assert_eq!(transfer_percentage(0, 0, 0, 0), 0.0);
        assert_eq!(transfer_percentage(0, 2, 0, 100), 0.0);
        assert_eq!(transfer_percentage(0, 2, 50, 100), 25.0);
        assert_eq!(transfer_percentage(1, 2, 0, 0), 50.0);
        assert_eq!(transfer_percentage(2, 2, 0, 0), 100.0);
        // More documents than counted up front never exceed the index share
        assert_eq!(transfer_percentage(0, 2, 500, 100), 50.0);
    }

    proptest! {
        #[test]
        fn percentage_is_monotonic_within_and_across_indices(
            total in 1usize..20,
            docs in 0u64..5_000,
            steps in proptest::collection::vec(0u64..700, 0..20),
        ) {
            let mut last = 0.0;
            for completed in 0..total {
                let mut processed = 0;
                for step in &steps {
                    processed += step;
                    let pct = transfer_percentage(completed, total, processed, docs);
                    prop_assert!(pct >= last);
                    last = pct;
                }
                let next = transfer_percentage(completed + 1, total, 0, 0);
                prop_assert!(next >= last);
                last = next;
            }
            prop_assert_eq!(last, 100.0);
        }
    }

    #[test]
    fn test_snapshot_estimates_remaining_time() {
        let start = Utc::now();
        let mut op = TransferOperation::from_request(TransferRequest::cluster_to_cluster(
            ClusterEndpoint::new("a", 9200),
            ClusterEndpoint::new("b", 9200),
            vec!["logs".into()],
        ));
        op.transition(TransferStatus::Running, start);
        op.total_documents = 400;
        op.begin_index("logs", 400);
        op.record_written(100, 0);

        let event = ProgressEvent::snapshot(&op, "Transferring logs", start + Duration::seconds(10));
        assert_eq!(event.elapsed_ms, 10_000);
        assert_eq!(event.estimated_remaining_ms, Some(30_000));
        assert_eq!(event.percentage, 25.0);
        assert_eq!(event.current_index.as_deref(), Some("logs"));
        assert!(!event.is_terminal());
    }
}
