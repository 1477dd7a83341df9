//! Live progress rendering for transfers
//!
//! A transfer's progress events are folded into one `indicatif` bar whose
//! length is the operation's document total.

use dm_common::types::ProgressEvent;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const BAR_TEMPLATE: &str =
    "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} docs ({eta})";

/// Progress bar bound to a single operation
pub struct TransferProgress {
    operation_id: String,
    bar: ProgressBar,
}

impl TransferProgress {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self::with_bar(operation_id, ProgressBar::new(0))
    }

    /// Same rendering logic over a caller-provided bar
    pub fn with_bar(operation_id: impl Into<String>, bar: ProgressBar) -> Self {
        bar.set_style(
            ProgressStyle::default_bar()
                .template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            operation_id: operation_id.into(),
            bar,
        }
    }

    /// Apply one event; returns true once the operation reached a terminal state
    ///
    /// Events of other operations are ignored.
    pub fn apply(&self, event: &ProgressEvent) -> bool {
        if event.operation_id != self.operation_id {
            return false;
        }

        self.bar.set_length(event.total_documents);
        self.bar.set_position(event.processed_documents.min(event.total_documents));
        self.bar.set_message(describe(event));

        if event.is_terminal() {
            self.bar.finish_with_message(event.message.clone());
            return true;
        }
        false
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

/// One-line headline of an event: message plus index counter and failures
pub fn describe(event: &ProgressEvent) -> String {
    let mut line = format!(
        "{} [{}/{} indices, {:.2}%]",
        event.message, event.completed_indices, event.total_indices, event.percentage
    );
    if event.failed_documents > 0 {
        line.push_str(&format!(" ({} failed)", event.failed_documents));
    }
    line
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dm_common::types::{
        ClusterEndpoint, TransferOperation, TransferRequest, TransferStatus,
    };

    fn event(id: &str, status: TransferStatus, processed: u64, failed: u64) -> ProgressEvent {
        let request = TransferRequest::cluster_to_file(
            ClusterEndpoint::new("localhost", 9200),
            vec!["logs".to_string()],
            "/tmp/out.json",
        )
        .with_operation_id(id);
        let mut op = TransferOperation::from_request(request);
        op.status = status;
        op.total_indices = 1;
        op.total_documents = 100;
        op.processed_documents = processed;
        op.failed_documents = failed;
        ProgressEvent::snapshot(&op, "Transferring index logs", Utc::now())
    }

    #[test]
    fn test_apply_tracks_position() {
        let progress = TransferProgress::with_bar("OP1", ProgressBar::hidden());

        assert!(!progress.apply(&event("OP1", TransferStatus::Running, 40, 0)));
        assert_eq!(progress.bar().length(), Some(100));
        assert_eq!(progress.bar().position(), 40);

        assert!(progress.apply(&event("OP1", TransferStatus::Completed, 100, 0)));
        assert!(progress.bar().is_finished());
    }

    #[test]
    fn test_other_operations_ignored() {
        let progress = TransferProgress::with_bar("OP1", ProgressBar::hidden());
        assert!(!progress.apply(&event("OP2", TransferStatus::Completed, 100, 0)));
        assert_eq!(progress.bar().position(), 0);
    }

    #[test]
    fn test_describe_mentions_failures() {
        let line = describe(&event("OP1", TransferStatus::Running, 50, 3));
        assert!(line.starts_with("Transferring index logs [0/1 indices"));
        assert!(line.ends_with("(3 failed)"));
    }
}
