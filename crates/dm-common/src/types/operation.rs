//! Transfer operations: the request a caller submits and the live record the
//! engine keeps for it.

use super::endpoint::ClusterEndpoint;
use super::progress::transfer_percentage;
use crate::error::{DmError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Scroll page size used when a request does not set one
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// The three ways data can move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferMode {
    ClusterToCluster,
    ClusterToFile,
    FileToCluster,
}

impl TransferMode {
    pub fn as_str(&self) -> &str {
        match self {
            TransferMode::ClusterToCluster => "CLUSTER_TO_CLUSTER",
            TransferMode::ClusterToFile => "CLUSTER_TO_FILE",
            TransferMode::FileToCluster => "FILE_TO_CLUSTER",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            TransferMode::ClusterToCluster => "Cluster to cluster",
            TransferMode::ClusterToFile => "Export to file",
            TransferMode::FileToCluster => "Import from file",
        }
    }

    pub fn needs_source(&self) -> bool {
        matches!(self, TransferMode::ClusterToCluster | TransferMode::ClusterToFile)
    }

    pub fn needs_target(&self) -> bool {
        matches!(self, TransferMode::ClusterToCluster | TransferMode::FileToCluster)
    }

    pub fn needs_file(&self) -> bool {
        matches!(self, TransferMode::ClusterToFile | TransferMode::FileToCluster)
    }
}

impl std::fmt::Display for TransferMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of an operation
///
/// `Pending -> Running -> {Completed, Failed, Cancelled}`; nothing is re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::Running => "RUNNING",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Failed => "FAILED",
            TransferStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Completed | TransferStatus::Failed | TransferStatus::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        matches!(
            (self, next),
            (TransferStatus::Pending, TransferStatus::Running)
                | (TransferStatus::Running, TransferStatus::Completed)
                | (TransferStatus::Running, TransferStatus::Failed)
                | (TransferStatus::Running, TransferStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-operation knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferOptions {
    /// Documents requested per scroll page
    pub batch_size: usize,
    pub include_settings: bool,
    pub include_mappings: bool,
    pub include_aliases: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            include_settings: true,
            include_mappings: true,
            include_aliases: true,
        }
    }
}

/// What a caller submits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    pub mode: TransferMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ClusterEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ClusterEndpoint>,
    #[serde(default)]
    pub indices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_file_path: Option<PathBuf>,
    #[serde(default)]
    pub options: TransferOptions,
}

impl TransferRequest {
    pub fn cluster_to_cluster(
        source: ClusterEndpoint,
        target: ClusterEndpoint,
        indices: Vec<String>,
    ) -> Self {
        Self {
            operation_id: None,
            mode: TransferMode::ClusterToCluster,
            source: Some(source),
            target: Some(target),
            indices,
            export_file_path: None,
            options: TransferOptions::default(),
        }
    }

    pub fn cluster_to_file(
        source: ClusterEndpoint,
        indices: Vec<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            operation_id: None,
            mode: TransferMode::ClusterToFile,
            source: Some(source),
            target: None,
            indices,
            export_file_path: Some(path.into()),
            options: TransferOptions::default(),
        }
    }

    /// An empty `indices` list imports every record in the file
    pub fn file_to_cluster(
        path: impl Into<PathBuf>,
        target: ClusterEndpoint,
        indices: Vec<String>,
    ) -> Self {
        Self {
            operation_id: None,
            mode: TransferMode::FileToCluster,
            source: None,
            target: Some(target),
            indices,
            export_file_path: Some(path.into()),
            options: TransferOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TransferOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.options.batch_size = batch_size;
        self
    }

    pub fn with_operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    /// Check that the request carries everything its mode needs
    pub fn validate(&self) -> Result<()> {
        if let Some(id) = &self.operation_id {
            if id.trim().is_empty() {
                return Err(DmError::validation("operation id must not be blank"));
            }
        }

        match (&self.source, self.mode.needs_source()) {
            (None, true) => {
                return Err(DmError::validation(format!(
                    "{} requires a source cluster",
                    self.mode
                )))
            }
            (Some(source), true) => source.validate()?,
            _ => {}
        }

        match (&self.target, self.mode.needs_target()) {
            (None, true) => {
                return Err(DmError::validation(format!(
                    "{} requires a target cluster",
                    self.mode
                )))
            }
            (Some(target), true) => target.validate()?,
            _ => {}
        }

        if self.mode.needs_file()
            && self
                .export_file_path
                .as_ref()
                .map_or(true, |p| p.as_os_str().is_empty())
        {
            return Err(DmError::validation(format!(
                "{} requires an export file path",
                self.mode
            )));
        }

        if self.mode.needs_source() && self.indices.is_empty() {
            return Err(DmError::validation("at least one index must be selected"));
        }

        if let Some(blank) = self.indices.iter().find(|name| name.trim().is_empty()) {
            return Err(DmError::validation(format!(
                "index names must not be blank (got {blank:?})"
            )));
        }

        if self.options.batch_size == 0 {
            return Err(DmError::validation("batch size must be greater than zero"));
        }

        Ok(())
    }
}

/// Eight uppercase hex characters taken from a random UUID
pub fn generate_operation_id() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect::<String>()
        .to_uppercase()
}

/// The live record of one operation
///
/// Counters and status are written only by the task executing the operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOperation {
    pub operation_id: String,
    pub mode: TransferMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ClusterEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ClusterEndpoint>,
    pub indices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_file_path: Option<PathBuf>,
    pub options: TransferOptions,

    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,

    pub total_documents: u64,
    pub processed_documents: u64,
    pub failed_documents: u64,
    pub total_indices: usize,
    pub completed_indices: usize,

    /// Index currently being processed
    pub current_index: Option<String>,
    /// Expected document count of the current index
    pub current_index_documents: u64,
    /// Documents written so far for the current index
    pub current_index_processed: u64,

    pub error_message: Option<String>,
    /// Set once a cancellation request has been accepted
    pub cancel_requested: bool,
}

impl TransferOperation {
    /// Build the PENDING record for a request, assigning an id when absent
    pub fn from_request(request: TransferRequest) -> Self {
        let operation_id = request
            .operation_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(generate_operation_id);

        Self {
            operation_id,
            mode: request.mode,
            total_indices: request.indices.len(),
            source: request.source,
            target: request.target,
            indices: request.indices,
            export_file_path: request.export_file_path,
            options: request.options,
            status: TransferStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            total_documents: 0,
            processed_documents: 0,
            failed_documents: 0,
            completed_indices: 0,
            current_index: None,
            current_index_documents: 0,
            current_index_processed: 0,
            error_message: None,
            cancel_requested: false,
        }
    }

    /// Move to `next` if the state machine allows it, stamping times
    pub fn transition(&mut self, next: TransferStatus, now: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        if next == TransferStatus::Running {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.ended_at = Some(now);
            if self.started_at.is_none() {
                self.started_at = Some(now);
            }
        }
        true
    }

    pub fn begin_index(&mut self, name: &str, expected_documents: u64) {
        self.current_index = Some(name.to_string());
        self.current_index_documents = expected_documents;
        self.current_index_processed = 0;
    }

    pub fn record_written(&mut self, succeeded: u64, failed: u64) {
        self.processed_documents += succeeded + failed;
        self.current_index_processed += succeeded + failed;
        self.failed_documents += failed;
    }

    pub fn complete_index(&mut self) {
        self.completed_indices += 1;
        self.current_index_documents = 0;
        self.current_index_processed = 0;
    }

    /// Derived completion percentage; 100 only once COMPLETED
    pub fn percentage(&self) -> f64 {
        match self.status {
            TransferStatus::Completed => 100.0,
            TransferStatus::Pending => 0.0,
            _ => transfer_percentage(
                self.completed_indices,
                self.total_indices,
                self.current_index_processed,
                self.current_index_documents,
            )
            .min(99.9),
        }
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> chrono::Duration {
        match self.started_at {
            Some(start) => self.ended_at.unwrap_or(now) - start,
            None => chrono::Duration::zero(),
        }
    }

    /// Human readable run time: `42s`, `3m 7s`, `2h 15m`
    pub fn duration(&self, now: DateTime<Utc>) -> String {
        if self.started_at.is_none() {
            return "-".to_string();
        }
        let seconds = self.elapsed(now).num_seconds().max(0);
        if seconds < 60 {
            format!("{seconds}s")
        } else if seconds < 3600 {
            format!("{}m {}s", seconds / 60, seconds % 60)
        } else {
            format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
        }
    }

    pub fn formatted_start_time(&self) -> String {
        format_timestamp(self.started_at)
    }

    pub fn formatted_end_time(&self) -> String {
        format_timestamp(self.ended_at)
    }
}

fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn endpoint() -> ClusterEndpoint {
        ClusterEndpoint::new("localhost", 9200)
    }

    #[test]
    fn test_state_machine() {
        use TransferStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Cancelled.can_transition_to(Running));
        assert!(!Running.can_transition_to(Running));
        assert!(Failed.is_terminal() && !Running.is_terminal());
    }

    #[test]
    fn test_generated_id_shape() {
        let id = generate_operation_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_from_request_keeps_explicit_id() {
        let request = TransferRequest::cluster_to_cluster(endpoint(), endpoint(), vec!["a".into()])
            .with_operation_id("MYOP0001");
        let op = TransferOperation::from_request(request);
        assert_eq!(op.operation_id, "MYOP0001");
        assert_eq!(op.status, TransferStatus::Pending);
        assert_eq!(op.total_indices, 1);
    }

    #[test]
    fn test_validate_mode_requirements() {
        let ok = TransferRequest::cluster_to_file(endpoint(), vec!["a".into()], "/tmp/out.json");
        assert!(ok.validate().is_ok());

        let mut missing_target =
            TransferRequest::cluster_to_cluster(endpoint(), endpoint(), vec!["a".into()]);
        missing_target.target = None;
        assert!(missing_target.validate().is_err());

        let no_indices = TransferRequest::cluster_to_cluster(endpoint(), endpoint(), vec![]);
        assert!(no_indices.validate().is_err());

        let import_all = TransferRequest::file_to_cluster("/tmp/in.json", endpoint(), vec![]);
        assert!(import_all.validate().is_ok());

        let zero_batch = TransferRequest::cluster_to_cluster(endpoint(), endpoint(), vec!["a".into()])
            .with_batch_size(0);
        assert!(zero_batch.validate().is_err());
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: TransferRequest = serde_json::from_str(
            r#"{
                "mode": "CLUSTER_TO_FILE",
                "source": {"host": "localhost", "port": 9200},
                "indices": ["logs-2024"],
                "exportFilePath": "/tmp/export.json"
            }"#,
        )
        .unwrap();
        assert_eq!(request.options, TransferOptions::default());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_transition_stamps_times() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 1, 1, 11, 2, 5).unwrap();
        let mut op = TransferOperation::from_request(TransferRequest::cluster_to_cluster(
            endpoint(),
            endpoint(),
            vec!["a".into()],
        ));

        assert!(op.transition(TransferStatus::Running, t0));
        assert!(op.transition(TransferStatus::Completed, t1));
        assert!(!op.transition(TransferStatus::Running, t1));
        assert_eq!(op.duration(t1), "1h 2m");
        assert_eq!(op.formatted_start_time(), "2026-01-01 10:00:00");
    }

    #[test]
    fn test_percentage_only_reaches_100_when_completed() {
        let now = Utc::now();
        let mut op = TransferOperation::from_request(TransferRequest::cluster_to_cluster(
            endpoint(),
            endpoint(),
            vec!["a".into()],
        ));
        op.transition(TransferStatus::Running, now);
        op.begin_index("a", 10);
        op.record_written(10, 0);
        op.complete_index();
        assert!(op.percentage() < 100.0);

        op.transition(TransferStatus::Completed, now);
        assert_eq!(op.percentage(), 100.0);
    }
}
