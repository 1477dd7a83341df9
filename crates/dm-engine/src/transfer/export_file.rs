//! Export file access from async context
//!
//! Reading and writing an export is blocking file I/O over a potentially large
//! JSON document, so both run on the blocking pool.

use crate::error::{Result, TransferError};
use dm_common::export::{read_export, write_export, ExportEnvelope};
use std::path::PathBuf;
use tracing::info;

pub async fn load_envelope(path: PathBuf) -> Result<ExportEnvelope> {
    let shown = path.display().to_string();
    let envelope = tokio::task::spawn_blocking(move || read_export(&path))
        .await
        .map_err(|e| TransferError::Internal(format!("export reader task failed: {e}")))??;

    info!(
        path = %shown,
        indices = envelope.indices.len(),
        documents = envelope.total_documents(),
        "Loaded export file"
    );
    Ok(envelope)
}

pub async fn store_envelope(path: PathBuf, envelope: ExportEnvelope) -> Result<()> {
    let shown = path.display().to_string();
    let indices = envelope.indices.len();
    let documents = envelope.total_documents();

    tokio::task::spawn_blocking(move || write_export(&path, &envelope))
        .await
        .map_err(|e| TransferError::Internal(format!("export writer task failed: {e}")))??;

    info!(path = %shown, indices, documents, "Wrote export file");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use dm_common::export::IndexRecord;
    use dm_common::types::{Document, IndexDescriptor};
    use serde_json::json;

    #[tokio::test]
    async fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("export.json");

        let mut envelope = ExportEnvelope::new(None);
        envelope.indices.push(IndexRecord::new(
            IndexDescriptor::new("logs"),
            vec![Document::new("1", json!({ "msg": "hello" }))],
        ));

        store_envelope(path.clone(), envelope.clone()).await.unwrap();
        let loaded = load_envelope(path).await.unwrap();
        assert_eq!(loaded.indices, envelope.indices);
    }

    #[tokio::test]
    async fn test_missing_file_is_a_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_envelope(dir.path().join("absent.json")).await.unwrap_err();
        assert!(matches!(err, TransferError::File(_)));
    }
}
