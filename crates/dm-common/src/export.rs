//! Export file schema and atomic file I/O
//!
//! An export is a single JSON document:
//!
//! ```json
//! {
//!   "exportDate": "2026-10-18T09:30:00Z",
//!   "clusterInfo": { "clusterName": "prod", "clusterUuid": "...", "version": "8.13.0" },
//!   "indices": [
//!     {
//!       "name": "logs-2024",
//!       "settings": { ... },
//!       "mappings": { ... },
//!       "aliases": { "logs": { "is_write_index": true } },
//!       "documents": [ { "_id": "1", "_source": { ... } } ],
//!       "documentCount": 1
//!     }
//!   ]
//! }
//! ```
//!
//! Writes go to a temporary file in the destination directory which is renamed
//! into place only after the whole envelope has been serialized, so readers never
//! observe a partial export.

use crate::error::{DmError, Result};
use crate::types::{ClusterInfo, Document, IndexDescriptor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// File-level wrapper around all exported indices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    pub export_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_info: Option<ClusterInfo>,
    #[serde(default)]
    pub indices: Vec<IndexRecord>,
}

impl ExportEnvelope {
    pub fn new(cluster_info: Option<ClusterInfo>) -> Self {
        Self {
            export_date: Utc::now(),
            cluster_info,
            indices: Vec::new(),
        }
    }

    pub fn total_documents(&self) -> u64 {
        self.indices.iter().map(|r| r.documents.len() as u64).sum()
    }

    pub fn record(&self, name: &str) -> Option<&IndexRecord> {
        self.indices.iter().find(|r| r.descriptor.name == name)
    }
}

/// One exported index: its metadata plus every document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRecord {
    #[serde(flatten)]
    pub descriptor: IndexDescriptor,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub document_count: u64,
}

impl IndexRecord {
    pub fn new(descriptor: IndexDescriptor, documents: Vec<Document>) -> Self {
        Self {
            document_count: documents.len() as u64,
            descriptor,
            documents,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

/// Read and parse an export file
pub fn read_export(path: &Path) -> Result<ExportEnvelope> {
    let file = File::open(path)?;
    let envelope: ExportEnvelope =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| DmError::InvalidExportFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    if let Some(unnamed) = envelope.indices.iter().position(|r| r.name().is_empty()) {
        return Err(DmError::InvalidExportFile {
            path: path.display().to_string(),
            reason: format!("index record #{unnamed} has no name"),
        });
    }

    Ok(envelope)
}

/// Serialize `envelope` to `path`, replacing any existing file atomically
pub fn write_export(path: &Path, envelope: &ExportEnvelope) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut staged = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, envelope)?;
        writer.flush()?;
    }
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| DmError::Io(e.error))?;

    Ok(())
}
