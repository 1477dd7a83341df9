//! The transfer engine
//!
//! Components, leaves first:
//!
//! - [`CursorReader`]: lazy paging through a source index
//! - [`BulkBatcher`]: re-chunking under byte and count ceilings
//! - [`BulkWriter`]: one bulk upsert per batch, tolerating per-document failures
//! - [`IndexReplicator`]: settings, mappings and aliases
//! - [`TransferOrchestrator`]: one operation, start to finish
//! - [`OperationRegistry`]: every operation of this process
//! - [`TransferService`]: submission and control on top of all of the above

mod batcher;
mod cursor;
mod export_file;
mod orchestrator;
mod progress;
mod registry;
mod replicator;
mod service;
mod writer;

pub use batcher::{estimate_size, BatchLimits, BulkBatcher, MAX_BATCH_BYTES, MAX_BATCH_DOCS};
pub use cursor::CursorReader;
pub use export_file::{load_envelope, store_envelope};
pub use orchestrator::TransferOrchestrator;
pub use progress::{BroadcastSink, ProgressEmitter, ProgressSink};
pub use registry::{OperationHandle, OperationRegistry};
pub use replicator::{IndexCreation, IndexReplicator};
pub use service::TransferService;
pub use writer::BulkWriter;
