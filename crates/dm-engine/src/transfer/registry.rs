//! Process-wide table of operations
//!
//! Nothing here is persisted: the registry lives as long as the process that
//! created it and an interrupted operation cannot be resumed.

use super::progress::BroadcastSink;
use crate::error::{Result, TransferError};
use dm_common::types::{ProgressEvent, TransferOperation, TransferStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Buffered progress events per subscriber before it starts lagging
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Shared state of one operation
///
/// Only the task executing the operation mutates the record; every other
/// context reads snapshots or raises the cancellation flag.
#[derive(Debug)]
pub struct OperationHandle {
    id: String,
    state: RwLock<TransferOperation>,
    cancel: AtomicBool,
}

impl OperationHandle {
    fn new(operation: TransferOperation) -> Self {
        Self {
            id: operation.operation_id.clone(),
            state: RwLock::new(operation),
            cancel: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn read(&self) -> RwLockReadGuard<'_, TransferOperation> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, TransferOperation> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> TransferOperation {
        self.read().clone()
    }

    pub fn status(&self) -> TransferStatus {
        self.read().status
    }

    /// Mutate the record; reserved for the executing task
    pub fn update<R>(&self, f: impl FnOnce(&mut TransferOperation) -> R) -> R {
        f(&mut self.write())
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Raise the cancellation flag if the operation is RUNNING
    ///
    /// Returns whether the request was accepted. Holding the write lock keeps
    /// the check atomic with the executor's final status transition.
    pub fn request_cancel(&self) -> bool {
        let mut operation = self.write();
        if operation.status != TransferStatus::Running || operation.cancel_requested {
            return false;
        }
        operation.cancel_requested = true;
        self.cancel.store(true, Ordering::Release);
        true
    }
}

/// All operations known to this process, by id
pub struct OperationRegistry {
    operations: RwLock<HashMap<String, Arc<OperationHandle>>>,
    events: broadcast::Sender<ProgressEvent>,
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            operations: RwLock::new(HashMap::new()),
            events,
        }
    }

    fn table(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<OperationHandle>>> {
        self.operations.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn table_mut(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<OperationHandle>>> {
        self.operations.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a new operation; ids must be unique
    pub fn register(&self, operation: TransferOperation) -> Result<Arc<OperationHandle>> {
        let mut table = self.table_mut();
        if table.contains_key(&operation.operation_id) {
            return Err(TransferError::InvalidRequest(format!(
                "operation {} already exists",
                operation.operation_id
            )));
        }

        let handle = Arc::new(OperationHandle::new(operation));
        table.insert(handle.id().to_string(), Arc::clone(&handle));
        debug!(operation_id = %handle.id(), "Registered operation");
        Ok(handle)
    }

    pub fn get(&self, id: &str) -> Option<TransferOperation> {
        self.handle(id).map(|handle| handle.snapshot())
    }

    pub fn handle(&self, id: &str) -> Option<Arc<OperationHandle>> {
        self.table().get(id).cloned()
    }

    /// Request cancellation; `None` when the id is unknown, otherwise whether
    /// the request was accepted (only RUNNING operations accept it)
    pub fn cancel(&self, id: &str) -> Option<bool> {
        let handle = self.handle(id)?;
        let accepted = handle.request_cancel();
        if accepted {
            info!(operation_id = %id, "Cancellation requested");
        } else {
            debug!(operation_id = %id, status = %handle.status(), "Cancellation ignored");
        }
        Some(accepted)
    }

    /// Snapshots of every operation, oldest first
    pub fn list_all(&self) -> Vec<TransferOperation> {
        let mut operations: Vec<TransferOperation> =
            self.table().values().map(|handle| handle.snapshot()).collect();
        operations.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.operation_id.cmp(&b.operation_id))
        });
        operations
    }

    /// Drop every COMPLETED, FAILED and CANCELLED operation; returns how many
    pub fn clear_terminal(&self) -> usize {
        let mut table = self.table_mut();
        let before = table.len();
        table.retain(|_, handle| !handle.status().is_terminal());
        let removed = before - table.len();
        if removed > 0 {
            info!(removed, "Cleared finished operations");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Progress events of all operations from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// Sink publishing into this registry's event stream
    pub fn sink(&self) -> BroadcastSink {
        BroadcastSink::new(self.events.clone())
    }
}
