//! Operation control surface
//!
//! [`TransferService`] is what request layers talk to: submission returns the
//! operation id at once and the work continues on its own tokio task. Outcomes
//! are observed through the registry or the progress event stream.

use super::orchestrator::TransferOrchestrator;
use super::progress::{ProgressEmitter, ProgressSink};
use super::registry::OperationRegistry;
use crate::cluster::{ClusterClient, ClusterConnector};
use crate::error::{ClusterResult, Result, TransferError};
use crate::settings::TransferSettings;
use dm_common::types::{
    ClusterEndpoint, ProgressEvent, TransferOperation, TransferRequest, TransferStatus,
};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, Instrument};

#[derive(Clone)]
pub struct TransferService {
    connector: Arc<dyn ClusterConnector>,
    registry: Arc<OperationRegistry>,
    orchestrator: Arc<TransferOrchestrator>,
}

impl TransferService {
    pub fn new(connector: Arc<dyn ClusterConnector>, settings: TransferSettings) -> Self {
        Self::with_registry(connector, settings, Arc::new(OperationRegistry::new()))
    }

    /// Share an existing registry, e.g. one owned by the server state
    pub fn with_registry(
        connector: Arc<dyn ClusterConnector>,
        settings: TransferSettings,
        registry: Arc<OperationRegistry>,
    ) -> Self {
        let orchestrator = Arc::new(TransferOrchestrator::new(Arc::clone(&connector), settings));
        Self {
            connector,
            registry,
            orchestrator,
        }
    }

    /// Validate, register and start an operation; returns its id
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, request: TransferRequest) -> Result<String> {
        self.start(request, ProgressEmitter::new())
    }

    /// Like [`submit`](Self::submit), additionally feeding `sink` with this
    /// operation's events
    pub fn submit_with_sink(&self, request: TransferRequest, sink: Arc<dyn ProgressSink>) -> Result<String> {
        self.start(request, ProgressEmitter::new().with_sink(sink))
    }

    fn start(&self, request: TransferRequest, emitter: ProgressEmitter) -> Result<String> {
        request
            .validate()
            .map_err(|e| TransferError::InvalidRequest(e.to_string()))?;

        let operation = TransferOperation::from_request(request);
        let handle = self.registry.register(operation)?;
        let id = handle.id().to_string();
        let emitter = emitter.with_sink(Arc::new(self.registry.sink()));
        let orchestrator = Arc::clone(&self.orchestrator);

        info!(operation_id = %id, "Transfer submitted");
        tokio::spawn(
            async move {
                let status = orchestrator.run(handle, emitter).await;
                debug!(status = %status, "Transfer task finished");
            }
            .in_current_span(),
        );

        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<TransferOperation> {
        self.registry.get(id)
    }

    /// `None` for an unknown id, otherwise whether the request was accepted
    pub fn cancel(&self, id: &str) -> Option<bool> {
        self.registry.cancel(id)
    }

    pub fn list(&self) -> Vec<TransferOperation> {
        self.registry.list_all()
    }

    pub fn clear_terminal(&self) -> usize {
        self.registry.clear_terminal()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.registry.subscribe()
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &TransferSettings {
        self.orchestrator.settings()
    }

    /// A client for ad hoc calls (connection tests, index browsing)
    pub fn connect(&self, endpoint: &ClusterEndpoint) -> ClusterResult<Arc<dyn ClusterClient>> {
        self.connector.connect(endpoint)
    }

    /// Resolve once the operation is terminal; `None` if the id is unknown
    /// or the operation was cleared while waiting
    pub async fn wait(&self, id: &str) -> Option<TransferOperation> {
        // Subscribe before reading so the terminal event cannot slip between
        let mut events = self.registry.subscribe();
        loop {
            let operation = self.registry.get(id)?;
            if operation.status.is_terminal() {
                return Some(operation);
            }

            loop {
                match events.recv().await {
                    Ok(event) if event.operation_id == id && event.is_terminal() => break,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(operation_id = %id, skipped, "Progress stream lagged while waiting");
                        break;
                    }
                    Err(RecvError::Closed) => return self.registry.get(id),
                }
            }
        }
    }

    /// Status of an operation, if known
    pub fn status(&self, id: &str) -> Option<TransferStatus> {
        self.registry.handle(id).map(|handle| handle.status())
    }
}
