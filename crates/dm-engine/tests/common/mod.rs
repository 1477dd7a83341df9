//! Shared fixtures for engine integration tests
//!
//! Every test gets a fresh pair of in-memory clusters behind a
//! [`MemoryConnector`] and a [`TransferService`] wired to it.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use dm_common::types::{ClusterEndpoint, Document, ProgressEvent, TransferOperation, TransferRequest};
use dm_engine::{ClusterClient, MemoryCluster, MemoryConnector, TransferService, TransferSettings};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Upper bound for any single test operation
const RUN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Harness {
    pub source: Arc<MemoryCluster>,
    pub target: Arc<MemoryCluster>,
    pub service: TransferService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(TransferSettings::default())
    }

    pub fn with_settings(settings: TransferSettings) -> Self {
        let source = Arc::new(MemoryCluster::named("source"));
        let target = Arc::new(MemoryCluster::named("target"));

        let connector = MemoryConnector::new();
        connector.register(Arc::clone(&source));
        connector.register(Arc::clone(&target));

        Self {
            source,
            target,
            service: TransferService::new(Arc::new(connector), settings),
        }
    }

    pub fn source_endpoint(&self) -> ClusterEndpoint {
        self.source.endpoint().clone()
    }

    pub fn target_endpoint(&self) -> ClusterEndpoint {
        self.target.endpoint().clone()
    }

    /// Put `count` small documents into `index` on the source
    pub fn seed(&self, index: &str, count: usize) {
        self.source.insert_documents(index, documents(count));
    }

    /// Submit and wait for the terminal event, returning the final record and
    /// every event of the operation in emission order
    pub async fn run(&self, request: TransferRequest) -> (TransferOperation, Vec<ProgressEvent>) {
        let mut events = self.service.subscribe();
        let id = self.service.submit(request).expect("request accepted");
        let collected = collect_events(&mut events, &id).await;
        let operation = self.service.get(&id).expect("operation registered");
        (operation, collected)
    }
}

pub fn documents(count: usize) -> impl Iterator<Item = Document> {
    (0..count).map(|i| {
        Document::new(
            format!("doc-{i:05}"),
            json!({ "n": i, "message": format!("event number {i}") }),
        )
    })
}

/// Read events of operation `id` until its terminal one
pub async fn collect_events(
    events: &mut broadcast::Receiver<ProgressEvent>,
    id: &str,
) -> Vec<ProgressEvent> {
    let mut collected = Vec::new();
    loop {
        let event = tokio::time::timeout(RUN_TIMEOUT, events.recv())
            .await
            .expect("operation did not finish in time")
            .expect("progress stream closed or lagged");
        if event.operation_id != id {
            continue;
        }
        let terminal = event.is_terminal();
        collected.push(event);
        if terminal {
            return collected;
        }
    }
}
