//! Delivery of progress events to observers

use dm_common::types::ProgressEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Receives progress events one at a time, in emission order
///
/// An error returned here is logged by the engine and otherwise ignored.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &ProgressEvent) -> anyhow::Result<()>;
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn emit(&self, event: &ProgressEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Fans events out to any number of broadcast subscribers
#[derive(Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<ProgressEvent>,
}

impl BroadcastSink {
    pub fn new(sender: broadcast::Sender<ProgressEvent>) -> Self {
        Self { sender }
    }
}

impl ProgressSink for BroadcastSink {
    fn emit(&self, event: &ProgressEvent) -> anyhow::Result<()> {
        // No subscribers is not a failure
        let _ = self.sender.send(event.clone());
        Ok(())
    }
}

/// The set of sinks attached to one operation
#[derive(Clone, Default)]
pub struct ProgressEmitter {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl ProgressEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn emit(&self, event: &ProgressEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.emit(event) {
                warn!(
                    operation_id = %event.operation_id,
                    error = %e,
                    "Progress sink failed, event dropped for this sink"
                );
            }
        }
    }
}
