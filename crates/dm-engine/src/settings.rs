//! Engine tunables

use crate::transfer::BatchLimits;

/// How long the source keeps a scroll cursor alive between page fetches
pub const DEFAULT_SCROLL_KEEP_ALIVE: &str = "1m";

/// Knobs that apply to every operation run by one engine instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSettings {
    pub batch_limits: BatchLimits,
    pub scroll_keep_alive: String,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            batch_limits: BatchLimits::default(),
            scroll_keep_alive: DEFAULT_SCROLL_KEEP_ALIVE.to_string(),
        }
    }
}

impl TransferSettings {
    pub fn with_batch_limits(mut self, limits: BatchLimits) -> Self {
        self.batch_limits = limits;
        self
    }

    pub fn with_scroll_keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.scroll_keep_alive = keep_alive.into();
        self
    }
}
