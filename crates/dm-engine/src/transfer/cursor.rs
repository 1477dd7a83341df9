//! Lazy, forward-only reading of a whole index through a scroll cursor

use crate::cluster::ClusterClient;
use crate::error::ClusterResult;
use dm_common::types::Document;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug)]
enum CursorState {
    Unopened,
    Open(String),
    Exhausted,
}

/// Pages through every document of one index
///
/// The cursor is opened on the first [`next_batch`](CursorReader::next_batch)
/// call and released as soon as the sequence ends, whether by exhaustion or by
/// error. Release failures are logged and swallowed; the server expires the
/// cursor on its own.
pub struct CursorReader {
    client: Arc<dyn ClusterClient>,
    index: String,
    page_size: usize,
    keep_alive: String,
    state: CursorState,
    pages_read: usize,
    total_hits: Option<u64>,
}

impl CursorReader {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        index: impl Into<String>,
        page_size: usize,
        keep_alive: impl Into<String>,
    ) -> Self {
        Self {
            client,
            index: index.into(),
            page_size: page_size.max(1),
            keep_alive: keep_alive.into(),
            state: CursorState::Unopened,
            pages_read: 0,
            total_hits: None,
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn pages_read(&self) -> usize {
        self.pages_read
    }

    /// Hit count reported by the source when the cursor was opened
    pub fn total_hits(&self) -> Option<u64> {
        self.total_hits
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, CursorState::Exhausted)
    }

    /// Fetch the next page; `Ok(None)` once the index is drained
    pub async fn next_batch(&mut self) -> ClusterResult<Option<Vec<Document>>> {
        let fetched = match &self.state {
            CursorState::Exhausted => return Ok(None),
            CursorState::Unopened => {
                debug!(index = %self.index, page_size = self.page_size, "Opening scroll cursor");
                self.client
                    .open_scroll(&self.index, self.page_size, &self.keep_alive)
                    .await
            }
            CursorState::Open(scroll_id) => {
                self.client
                    .continue_scroll(scroll_id, &self.keep_alive)
                    .await
            }
        };

        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                self.release().await;
                return Err(e);
            }
        };

        if page.total_hits.is_some() && self.total_hits.is_none() {
            self.total_hits = page.total_hits;
        }

        let has_documents = !page.documents.is_empty();
        match page.scroll_id {
            Some(next_id) if has_documents => {
                self.replace_cursor(next_id);
                self.pages_read += 1;
                Ok(Some(page.documents))
            }
            Some(next_id) => {
                self.replace_cursor(next_id);
                self.release().await;
                Ok(None)
            }
            None => {
                self.release().await;
                if has_documents {
                    self.pages_read += 1;
                    Ok(Some(page.documents))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Track the newest scroll token
    ///
    /// A rotated token still refers to the same server-side search contexts,
    /// so the superseded one is dropped without clearing it.
    fn replace_cursor(&mut self, next_id: String) {
        self.state = CursorState::Open(next_id);
    }

    /// Release the server-side cursor; safe to call repeatedly
    pub async fn release(&mut self) {
        if let CursorState::Open(scroll_id) =
            std::mem::replace(&mut self.state, CursorState::Exhausted)
        {
            self.clear(&scroll_id).await;
        }
        self.state = CursorState::Exhausted;
    }

    async fn clear(&self, scroll_id: &str) {
        if let Err(e) = self.client.clear_scroll(scroll_id).await {
            warn!(index = %self.index, error = %e, "Failed to release scroll cursor");
        }
    }
}

impl Drop for CursorReader {
    fn drop(&mut self) {
        let CursorState::Open(scroll_id) = std::mem::replace(&mut self.state, CursorState::Exhausted)
        else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let client = Arc::clone(&self.client);
        let index = std::mem::take(&mut self.index);
        runtime.spawn(async move {
            if let Err(e) = client.clear_scroll(&scroll_id).await {
                debug!(index = %index, error = %e, "Releasing abandoned scroll cursor failed");
            }
        });
    }
}
