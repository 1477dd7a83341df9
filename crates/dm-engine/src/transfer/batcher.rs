//! Re-chunking documents into bulk batches bounded by bytes and count

use dm_common::types::Document;
use serde_json::Value;
use std::io;

/// Largest cumulative source size of one bulk batch (5 MiB)
pub const MAX_BATCH_BYTES: usize = 5 * 1024 * 1024;

/// Largest number of documents in one bulk batch
pub const MAX_BATCH_DOCS: usize = 500;

/// Ceilings applied to every batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_bytes: usize,
    pub max_docs: usize,
}

impl BatchLimits {
    pub fn new(max_bytes: usize, max_docs: usize) -> Self {
        Self {
            max_bytes: max_bytes.max(1),
            max_docs: max_docs.max(1),
        }
    }
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self::new(MAX_BATCH_BYTES, MAX_BATCH_DOCS)
    }
}

/// Serialized size of a document body in bytes
///
/// Identifiers and bulk action lines are not counted.
pub fn estimate_size(source: &Value) -> usize {
    let mut counter = ByteCounter(0);
    match serde_json::to_writer(&mut counter, source) {
        Ok(()) => counter.0,
        Err(_) => 0,
    }
}

struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Accumulates documents and hands back full batches
///
/// A batch is cut as soon as the next document would push it past either
/// ceiling. A document larger than the byte ceiling on its own still gets a
/// batch, alone.
#[derive(Debug)]
pub struct BulkBatcher {
    limits: BatchLimits,
    pending: Vec<Document>,
    pending_bytes: usize,
}

impl BulkBatcher {
    pub fn new(limits: BatchLimits) -> Self {
        Self {
            limits,
            pending: Vec::new(),
            pending_bytes: 0,
        }
    }

    /// Add a document, returning the batch that had to be closed to admit it
    pub fn push(&mut self, document: Document) -> Option<Vec<Document>> {
        let size = estimate_size(&document.source);
        let full = !self.pending.is_empty()
            && (self.pending_bytes + size > self.limits.max_bytes
                || self.pending.len() >= self.limits.max_docs);

        let flushed = if full { self.take() } else { None };
        self.pending_bytes += size;
        self.pending.push(document);
        flushed
    }

    /// Close the current batch regardless of its size
    pub fn finish(&mut self) -> Option<Vec<Document>> {
        self.take()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn take(&mut self) -> Option<Vec<Document>> {
        if self.pending.is_empty() {
            return None;
        }
        self.pending_bytes = 0;
        Some(std::mem::take(&mut self.pending))
    }

    /// Batch a whole sequence at once
    pub fn split(limits: BatchLimits, documents: impl IntoIterator<Item = Document>) -> Vec<Vec<Document>> {
        let mut batcher = Self::new(limits);
        let mut batches: Vec<Vec<Document>> = documents
            .into_iter()
            .filter_map(|doc| batcher.push(doc))
            .collect();
        batches.extend(batcher.finish());
        batches
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn doc(id: usize, payload_len: usize) -> Document {
        Document::new(id.to_string(), json!({ "p": "x".repeat(payload_len) }))
    }

    #[test]
    fn test_estimate_matches_serialized_length() {
        let source = json!({"a": [1, 2, 3], "b": "héllo"});
        assert_eq!(estimate_size(&source), serde_json::to_vec(&source).unwrap().len());
    }

    #[test]
    fn test_count_ceiling() {
        let batches = BulkBatcher::split(BatchLimits::default(), (0..1234).map(|i| doc(i, 10)));
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![500, 500, 234]);
    }

    #[test]
    fn test_byte_ceiling() {
        // each body is 10 bytes of payload plus 8 bytes of JSON framing
        let limits = BatchLimits::new(40, 100);
        let batches = BulkBatcher::split(limits, (0..5).map(|i| doc(i, 10)));
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_oversized_document_gets_its_own_batch() {
        let huge = doc(1, 8 * 1024 * 1024);
        let batches = BulkBatcher::split(
            BatchLimits::default(),
            vec![doc(0, 10), huge.clone(), doc(2, 10)],
        );

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[1], vec![huge]);
        assert!(estimate_size(&batches[1][0].source) > MAX_BATCH_BYTES);
    }

    #[test]
    fn test_push_reports_closed_batch() {
        let mut batcher = BulkBatcher::new(BatchLimits::new(usize::MAX, 2));
        assert!(batcher.push(doc(0, 1)).is_none());
        assert!(batcher.push(doc(1, 1)).is_none());
        let closed = batcher.push(doc(2, 1)).unwrap();
        assert_eq!(closed.len(), 2);
        assert_eq!(batcher.pending_len(), 1);
        assert_eq!(batcher.finish().unwrap().len(), 1);
        assert!(batcher.finish().is_none());
    }

    proptest! {
        #[test]
        fn batches_respect_ceilings_and_preserve_order(
            payloads in proptest::collection::vec(0usize..300, 0..200),
            max_bytes in 1usize..2_000,
            max_docs in 1usize..25,
        ) {
            let limits = BatchLimits::new(max_bytes, max_docs);
            let input: Vec<Document> = payloads.iter().enumerate().map(|(i, len)| doc(i, *len)).collect();
            let batches = BulkBatcher::split(limits, input.clone());

            for batch in &batches {
                prop_assert!(!batch.is_empty());
                prop_assert!(batch.len() <= max_docs);
                let bytes: usize = batch.iter().map(|d| estimate_size(&d.source)).sum();
                prop_assert!(bytes <= max_bytes || batch.len() == 1);
            }

            let flattened: Vec<Document> = batches.into_iter().flatten().collect();
            prop_assert_eq!(flattened, input);
        }
    }
}
