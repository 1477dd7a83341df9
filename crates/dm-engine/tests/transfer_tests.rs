//! End-to-end transfer scenarios against in-memory clusters
//!
//! These tests verify:
//! - Scroll pages and bulk batches have the expected sizes
//! - Export followed by import preserves the document id set
//! - Failures, partial bulk rejections and cancellation end in the right state
//! - Progress events are ordered and monotonic

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{collect_events, documents, Harness};
use dm_common::export::read_export;
use dm_common::types::{
    AliasDefinition, Document, TransferOptions, TransferRequest, TransferStatus,
};
use dm_engine::cluster::FaultPoint;
use dm_engine::ProgressSink;
use serde_json::json;
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn test_cluster_to_cluster_batches_and_final_event() {
    let harness = Harness::new();
    harness.seed("logs-2024", 1234);

    let request = TransferRequest::cluster_to_cluster(
        harness.source_endpoint(),
        harness.target_endpoint(),
        vec!["logs-2024".into()],
    )
    .with_batch_size(500);
    let (operation, events) = harness.run(request).await;

    assert_eq!(operation.status, TransferStatus::Completed);
    assert_eq!(operation.total_documents, 1234);
    assert_eq!(harness.target.stats().bulk_batch_sizes, vec![500, 500, 234]);
    assert_eq!(
        harness.target.document_ids("logs-2024"),
        harness.source.document_ids("logs-2024")
    );

    let last = events.last().unwrap();
    assert_eq!(last.status, TransferStatus::Completed);
    assert_eq!(last.processed_documents, 1234);
    assert_eq!(last.percentage, 100.0);
    assert_eq!(harness.source.open_scrolls(), 0);
    // one context per index, cleared once after every rotated token was used
    let scrolls = harness.source.stats();
    assert_eq!((scrolls.scrolls_opened, scrolls.scrolls_cleared), (1, 1));
}

#[tokio::test]
async fn test_export_pages_and_file_contents() {
    let harness = Harness::new();
    harness.seed("logs-2024", 1234);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs.json");

    let request = TransferRequest::cluster_to_file(
        harness.source_endpoint(),
        vec!["logs-2024".into()],
        &path,
    )
    .with_batch_size(500);
    let (operation, events) = harness.run(request).await;

    assert_eq!(operation.status, TransferStatus::Completed, "{:?}", operation.error_message);
    assert_eq!(harness.source.stats().scroll_page_sizes, vec![500, 500, 234]);

    let last = events.last().unwrap();
    assert_eq!(last.processed_documents, 1234);
    assert_eq!(last.percentage, 100.0);

    let envelope = read_export(&path).unwrap();
    assert_eq!(envelope.indices.len(), 1);
    assert_eq!(envelope.indices[0].document_count, 1234);
    assert_eq!(envelope.cluster_info.unwrap().cluster_name, "source");
}

#[tokio::test]
async fn test_existing_target_index_still_completes() {
    let harness = Harness::new();
    harness.source.seed_index(
        "orders",
        Some(json!({ "index": { "number_of_shards": "3" } })),
        Some(json!({ "properties": { "n": { "type": "long" } } })),
    );
    harness.seed("orders", 40);
    harness.target.seed_index("orders", None, None);

    let (operation, _) = harness
        .run(TransferRequest::cluster_to_cluster(
            harness.source_endpoint(),
            harness.target_endpoint(),
            vec!["orders".into()],
        ))
        .await;

    assert_eq!(operation.status, TransferStatus::Completed);
    assert!(operation.error_message.is_none());
    assert_eq!(harness.target.stats().create_index_calls, 1);
    assert_eq!(harness.target.document_ids("orders").len(), 40);
}

#[tokio::test]
async fn test_oversized_document_is_delivered_alone() {
    let harness = Harness::new();
    let big = "x".repeat(8 * 1024 * 1024);
    harness.source.insert_documents(
        "blobs",
        vec![
            Document::new("1", json!({ "body": "small" })),
            Document::new("2", json!({ "body": big })),
            Document::new("3", json!({ "body": "small" })),
        ],
    );

    let (operation, _) = harness
        .run(TransferRequest::cluster_to_cluster(
            harness.source_endpoint(),
            harness.target_endpoint(),
            vec!["blobs".into()],
        ))
        .await;

    assert_eq!(operation.status, TransferStatus::Completed);
    assert_eq!(operation.processed_documents, 3);
    assert_eq!(harness.target.stats().bulk_batch_sizes, vec![1, 1, 1]);
    let delivered = harness.target.documents("blobs");
    let large = delivered.iter().find(|doc| doc.id == "2").unwrap();
    assert_eq!(large.source["body"].as_str().unwrap().len(), 8 * 1024 * 1024);
}

#[tokio::test]
async fn test_export_then_import_preserves_ids_and_metadata() {
    let harness = Harness::new();
    harness.source.seed_index(
        "metrics",
        None,
        Some(json!({ "properties": { "n": { "type": "integer" } } })),
    );
    harness.source.seed_alias(
        "metrics",
        "metrics-current",
        AliasDefinition {
            is_write_index: Some(true),
            ..Default::default()
        },
    );
    harness.seed("metrics", 257);
    harness.seed("events", 12);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    let (exported, _) = harness
        .run(
            TransferRequest::cluster_to_file(
                harness.source_endpoint(),
                vec!["metrics".into(), "events".into()],
                &path,
            )
            .with_batch_size(100),
        )
        .await;
    assert_eq!(exported.status, TransferStatus::Completed);

    let (imported, events) = harness
        .run(TransferRequest::file_to_cluster(&path, harness.target_endpoint(), vec![]).with_batch_size(100))
        .await;

    assert_eq!(imported.status, TransferStatus::Completed, "{:?}", imported.error_message);
    assert_eq!(imported.total_indices, 2);
    assert_eq!(imported.total_documents, 269);
    assert_eq!(events.last().unwrap().processed_documents, 269);
    for index in ["metrics", "events"] {
        assert_eq!(
            harness.target.document_ids(index),
            harness.source.document_ids(index),
            "ids differ for {index}"
        );
    }

    let metrics = harness.target.descriptor("metrics").unwrap();
    assert!(metrics.mappings.is_some());
    assert_eq!(metrics.aliases["metrics-current"].is_write_index, Some(true));
}

#[tokio::test]
async fn test_import_of_unknown_index_fails() {
    let harness = Harness::new();
    harness.seed("events", 3);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");

    harness
        .run(TransferRequest::cluster_to_file(harness.source_endpoint(), vec!["events".into()], &path))
        .await;
    let (operation, _) = harness
        .run(TransferRequest::file_to_cluster(
            &path,
            harness.target_endpoint(),
            vec!["missing".into()],
        ))
        .await;

    assert_eq!(operation.status, TransferStatus::Failed);
    assert!(operation.error_message.unwrap().contains("missing"));
    assert!(!harness.target.has_index("events"));
}

#[tokio::test]
async fn test_unreachable_source_fails_with_message() {
    let harness = Harness::new();
    harness.seed("logs", 10);
    harness.source.set_unavailable(true);

    let (operation, events) = harness
        .run(TransferRequest::cluster_to_cluster(
            harness.source_endpoint(),
            harness.target_endpoint(),
            vec!["logs".into()],
        ))
        .await;

    assert_eq!(operation.status, TransferStatus::Failed);
    let message = operation.error_message.unwrap();
    assert!(message.starts_with("Connecting to source cluster"), "{message}");
    assert!(message.contains("unavailable"));

    let last = events.last().unwrap();
    assert_eq!(last.status, TransferStatus::Failed);
    assert_eq!(last.message, message);
    assert!(operation.ended_at.is_some());
}

#[tokio::test]
async fn test_failure_inside_index_stops_remaining_indices() {
    let harness = Harness::new();
    harness.seed("first", 30);
    harness.seed("second", 30);
    harness.source.fail_on_after(FaultPoint::ContinueScroll, 1);

    let (operation, _) = harness
        .run(
            TransferRequest::cluster_to_cluster(
                harness.source_endpoint(),
                harness.target_endpoint(),
                vec!["first".into(), "second".into()],
            )
            .with_batch_size(10),
        )
        .await;

    assert_eq!(operation.status, TransferStatus::Failed);
    assert!(operation
        .error_message
        .unwrap()
        .starts_with("Reading documents from index first"));
    assert_eq!(operation.completed_indices, 0);
    // already written documents stay
    assert_eq!(harness.target.document_ids("first").len(), 20);
    assert!(!harness.target.has_index("second"));
    assert_eq!(harness.source.open_scrolls(), 0);
}

#[tokio::test]
async fn test_partial_bulk_failures_are_counted() {
    let harness = Harness::new();
    harness.seed("orders", 50);
    harness.target.reject_document("doc-00003");
    harness.target.reject_document("doc-00007");

    let (operation, _) = harness
        .run(TransferRequest::cluster_to_cluster(
            harness.source_endpoint(),
            harness.target_endpoint(),
            vec!["orders".into()],
        ))
        .await;

    assert_eq!(operation.status, TransferStatus::Completed);
    assert_eq!(operation.processed_documents, 50);
    assert_eq!(operation.failed_documents, 2);
    assert_eq!(harness.target.document_ids("orders").len(), 48);
}

#[tokio::test]
async fn test_progress_is_monotonic_across_indices() {
    let harness = Harness::new();
    harness.seed("a", 95);
    harness.seed("b", 0);
    harness.seed("c", 41);

    let (operation, events) = harness
        .run(
            TransferRequest::cluster_to_cluster(
                harness.source_endpoint(),
                harness.target_endpoint(),
                vec!["a".into(), "b".into(), "c".into()],
            )
            .with_batch_size(20),
        )
        .await;

    assert_eq!(operation.status, TransferStatus::Completed);
    assert_eq!(events.first().unwrap().status, TransferStatus::Running);
    assert_eq!(events.first().unwrap().percentage, 0.0);

    for pair in events.windows(2) {
        assert!(pair[1].processed_documents >= pair[0].processed_documents);
        assert!(pair[1].percentage >= pair[0].percentage, "{:?} -> {:?}", pair[0], pair[1]);
    }
    assert!(events[..events.len() - 1].iter().all(|e| e.percentage < 100.0));
    assert_eq!(events.last().unwrap().processed_documents, 136);
    assert_eq!(operation.completed_indices, 3);
}

#[tokio::test]
async fn test_cancel_running_operation() {
    let harness = Harness::new();
    harness.seed("big", 100);
    let gate = harness.source.install_scroll_gate();

    let mut events = harness.service.subscribe();
    let id = harness
        .service
        .submit(
            TransferRequest::cluster_to_cluster(
                harness.source_endpoint(),
                harness.target_endpoint(),
                vec!["big".into()],
            )
            .with_batch_size(10),
        )
        .unwrap();

    // the first page is written, the second fetch is parked
    gate.wait_reached().await;
    assert_eq!(harness.service.cancel(&id), Some(true));
    gate.release(1_000);

    let collected = collect_events(&mut events, &id).await;
    let operation = harness.service.get(&id).unwrap();

    assert_eq!(operation.status, TransferStatus::Cancelled);
    assert!(operation.cancel_requested);
    assert!(operation.processed_documents < 100);
    assert_eq!(collected.last().unwrap().status, TransferStatus::Cancelled);
    assert!(collected.iter().all(|e| e.status != TransferStatus::Completed));
    assert_eq!(harness.source.open_scrolls(), 0);

    // never goes back, and further requests are ignored
    assert_eq!(harness.service.cancel(&id), Some(false));
    assert_eq!(harness.service.get(&id).unwrap().status, TransferStatus::Cancelled);
}

#[tokio::test]
async fn test_cancel_finished_operation_is_noop() {
    let harness = Harness::new();
    harness.seed("small", 5);

    let (operation, _) = harness
        .run(TransferRequest::cluster_to_cluster(
            harness.source_endpoint(),
            harness.target_endpoint(),
            vec!["small".into()],
        ))
        .await;

    assert_eq!(harness.service.cancel(&operation.operation_id), Some(false));
    let after = harness.service.get(&operation.operation_id).unwrap();
    assert_eq!(after.status, TransferStatus::Completed);
    assert!(!after.cancel_requested);
    assert_eq!(harness.service.cancel("NOTTHERE"), None);
}

#[tokio::test]
async fn test_caller_sink_sees_every_event() {
    let harness = Harness::new();
    harness.seed("logs", 25);

    let seen: Arc<Mutex<Vec<u64>>> = Arc::default();
    let sink = {
        let seen = Arc::clone(&seen);
        move |event: &dm_common::types::ProgressEvent| -> anyhow::Result<()> {
            seen.lock().unwrap().push(event.processed_documents);
            Ok(())
        }
    };
    let sink: Arc<dyn ProgressSink> = Arc::new(sink);

    let mut events = harness.service.subscribe();
    let id = harness
        .service
        .submit_with_sink(
            TransferRequest::cluster_to_cluster(
                harness.source_endpoint(),
                harness.target_endpoint(),
                vec!["logs".into()],
            )
            .with_batch_size(10),
            sink,
        )
        .unwrap();
    let broadcast = collect_events(&mut events, &id).await;

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), broadcast.len());
    assert_eq!(seen.last(), Some(&25));
}

#[tokio::test]
async fn test_schema_flags_off_skip_index_creation() {
    let harness = Harness::new();
    harness.source.seed_index("plain", Some(json!({ "index": {} })), None);
    harness.source.insert_documents("plain", documents(7));

    let options = TransferOptions {
        include_settings: false,
        include_mappings: false,
        include_aliases: false,
        ..Default::default()
    };
    let (operation, _) = harness
        .run(
            TransferRequest::cluster_to_cluster(
                harness.source_endpoint(),
                harness.target_endpoint(),
                vec!["plain".into()],
            )
            .with_options(options),
        )
        .await;

    assert_eq!(operation.status, TransferStatus::Completed);
    assert_eq!(harness.target.stats().create_index_calls, 0);
    assert_eq!(harness.target.document_ids("plain").len(), 7);
}

#[tokio::test]
async fn test_clear_terminal_removes_finished_operations() {
    let harness = Harness::new();
    harness.seed("one", 3);

    for _ in 0..2 {
        harness
            .run(TransferRequest::cluster_to_cluster(
                harness.source_endpoint(),
                harness.target_endpoint(),
                vec!["one".into()],
            ))
            .await;
    }

    assert_eq!(harness.service.list().len(), 2);
    assert_eq!(harness.service.clear_terminal(), 2);
    assert!(harness.service.list().is_empty());
}
