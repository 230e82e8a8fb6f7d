//! Bulk stat and bulk delete tests.
//!
//! Covers:
//! - Result order matching input order under reordered completion
//! - The worker concurrency bound
//! - Per-key delete failures reported as data
//! - Transport failures failing the whole call

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use bucket_ops_core::storage::{StatResult, STATUS_NOT_FOUND};
use bucket_ops_core::{BatchDispatcher, BatchOptions, Error, Lister, StorageError};

use crate::common::{keys, seeded, ScriptedBackend};

/// Later keys finish first
fn reversed_delay(key: &str) -> Duration {
    let index: u64 = key
        .rsplit('/')
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    Duration::from_millis(40u64.saturating_sub(index))
}

// ============================================================================
// Order Preservation
// ============================================================================

#[tokio::test]
async fn stat_results_follow_input_order() {
    let all = keys("obj/", 40);
    let backend = seeded(ScriptedBackend::new().with_delay_fn(reversed_delay), &all).await;
    let dispatcher = BatchDispatcher::new(backend.clone(), BatchOptions::new(3, 8));

    let results = dispatcher
        .stat_keys(&all, &CancellationToken::new())
        .await
        .expect("bulk stat failed");

    assert_eq!(results.len(), all.len());
    for (i, (result, key)) in results.iter().zip(&all).enumerate() {
        assert_eq!(&result.key, key, "slot {} holds the wrong key", i);
        assert_eq!(result.size, key.len() as i64);
    }
    assert_eq!(backend.stat_calls.load(Ordering::SeqCst), 40);
}

#[tokio::test]
async fn stat_order_holds_for_every_batch_size() {
    let all = keys("obj/", 23);
    let backend = seeded(ScriptedBackend::new(), &all).await;

    for batch_size in [1, 2, 5, 22, 23, 100] {
        let dispatcher = BatchDispatcher::new(backend.clone(), BatchOptions::new(batch_size, 4));
        let results = dispatcher
            .stat_keys(&all, &CancellationToken::new())
            .await
            .expect("bulk stat failed");
        let got: Vec<&str> = results.iter().map(|r| r.key.as_str()).collect();
        let want: Vec<&str> = all.iter().map(String::as_str).collect();
        assert_eq!(got, want, "batch_size {}", batch_size);
    }
}

#[tokio::test]
async fn stat_reports_missing_keys_as_data() {
    let present = keys("obj/", 3);
    let backend = seeded(ScriptedBackend::new(), &present).await;
    let dispatcher = BatchDispatcher::new(backend, BatchOptions::new(2, 2));

    let request = vec![
        present[0].clone(),
        "obj/missing".to_string(),
        present[2].clone(),
    ];
    let results = dispatcher
        .stat_keys(&request, &CancellationToken::new())
        .await
        .expect("missing keys must not fail the call");

    assert!(results[0].is_found());
    assert_eq!(
        results[1],
        StatResult::missing("obj/missing", STATUS_NOT_FOUND)
    );
    assert!(results[2].is_found());
}

// ============================================================================
// Concurrency Bound
// ============================================================================

#[tokio::test]
async fn dispatcher_never_exceeds_batch_concurrency() {
    let all = keys("obj/", 30);
    let backend = seeded(
        ScriptedBackend::new().with_delay(Duration::from_millis(5)),
        &all,
    )
    .await;
    let dispatcher = BatchDispatcher::new(backend.clone(), BatchOptions::new(1, 3));

    dispatcher
        .stat_keys(&all, &CancellationToken::new())
        .await
        .expect("bulk stat failed");

    let peak = backend.peak_in_flight();
    assert!(peak <= 3, "peak concurrency {} exceeds 3", peak);
    assert!(peak >= 2, "expected batches to overlap, peak was {}", peak);
}

#[tokio::test]
async fn few_keys_use_one_worker() {
    let all = keys("obj/", 4);
    let backend = seeded(
        ScriptedBackend::new().with_delay(Duration::from_millis(2)),
        &all,
    )
    .await;
    let dispatcher = BatchDispatcher::new(backend.clone(), BatchOptions::new(100, 20));

    dispatcher
        .stat_keys(&all, &CancellationToken::new())
        .await
        .expect("bulk stat failed");
    assert_eq!(backend.peak_in_flight(), 1);
}

// ============================================================================
// Bulk Delete
// ============================================================================

#[tokio::test]
async fn two_failed_deletes_give_two_outcomes() {
    let all = keys("obj/", 10);
    let backend = seeded(
        ScriptedBackend::new().with_failing_deletes(&["obj/00002", "obj/00007"]),
        &all,
    )
    .await;
    let lister = Lister::new(backend.clone(), BatchOptions::new(3, 2));
    let cancel = CancellationToken::new();

    let failed = lister
        .delete_keys(&all, &cancel)
        .await
        .expect("per-key failures must not fail the call");

    assert_eq!(failed.len(), 2);
    assert_eq!(failed[0].key, "obj/00002");
    assert_eq!(failed[1].key, "obj/00007");
    assert!(failed.iter().all(|o| o.code == "AccessDenied"));

    let left = lister.list_prefix("obj/", &cancel).await.expect("list failed");
    assert_eq!(left, vec!["obj/00002", "obj/00007"]);
    assert_eq!(backend.delete_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn delete_then_list_omits_deleted_key() {
    let all = keys("obj/", 5);
    let backend = seeded(ScriptedBackend::new(), &all).await;
    let lister = Lister::new(backend, BatchOptions::default());
    let cancel = CancellationToken::new();

    let failed = lister
        .delete_keys(&all[1..2], &cancel)
        .await
        .expect("delete failed");
    assert!(failed.is_empty());

    let listed = lister.list_prefix("obj/", &cancel).await.expect("list failed");
    assert_eq!(listed.len(), 4);
    assert!(!listed.contains(&all[1]));
}

#[tokio::test]
async fn delete_prefix_pages_through_everything() {
    let all = keys("tmp/", 25);
    let backend = seeded(ScriptedBackend::new().with_page_size(4), &all).await;
    backend.seed(&["keep/me".to_string()]).await;
    let lister = Lister::new(backend.clone(), BatchOptions::new(3, 2));
    let cancel = CancellationToken::new();

    let failed = lister
        .delete_prefix("tmp/", &cancel)
        .await
        .expect("delete_prefix failed");
    assert!(failed.is_empty());

    assert_eq!(
        lister.list_prefix("", &cancel).await.expect("list failed"),
        vec!["keep/me"]
    );
}

// ============================================================================
// Transport Failures
// ============================================================================

#[tokio::test]
async fn transport_failure_fails_bulk_delete() {
    let all = keys("obj/", 12);
    let backend = seeded(
        ScriptedBackend::new().with_transport_failure(&["obj/00005"]),
        &all,
    )
    .await;
    let dispatcher = BatchDispatcher::new(backend, BatchOptions::new(2, 2));

    let err = dispatcher
        .delete_keys(&all, &CancellationToken::new())
        .await
        .expect_err("transport failure must fail the call");
    assert!(matches!(
        err,
        Error::Storage(StorageError::Unauthenticated(_))
    ));
}

#[tokio::test]
async fn transport_failure_fails_bulk_stat() {
    let all = keys("obj/", 8);
    let backend = seeded(
        ScriptedBackend::new().with_transport_failure(&["obj/00003"]),
        &all,
    )
    .await;
    let dispatcher = BatchDispatcher::new(backend, BatchOptions::new(4, 2));

    let result = dispatcher.stat_keys(&all, &CancellationToken::new()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn shared_backend_serves_parallel_bulk_calls() {
    let all = keys("obj/", 50);
    let backend = seeded(ScriptedBackend::new(), &all).await;
    let dispatcher = Arc::new(BatchDispatcher::new(backend, BatchOptions::new(5, 4)));

    let first = {
        let dispatcher = Arc::clone(&dispatcher);
        let request = all[..25].to_vec();
        tokio::spawn(async move { dispatcher.stat_keys(&request, &CancellationToken::new()).await })
    };
    let second = {
        let dispatcher = Arc::clone(&dispatcher);
        let request = all[25..].to_vec();
        tokio::spawn(async move { dispatcher.stat_keys(&request, &CancellationToken::new()).await })
    };

    let first = first.await.expect("task panicked").expect("stat failed");
    let second = second.await.expect("task panicked").expect("stat failed");
    assert_eq!(first[0].key, all[0]);
    assert_eq!(second[24].key, all[49]);
}
