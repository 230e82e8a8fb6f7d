//! Listing tests.
//!
//! Covers:
//! - Completeness of a prefix listing
//! - Exact union of fixed-size pages
//! - Restarting a paginator after a failed page
//! - Listing into a channel

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use bucket_ops_core::engine::{list_prefix, list_prefix_to_channel, PageState};
use bucket_ops_core::storage::StoreBackend;
use bucket_ops_core::{KeyPaginator, ObjectBackend};

use crate::common::{keys, seeded, ScriptedBackend};

// ============================================================================
// Completeness
// ============================================================================

#[tokio::test]
async fn listing_returns_exactly_inserted_keys() {
    let inserted: Vec<String> = ["dir/c", "dir/a", "dir/b"].iter().map(|s| s.to_string()).collect();
    let backend = seeded(ScriptedBackend::new(), &inserted).await;
    backend.seed(&["dirt".to_string(), "other/a".to_string()]).await;

    let listed = list_prefix(backend, "dir/", &CancellationToken::new())
        .await
        .expect("list failed");

    let listed: HashSet<String> = listed.into_iter().collect();
    let inserted: HashSet<String> = inserted.into_iter().collect();
    assert_eq!(listed, inserted);
}

#[tokio::test]
async fn listing_is_repeatable() {
    let all = keys("data/", 30);
    let backend = seeded(ScriptedBackend::new().with_page_size(7), &all).await;
    let cancel = CancellationToken::new();

    let first = list_prefix(backend.clone(), "data/", &cancel).await.expect("list failed");
    let second = list_prefix(backend.clone(), "data/", &cancel).await.expect("list failed");
    assert_eq!(first, second);
}

#[tokio::test]
async fn string_prefix_matches_across_directories() {
    let backend: Arc<dyn ObjectBackend> = Arc::new(StoreBackend::memory());
    for key in ["log1", "log2/a", "logs/b", "lo", "m"] {
        backend.put(key, bytes::Bytes::from_static(b"x")).await.expect("put failed");
    }

    let listed = list_prefix(backend, "log", &CancellationToken::new())
        .await
        .expect("list failed");
    assert_eq!(listed, vec!["log1", "log2/a", "logs/b"]);
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn full_pages_then_partial_page_yield_exact_union() {
    let all = keys("data/", 50);
    let backend = seeded(ScriptedBackend::new().with_page_size(7), &all).await;

    let listed = list_prefix(backend.clone(), "data/", &CancellationToken::new())
        .await
        .expect("list failed");

    assert_eq!(listed, all);
    let unique: HashSet<&String> = listed.iter().collect();
    assert_eq!(unique.len(), listed.len(), "duplicates in listing");
    // 7 full pages and one page holding the last key
    assert_eq!(backend.list_calls.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn exact_multiple_of_page_size_ends_on_full_page() {
    let all = keys("data/", 21);
    let backend = seeded(ScriptedBackend::new().with_page_size(7), &all).await;
    let mut pager = KeyPaginator::new(backend.clone(), "data/");
    let cancel = CancellationToken::new();

    let mut pages = Vec::new();
    while let Some(page) = pager.next_page(&cancel).await.expect("page failed") {
        pages.push(page.len());
    }
    assert_eq!(pages, vec![7, 7, 7]);
    assert_eq!(pager.state(), &PageState::Done);
}

#[tokio::test]
async fn cancelled_paginator_can_resume_same_page() {
    let all = keys("data/", 10);
    let backend = seeded(ScriptedBackend::new().with_page_size(4), &all).await;
    let mut pager = KeyPaginator::new(backend, "data/");

    let first = pager
        .next_page(&CancellationToken::new())
        .await
        .expect("page failed")
        .expect("first page missing");
    assert_eq!(first.len(), 4);
    let position = pager.state().clone();

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    assert!(pager.next_page(&cancelled).await.is_err());
    assert_eq!(pager.state(), &position);

    let second = pager
        .next_page(&CancellationToken::new())
        .await
        .expect("page failed")
        .expect("second page missing");
    assert_eq!(second[0].key, all[4]);
}

#[tokio::test]
async fn empty_prefix_listing() {
    let backend = seeded(ScriptedBackend::new(), &[]).await;
    let listed = list_prefix(backend.clone(), "nothing/", &CancellationToken::new())
        .await
        .expect("list failed");
    assert!(listed.is_empty());
    assert_eq!(backend.list_calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Channel Producer
// ============================================================================

#[tokio::test]
async fn channel_producer_sends_keys_in_order() {
    let all = keys("data/", 15);
    let backend = seeded(ScriptedBackend::new().with_page_size(4), &all).await;
    let (tx, mut rx) = mpsc::channel(2);

    let consumer = tokio::spawn(async move {
        let mut got = Vec::new();
        while let Some(key) = rx.recv().await {
            got.push(key);
        }
        got
    });

    let sent = list_prefix_to_channel(backend, "data/", tx, &CancellationToken::new())
        .await
        .expect("producer failed");
    let got = consumer.await.expect("consumer panicked");

    assert_eq!(sent, 15);
    assert_eq!(got, all);
}
