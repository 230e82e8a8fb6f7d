//! Worker pool failure tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use bucket_ops_core::error::StorageError;
use bucket_ops_core::{BatchDispatcher, BatchOptions, Error, ObjectBackend, WorkerPool};

use crate::common::{keys, seeded, ScriptedBackend};

#[tokio::test]
async fn first_failure_stops_new_units() {
    let pool = WorkerPool::new(2);
    let started = Arc::new(AtomicUsize::new(0));

    let failing = Arc::clone(&started);
    pool.submit(move |_| async move {
        failing.fetch_add(1, Ordering::SeqCst);
        Err(Error::Storage(StorageError::Backend("connection refused".into())))
    })
    .await
    .expect("submit failed");

    let mut rejected = 0;
    for _ in 0..50 {
        let started = Arc::clone(&started);
        let submitted = pool
            .submit(move |_| async move {
                started.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(())
            })
            .await;
        if matches!(submitted, Err(Error::PoolShutdown)) {
            rejected += 1;
        }
    }

    let err = pool
        .wait(&CancellationToken::new())
        .await
        .expect_err("wait must report the failure");
    assert!(err.to_string().contains("connection refused"));
    assert!(rejected > 0, "pool kept accepting work after failing");
    assert!(started.load(Ordering::SeqCst) < 51);
}

#[tokio::test]
async fn panicking_unit_does_not_hang_wait() {
    let pool = WorkerPool::new(3);
    for i in 0..6 {
        pool.submit(move |_| async move {
            if i == 3 {
                panic!("unit {} exploded", i);
            }
            Ok(())
        })
        .await
        .ok();
    }

    let err = tokio::time::timeout(Duration::from_secs(5), pool.wait(&CancellationToken::new()))
        .await
        .expect("wait hung after a panic")
        .expect_err("panic must be reported");
    assert!(matches!(err, Error::WorkerPanic(ref msg) if msg.contains("exploded")));
}

#[tokio::test]
async fn running_units_observe_stop_token() {
    let pool = WorkerPool::new(2);
    let observed = Arc::new(AtomicUsize::new(0));

    let seen = Arc::clone(&observed);
    pool.submit(move |stop| async move {
        stop.cancelled().await;
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .await
    .expect("submit failed");
    pool.submit(|_| async { Err(Error::Storage(StorageError::Backend("boom".into()))) })
        .await
        .expect("submit failed");

    assert!(pool.wait(&CancellationToken::new()).await.is_err());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(observed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn max_concurrency_is_respected_under_load() {
    let pool = WorkerPool::new(4);
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    for _ in 0..100 {
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        pool.submit(move |_| async move {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(1)).await;
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .expect("submit failed");
        assert!(pool.active() <= pool.max_concurrency());
    }

    pool.wait(&CancellationToken::new()).await.expect("wait failed");
    assert!(peak.load(Ordering::SeqCst) <= 4);
}

#[tokio::test]
async fn failed_bulk_call_discards_completed_chunks() {
    let all = keys("obj/", 30);
    // The last chunk fails after every other chunk has had time to finish
    let backend = seeded(
        ScriptedBackend::new()
            .with_transport_failure(&["obj/00029"])
            .with_delay_fn(|key| {
                if key == "obj/00027" {
                    Duration::from_millis(30)
                } else {
                    Duration::ZERO
                }
            }),
        &all,
    )
    .await;
    let dispatcher = BatchDispatcher::new(backend.clone(), BatchOptions::new(3, 4));

    let err = dispatcher
        .delete_keys(&all, &CancellationToken::new())
        .await
        .expect_err("partial results must not be returned");
    assert!(matches!(err, Error::Storage(StorageError::Unauthenticated(_))));

    // Every chunk ran and the first nine really deleted their keys
    assert_eq!(backend.delete_calls.load(Ordering::SeqCst), 10);
    for key in ["obj/00000", "obj/00013", "obj/00026"] {
        assert!(backend.get(key).await.is_err(), "{} survived a completed chunk", key);
    }
    assert!(backend.get("obj/00029").await.is_ok());
}
