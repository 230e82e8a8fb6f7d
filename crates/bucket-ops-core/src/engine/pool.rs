//! Bounded worker pool.
//!
//! A fixed set of worker tasks pull boxed units of work from one bounded
//! queue, so at most `max_concurrency` units run at the same time and a
//! submitter waits once `max_concurrency` units are queued. The first unit
//! that fails stops the pool from starting anything new; units already
//! running are left to finish on their own.

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::DEFAULT_BATCH_CONCURRENCY;
use crate::{Error, Result};

/// A unit of work. It receives the pool's stop token, which fires when the
/// pool stops scheduling (first failure or caller cancellation).
pub type WorkUnit = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Result<()>> + Send>;

struct PoolState {
    /// Units submitted and not yet finished or discarded
    pending: AtomicUsize,
    /// Units currently running
    active: AtomicUsize,
    first_error: Mutex<Option<Error>>,
    stop: CancellationToken,
    changed: Notify,
}

impl PoolState {
    fn record_error(&self, err: Error) {
        {
            let mut first = self.first_error.lock();
            if first.is_none() {
                warn!("Worker pool stopping after error: {}", err);
                *first = Some(err);
            } else {
                debug!("Discarding later worker error: {}", err);
            }
        }
        self.stop.cancel();
        self.changed.notify_waiters();
    }

    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.changed.notify_waiters();
        }
    }
}

/// Pool of workers running at most `max_concurrency` units at once.
///
/// Must be created inside a Tokio runtime. Dropping the pool without
/// calling [`WorkerPool::wait`] stops it.
pub struct WorkerPool {
    state: Arc<PoolState>,
    submitter: PoolSubmitter,
    max_concurrency: usize,
}

impl WorkerPool {
    /// Create a pool; a `max_concurrency` of zero falls back to the default
    /// batch concurrency.
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = if max_concurrency == 0 {
            DEFAULT_BATCH_CONCURRENCY
        } else {
            max_concurrency
        };

        let (sender, receiver) = mpsc::channel::<WorkUnit>(max_concurrency);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let state = Arc::new(PoolState {
            pending: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            first_error: Mutex::new(None),
            stop: CancellationToken::new(),
            changed: Notify::new(),
        });

        for id in 0..max_concurrency {
            tokio::spawn(run_worker(id, Arc::clone(&receiver), Arc::clone(&state)));
        }

        debug!("Started worker pool with {} workers", max_concurrency);

        Self {
            submitter: PoolSubmitter {
                state: Arc::clone(&state),
                sender,
            },
            state,
            max_concurrency,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Number of units running right now
    pub fn active(&self) -> usize {
        self.state.active.load(Ordering::Acquire)
    }

    /// A cloneable handle for submitting work, usable from inside running
    /// units.
    pub fn submitter(&self) -> PoolSubmitter {
        self.submitter.clone()
    }

    /// Queue a unit of work. See [`PoolSubmitter::submit`].
    pub async fn submit<F, Fut>(&self, work: F) -> Result<()>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.submitter.submit(work).await
    }

    /// Wait for every submitted unit to finish.
    ///
    /// Returns the first unit error as soon as it is recorded, or
    /// [`Error::Cancelled`] once `cancel` fires. Either way the pool stops
    /// scheduling queued units.
    pub async fn wait(self, cancel: &CancellationToken) -> Result<()> {
        let state = Arc::clone(&self.state);
        loop {
            let changed = state.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            if let Some(err) = state.first_error.lock().take() {
                return Err(err);
            }
            if cancel.is_cancelled() {
                state.stop.cancel();
                return Err(Error::Cancelled);
            }
            if state.pending.load(Ordering::Acquire) == 0 {
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = &mut changed => {}
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.state.stop.cancel();
    }
}

/// Handle for submitting units to a [`WorkerPool`].
#[derive(Clone)]
pub struct PoolSubmitter {
    state: Arc<PoolState>,
    sender: mpsc::Sender<WorkUnit>,
}

impl PoolSubmitter {
    /// Queue a unit of work, waiting while the queue is full.
    ///
    /// Returns [`Error::PoolShutdown`] once the pool has stopped. A unit
    /// that submits more work while every worker is busy and the queue is
    /// full waits until another unit finishes, so fan-out from inside units
    /// must leave at least one worker free.
    pub async fn submit<F, Fut>(&self, work: F) -> Result<()>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        if self.state.stop.is_cancelled() {
            return Err(Error::PoolShutdown);
        }

        let unit: WorkUnit = Box::new(move |token| work(token).boxed());
        self.state.pending.fetch_add(1, Ordering::AcqRel);

        let sent = tokio::select! {
            biased;
            _ = self.state.stop.cancelled() => false,
            res = self.sender.send(unit) => res.is_ok(),
        };

        if !sent {
            self.state.finish_one();
            return Err(Error::PoolShutdown);
        }
        Ok(())
    }
}

async fn run_worker(
    id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<WorkUnit>>>,
    state: Arc<PoolState>,
) {
    loop {
        let unit = {
            let mut rx = tokio::select! {
                biased;
                _ = state.stop.cancelled() => break,
                rx = receiver.lock() => rx,
            };
            tokio::select! {
                biased;
                _ = state.stop.cancelled() => break,
                unit = rx.recv() => unit,
            }
        };
        let Some(unit) = unit else { break };

        if state.stop.is_cancelled() {
            // Dequeued after the pool stopped; never started
            state.finish_one();
            break;
        }

        state.active.fetch_add(1, Ordering::AcqRel);
        let token = state.stop.clone();
        let outcome = AssertUnwindSafe(async move { unit(token).await })
            .catch_unwind()
            .await;
        state.active.fetch_sub(1, Ordering::AcqRel);

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => state.record_error(e),
            Err(panic) => state.record_error(Error::WorkerPanic(panic_message(panic.as_ref()))),
        }
        state.finish_one();
    }
    trace!("Worker {} exiting", id);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
