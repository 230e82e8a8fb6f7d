//! Chunked bulk operations over a worker pool.
//!
//! Keys are cut into chunks of `batch_size`. Chunk `n` owns result slots
//! `[n * batch_size, n * batch_size + len)`, so results come back in input
//! order however the chunks are scheduled. Per-key failures are stored as
//! data; only a failed backend call fails the whole operation, and then
//! every completed result is discarded.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::pool::WorkerPool;
use super::slots::{SlotBuffer, SlotRange};
use crate::config::BatchOptions;
use crate::error::StorageError;
use crate::storage::{DeleteOutcome, ObjectBackend, StatResult};
use crate::Result;

pub struct BatchDispatcher {
    backend: Arc<dyn ObjectBackend>,
    options: BatchOptions,
}

impl BatchDispatcher {
    pub fn new(backend: Arc<dyn ObjectBackend>, options: BatchOptions) -> Self {
        Self { backend, options }
    }

    pub fn options(&self) -> BatchOptions {
        self.options
    }

    /// Stat every key. `result[i]` describes `keys[i]`; missing or
    /// forbidden keys are reported with `size == -1`.
    pub async fn stat_keys(
        &self,
        keys: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<StatResult>> {
        let buffer = self.dispatch("stat", keys, cancel, stat_chunk).await?;
        buffer.into_vec()
    }

    /// Delete every key. Only keys that failed to delete are returned, in
    /// input order; an empty vector means every key was deleted.
    pub async fn delete_keys(
        &self,
        keys: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<DeleteOutcome>> {
        let buffer = self.dispatch("delete", keys, cancel, delete_chunk).await?;
        let failed = buffer.into_present()?;
        if !failed.is_empty() {
            info!("{} of {} keys failed to delete", failed.len(), keys.len());
        }
        Ok(failed)
    }

    async fn dispatch<T, F, Fut>(
        &self,
        op: &'static str,
        keys: &[String],
        cancel: &CancellationToken,
        unit: F,
    ) -> Result<SlotBuffer<T>>
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<dyn ObjectBackend>, Vec<String>, SlotRange<T>, CancellationToken) -> Fut
            + Clone
            + Send
            + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let buffer = SlotBuffer::new(keys.len());
        if keys.is_empty() {
            return Ok(buffer);
        }

        let batch_size = self.options.effective_batch_size();
        let concurrency = self.options.concurrency_for(keys.len());
        let chunks = keys.len().div_ceil(batch_size);
        let start = Instant::now();
        info!(
            "Bulk {} of {} keys: {} chunks of up to {}, {} workers",
            op,
            keys.len(),
            chunks,
            batch_size,
            concurrency
        );

        let pool = WorkerPool::new(concurrency);
        for (n, chunk) in keys.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            let slots = buffer.range(n * batch_size, chunk.len());
            let backend = Arc::clone(&self.backend);
            let chunk = chunk.to_vec();
            let unit = unit.clone();

            let submitted = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                res = pool.submit(move |stop| unit(backend, chunk, slots, stop)) => res,
            };
            if let Err(e) = submitted {
                debug!("Stopped submitting {} chunks at chunk {}: {}", op, n, e);
                break;
            }
        }

        pool.wait(cancel).await?;
        info!(
            "Bulk {} of {} keys finished in {:?}",
            op,
            keys.len(),
            start.elapsed()
        );
        Ok(buffer)
    }
}

async fn stat_chunk(
    backend: Arc<dyn ObjectBackend>,
    chunk: Vec<String>,
    slots: SlotRange<StatResult>,
    stop: CancellationToken,
) -> Result<()> {
    for (j, key) in chunk.iter().enumerate() {
        if stop.is_cancelled() {
            // The pool has stopped and will discard this buffer
            return Ok(());
        }
        slots.write(j, backend.stat_key(key).await?);
    }
    Ok(())
}

async fn delete_chunk(
    backend: Arc<dyn ObjectBackend>,
    chunk: Vec<String>,
    slots: SlotRange<DeleteOutcome>,
    stop: CancellationToken,
) -> Result<()> {
    if stop.is_cancelled() {
        return Ok(());
    }
    let outcomes = backend.batch_delete(&chunk).await?;
    place_outcomes(&chunk, outcomes, &slots)
}

/// Write each outcome into the slot of the key it reports on.
///
/// Outcomes normally arrive in request order, so the search starts after
/// the previous match and wraps around otherwise.
fn place_outcomes(
    chunk: &[String],
    outcomes: Vec<DeleteOutcome>,
    slots: &SlotRange<DeleteOutcome>,
) -> Result<()> {
    let mut cursor = 0;
    for outcome in outcomes {
        let free = |j: &usize| chunk[*j] == outcome.key && !slots.is_written(*j);
        let position = (cursor..chunk.len())
            .find(free)
            .or_else(|| (0..cursor).find(free));

        match position {
            Some(j) => {
                slots.write(j, outcome);
                cursor = j + 1;
            }
            None => {
                return Err(StorageError::Backend(format!(
                    "bulk delete reported a failure for unrequested key '{}'",
                    outcome.key
                ))
                .into())
            }
        }
    }
    Ok(())
}
