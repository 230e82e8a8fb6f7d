//! Listing, bulk stat and delete over one bucket.

use futures::Stream;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::BatchOptions;
use crate::engine::{self, BatchDispatcher, KeyPaginator};
use crate::storage::{DeleteOutcome, ListRecord, ObjectBackend, ObjectStat, StatResult};
use crate::Result;

pub struct Lister {
    backend: Arc<dyn ObjectBackend>,
    dispatcher: BatchDispatcher,
}

impl Lister {
    pub fn new(backend: Arc<dyn ObjectBackend>, options: BatchOptions) -> Self {
        Self {
            dispatcher: BatchDispatcher::new(Arc::clone(&backend), options),
            backend,
        }
    }

    pub fn backend(&self) -> &Arc<dyn ObjectBackend> {
        &self.backend
    }

    /// Every key starting with `prefix`, in key order.
    pub async fn list_prefix(&self, prefix: &str, cancel: &CancellationToken) -> Result<Vec<String>> {
        engine::list_prefix(Arc::clone(&self.backend), prefix, cancel).await
    }

    /// Send every key starting with `prefix` to `tx`. Returns the number of
    /// keys sent.
    pub async fn list_prefix_to_channel(
        &self,
        prefix: &str,
        tx: mpsc::Sender<String>,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        engine::list_prefix_to_channel(Arc::clone(&self.backend), prefix, tx, cancel).await
    }

    /// Full listing records under `prefix`, fetched page by page as the
    /// stream is polled.
    pub fn list_records(
        &self,
        prefix: &str,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<ListRecord>> + Send + 'static {
        KeyPaginator::new(Arc::clone(&self.backend), prefix).into_stream(cancel)
    }

    /// Stat many keys; `result[i]` describes `keys[i]`.
    pub async fn list_stat(
        &self,
        keys: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<StatResult>> {
        self.dispatcher.stat_keys(keys, cancel).await
    }

    /// Delete many keys. Returns the keys that failed, in input order.
    pub async fn delete_keys(
        &self,
        keys: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<DeleteOutcome>> {
        self.dispatcher.delete_keys(keys, cancel).await
    }

    /// Delete every key under `prefix`, one listing page at a time.
    pub async fn delete_prefix(
        &self,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<DeleteOutcome>> {
        let mut pager = KeyPaginator::new(Arc::clone(&self.backend), prefix);
        let mut failed = Vec::new();
        let mut deleted = 0usize;

        while let Some(records) = pager.next_page(cancel).await? {
            let keys: Vec<String> = records.into_iter().map(|r| r.key).collect();
            let outcomes = self.dispatcher.delete_keys(&keys, cancel).await?;
            deleted += keys.len() - outcomes.len();
            failed.extend(outcomes);
        }

        info!(
            "Deleted {} keys under '{}' ({} failed)",
            deleted,
            prefix,
            failed.len()
        );
        Ok(failed)
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.backend.delete_one(key).await
    }

    pub async fn stat(&self, key: &str) -> Result<ObjectStat> {
        self.backend.get_metadata(key).await
    }
}
