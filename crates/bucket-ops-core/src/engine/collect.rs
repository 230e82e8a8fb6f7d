//! Turning a paginated listing into a channel or a vector of keys.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::paginator::KeyPaginator;
use crate::storage::ObjectBackend;
use crate::{Error, Result};

/// Depth of the channel between the listing producer and its consumer.
pub const LIST_CHANNEL_DEPTH: usize = 1000;

/// Page through `prefix` and send every key to `tx`, in listing order.
///
/// Returns the number of keys sent. A dropped receiver ends the listing
/// early without error.
pub async fn list_prefix_to_channel(
    backend: Arc<dyn ObjectBackend>,
    prefix: &str,
    tx: mpsc::Sender<String>,
    cancel: &CancellationToken,
) -> Result<usize> {
    let mut pager = KeyPaginator::new(backend, prefix);
    let mut sent = 0usize;

    while let Some(records) = pager.next_page(cancel).await? {
        for record in records {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                res = tx.send(record.key) => {
                    if res.is_err() {
                        debug!("Listing receiver for '{}' closed after {} keys", prefix, sent);
                        return Ok(sent);
                    }
                }
            }
            sent += 1;
        }
    }

    Ok(sent)
}

/// Every key under `prefix`, in listing order.
pub async fn list_prefix(
    backend: Arc<dyn ObjectBackend>,
    prefix: &str,
    cancel: &CancellationToken,
) -> Result<Vec<String>> {
    let (tx, mut rx) = mpsc::channel::<String>(LIST_CHANNEL_DEPTH);

    let consumer = tokio::spawn(async move {
        let mut keys = Vec::new();
        while let Some(key) = rx.recv().await {
            keys.push(key);
        }
        keys
    });

    let produced = list_prefix_to_channel(backend, prefix, tx, cancel).await;
    // The sender was moved into the producer and is dropped by now, so the
    // consumer drains what is left and exits.
    let keys = consumer
        .await
        .map_err(|e| Error::Internal(format!("listing consumer failed: {}", e)))?;

    let sent = produced?;
    info!("Listed {} keys under '{}'", sent, prefix);
    Ok(keys)
}
