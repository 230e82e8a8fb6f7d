//! Marker-driven listing.
//!
//! [`KeyPaginator`] walks a prefix one page at a time. It only moves to the
//! next page once the previous page's marker is known, and a failed fetch
//! leaves it positioned on the same marker so the page can be fetched again.

use futures::stream::{self, Stream, TryStreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::LIST_PAGE_LIMIT;
use crate::error::StorageError;
use crate::storage::{ListRecord, ObjectBackend};
use crate::{Error, Result};

/// Position of a paginator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    /// Another page starts after this marker ("" for the first page)
    HasMore(String),
    /// The listing is exhausted
    Done,
}

pub struct KeyPaginator {
    backend: Arc<dyn ObjectBackend>,
    prefix: String,
    state: PageState,
    pages_fetched: usize,
}

impl KeyPaginator {
    pub fn new(backend: Arc<dyn ObjectBackend>, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            state: PageState::HasMore(String::new()),
            pages_fetched: 0,
        }
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Fetch the next page, or `None` once the listing is exhausted.
    pub async fn next_page(&mut self, cancel: &CancellationToken) -> Result<Option<Vec<ListRecord>>> {
        let marker = match &self.state {
            PageState::Done => return Ok(None),
            PageState::HasMore(marker) => marker.clone(),
        };

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let page = self
            .backend
            .list_page(&self.prefix, &marker, LIST_PAGE_LIMIT)
            .await?;

        if !marker.is_empty() && page.next_marker == marker {
            return Err(StorageError::Backend(format!(
                "listing of '{}' did not advance past marker '{}'",
                self.prefix, marker
            ))
            .into());
        }

        self.pages_fetched += 1;
        debug!(
            "Fetched page {} of '{}': {} records",
            self.pages_fetched,
            self.prefix,
            page.records.len()
        );

        self.state = if page.next_marker.is_empty() {
            PageState::Done
        } else {
            PageState::HasMore(page.next_marker)
        };

        Ok(Some(page.records))
    }

    /// Records of every remaining page as a stream. Pages are fetched on
    /// demand as the stream is polled.
    pub fn into_stream(
        self,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<ListRecord>> + Send + 'static {
        stream::try_unfold((self, cancel), |(mut pager, cancel)| async move {
            match pager.next_page(&cancel).await? {
                Some(records) => {
                    let page = stream::iter(records.into_iter().map(Ok::<_, Error>));
                    Ok::<_, Error>(Some((page, (pager, cancel))))
                }
                None => Ok(None),
            }
        })
        .try_flatten()
    }
}
