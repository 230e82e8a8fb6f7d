//! Downloads into memory, readers and local files.

use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::retry::with_retry;
use crate::config::RetryPolicy;
use crate::error::StorageError;
use crate::storage::{is_success_status, ByteRange, ObjectBackend, ObjectStat, RangeResponse};
use crate::Result;

/// Length of the tail read by [`Downloader::download_check`].
const CHECK_TAIL_LEN: u64 = 4;

pub struct Downloader {
    backend: Arc<dyn ObjectBackend>,
    retry: RetryPolicy,
}

impl Downloader {
    pub fn new(backend: Arc<dyn ObjectBackend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    /// Read a whole object into memory.
    pub async fn download_bytes(&self, key: &str) -> Result<Bytes> {
        with_retry(&self.retry, "download", || self.backend.get(key)).await
    }

    /// Stream a whole object without buffering it, along with its
    /// metadata. Only opening the stream is retried.
    pub async fn download_raw(
        &self,
        key: &str,
    ) -> Result<(ObjectStat, BoxStream<'static, Result<Bytes>>)> {
        with_retry(&self.retry, "raw download", || self.open_raw(key)).await
    }

    async fn open_raw(&self, key: &str) -> Result<(ObjectStat, BoxStream<'static, Result<Bytes>>)> {
        let stat = self.backend.get_metadata(key).await?;
        // A range starting at 0 is unsatisfiable on an empty object
        if stat.size == 0 {
            return Ok((stat, futures::stream::empty().boxed()));
        }
        let response = self.open_range(key, ByteRange::From(0)).await?;
        Ok((stat, response.body))
    }

    /// Open a ranged read. Returns the number of bytes the stream will
    /// yield and the stream itself.
    pub async fn download_range_reader(
        &self,
        key: &str,
        range: ByteRange,
    ) -> Result<(u64, BoxStream<'static, Result<Bytes>>)> {
        let response = with_retry(&self.retry, "range download", || {
            self.open_range(key, range)
        })
        .await?;
        Ok((response.content_length, response.body))
    }

    /// Read a byte range into memory. Returns the reported content length
    /// and the data.
    pub async fn download_range_bytes(&self, key: &str, range: ByteRange) -> Result<(u64, Bytes)> {
        with_retry(&self.retry, "range download", || self.read_range(key, range)).await
    }

    /// Read the last few bytes of an object to check that it is readable.
    /// Returns the number of bytes the backend reported.
    pub async fn download_check(&self, key: &str) -> Result<u64> {
        let (len, _) = self
            .download_range_bytes(key, ByteRange::Suffix(CHECK_TAIL_LEN))
            .await?;
        Ok(len)
    }

    async fn read_range(&self, key: &str, range: ByteRange) -> Result<(u64, Bytes)> {
        let response = self.open_range(key, range).await?;
        let content_length = response.content_length;
        let mut buf = BytesMut::with_capacity(content_length as usize);
        let mut body = response.body;
        while let Some(chunk) = body.try_next().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok((content_length, buf.freeze()))
    }

    /// Download `key` into the file at `path`, resuming after whatever the
    /// file already holds. The returned file is positioned at the start.
    pub async fn download_file(&self, key: &str, path: impl AsRef<Path>) -> Result<File> {
        let path = path.as_ref();
        with_retry(&self.retry, "file download", || self.download_file_once(key, path)).await
    }

    async fn download_file_once(&self, key: &str, path: &Path) -> Result<File> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .await?;
        let mut existing = file.seek(SeekFrom::End(0)).await?;
        let size = self.backend.get_metadata(key).await?.size;

        if existing == size {
            debug!("{} already complete at {}", key, path.display());
            file.rewind().await?;
            return Ok(file);
        }
        if existing > size {
            warn!(
                "Local file {} is larger than {} ({} > {} bytes), starting over",
                path.display(),
                key,
                existing,
                size
            );
            file.set_len(0).await?;
            file.rewind().await?;
            existing = 0;
        }

        if existing > 0 {
            info!("Resuming {} at byte {}", key, existing);
        }
        let response = self.open_range(key, ByteRange::From(existing)).await?;
        let mut body = response.body;
        let mut written = 0u64;
        while let Some(chunk) = body.try_next().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written != response.content_length {
            warn!(
                "Download length mismatch for {}: expected {} bytes, got {}",
                key, response.content_length, written
            );
        }
        info!("Downloaded {} bytes of {} to {}", written, key, path.display());

        file.rewind().await?;
        Ok(file)
    }

    async fn open_range(&self, key: &str, range: ByteRange) -> Result<RangeResponse> {
        let response = self.backend.get_range(key, range).await?;
        if !is_success_status(response.status) {
            return Err(StorageError::UnexpectedStatus {
                key: key.to_string(),
                status: response.status,
            }
            .into());
        }
        Ok(response)
    }
}
