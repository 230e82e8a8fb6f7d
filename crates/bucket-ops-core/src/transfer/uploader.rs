//! Uploads of in-memory data and local files.

use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::retry::with_retry;
use crate::config::TransferOptions;
use crate::storage::ObjectBackend;
use crate::Result;

pub struct Uploader {
    backend: Arc<dyn ObjectBackend>,
    options: TransferOptions,
}

impl Uploader {
    pub fn new(backend: Arc<dyn ObjectBackend>, options: TransferOptions) -> Self {
        Self { backend, options }
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Store `data` under `key`. A leading `/` in the key is ignored.
    pub async fn upload_data(&self, data: Bytes, key: &str) -> Result<()> {
        let key = key.trim_start_matches('/');
        let start = Instant::now();

        with_retry(&self.options.retry, "upload", || {
            self.backend.put(key, data.clone())
        })
        .await?;

        info!(
            "Uploaded {} bytes to {} in {:?}",
            data.len(),
            key,
            start.elapsed()
        );
        Ok(())
    }

    /// Upload a local file to `key`.
    ///
    /// Files up to the multipart threshold are sent in one request; larger
    /// files are streamed in parts of `part_size` bytes with up to
    /// `up_concurrency` parts in flight.
    pub async fn upload_file(&self, path: impl AsRef<Path>, key: &str) -> Result<()> {
        let path = path.as_ref();
        let key = key.trim_start_matches('/');
        let start = Instant::now();
        let size = tokio::fs::metadata(path).await?.len();

        if size <= self.options.multipart_threshold_bytes {
            debug!("Uploading {} ({} bytes) in one request", path.display(), size);
            let data = Bytes::from(tokio::fs::read(path).await?);
            with_retry(&self.options.retry, "upload", || {
                self.backend.put(key, data.clone())
            })
            .await?;
        } else {
            let part_size = self.options.part_size() as usize;
            debug!(
                "Streaming {} ({} bytes) in parts of {} bytes",
                path.display(),
                size,
                part_size
            );
            with_retry(&self.options.retry, "multipart upload", || {
                self.backend
                    .put_file(key, path, part_size, self.options.up_concurrency)
            })
            .await?;
        }

        info!(
            "Uploaded {} ({} bytes) to {} in {:?}",
            path.display(),
            size,
            key,
            start.elapsed()
        );
        Ok(())
    }
}
