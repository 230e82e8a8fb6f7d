//! `ObjectBackend` implementation on top of `object_store`.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::buffered::BufWriter;
use object_store::path::Path;
use object_store::{Attribute, GetOptions, ObjectMeta, ObjectStore, PutPayload};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{
    ByteRange, DeleteOutcome, ListPage, ListRecord, ObjectBackend, ObjectStat, RangeResponse,
    StatResult, STATUS_FORBIDDEN, STATUS_NOT_FOUND, STATUS_OK, STATUS_PARTIAL_CONTENT,
};
use crate::error::StorageError;
use crate::{Error, Result};

/// Storage backend over any `object_store::ObjectStore`.
///
/// Keys are mapped under an optional prefix. Listing uses plain string
/// prefixes (`"log"` matches `"log1"` and `"logs/a"`), like the S3 API.
pub struct StoreBackend {
    store: Arc<dyn ObjectStore>,
    prefix: Option<String>,
    name: &'static str,
    /// Whether the store lists keys in lexicographic order
    ordered_listing: bool,
}

impl StoreBackend {
    pub(crate) fn from_store(
        store: Arc<dyn ObjectStore>,
        prefix: Option<String>,
        name: &'static str,
        ordered_listing: bool,
    ) -> Self {
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());
        Self {
            store,
            prefix,
            name,
            ordered_listing,
        }
    }

    /// The underlying object store
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Build the full path for a key.
    ///
    /// The key is stored verbatim, so `#`, `%` and spaces survive a round
    /// trip through listing. Keys with empty segments (`a//b`), `.`/`..`
    /// segments or control characters cannot be stored and are rejected.
    fn full_path(&self, key: &str) -> Result<Path> {
        let key = key.trim_start_matches('/');
        let raw = match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, key),
            None => key.to_string(),
        };
        parse_path(&raw)
    }

    /// Remove the configured prefix from a stored location
    fn key_of(&self, location: &Path) -> String {
        let key = location.as_ref().to_string();
        match &self.prefix {
            Some(p) => key
                .strip_prefix(&format!("{}/", p))
                .map(str::to_string)
                .unwrap_or(key),
            None => key,
        }
    }

    /// Directory to list from so that every key starting with `prefix` is
    /// below it.
    fn list_root(&self, prefix: &str) -> Result<Option<Path>> {
        let dir = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let root = match (&self.prefix, dir.is_empty()) {
            (None, true) => return Ok(None),
            (None, false) => parse_path(dir)?,
            (Some(p), true) => parse_path(p)?,
            (Some(p), false) => parse_path(&format!("{}/{}", p, dir))?,
        };
        Ok(Some(root))
    }

    fn to_record(&self, meta: ObjectMeta) -> ListRecord {
        ListRecord {
            key: self.key_of(&meta.location),
            hash: meta.e_tag,
            size: meta.size as u64,
            last_modified: meta.last_modified,
            owner: None,
        }
    }

    async fn list_page_ordered(
        &self,
        prefix: &str,
        marker: &str,
        limit: usize,
    ) -> Result<ListPage> {
        let root = self.list_root(prefix)?;
        let mut stream = if marker.is_empty() {
            self.store.list(root.as_ref())
        } else {
            self.store
                .list_with_offset(root.as_ref(), &self.full_path(marker)?)
        };

        let mut records = Vec::with_capacity(limit.min(1024));
        let mut has_more = false;
        while let Some(meta) = stream.next().await {
            let record = self.to_record(meta?);
            if !record.key.starts_with(prefix) {
                if record.key.as_str() > prefix {
                    // Past the prefix range
                    break;
                }
                continue;
            }
            if records.len() == limit {
                has_more = true;
                break;
            }
            records.push(record);
        }

        let next_marker = match (has_more, records.last()) {
            (true, Some(last)) => last.key.clone(),
            _ => String::new(),
        };
        Ok(ListPage {
            records,
            next_marker,
        })
    }

    /// Listing for stores that walk in no particular order (local
    /// directories). Each page walks and sorts everything below the
    /// listing root, so a full listing of N keys costs N / limit walks.
    async fn list_page_unordered(
        &self,
        prefix: &str,
        marker: &str,
        limit: usize,
    ) -> Result<ListPage> {
        let root = self.list_root(prefix)?;
        let metas: Vec<ObjectMeta> = self.store.list(root.as_ref()).try_collect().await?;

        let mut records: Vec<ListRecord> = metas
            .into_iter()
            .map(|m| self.to_record(m))
            .filter(|r| r.key.starts_with(prefix) && r.key.as_str() > marker)
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));

        let has_more = records.len() > limit;
        records.truncate(limit);
        let next_marker = match (has_more, records.last()) {
            (true, Some(last)) => last.key.clone(),
            _ => String::new(),
        };
        Ok(ListPage {
            records,
            next_marker,
        })
    }
}

#[async_trait]
impl ObjectBackend for StoreBackend {
    fn name(&self) -> &str {
        self.name
    }

    async fn list_page(&self, prefix: &str, marker: &str, limit: usize) -> Result<ListPage> {
        let limit = limit.max(1);
        debug!(
            "{} LIST: prefix={:?} marker={:?} limit={}",
            self.name, prefix, marker, limit
        );
        if self.ordered_listing {
            self.list_page_ordered(prefix, marker, limit).await
        } else {
            self.list_page_unordered(prefix, marker, limit).await
        }
    }

    async fn stat_key(&self, key: &str) -> Result<StatResult> {
        // A key that cannot be stored cannot exist
        let Ok(path) = self.full_path(key) else {
            return Ok(StatResult::missing(key, STATUS_NOT_FOUND));
        };
        debug!("{} HEAD: {}", self.name, path);

        match self.store.head(&path).await {
            Ok(meta) => Ok(StatResult::found(key, meta.size as u64)),
            Err(object_store::Error::NotFound { .. }) => {
                Ok(StatResult::missing(key, STATUS_NOT_FOUND))
            }
            Err(object_store::Error::PermissionDenied { .. }) => {
                Ok(StatResult::missing(key, STATUS_FORBIDDEN))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_metadata(&self, key: &str) -> Result<ObjectStat> {
        let path = self.full_path(key)?;
        debug!("{} HEAD (metadata): {}", self.name, path);

        let options = GetOptions {
            head: true,
            ..Default::default()
        };
        let result = self.store.get_opts(&path, options).await?;
        let mime_type = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|v| v.to_string());

        Ok(ObjectStat {
            hash: result.meta.e_tag.clone(),
            size: result.meta.size as u64,
            last_modified: result.meta.last_modified,
            mime_type,
        })
    }

    async fn batch_delete(&self, keys: &[String]) -> Result<Vec<DeleteOutcome>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        debug!("{} DELETE (batch of {})", self.name, keys.len());

        let mut outcomes = Vec::new();
        let mut valid = Vec::with_capacity(keys.len());
        let mut locations = Vec::with_capacity(keys.len());
        for key in keys {
            match self.full_path(key) {
                Ok(path) => {
                    valid.push(key);
                    locations.push(Ok::<_, object_store::Error>(path));
                }
                Err(Error::Storage(e)) => outcomes.push(DeleteOutcome::from_error(key, &e)),
                Err(e) => return Err(e),
            }
        }

        let results: Vec<object_store::Result<Path>> = self
            .store
            .delete_stream(futures::stream::iter(locations).boxed())
            .collect()
            .await;

        // A failed request yields one error for the whole chunk instead of
        // one result per key.
        if results.len() != valid.len() {
            let err = results.into_iter().find_map(|r| r.err());
            return Err(match err {
                Some(e) => e.into(),
                None => Error::Storage(StorageError::Backend(format!(
                    "{} bulk delete returned an incomplete response",
                    self.name
                ))),
            });
        }

        for (key, result) in valid.into_iter().zip(results) {
            if let Err(e) = result {
                match StorageError::from(e) {
                    // Deleting a missing key succeeds, as on S3
                    StorageError::NotFound(_) => {}
                    e @ StorageError::Unauthenticated(_) => return Err(e.into()),
                    e => outcomes.push(DeleteOutcome::from_error(key, &e)),
                }
            }
        }
        if !outcomes.is_empty() {
            warn!(
                "{} bulk delete: {}/{} keys failed",
                self.name,
                outcomes.len(),
                keys.len()
            );
        }
        Ok(outcomes)
    }

    async fn delete_one(&self, key: &str) -> Result<()> {
        let path = self.full_path(key)?;
        debug!("{} DELETE: {}", self.name, path);

        self.store.delete(&path).await?;
        Ok(())
    }

    async fn get_range(&self, key: &str, range: ByteRange) -> Result<RangeResponse> {
        range.validate()?;
        let path = self.full_path(key)?;
        debug!("{} GET: {} Range: {}", self.name, path, range);

        let options = GetOptions {
            range: Some(range.into()),
            ..Default::default()
        };
        let result = self.store.get_opts(&path, options).await?;
        let content_length = (result.range.end - result.range.start) as u64;
        let status = if content_length == result.meta.size as u64
            && !matches!(range, ByteRange::Bounded { .. })
        {
            STATUS_OK
        } else {
            STATUS_PARTIAL_CONTENT
        };
        let body = result.into_stream().map_err(Error::from).boxed();

        Ok(RangeResponse {
            content_length,
            status,
            body,
        })
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let path = self.full_path(key)?;
        debug!("{} GET: {}", self.name, path);

        let result = self.store.get(&path).await?;
        Ok(result.bytes().await?)
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.full_path(key)?;
        debug!("{} PUT: {} ({} bytes)", self.name, path, data.len());

        self.store.put(&path, PutPayload::from_bytes(data)).await?;
        Ok(())
    }

    async fn put_file(
        &self,
        key: &str,
        file: &std::path::Path,
        part_size: usize,
        max_concurrency: usize,
    ) -> Result<()> {
        let path = self.full_path(key)?;
        debug!("{} PUT (buffered): {} <- {}", self.name, path, file.display());

        let mut reader = tokio::fs::File::open(file).await?;
        let mut writer = BufWriter::with_capacity(Arc::clone(&self.store), path, part_size)
            .with_max_concurrency(max_concurrency.max(1));
        tokio::io::copy(&mut reader, &mut writer).await?;
        writer.shutdown().await?;
        Ok(())
    }
}

fn parse_path(raw: &str) -> Result<Path> {
    Path::parse(raw)
        .map_err(|e| Error::Storage(StorageError::InvalidPath(format!("{:?}: {}", raw, e))))
}

/// Whether a read status carries a usable body.
pub(crate) fn is_success_status(status: u16) -> bool {
    status == STATUS_OK || status == STATUS_PARTIAL_CONTENT
}
