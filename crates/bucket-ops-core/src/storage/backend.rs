//! Object backend capability trait and the records it produces.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::ByteRange;
use crate::error::StorageError;
use crate::Result;

/// HTTP-style status reported for a key that exists.
pub const STATUS_OK: u16 = 200;
/// Status reported for a successful ranged read.
pub const STATUS_PARTIAL_CONTENT: u16 = 206;
/// Status reported when access to a key is denied.
pub const STATUS_FORBIDDEN: u16 = 403;
/// Status reported for a key that does not exist.
pub const STATUS_NOT_FOUND: u16 = 404;

/// One object produced by a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRecord {
    /// Object key
    pub key: String,
    /// ETag or content hash (if the backend reports one)
    pub hash: Option<String>,
    /// Size in bytes
    pub size: u64,
    /// Last modified time
    pub last_modified: DateTime<Utc>,
    /// Owner identifier (if the backend reports one)
    pub owner: Option<String>,
}

/// A single page of a marker-based listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub records: Vec<ListRecord>,
    /// Marker to continue from; empty when the listing is exhausted.
    pub next_marker: String,
}

impl ListPage {
    /// Whether this page is the last one of the listing.
    pub fn is_last(&self) -> bool {
        self.next_marker.is_empty()
    }
}

/// Per-key result of a bulk stat.
///
/// A key that could not be read has `size == -1` and a status above 300.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatResult {
    pub key: String,
    pub size: i64,
    pub status: u16,
}

impl StatResult {
    pub fn found(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size: size as i64,
            status: STATUS_OK,
        }
    }

    pub fn missing(key: impl Into<String>, status: u16) -> Self {
        Self {
            key: key.into(),
            size: -1,
            status,
        }
    }

    /// Whether the key was read successfully.
    pub fn is_found(&self) -> bool {
        self.status <= 300 && self.size >= 0
    }
}

/// A key that failed to delete, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub key: String,
    pub code: String,
    pub message: String,
}

impl DeleteOutcome {
    pub fn new(key: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    /// Build an outcome from the error the backend reported for `key`.
    pub fn from_error(key: &str, error: &StorageError) -> Self {
        let code = match error {
            StorageError::NotFound(_) => "NoSuchKey",
            StorageError::PermissionDenied(_) => "AccessDenied",
            StorageError::Unauthenticated(_) => "InvalidAccessKeyId",
            StorageError::InvalidPath(_) => "InvalidArgument",
            StorageError::Backend(_) | StorageError::UnexpectedStatus { .. } => "InternalError",
        };
        Self::new(key, code, error.to_string())
    }
}

/// Metadata of a single object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStat {
    pub hash: Option<String>,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub mime_type: Option<String>,
}

/// Body of a ranged read.
pub struct RangeResponse {
    /// Number of bytes the body will yield
    pub content_length: u64,
    /// Status of the read (206 for a partial body)
    pub status: u16,
    pub body: BoxStream<'static, Result<Bytes>>,
}

impl std::fmt::Debug for RangeResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeResponse")
            .field("content_length", &self.content_length)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Capabilities the batch engine and the facades need from a storage
/// service. An implementation is bound to a single bucket.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Short backend name for logging (s3, filesystem, memory)
    fn name(&self) -> &str;

    /// Fetch one page of keys starting with `prefix`, strictly after
    /// `marker` (an empty marker starts from the beginning). At most
    /// `limit` records are returned.
    async fn list_page(&self, prefix: &str, marker: &str, limit: usize) -> Result<ListPage>;

    /// Stat a key as part of a bulk call. Missing or forbidden keys are
    /// reported in the result; only transport failures are errors.
    async fn stat_key(&self, key: &str) -> Result<StatResult>;

    /// Full metadata of a single object.
    async fn get_metadata(&self, key: &str) -> Result<ObjectStat>;

    /// Delete `keys` in one round trip where the backend supports it.
    /// Returns the keys that failed, in request order.
    async fn batch_delete(&self, keys: &[String]) -> Result<Vec<DeleteOutcome>>;

    /// Delete a single key
    async fn delete_one(&self, key: &str) -> Result<()>;

    /// Read a byte range of an object
    async fn get_range(&self, key: &str, range: ByteRange) -> Result<RangeResponse>;

    /// Read a whole object
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Write data to a key
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Stream a local file into a key, buffering `part_size` bytes at a
    /// time with up to `max_concurrency` parts in flight
    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        part_size: usize,
        max_concurrency: usize,
    ) -> Result<()>;
}
