//! Storage backend abstraction and implementations.
//!
//! Everything above this module sees storage through [`ObjectBackend`].
//! [`StoreBackend`] is the one implementation, wrapping an
//! `object_store::ObjectStore` for S3-compatible buckets, a local directory
//! or process memory.

mod backend;
mod config;
mod filesystem;
mod memory;
mod range;
mod s3;
mod store;

pub use backend::{
    DeleteOutcome, ListPage, ListRecord, ObjectBackend, ObjectStat, RangeResponse, StatResult,
    STATUS_FORBIDDEN, STATUS_NOT_FOUND, STATUS_OK, STATUS_PARTIAL_CONTENT,
};
pub use config::StorageBackendConfig;
pub use range::ByteRange;
pub use s3::S3Config;
pub use store::StoreBackend;

pub(crate) use store::is_success_status;

use crate::Result;
use std::sync::Arc;

/// Build the backend described by `config`.
///
/// The S3 client connects lazily, so a bad endpoint surfaces on the first
/// request rather than here.
pub fn create_backend(config: &StorageBackendConfig) -> Result<Arc<dyn ObjectBackend>> {
    let backend = match config {
        StorageBackendConfig::S3(s3) => StoreBackend::s3(s3.clone())?,
        StorageBackendConfig::Filesystem { path } => StoreBackend::filesystem(path.clone())?,
        StorageBackendConfig::Memory => StoreBackend::memory(),
    };
    Ok(Arc::new(backend))
}
