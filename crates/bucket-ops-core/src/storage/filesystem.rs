//! Filesystem storage backend.

use object_store::local::LocalFileSystem;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::StoreBackend;
use crate::Result;

impl StoreBackend {
    /// Create a backend rooted at a local directory, creating it if needed.
    ///
    /// Directory walks are not sorted, so listing pages are assembled by
    /// sorting the matching keys on every call.
    pub fn filesystem(base_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&base_path)?;
        let store = LocalFileSystem::new_with_prefix(&base_path)?;
        info!("Created filesystem backend at {}", base_path.display());
        Ok(Self::from_store(Arc::new(store), None, "filesystem", false))
    }
}
