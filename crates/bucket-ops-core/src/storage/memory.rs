//! In-memory storage backend for testing.

use object_store::memory::InMemory;
use std::sync::Arc;

use super::StoreBackend;

impl StoreBackend {
    /// Create an in-memory backend.
    ///
    /// Data does not outlive the backend, which makes it mostly useful for
    /// tests.
    pub fn memory() -> Self {
        Self::from_store(Arc::new(InMemory::new()), None, "memory", true)
    }
}
