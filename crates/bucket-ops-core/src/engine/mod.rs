//! Bounded-concurrency batch engine.
//!
//! - [`WorkerPool`] runs submitted units with a fixed concurrency limit
//! - [`KeyPaginator`] walks a marker-based listing one page at a time
//! - [`BatchDispatcher`] runs bulk stat and bulk delete in chunks
//! - [`list_prefix`] / [`list_prefix_to_channel`] drain a listing

mod collect;
mod dispatcher;
mod paginator;
mod pool;
mod slots;

pub use collect::{list_prefix, list_prefix_to_channel, LIST_CHANNEL_DEPTH};
pub use dispatcher::BatchDispatcher;
pub use paginator::{KeyPaginator, PageState};
pub use pool::{PoolSubmitter, WorkUnit, WorkerPool};
pub use slots::{SlotBuffer, SlotRange};
