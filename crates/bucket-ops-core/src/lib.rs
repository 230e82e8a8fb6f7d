//! Bucket Ops Core Library
//!
//! This crate provides bulk operations over object storage: a
//! bounded-concurrency batch engine for stat and delete, marker-based
//! listing, and upload/download helpers with retry.

pub mod config;
pub mod engine;
pub mod error;
pub mod lister;
pub mod storage;
pub mod transfer;

pub use config::{BatchOptions, Config, RetryPolicy, TransferOptions};
pub use engine::{BatchDispatcher, KeyPaginator, PageState, WorkerPool};
pub use error::{Error, Result, StorageError};
pub use lister::Lister;
pub use storage::{
    create_backend, ByteRange, DeleteOutcome, ListPage, ListRecord, ObjectBackend, ObjectStat,
    S3Config, StatResult, StorageBackendConfig, StoreBackend,
};
pub use transfer::{Downloader, Uploader};
