//! Configuration structures for bucket operations.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::storage::StorageBackendConfig;

/// Keys per batch when the configured value is zero.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Concurrent batches when the configured value is zero.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 20;

/// Records requested per listing page. This is the protocol maximum and
/// cannot be configured.
pub const LIST_PAGE_LIMIT: usize = 1000;

/// Smallest part size handed to the backend's buffered writer.
pub const MIN_PART_SIZE: u64 = 4 * 1024 * 1024;

/// Files above this size are streamed instead of sent in one request.
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 50 * 1024 * 1024;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Storage configuration (S3, Filesystem, Memory)
    pub storage: StorageBackendConfig,

    /// Bulk stat / delete options
    #[serde(default)]
    pub batch: BatchOptions,

    /// Upload / download options
    #[serde(default)]
    pub transfer: TransferOptions,
}

impl Config {
    /// Build a configuration with default options around a storage config
    pub fn new(storage: StorageBackendConfig) -> Self {
        Self {
            storage,
            batch: BatchOptions::default(),
            transfer: TransferOptions::default(),
        }
    }

    /// Parse a YAML document
    pub fn from_yaml(content: &str) -> crate::Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if let StorageBackendConfig::S3(s3) = &self.storage {
            if s3.bucket.trim().is_empty() {
                return Err(crate::Error::Config(
                    "S3 bucket must not be empty".to_string(),
                ));
            }
        }

        self.transfer.retry.validate()?;

        Ok(())
    }
}

/// Options for the batch dispatcher.
///
/// Zero means "use the default" for both fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Keys per batch (default: 100)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum batches in flight (default: 20)
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
}

impl BatchOptions {
    pub fn new(batch_size: usize, batch_concurrency: usize) -> Self {
        Self {
            batch_size,
            batch_concurrency,
        }
    }

    /// Batch size with zero replaced by the default
    pub fn effective_batch_size(&self) -> usize {
        if self.batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            self.batch_size
        }
    }

    /// Batch concurrency with zero replaced by the default
    pub fn effective_batch_concurrency(&self) -> usize {
        if self.batch_concurrency == 0 {
            DEFAULT_BATCH_CONCURRENCY
        } else {
            self.batch_concurrency
        }
    }

    /// Workers needed for `key_count` keys: one per batch, capped by the
    /// configured concurrency.
    pub fn concurrency_for(&self, key_count: usize) -> usize {
        let batches = key_count.div_ceil(self.effective_batch_size());
        batches.min(self.effective_batch_concurrency())
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_concurrency: default_batch_concurrency(),
        }
    }
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_batch_concurrency() -> usize {
    DEFAULT_BATCH_CONCURRENCY
}

/// Options for uploads and downloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOptions {
    /// Part size in MiB for streamed uploads (floor: 4 MiB)
    #[serde(default)]
    pub part_size_mb: u64,

    /// Concurrent part uploads (default: 20)
    #[serde(default = "default_up_concurrency")]
    pub up_concurrency: usize,

    /// Files larger than this are streamed (default: 50 MiB)
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold_bytes: u64,

    /// Retry policy for single-object transfers
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl TransferOptions {
    /// Part size in bytes, never below [`MIN_PART_SIZE`]
    pub fn part_size(&self) -> u64 {
        (self.part_size_mb.saturating_mul(1024 * 1024)).max(MIN_PART_SIZE)
    }
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            part_size_mb: 0,
            up_concurrency: default_up_concurrency(),
            multipart_threshold_bytes: default_multipart_threshold(),
            retry: RetryPolicy::default(),
        }
    }
}

fn default_up_concurrency() -> usize {
    20
}

fn default_multipart_threshold() -> u64 {
    DEFAULT_MULTIPART_THRESHOLD
}

/// Exponential backoff policy for single-object transfers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds (default: 100)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound for a single delay in milliseconds (default: 5000)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// A policy that makes a single attempt
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.max_attempts == 0 {
            return Err(crate::Error::Config(
                "retry.max_attempts must be > 0".to_string(),
            ));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(crate::Error::Config(format!(
                "retry.base_delay_ms ({}) > retry.max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5000
}
