pub mod delete;
pub mod list;
pub mod stat;
pub mod transfer;

use anyhow::{Context as _, Result};
use bucket_ops_core::{create_backend, Config, ObjectBackend, StorageBackendConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Where the storage configuration comes from
pub enum StorageSource {
    File(PathBuf),
    Url(String),
}

/// Output format for listing and stat results
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "yaml" => Self::Yaml,
            _ => Self::Text,
        }
    }
}

/// Everything a command needs: configuration, backend and the shared
/// cancellation token.
pub struct Context {
    pub config: Config,
    pub backend: Arc<dyn ObjectBackend>,
    pub cancel: CancellationToken,
}

impl Context {
    pub fn load(
        source: StorageSource,
        batch_size: Option<usize>,
        batch_concurrency: Option<usize>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let mut config = match source {
            StorageSource::File(path) => {
                info!("Loading configuration from: {}", path.display());
                Config::load(&path)
                    .with_context(|| format!("failed to load {}", path.display()))?
            }
            StorageSource::Url(url) => {
                let storage = StorageBackendConfig::from_url(&url)?;
                Config::new(storage)
            }
        };

        if let Some(size) = batch_size {
            config.batch.batch_size = size;
        }
        if let Some(concurrency) = batch_concurrency {
            config.batch.batch_concurrency = concurrency;
        }
        config.validate()?;

        let backend = create_backend(&config.storage)?;
        info!("Using {} storage", backend.name());

        Ok(Self {
            config,
            backend,
            cancel,
        })
    }
}
