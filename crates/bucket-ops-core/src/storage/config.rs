//! Storage configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::S3Config;
use crate::{Error, Result};

/// Which store to talk to, selected by the `backend` tag in YAML:
///
/// ```yaml
/// backend: s3
/// bucket: media
/// endpoint: http://minio:9000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageBackendConfig {
    S3(S3Config),
    /// Objects are files below `path`
    Filesystem { path: PathBuf },
    /// Process-local store, mostly for tests
    Memory,
}

impl StorageBackendConfig {
    /// Parse a storage URL.
    ///
    /// - `s3://bucket/optional/prefix?region=..&endpoint=..&path_style=true`
    ///   (`s3a://` and `obs://` are accepted as aliases)
    /// - `file:///path/to/dir`
    /// - `memory://`
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::Config(format!("invalid storage URL {:?}: {}", url, e)))?;

        match parsed.scheme() {
            "s3" | "s3a" | "obs" => Ok(Self::S3(s3_from_url(&parsed)?)),
            "file" => Ok(Self::Filesystem {
                path: PathBuf::from(parsed.path()),
            }),
            "memory" => Ok(Self::Memory),
            other => Err(Error::Config(format!(
                "unsupported storage scheme {:?} (expected s3, file or memory)",
                other
            ))),
        }
    }

    /// Key prefix applied to every operation, if any
    pub fn prefix(&self) -> Option<&str> {
        match self {
            Self::S3(s3) => s3.prefix.as_deref(),
            Self::Filesystem { .. } | Self::Memory => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::S3(_) => "s3",
            Self::Filesystem { .. } => "filesystem",
            Self::Memory => "memory",
        }
    }
}

fn s3_from_url(url: &url::Url) -> Result<S3Config> {
    let bucket = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::Config(format!("no bucket in storage URL {}", url)))?;

    let mut config = S3Config::new(bucket);
    for (name, value) in url.query_pairs() {
        match name.as_ref() {
            "region" => config.region = Some(value.into_owned()),
            "endpoint" => {
                config.allow_http = value.starts_with("http://");
                config.endpoint = Some(value.into_owned());
            }
            "path_style" => config.path_style = value == "true",
            _ => {}
        }
    }

    let path = url.path().trim_matches('/');
    if !path.is_empty() {
        config.prefix = Some(path.to_string());
    }
    Ok(config)
}
