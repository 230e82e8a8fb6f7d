//! S3 and S3-compatible buckets (MinIO, Ceph RGW, Huawei OBS).

use object_store::aws::{AmazonS3Builder, AmazonS3ConfigKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::StoreBackend;
use crate::error::StorageError;
use crate::{Error, Result};

/// Connection settings for one bucket.
///
/// Anything left unset is picked up from the `AWS_*` environment
/// variables by the underlying client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    #[serde(default)]
    pub region: Option<String>,
    /// Service URL, e.g. `http://minio:9000` or an OBS regional endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Every key is stored below this prefix
    #[serde(default)]
    pub prefix: Option<String>,
    /// Address the bucket in the path instead of the host name.
    /// Implied when `endpoint` is set.
    #[serde(default)]
    pub path_style: bool,
    #[serde(default)]
    pub allow_http: bool,
}

impl S3Config {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    /// Client options derived from these settings, in the order they are applied.
    fn client_options(&self) -> Vec<(AmazonS3ConfigKey, String)> {
        let optional = [
            (AmazonS3ConfigKey::Region, &self.region),
            (AmazonS3ConfigKey::Endpoint, &self.endpoint),
            (AmazonS3ConfigKey::AccessKeyId, &self.access_key),
            (AmazonS3ConfigKey::SecretAccessKey, &self.secret_key),
        ];

        let mut options = vec![(AmazonS3ConfigKey::Bucket, self.bucket.clone())];
        options.extend(
            optional
                .into_iter()
                .filter_map(|(key, value)| value.clone().map(|v| (key, v))),
        );
        if self.path_style || self.endpoint.is_some() {
            options.push((
                AmazonS3ConfigKey::VirtualHostedStyleRequest,
                "false".to_string(),
            ));
        }
        options
    }
}

impl StoreBackend {
    /// Connect to an S3 bucket. No request is sent until the first operation.
    pub fn s3(config: S3Config) -> Result<Self> {
        if config.bucket.trim().is_empty() {
            return Err(Error::Config("S3 bucket is required".to_string()));
        }

        let store = config
            .client_options()
            .into_iter()
            .fold(AmazonS3Builder::from_env(), |builder, (key, value)| {
                builder.with_config(key, value)
            })
            .with_allow_http(config.allow_http)
            .build()
            .map_err(|e| {
                Error::Storage(StorageError::Backend(format!(
                    "cannot configure bucket {}: {}",
                    config.bucket, e
                )))
            })?;

        info!(
            bucket = %config.bucket,
            endpoint = config.endpoint.as_deref().unwrap_or("aws"),
            "S3 backend ready"
        );
        Ok(Self::from_store(Arc::new(store), config.prefix, "s3", true))
    }
}
