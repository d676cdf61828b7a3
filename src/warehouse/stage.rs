//! Stage storage (local, S3, R2, GCS, Azure)
//!
//! A stage is a named folder under a storage root. Uploaded artifacts live
//! at `{root}/{stage}/{name}` and are read back by the warehouse through the
//! location string returned by [`StageArea::location`].

use crate::error::{Error, Result, ResultExt};
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::io::Write;
use std::sync::Arc;
use tracing::debug;

/// Storage root backing the warehouse stages
#[derive(Debug, Clone)]
pub struct StageArea {
    /// The object store implementation
    store: Arc<dyn ObjectStore>,
    /// Key prefix within the bucket/container
    prefix: String,
    /// `s3`, `r2`, `gs`, `az` or `file`
    scheme: String,
    /// Location prefix the warehouse reads from (`s3://bucket`, `/abs/dir`)
    base: String,
}

impl StageArea {
    /// Parse a storage URL and create the matching object store
    ///
    /// Supported formats:
    /// - `s3://bucket/path/` - AWS S3
    /// - `r2://bucket/path/` - Cloudflare R2 (S3-compatible)
    /// - `gs://bucket/path/` - Google Cloud Storage
    /// - `az://container/path/` - Azure Blob Storage
    /// - `/local/path/`, `./path/` or `file:///path` - Local filesystem
    pub fn parse(url: &str) -> Result<Self> {
        if let Some(rest) = url.strip_prefix("s3://") {
            Self::parse_s3(rest, false)
        } else if let Some(rest) = url.strip_prefix("r2://") {
            Self::parse_s3(rest, true)
        } else if let Some(rest) = url.strip_prefix("gs://") {
            Self::parse_gcs(rest)
        } else if let Some(rest) = url.strip_prefix("az://") {
            Self::parse_azure(rest)
        } else {
            Self::parse_local(url.strip_prefix("file://").unwrap_or(url))
        }
    }

    fn parse_s3(without_scheme: &str, is_r2: bool) -> Result<Self> {
        let scheme = if is_r2 { "r2" } else { "s3" };
        let (bucket, prefix) = split_bucket(without_scheme, scheme)?;

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        if is_r2 {
            // AWS_ENDPOINT is already read by from_env()
            if let Ok(endpoint) = std::env::var("R2_ENDPOINT_URL") {
                builder = builder.with_endpoint(endpoint);
            }
        }

        let store = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create {scheme} client: {e}")))?;

        // The warehouse reads R2 through its S3 endpoint settings
        Ok(Self {
            store: Arc::new(store),
            prefix,
            scheme: scheme.to_string(),
            base: format!("s3://{bucket}"),
        })
    }

    fn parse_gcs(without_scheme: &str) -> Result<Self> {
        let (bucket, prefix) = split_bucket(without_scheme, "gs")?;

        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| Error::config(format!("Failed to create GCS client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix,
            scheme: "gs".to_string(),
            base: format!("gs://{bucket}"),
        })
    }

    fn parse_azure(without_scheme: &str) -> Result<Self> {
        let (container, prefix) = split_bucket(without_scheme, "az")?;

        let store = MicrosoftAzureBuilder::from_env()
            .with_container_name(container)
            .build()
            .map_err(|e| Error::config(format!("Failed to create Azure client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix,
            scheme: "az".to_string(),
            base: format!("az://{container}"),
        })
    }

    fn parse_local(path: &str) -> Result<Self> {
        std::fs::create_dir_all(path)
            .map_err(|e| Error::config(format!("Failed to create directory {path}: {e}")))?;
        let root = std::fs::canonicalize(path)
            .map_err(|e| Error::config(format!("Failed to resolve directory {path}: {e}")))?;

        let store = LocalFileSystem::new_with_prefix(&root)
            .map_err(|e| Error::config(format!("Failed to create local store: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix: String::new(),
            scheme: "file".to_string(),
            base: root.to_string_lossy().trim_end_matches('/').to_string(),
        })
    }

    /// Check if the stage lives in cloud storage
    pub fn is_cloud(&self) -> bool {
        self.scheme != "file"
    }

    /// The scheme (s3, r2, gs, az, file)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    fn key(&self, stage: &str, name: &str) -> String {
        if self.prefix.is_empty() {
            format!("{stage}/{name}")
        } else {
            format!("{}/{stage}/{name}", self.prefix.trim_end_matches('/'))
        }
    }

    fn stage_prefix(&self, stage: &str) -> ObjectPath {
        if self.prefix.is_empty() {
            ObjectPath::from(stage)
        } else {
            ObjectPath::from(format!("{}/{stage}", self.prefix.trim_end_matches('/')))
        }
    }

    /// Location the warehouse reads an artifact from
    pub fn location(&self, stage: &str, name: &str) -> String {
        format!("{}/{}", self.base, self.key(stage, name))
    }

    /// Make sure the stage folder exists.
    ///
    /// Object stores have no folders; only the local backend needs this.
    pub async fn create(&self, stage: &str) -> Result<()> {
        if !self.is_cloud() {
            let dir = format!("{}/{stage}", self.base);
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create stage {dir}"))?;
        }
        Ok(())
    }

    /// Write bytes into a stage, returning the artifact location
    pub async fn put(&self, stage: &str, name: &str, data: Bytes) -> Result<String> {
        let path = ObjectPath::from(self.key(stage, name));
        let size = data.len();
        self.store.put(&path, data.into()).await?;
        debug!(scheme = %self.scheme, path = %path, size, "Uploaded staged artifact");
        Ok(self.location(stage, name))
    }

    /// Delete an artifact from a stage
    pub async fn delete(&self, stage: &str, name: &str) -> Result<()> {
        let path = ObjectPath::from(self.key(stage, name));
        self.store.delete(&path).await?;
        Ok(())
    }

    /// Names of the artifacts currently in a stage
    pub async fn list(&self, stage: &str) -> Result<Vec<String>> {
        let listing = self
            .store
            .list_with_delimiter(Some(&self.stage_prefix(stage)))
            .await?;
        let mut names: Vec<String> = listing
            .objects
            .iter()
            .filter_map(|meta| meta.location.filename().map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }
}

fn split_bucket<'a>(without_scheme: &'a str, scheme: &str) -> Result<(&'a str, String)> {
    let (bucket, prefix) = match without_scheme.find('/') {
        Some(idx) => (
            &without_scheme[..idx],
            without_scheme[idx + 1..].trim_end_matches('/').to_string(),
        ),
        None => (without_scheme, String::new()),
    };
    if bucket.is_empty() {
        return Err(Error::config(format!(
            "Invalid {scheme} URL: missing bucket name"
        )));
    }
    Ok((bucket, prefix))
}

/// Gzip a buffer
pub fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 4), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
