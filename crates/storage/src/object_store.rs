//! Blob storage for stored requests (local directory, memory, MinIO/S3).

use bytes::Bytes;
use object_store::{
    aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory, path::Path, ObjectStore,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument};

use wfs_common::{WfsError, WfsResult};

/// Where blobs are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlobBackend {
    /// A directory on the local filesystem
    Local { root: PathBuf },
    /// Process memory (lost on restart)
    Memory,
    /// S3-compatible bucket
    S3 {
        endpoint: String,
        bucket: String,
        access_key_id: String,
        secret_access_key: String,
        region: String,
        allow_http: bool,
    },
}

/// Configuration for blob storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStorageConfig {
    pub backend: BlobBackend,
    /// Prefix prepended to every blob path
    pub prefix: String,
}

impl Default for BlobStorageConfig {
    fn default() -> Self {
        Self {
            backend: BlobBackend::Local {
                root: PathBuf::from("./data/resultsets"),
            },
            prefix: String::new(),
        }
    }
}

/// Blob storage client.
#[derive(Clone)]
pub struct BlobStorage {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    description: String,
}

impl std::fmt::Debug for BlobStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStorage")
            .field("description", &self.description)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl BlobStorage {
    /// Create a new blob storage client from config.
    pub fn new(config: &BlobStorageConfig) -> WfsResult<Self> {
        let (store, description): (Arc<dyn ObjectStore>, String) = match &config.backend {
            BlobBackend::Local { root } => {
                std::fs::create_dir_all(root).map_err(|e| {
                    WfsError::StorageError(format!("Failed to create {}: {}", root.display(), e))
                })?;
                let store = LocalFileSystem::new_with_prefix(root).map_err(|e| {
                    WfsError::StorageError(format!("Failed to open {}: {}", root.display(), e))
                })?;
                (Arc::new(store), format!("local:{}", root.display()))
            }
            BlobBackend::Memory => (Arc::new(InMemory::new()), "memory".to_string()),
            BlobBackend::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
                allow_http,
            } => {
                let mut builder = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_bucket_name(bucket)
                    .with_access_key_id(access_key_id)
                    .with_secret_access_key(secret_access_key)
                    .with_region(region);

                if *allow_http {
                    builder = builder.with_allow_http(true);
                }

                let store = builder.build().map_err(|e| {
                    WfsError::StorageError(format!("Failed to create S3 client: {}", e))
                })?;
                (Arc::new(store), format!("s3:{}", bucket))
            }
        };

        Ok(Self {
            store,
            prefix: config.prefix.trim_matches('/').to_string(),
            description,
        })
    }

    /// Blob storage held in memory.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            prefix: String::new(),
            description: "memory".to_string(),
        }
    }

    /// Blob storage rooted at a local directory.
    pub fn local(root: impl Into<PathBuf>) -> WfsResult<Self> {
        Self::new(&BlobStorageConfig {
            backend: BlobBackend::Local { root: root.into() },
            prefix: String::new(),
        })
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    fn location(&self, path: &str) -> Path {
        if self.prefix.is_empty() {
            Path::from(path)
        } else {
            Path::from(format!("{}/{}", self.prefix, path))
        }
    }

    /// Write bytes to a path.
    #[instrument(skip(self, data), fields(store = %self.description, path = %path))]
    pub async fn put(&self, path: &str, data: Bytes) -> WfsResult<()> {
        let location = self.location(path);
        debug!(size = data.len(), "Writing blob");

        self.store
            .put(&location, data.into())
            .await
            .map_err(|e| WfsError::StorageError(format!("Failed to write {}: {}", path, e)))?;

        Ok(())
    }

    /// Read bytes from a path. A missing blob is `None`.
    #[instrument(skip(self), fields(store = %self.description, path = %path))]
    pub async fn get(&self, path: &str) -> WfsResult<Option<Bytes>> {
        let location = self.location(path);

        let result = match self.store.get(&location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => {
                return Err(WfsError::StorageError(format!(
                    "Failed to read {}: {}",
                    path, e
                )))
            }
        };

        let bytes = result
            .bytes()
            .await
            .map_err(|e| WfsError::StorageError(format!("Failed to read bytes: {}", e)))?;

        debug!(size = bytes.len(), "Read blob");
        Ok(Some(bytes))
    }

    /// Check if a blob exists.
    pub async fn exists(&self, path: &str) -> WfsResult<bool> {
        match self.store.head(&self.location(path)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(WfsError::StorageError(format!(
                "Failed to check {}: {}",
                path, e
            ))),
        }
    }

    /// Delete a blob. Deleting a missing blob is not an error.
    #[instrument(skip(self), fields(store = %self.description, path = %path))]
    pub async fn delete(&self, path: &str) -> WfsResult<()> {
        match self.store.delete(&self.location(path)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(WfsError::StorageError(format!(
                "Failed to delete {}: {}",
                path, e
            ))),
        }
    }

    /// Number of blobs under the prefix.
    pub async fn count(&self) -> WfsResult<u64> {
        use futures::TryStreamExt;

        let prefix = (!self.prefix.is_empty()).then(|| Path::from(self.prefix.as_str()));
        let mut stream = self.store.list(prefix.as_ref());
        let mut count = 0;
        while stream
            .try_next()
            .await
            .map_err(|e| WfsError::StorageError(format!("List failed: {}", e)))?
            .is_some()
        {
            count += 1;
        }
        Ok(count)
    }
}
