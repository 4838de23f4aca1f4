//! Service configuration from environment variables.

use anyhow::{bail, Result};
use std::path::PathBuf;

use storage::{BlobBackend, BlobStorageConfig};

use crate::cleanup::CleanupConfig;

/// Configuration for the WFS service.
#[derive(Debug, Clone)]
pub struct WfsConfig {
    /// PostgreSQL URL for result set records; `None` keeps them in memory
    pub database_url: Option<String>,

    /// Connection pool size for the result set database
    pub database_max_connections: u32,

    /// Where stored requests are written
    pub blob_storage: BlobStorageConfig,

    /// Directory of GeoJSON layers served by GetFeature
    pub layers_dir: PathBuf,

    /// Public URL of the WFS endpoint, used when a request carries no Host header
    pub base_url: String,

    /// Result set expiry
    pub cleanup: CleanupConfig,
}

impl WfsConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through a variable lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let database_max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let backend = match lookup("CURSOR_BLOB_BACKEND")
            .unwrap_or_else(|| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "local" => BlobBackend::Local {
                root: lookup("CURSOR_STORAGE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./data/resultsets")),
            },
            "memory" => BlobBackend::Memory,
            "s3" => BlobBackend::S3 {
                endpoint: lookup("S3_ENDPOINT")
                    .unwrap_or_else(|| "http://localhost:9000".to_string()),
                bucket: lookup("S3_BUCKET").unwrap_or_else(|| "wfs-resultsets".to_string()),
                access_key_id: lookup("S3_ACCESS_KEY").unwrap_or_else(|| "minioadmin".to_string()),
                secret_access_key: lookup("S3_SECRET_KEY")
                    .unwrap_or_else(|| "minioadmin".to_string()),
                region: lookup("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                allow_http: lookup("S3_ALLOW_HTTP")
                    .map(|v| v.to_lowercase() == "true" || v == "1")
                    .unwrap_or(true),
            },
            other => bail!(
                "Unknown CURSOR_BLOB_BACKEND '{}' (expected local, memory or s3)",
                other
            ),
        };

        let blob_storage = BlobStorageConfig {
            backend,
            prefix: lookup("CURSOR_BLOB_PREFIX").unwrap_or_default(),
        };

        let layers_dir = lookup("WFS_LAYERS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./config/layers"));

        let base_url = lookup("WFS_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8084/wfs".to_string());

        Ok(Self {
            database_url,
            database_max_connections,
            blob_storage,
            layers_dir,
            base_url,
            cleanup: CleanupConfig::from_lookup(&lookup),
        })
    }
}
