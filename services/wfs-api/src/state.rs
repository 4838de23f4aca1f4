//! Application state for the WFS API.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::{info, warn};

use storage::{BlobStorage, CursorStore, FeatureStore, MemoryFeatureStore, PgFeatureStore};

use crate::capture::IndexCaptureEncoder;
use crate::config::WfsConfig;
use crate::executor::{FeatureQueryExecutor, LayerCatalog};
use crate::metrics::WfsMetrics;
use crate::paging::PagingService;

/// Shared application state.
pub struct AppState {
    /// Result set registry
    pub cursors: Arc<CursorStore>,

    /// GetFeature execution
    pub executor: Arc<dyn FeatureQueryExecutor>,

    /// Hits encoding for index queries
    pub capture: IndexCaptureEncoder,

    /// PageResults execution
    pub paging: PagingService,

    pub metrics: Arc<WfsMetrics>,

    /// Prometheus exporter, when installed
    pub prometheus: Option<PrometheusHandle>,

    /// Base URL used when a request carries no Host header
    pub base_url: String,
}

impl AppState {
    /// Create a new AppState from configuration.
    pub async fn new(config: &WfsConfig, prometheus: Option<PrometheusHandle>) -> Result<Self> {
        let features: Arc<dyn FeatureStore> = match &config.database_url {
            Some(url) => {
                let store = PgFeatureStore::connect(url, config.database_max_connections)
                    .await
                    .context("Failed to connect to result set database")?;
                store
                    .ensure_schema()
                    .await
                    .context("Failed to create result set schema")?;
                info!("Result sets stored in PostgreSQL");
                Arc::new(store)
            }
            None => {
                warn!("DATABASE_URL not set, result set records are kept in memory");
                Arc::new(MemoryFeatureStore::new())
            }
        };

        let blobs = BlobStorage::new(&config.blob_storage)
            .context("Failed to open result set storage")?;
        info!(storage = %blobs.description(), "Stored requests location");

        let catalog = LayerCatalog::load_from_dir(&config.layers_dir)?;
        info!(layers = catalog.len(), dir = %config.layers_dir.display(), "Loaded layer catalog");

        let mut state = Self::from_parts(
            Arc::new(CursorStore::new(features, blobs)),
            Arc::new(catalog),
            config.base_url.clone(),
        );
        state.prometheus = prometheus;
        Ok(state)
    }

    /// Assemble state from already built components.
    pub fn from_parts(
        cursors: Arc<CursorStore>,
        executor: Arc<dyn FeatureQueryExecutor>,
        base_url: impl Into<String>,
    ) -> Self {
        let metrics = Arc::new(WfsMetrics::new());
        Self {
            capture: IndexCaptureEncoder::new(Arc::clone(&cursors), Arc::clone(&metrics)),
            paging: PagingService::new(
                Arc::clone(&cursors),
                Arc::clone(&executor),
                Arc::clone(&metrics),
            ),
            cursors,
            executor,
            metrics,
            prometheus: None,
            base_url: base_url.into(),
        }
    }
}
