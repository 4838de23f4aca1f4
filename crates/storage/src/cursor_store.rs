//! Persistent result set cursors.
//!
//! A cursor lives in two places: a record in the feature store (creation and
//! last-use times) and a snapshot blob named `<token>.feature`. A single
//! process-wide lock keeps the two consistent. Every operation that writes,
//! including loading a cursor (which advances its `updated` time), holds the
//! write lock for its whole duration.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use wfs_common::{is_valid_token, WfsError, WfsResult};

use crate::feature_store::{CursorRecord, FeatureStore, FeatureTransaction, IdFilter};
use crate::object_store::BlobStorage;
use crate::snapshot::StoredRequestSnapshot;

/// Mint a new result set token: a random UUID without hyphens.
pub fn mint_token() -> String {
    Uuid::new_v4().simple().to_string()
}

fn blob_path(token: &str) -> String {
    format!("{}.feature", token)
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Statistics from an expiry pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExpireStats {
    /// Number of records removed from the feature store
    pub records_deleted: u64,
    /// Number of snapshot blobs removed
    pub blobs_deleted: u64,
    /// Number of cursors that could not be removed
    pub delete_errors: u64,
}

/// Registry of result set cursors.
pub struct CursorStore {
    features: Arc<dyn FeatureStore>,
    blobs: BlobStorage,
    lock: RwLock<()>,
}

impl CursorStore {
    pub fn new(features: Arc<dyn FeatureStore>, blobs: BlobStorage) -> Self {
        Self {
            features,
            blobs,
            lock: RwLock::new(()),
        }
    }

    /// Persist a new cursor: the feature store record, then the snapshot blob.
    ///
    /// Any failure is reported as `CursorPersist`. A record written before a
    /// failing blob write is not removed.
    #[instrument(skip(self, snapshot), fields(document = snapshot.is_document()))]
    pub async fn create_cursor(
        &self,
        token: &str,
        snapshot: &StoredRequestSnapshot,
    ) -> WfsResult<CursorRecord> {
        let persist_error = |e: WfsError| WfsError::CursorPersist {
            token: token.to_string(),
            message: e.to_string(),
        };

        let _guard = self.lock.write().await;

        let now = now_millis();
        let record = CursorRecord {
            id: token.to_string(),
            created: now,
            updated: now,
        };
        self.features.insert(&record).await.map_err(persist_error)?;

        let bytes = snapshot.to_bytes().map_err(persist_error)?;
        self.blobs
            .put(&blob_path(token), bytes)
            .await
            .map_err(persist_error)?;

        info!(token = %token, "Created result set");
        Ok(record)
    }

    /// Load a cursor's snapshot and advance its `updated` time.
    ///
    /// The timestamp update runs in a transaction that is only committed once
    /// the snapshot has been read and decoded; on any failure it is rolled back.
    pub async fn load_and_touch(&self, token: &str) -> WfsResult<StoredRequestSnapshot> {
        self.load_and_touch_with(token, Ok).await
    }

    /// Like [`load_and_touch`](Self::load_and_touch), but `rebuild` also runs
    /// before the commit. An error from `rebuild` rolls the touch back.
    #[instrument(skip(self, rebuild))]
    pub async fn load_and_touch_with<T, F>(&self, token: &str, rebuild: F) -> WfsResult<T>
    where
        F: FnOnce(StoredRequestSnapshot) -> WfsResult<T>,
    {
        if !is_valid_token(token) {
            return Err(WfsError::CursorNotFound(token.to_string()));
        }

        let _guard = self.lock.write().await;

        let mut tx = self.features.begin().await?;
        let loaded = match self.touch_and_read(tx.as_mut(), token).await {
            Ok(snapshot) => rebuild(snapshot),
            Err(e) => Err(e),
        };

        match loaded {
            Ok(value) => {
                tx.commit().await?;
                debug!(token = %token, "Loaded result set");
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(token = %token, error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Current record for a token, without touching it.
    pub async fn record(&self, token: &str) -> WfsResult<Option<CursorRecord>> {
        let _guard = self.lock.read().await;
        self.features.get(token).await
    }

    /// Number of cursors in the feature store.
    pub async fn count(&self) -> WfsResult<u64> {
        let _guard = self.lock.read().await;
        self.features.count().await
    }

    /// Remove cursors not used since `cutoff` (epoch millis).
    ///
    /// The blob goes first; a cursor whose blob cannot be deleted keeps its
    /// record so the next pass retries it.
    #[instrument(skip(self))]
    pub async fn expire_updated_before(&self, cutoff: i64) -> WfsResult<ExpireStats> {
        let _guard = self.lock.write().await;
        let mut stats = ExpireStats::default();

        for token in self.features.updated_before(cutoff).await? {
            if let Err(e) = self.blobs.delete(&blob_path(&token)).await {
                warn!(token = %token, error = %e, "Failed to delete result set blob");
                stats.delete_errors += 1;
                continue;
            }
            stats.blobs_deleted += 1;

            match self.features.delete(&IdFilter::id_equals(&token)).await {
                Ok(n) => stats.records_deleted += n,
                Err(e) => {
                    warn!(token = %token, error = %e, "Failed to delete result set record");
                    stats.delete_errors += 1;
                }
            }
        }

        Ok(stats)
    }
}
