//! Generic feature store holding one record per result set.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use wfs_common::{WfsError, WfsResult};

/// A result set record: token plus creation and last-use times (epoch millis).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorRecord {
    pub id: String,
    pub created: i64,
    pub updated: i64,
}

/// Selects records by identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdFilter {
    pub id: String,
}

impl IdFilter {
    pub fn id_equals(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Store of result set records.
#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// Create the backing table/type if it does not exist.
    async fn ensure_schema(&self) -> WfsResult<()>;

    /// Insert a new record. Fails if the id already exists.
    async fn insert(&self, record: &CursorRecord) -> WfsResult<()>;

    async fn get(&self, id: &str) -> WfsResult<Option<CursorRecord>>;

    /// Start a transaction for updates.
    async fn begin(&self) -> WfsResult<Box<dyn FeatureTransaction>>;

    /// Ids of records last used before `cutoff` (epoch millis).
    async fn updated_before(&self, cutoff: i64) -> WfsResult<Vec<String>>;

    /// Delete matching records, returning how many were removed.
    async fn delete(&self, filter: &IdFilter) -> WfsResult<u64>;

    async fn count(&self) -> WfsResult<u64>;
}

/// Updates staged against a [`FeatureStore`], applied on commit.
#[async_trait]
pub trait FeatureTransaction: Send {
    /// Advance `updated` on matching records. `updated` never moves backwards.
    async fn touch(&mut self, filter: &IdFilter, updated: i64) -> WfsResult<u64>;

    async fn commit(self: Box<Self>) -> WfsResult<()>;

    async fn rollback(self: Box<Self>) -> WfsResult<()>;
}

type Records = Arc<RwLock<HashMap<String, CursorRecord>>>;

/// In-process feature store, for tests and single-node deployments.
#[derive(Debug, Clone, Default)]
pub struct MemoryFeatureStore {
    records: Records,
}

impl MemoryFeatureStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeatureStore for MemoryFeatureStore {
    async fn ensure_schema(&self) -> WfsResult<()> {
        Ok(())
    }

    async fn insert(&self, record: &CursorRecord) -> WfsResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(WfsError::DatabaseError(format!(
                "duplicate result set id {}",
                record.id
            )));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> WfsResult<Option<CursorRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn begin(&self) -> WfsResult<Box<dyn FeatureTransaction>> {
        Ok(Box::new(MemoryTransaction {
            records: Arc::clone(&self.records),
            staged: Vec::new(),
        }))
    }

    async fn updated_before(&self, cutoff: i64) -> WfsResult<Vec<String>> {
        let records = self.records.read().await;
        let mut ids: Vec<String> = records
            .values()
            .filter(|r| r.updated < cutoff)
            .map(|r| r.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn delete(&self, filter: &IdFilter) -> WfsResult<u64> {
        Ok(self.records.write().await.remove(&filter.id).map_or(0, |_| 1))
    }

    async fn count(&self) -> WfsResult<u64> {
        Ok(self.records.read().await.len() as u64)
    }
}

struct MemoryTransaction {
    records: Records,
    staged: Vec<(String, i64)>,
}

#[async_trait]
impl FeatureTransaction for MemoryTransaction {
    async fn touch(&mut self, filter: &IdFilter, updated: i64) -> WfsResult<u64> {
        if !self.records.read().await.contains_key(&filter.id) {
            return Ok(0);
        }
        self.staged.push((filter.id.clone(), updated));
        Ok(1)
    }

    async fn commit(self: Box<Self>) -> WfsResult<()> {
        let mut records = self.records.write().await;
        for (id, updated) in self.staged {
            if let Some(record) = records.get_mut(&id) {
                record.updated = record.updated.max(updated);
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> WfsResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, at: i64) -> CursorRecord {
        CursorRecord {
            id: id.to_string(),
            created: at,
            updated: at,
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let store = MemoryFeatureStore::new();
        store.insert(&record("a", 1)).await.unwrap();
        assert!(store.insert(&record("a", 2)).await.is_err());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_touch_applies_only_on_commit() {
        let store = MemoryFeatureStore::new();
        store.insert(&record("a", 100)).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.touch(&IdFilter::id_equals("a"), 200).await.unwrap(), 1);
        assert_eq!(store.get("a").await.unwrap().unwrap().updated, 100);
        tx.commit().await.unwrap();
        assert_eq!(store.get("a").await.unwrap().unwrap().updated, 200);
    }

    #[tokio::test]
    async fn test_rollback_discards_touch() {
        let store = MemoryFeatureStore::new();
        store.insert(&record("a", 100)).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.touch(&IdFilter::id_equals("a"), 200).await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(store.get("a").await.unwrap().unwrap().updated, 100);
    }

    #[tokio::test]
    async fn test_touch_never_moves_backwards() {
        let store = MemoryFeatureStore::new();
        store.insert(&record("a", 100)).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.touch(&IdFilter::id_equals("a"), 50).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.get("a").await.unwrap().unwrap().updated, 100);
    }

    #[tokio::test]
    async fn test_touch_missing_record() {
        let store = MemoryFeatureStore::new();
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.touch(&IdFilter::id_equals("nope"), 1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_updated_before() {
        let store = MemoryFeatureStore::new();
        store.insert(&record("old", 10)).await.unwrap();
        store.insert(&record("new", 1000)).await.unwrap();

        assert_eq!(store.updated_before(500).await.unwrap(), vec!["old"]);
        assert_eq!(store.delete(&IdFilter::id_equals("old")).await.unwrap(), 1);
        assert_eq!(store.delete(&IdFilter::id_equals("old")).await.unwrap(), 0);
    }
}
