//! Result set records in PostgreSQL.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool, Postgres, Transaction};

use wfs_common::{WfsError, WfsResult};

use crate::feature_store::{CursorRecord, FeatureStore, FeatureTransaction, IdFilter};

/// Feature store backed by a `result_sets` table.
pub struct PgFeatureStore {
    pool: PgPool,
}

impl PgFeatureStore {
    /// Create a new store from a database URL.
    pub async fn connect(database_url: &str, max_connections: u32) -> WfsResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| WfsError::DatabaseError(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(action: &str) -> impl Fn(sqlx::Error) -> WfsError + '_ {
    move |e| WfsError::DatabaseError(format!("{} failed: {}", action, e))
}

#[async_trait]
impl FeatureStore for PgFeatureStore {
    async fn ensure_schema(&self) -> WfsResult<()> {
        // Split SQL statements and execute them individually
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(db_error("Migration"))?;
            }
        }
        Ok(())
    }

    async fn insert(&self, record: &CursorRecord) -> WfsResult<()> {
        sqlx::query("INSERT INTO result_sets (id, created, updated) VALUES ($1, $2, $3)")
            .bind(&record.id)
            .bind(record.created)
            .bind(record.updated)
            .execute(&self.pool)
            .await
            .map_err(db_error("Insert"))?;
        Ok(())
    }

    async fn get(&self, id: &str) -> WfsResult<Option<CursorRecord>> {
        let row = sqlx::query_as::<_, ResultSetRow>(
            "SELECT id, created, updated FROM result_sets WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Query"))?;

        Ok(row.map(Into::into))
    }

    async fn begin(&self) -> WfsResult<Box<dyn FeatureTransaction>> {
        let tx = self.pool.begin().await.map_err(db_error("Begin"))?;
        Ok(Box::new(PgFeatureTransaction { tx }))
    }

    async fn updated_before(&self, cutoff: i64) -> WfsResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT id FROM result_sets WHERE updated < $1 ORDER BY updated ASC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Query"))
    }

    async fn delete(&self, filter: &IdFilter) -> WfsResult<u64> {
        let result = sqlx::query("DELETE FROM result_sets WHERE id = $1")
            .bind(&filter.id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Delete"))?;
        Ok(result.rows_affected())
    }

    async fn count(&self) -> WfsResult<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM result_sets")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Count"))?;
        Ok(count as u64)
    }
}

struct PgFeatureTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl FeatureTransaction for PgFeatureTransaction {
    async fn touch(&mut self, filter: &IdFilter, updated: i64) -> WfsResult<u64> {
        let result =
            sqlx::query("UPDATE result_sets SET updated = GREATEST(updated, $2) WHERE id = $1")
                .bind(&filter.id)
                .bind(updated)
                .execute(&mut *self.tx)
                .await
                .map_err(db_error("Update"))?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> WfsResult<()> {
        self.tx.commit().await.map_err(db_error("Commit"))
    }

    async fn rollback(self: Box<Self>) -> WfsResult<()> {
        self.tx.rollback().await.map_err(db_error("Rollback"))
    }
}

/// Internal row type for database queries.
#[derive(FromRow)]
struct ResultSetRow {
    id: String,
    created: i64,
    updated: i64,
}

impl From<ResultSetRow> for CursorRecord {
    fn from(row: ResultSetRow) -> Self {
        CursorRecord {
            id: row.id,
            created: row.created,
            updated: row.updated,
        }
    }
}

/// Database schema SQL.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS result_sets (
    id VARCHAR(64) PRIMARY KEY,
    created BIGINT NOT NULL,
    updated BIGINT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_result_sets_updated ON result_sets(updated);
"#;
