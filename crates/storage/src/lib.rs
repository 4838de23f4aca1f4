//! Storage for resumable WFS result sets.
//!
//! Provides:
//! - A generic feature store for result set records (PostgreSQL or in-memory)
//! - Object storage (local directory, memory, MinIO/S3) for stored requests
//! - The cursor store that keeps both consistent under one lock

pub mod cursor_store;
pub mod feature_store;
pub mod object_store;
pub mod postgres;
pub mod snapshot;

pub use self::object_store::{BlobBackend, BlobStorage, BlobStorageConfig};
pub use cursor_store::{mint_token, CursorStore, ExpireStats};
pub use feature_store::{CursorRecord, FeatureStore, FeatureTransaction, IdFilter, MemoryFeatureStore};
pub use postgres::PgFeatureStore;
pub use snapshot::StoredRequestSnapshot;
