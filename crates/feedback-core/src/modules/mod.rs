pub mod config;
pub mod credentials;
pub mod memory_store;
pub(crate) mod pg_helpers;
pub mod pg_store;
mod pg_store_counters;
mod pg_store_responses;
pub mod repository;

use std::sync::Arc;

use feedback_types::IngestConfig;

use memory_store::MemoryStore;
use pg_store::PostgresIngestStore;
use repository::{IngestStore, StoreError};

/// Open the configured store: PostgreSQL when `database_url` is set
/// (migrations applied), otherwise the in-process store.
pub async fn open_store(config: &IngestConfig) -> Result<Arc<dyn IngestStore>, StoreError> {
    match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresIngestStore::connect(url)
                .await
                .map_err(|err| StoreError::Database(err.to_string()))?;
            store.run_migrations().await?;
            tracing::info!("Using PostgreSQL ingest store");
            Ok(Arc::new(store))
        },
        None => {
            tracing::warn!("No database_url configured; using in-memory ingest store");
            Ok(Arc::new(MemoryStore::new()))
        },
    }
}
