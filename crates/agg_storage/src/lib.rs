//! Durable storage ports and their two backends: an
//! in-memory implementation for tests and standalone demos, and a
//! Postgres implementation for real deployments, grounded on the
//! teacher's DAL layer.

mod error;
mod memory;
pub mod postgres;
mod traits;

pub use error::StorageError;
pub use memory::InMemoryStorage;
pub use postgres::PostgresStorage;
pub use traits::{
    AggregatorStorage, BlockRecordEvent, FinalizeBatch, QueuedCommitment, ResumePoint,
};

/// Opens the backend named by `storage_uri`: `memory://` for the
/// in-process store, anything else treated as a Postgres connection URI.
pub async fn connect(storage_uri: &str) -> anyhow::Result<std::sync::Arc<dyn AggregatorStorage>> {
    if storage_uri.starts_with("memory://") {
        return Ok(std::sync::Arc::new(InMemoryStorage::new()));
    }
    let backend = PostgresStorage::connect(storage_uri).await?;
    backend.run_migrations().await?;
    Ok(std::sync::Arc::new(backend))
}
