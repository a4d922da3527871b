//! Catalog inputs and listing output
//!
//! The scheduler reads its two immutable inputs (stores and categories)
//! through [`CatalogSource`] and the harvester appends records through
//! [`RecordSink`]. [`postgres::PostgresStore`] implements both against
//! PostgreSQL; [`memory::MemoryStore`] keeps everything in process.

pub mod checkpoint;
pub mod memory;
pub mod postgres;

pub use checkpoint::{CursorCheckpoint, CursorRecord};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;

use crate::models::{Category, DarkStore, ListingRecord};
use crate::utils::error::StorageError;

/// Source of the store and category sets
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Distinct dark stores with coordinates
    async fn list_stores(&self) -> Result<Vec<DarkStore>, StorageError>;

    /// Distinct (l1, l2) category pairs
    async fn list_categories(&self) -> Result<Vec<Category>, StorageError>;
}

/// Append-only destination for listing records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Make the sink ready to accept records; safe to call repeatedly
    async fn prepare(&self) -> Result<(), StorageError>;

    /// Append `records`, returning how many rows were written
    async fn append(&self, records: &[ListingRecord]) -> Result<u64, StorageError>;
}
