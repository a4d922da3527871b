//! shelfwatch - quick-commerce catalog harvester
//!
//! Harvests paginated product listings for every (dark store, category) pair
//! of a grocery marketplace while keeping all workers inside one shared
//! request budget.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`ratelimit`] - Shared sliding-window rate accountant (Redis or in-process)
//! - [`crawler`] - Fetch client with the direct→proxy ladder, page harvester, liveness
//! - [`transform`] - Listing payload to [`models::ListingRecord`] conversion
//! - [`storage`] - Catalog source, record sink and cursor checkpoint
//! - [`scheduler`] - Cross-product batching and resumable batch execution
//! - [`admin`] - HTTP API for budget inspection and reset
//! - [`metrics`] - Prometheus metrics
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use shelfwatch::config::Config;
//! use shelfwatch::crawler::{ListingFetcher, NoopLiveness};
//! use shelfwatch::ratelimit::InMemoryRateAccountant;
//! use shelfwatch::scheduler::{BatchScheduler, HarvestActivities};
//! use shelfwatch::storage::PostgresStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let fetcher = Arc::new(ListingFetcher::new(
//!         &config,
//!         Arc::new(InMemoryRateAccountant::new()),
//!     )?);
//!     let store = Arc::new(PostgresStore::connect(&config.database).await?);
//!     let activities = HarvestActivities::new(
//!         store.clone(),
//!         store,
//!         fetcher,
//!         Arc::new(NoopLiveness),
//!         config.scheduler.max_pages,
//!     );
//!     let scheduler = BatchScheduler::from_config(Arc::new(activities), &config.scheduler)?;
//!     let report = scheduler.run_batch(0).await?;
//!     println!("next: {:?}", report.next);
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod config;
pub mod crawler;
pub mod error;
pub mod metrics;
pub mod models;
pub mod ratelimit;
pub mod scheduler;
pub mod storage;
pub mod transform;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{FetchOutcome, HarvestReport, ListingFetcher, StopReason};
    pub use crate::error::{Error, ErrorCategory, Result, ShelfwatchError};
    pub use crate::models::{Category, DarkStore, ListingRecord, RateWindow, WorkItem};
    pub use crate::ratelimit::{RateAccountant, SharedAccountant};
    pub use crate::scheduler::{BatchReport, BatchScheduler, Continuation, HarvestActivities};
    pub use crate::storage::{CatalogSource, RecordSink};
}

// Direct re-exports for convenience
pub use models::{Category, DarkStore, ListingRecord, WorkItem};
