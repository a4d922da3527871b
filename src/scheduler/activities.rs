//! Orchestrator-facing activities
//!
//! Each method is one unit of work an external orchestrator may schedule and
//! retry on its own. All of them are safe to re-run: listing is read-only,
//! `prepare` is idempotent and `harvest_pair` only appends.

use std::sync::Arc;
use tracing::{debug, info};

use crate::crawler::{HarvestReport, ListingFetcher, Liveness, PageHarvester};
use crate::metrics;
use crate::models::{Category, DarkStore, WorkItem};
use crate::storage::{CatalogSource, RecordSink};
use crate::transform::{ListingTransformer, ProductListingTransformer};
use crate::utils::error::StorageError;

pub struct HarvestActivities {
    catalog: Arc<dyn CatalogSource>,
    sink: Arc<dyn RecordSink>,
    harvester: PageHarvester,
    max_pages: u32,
}

impl HarvestActivities {
    /// Wire activities with the product listing transformer
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        sink: Arc<dyn RecordSink>,
        fetcher: Arc<ListingFetcher>,
        liveness: Arc<dyn Liveness>,
        max_pages: u32,
    ) -> Self {
        Self::with_transformer(
            catalog,
            sink,
            fetcher,
            liveness,
            Arc::new(ProductListingTransformer),
            max_pages,
        )
    }

    pub fn with_transformer(
        catalog: Arc<dyn CatalogSource>,
        sink: Arc<dyn RecordSink>,
        fetcher: Arc<ListingFetcher>,
        liveness: Arc<dyn Liveness>,
        transformer: Arc<dyn ListingTransformer>,
        max_pages: u32,
    ) -> Self {
        let harvester = PageHarvester::new(fetcher, transformer, Arc::clone(&sink), liveness);
        Self {
            catalog,
            sink,
            harvester,
            max_pages,
        }
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    pub async fn prepare(&self) -> Result<(), StorageError> {
        let _timer = metrics::start_activity_timer("prepare");
        self.sink.prepare().await?;
        debug!("Sink prepared");
        Ok(())
    }

    pub async fn list_stores(&self) -> Result<Vec<DarkStore>, StorageError> {
        let _timer = metrics::start_activity_timer("list_stores");
        let stores = self.catalog.list_stores().await?;
        info!(count = stores.len(), "Listed dark stores");
        Ok(stores)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        let _timer = metrics::start_activity_timer("list_categories");
        let categories = self.catalog.list_categories().await?;
        info!(count = categories.len(), "Listed categories");
        Ok(categories)
    }

    /// Harvest every page of one pair. Never fails; the outcome is in the report.
    pub async fn harvest_pair(&self, item: &WorkItem) -> HarvestReport {
        let _timer = metrics::start_activity_timer("harvest_pair");
        self.harvester.harvest(item, self.max_pages).await
    }
}
