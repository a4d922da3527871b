//! In-process catalog and sink

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{CatalogSource, RecordSink};
use crate::models::{Category, DarkStore, ListingRecord};
use crate::utils::error::StorageError;

/// Catalog and sink held in memory
///
/// Also serves dry runs: records are kept instead of written anywhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    stores: Vec<DarkStore>,
    categories: Vec<Category>,
    records: Mutex<Vec<ListingRecord>>,
    prepare_calls: AtomicUsize,
    append_calls: AtomicUsize,
    failing_appends: AtomicUsize,
    catalog_unavailable: AtomicBool,
    prepare_failing: AtomicBool,
}

impl MemoryStore {
    pub fn new(stores: Vec<DarkStore>, categories: Vec<Category>) -> Self {
        Self {
            stores,
            categories,
            ..Default::default()
        }
    }

    /// Reject the next `count` appends with a storage error
    pub fn fail_next_appends(&self, count: usize) {
        self.failing_appends.store(count, Ordering::SeqCst);
    }

    /// Make catalog listing fail until switched back
    pub fn set_catalog_unavailable(&self, unavailable: bool) {
        self.catalog_unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ListingRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make `prepare` fail until switched back
    pub fn set_prepare_failing(&self, failing: bool) {
        self.prepare_failing.store(failing, Ordering::SeqCst);
    }

    /// Copy of every appended record, in append order
    pub fn records(&self) -> Vec<ListingRecord> {
        self.lock().clone()
    }

    pub fn record_count(&self) -> usize {
        self.lock().len()
    }

    pub fn prepare_calls(&self) -> usize {
        self.prepare_calls.load(Ordering::SeqCst)
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    fn check_catalog(&self) -> Result<(), StorageError> {
        if self.catalog_unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Pool("catalog unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogSource for MemoryStore {
    async fn list_stores(&self) -> Result<Vec<DarkStore>, StorageError> {
        self.check_catalog()?;
        Ok(self.stores.clone())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        self.check_catalog()?;
        Ok(self.categories.clone())
    }
}

#[async_trait]
impl RecordSink for MemoryStore {
    async fn prepare(&self) -> Result<(), StorageError> {
        self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        if self.prepare_failing.load(Ordering::SeqCst) {
            return Err(StorageError::Pool("sink unavailable".to_string()));
        }
        Ok(())
    }

    async fn append(&self, records: &[ListingRecord]) -> Result<u64, StorageError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing_appends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(StorageError::Pool("append rejected".to_string()));
        }

        self.lock().extend_from_slice(records);
        Ok(records.len() as u64)
    }
}
