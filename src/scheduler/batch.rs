//! Work-item ordering and batch slicing
//!
//! The work set is the cross product stores × categories. Both inputs are
//! sorted and de-duplicated first, so the same catalog always yields the same
//! item at the same index regardless of the order rows were returned in.
//! Items are addressed by index and materialized only for the batch in hand.

use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::models::{Category, DarkStore, WorkItem};

/// Ordered store × category cross product
#[derive(Debug, Clone)]
pub struct CrossProduct {
    stores: Vec<DarkStore>,
    categories: Vec<Category>,
}

impl CrossProduct {
    pub fn new(mut stores: Vec<DarkStore>, mut categories: Vec<Category>) -> Self {
        stores.sort_by(|a, b| {
            a.store_id
                .cmp(&b.store_id)
                .then(a.lat.total_cmp(&b.lat))
                .then(a.lon.total_cmp(&b.lon))
        });
        stores.dedup();

        categories.sort();
        categories.dedup();

        Self { stores, categories }
    }

    pub fn store_count(&self) -> usize {
        self.stores.len()
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    /// `|stores| * |categories|`
    pub fn len(&self) -> u64 {
        (self.stores.len() as u64).saturating_mul(self.categories.len() as u64)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Item at `index`, store-major: all categories of the first store come first
    pub fn item(&self, index: u64) -> Option<WorkItem> {
        if index >= self.len() {
            return None;
        }
        let per_store = self.categories.len() as u64;
        let store = &self.stores[(index / per_store) as usize];
        let category = &self.categories[(index % per_store) as usize];
        Some(WorkItem::new(store.clone(), category.clone()))
    }

    /// Items with indices in `range`, clipped to the product size
    pub fn items(&self, range: Range<u64>) -> impl Iterator<Item = WorkItem> + '_ {
        let end = range.end.min(self.len());
        (range.start..end).filter_map(move |index| self.item(index))
    }
}

/// Materialize the whole ordered cross product
pub fn build_work_items(stores: Vec<DarkStore>, categories: Vec<Category>) -> Vec<WorkItem> {
    let product = CrossProduct::new(stores, categories);
    product.items(0..product.len()).collect()
}

/// Scheduler progress marker carried from one execution to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCursor {
    pub batch_index: u64,
    pub batch_size: u64,
}

impl BatchCursor {
    pub fn new(batch_index: u64, batch_size: u64) -> Self {
        Self {
            batch_index,
            batch_size: batch_size.max(1),
        }
    }

    /// First item index of this batch
    pub fn start(&self) -> u64 {
        self.batch_index.saturating_mul(self.batch_size)
    }

    /// `[start, min(start + batch_size, total))`, or `None` past the end
    pub fn range(&self, total: u64) -> Option<Range<u64>> {
        let start = self.start();
        if start >= total {
            return None;
        }
        let end = start.saturating_add(self.batch_size).min(total);
        Some(start..end)
    }

    pub fn next(&self) -> Self {
        Self {
            batch_index: self.batch_index.saturating_add(1),
            batch_size: self.batch_size,
        }
    }
}

/// Number of batches needed to cover `total` items
pub fn batch_count(total: u64, batch_size: u64) -> u64 {
    total.div_ceil(batch_size.max(1))
}

/// What the orchestrator should do after a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Continuation {
    /// Re-invoke with `next_batch_index`
    Continue { next_batch_index: u64 },
    /// Every item has been dispatched
    Done,
}

impl Continuation {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue { .. } => "continue",
            Self::Done => "done",
        }
    }
}
