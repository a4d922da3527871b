// Core data structures for the shelfwatch harvester

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Fulfillment location whose coordinates scope every listing request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DarkStore {
    pub store_id: String,
    pub lat: f64,
    pub lon: f64,
}

impl DarkStore {
    pub fn new(store_id: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            store_id: store_id.into(),
            lat,
            lon,
        }
    }
}

/// Catalog taxonomy leaf (top-level id, sub-category id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Category {
    pub l1_id: String,
    pub l2_id: String,
}

impl Category {
    pub fn new(l1_id: impl Into<String>, l2_id: impl Into<String>) -> Self {
        Self {
            l1_id: l1_id.into(),
            l2_id: l2_id.into(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.l1_id, self.l2_id)
    }
}

/// One unit of harvesting work: a store paired with a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub store: DarkStore,
    pub category: Category,
}

impl WorkItem {
    pub fn new(store: DarkStore, category: Category) -> Self {
        Self { store, category }
    }

    /// Stable label: `{store_id}@{lat},{lon}:{l1_id}/{l2_id}`
    ///
    /// Coordinates are part of the label since one store id can be served
    /// at several locations.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{},{}:{}",
            self.store.store_id, self.store.lat, self.store.lon, self.category
        )
    }
}

/// A named request budget shared by every process using the same key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateWindow {
    pub key: String,
    pub limit: u32,
    pub window_secs: u64,
}

impl RateWindow {
    pub fn new(key: impl Into<String>, limit: u32, window_secs: u64) -> Self {
        Self {
            key: key.into(),
            limit,
            window_secs,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn window_millis(&self) -> u64 {
        self.window_secs.saturating_mul(1000)
    }
}

/// One product variant observed on one listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ListingRecord {
    pub captured_at: DateTime<Utc>,
    pub l1_category_id: String,
    pub l2_category_id: String,
    pub store_id: String,
    /// 1-based position of the variant within the page
    pub rank: i32,
    pub variant_id: String,
    pub variant_name: String,
    pub product_id: String,
    pub product_name: String,
    pub selling_price: f32,
    pub mrp: f32,
    pub discount: f32,
    pub in_stock: bool,
    pub inventory: i32,
    pub is_sponsored: bool,
    pub image_url: String,
    pub brand_id: String,
    pub brand: String,
    pub unit: String,
    pub product_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_item_label() {
        let item = WorkItem::new(
            DarkStore::new("1024", 12.97, 77.59),
            Category::new("1237", "940"),
        );
        assert_eq!(item.label(), "1024@12.97,77.59:1237/940");
    }

    #[test]
    fn test_work_item_label_distinguishes_locations() {
        let category = Category::new("X", "1");
        let near = WorkItem::new(DarkStore::new("S", 1.0, 1.0), category.clone());
        let far = WorkItem::new(DarkStore::new("S", 2.0, 2.0), category);
        assert_ne!(near.label(), far.label());
    }

    #[test]
    fn test_category_ordering() {
        let mut categories = vec![
            Category::new("2", "1"),
            Category::new("10", "5"),
            Category::new("10", "3"),
        ];
        categories.sort();
        assert_eq!(categories[0], Category::new("10", "3"));
        assert_eq!(categories[2], Category::new("2", "1"));
    }

    #[test]
    fn test_rate_window_durations() {
        let window = RateWindow::new("blinkit_scraper", 6500, 60);
        assert_eq!(window.window(), Duration::from_secs(60));
        assert_eq!(window.window_millis(), 60_000);
    }

    #[test]
    fn test_listing_record_serde() {
        let record = ListingRecord {
            store_id: "1024".into(),
            rank: 3,
            variant_id: "48213".into(),
            selling_price: 20.0,
            in_stock: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&record).unwrap();
        let parsed: ListingRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
