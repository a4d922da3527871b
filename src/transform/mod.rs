//! Listing payload to sink records
//!
//! The listing API answers with a widget feed: `objects[]`, where product
//! widgets carry `data.product.variant_info[]`. Each variant becomes one
//! [`ListingRecord`]; widgets without a product are skipped.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::models::{ListingRecord, WorkItem};

/// Turns one page payload into records
pub trait ListingTransformer: Send + Sync {
    fn transform(
        &self,
        payload: &Value,
        item: &WorkItem,
        captured_at: DateTime<Utc>,
    ) -> Vec<ListingRecord>;
}

/// The `objects` array of a page, or `None` when it is absent or empty
pub fn listing_objects(payload: &Value) -> Option<&Vec<Value>> {
    payload
        .get("objects")
        .and_then(Value::as_array)
        .filter(|objects| !objects.is_empty())
}

/// Lossy string view of a scalar field; numbers and booleans are stringified
fn text(node: &Map<String, Value>, key: &str) -> Option<String> {
    match node.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn number(node: &Map<String, Value>, key: &str) -> f64 {
    match node.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn integer(node: &Map<String, Value>, key: &str) -> i32 {
    let value = match node.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn object<'a>(node: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    node.get(key).and_then(Value::as_object)
}

/// Transformer for the product widget feed
#[derive(Debug, Default, Clone, Copy)]
pub struct ProductListingTransformer;

impl ProductListingTransformer {
    pub fn new() -> Self {
        Self
    }

    fn variant_record(
        variant: &Map<String, Value>,
        product: &Map<String, Value>,
        custom_data: Option<&Map<String, Value>>,
        item: &WorkItem,
        rank: i32,
        captured_at: DateTime<Utc>,
    ) -> ListingRecord {
        let image_url = variant
            .get("images")
            .and_then(Value::as_array)
            .and_then(|images| images.first())
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let is_sponsored = variant
            .get("image_overlay_tags")
            .and_then(Value::as_array)
            .is_some_and(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .any(|tag| tag.eq_ignore_ascii_case("ad"))
            });

        let brand = match variant.get("brand") {
            Some(Value::Object(brand)) => text(brand, "name").unwrap_or_default(),
            Some(Value::String(name)) => name.clone(),
            _ => String::new(),
        };

        let brand_id = object(variant, "attributes")
            .and_then(|attributes| text(attributes, "brand_id"))
            .unwrap_or_default();

        let inventory = integer(variant, "inventory");
        let variant_id = text(variant, "product_id").unwrap_or_default();
        let variant_name = text(variant, "name").unwrap_or_default();

        ListingRecord {
            captured_at,
            l1_category_id: custom_data
                .and_then(|d| text(d, "product_list_id"))
                .unwrap_or_else(|| item.category.l1_id.clone()),
            l2_category_id: custom_data
                .and_then(|d| text(d, "subcategory_id"))
                .unwrap_or_else(|| item.category.l2_id.clone()),
            store_id: item.store.store_id.clone(),
            rank,
            product_id: text(product, "id").unwrap_or_else(|| variant_id.clone()),
            product_name: text(product, "name").unwrap_or_else(|| variant_name.clone()),
            variant_id,
            variant_name,
            selling_price: number(variant, "price") as f32,
            mrp: number(variant, "mrp") as f32,
            discount: number(variant, "discount") as f32,
            in_stock: inventory > 0,
            inventory,
            is_sponsored,
            image_url,
            brand_id,
            brand,
            unit: text(variant, "unit").unwrap_or_default(),
            product_type: text(variant, "type").unwrap_or_default(),
        }
    }
}

impl ListingTransformer for ProductListingTransformer {
    fn transform(
        &self,
        payload: &Value,
        item: &WorkItem,
        captured_at: DateTime<Utc>,
    ) -> Vec<ListingRecord> {
        let Some(objects) = listing_objects(payload) else {
            return Vec::new();
        };

        let mut records = Vec::new();
        let mut rank = 1i32;

        for widget in objects.iter().filter_map(Value::as_object) {
            let Some(product) = object(widget, "data").and_then(|data| object(data, "product"))
            else {
                continue;
            };
            let Some(variants) = product.get("variant_info").and_then(Value::as_array) else {
                continue;
            };

            let custom_data = object(widget, "tracking")
                .and_then(|tracking| object(tracking, "widget_meta"))
                .and_then(|meta| object(meta, "custom_data"));

            for variant in variants.iter().filter_map(Value::as_object) {
                records.push(Self::variant_record(
                    variant,
                    product,
                    custom_data,
                    item,
                    rank,
                    captured_at,
                ));
                rank = rank.saturating_add(1);
            }
        }

        records
    }
}
