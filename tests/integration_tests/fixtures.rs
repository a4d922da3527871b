//! Test fixtures for integration tests
//!
//! Wires harvesters and schedulers over a wiremock listing API and an
//! in-memory catalog/sink.

use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{empty_page, listing_page, test_config, test_fetcher};
use shelfwatch::crawler::{Liveness, LivenessTracker, NoopLiveness, PageHarvester};
use shelfwatch::models::{Category, DarkStore, WorkItem};
use shelfwatch::scheduler::{BatchScheduler, HarvestActivities};
use shelfwatch::storage::MemoryStore;
use shelfwatch::transform::ProductListingTransformer;

pub const LISTING_PATH: &str = "/v1/listing/widgets";

pub fn store(id: &str) -> DarkStore {
    DarkStore::new(id, 28.6, 77.2)
}

pub fn category(l1: &str, l2: &str) -> Category {
    Category::new(l1, l2)
}

pub fn work_item() -> WorkItem {
    WorkItem::new(store("S1"), category("1237", "940"))
}

/// Serve `products` listings on pages `1..=pages` and an empty page after that
pub async fn mount_pages(server: &MockServer, pages: u32, products: usize) {
    for page in 1..=pages {
        Mock::given(method("GET"))
            .and(path(LISTING_PATH))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing_page(products)))
            .mount(server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_page()))
        .mount(server)
        .await;
}

pub fn harvester(
    server: &MockServer,
    sink: Arc<MemoryStore>,
    liveness: Arc<dyn Liveness>,
) -> PageHarvester {
    let fetcher = Arc::new(test_fetcher(&test_config(&server.uri(), None)));
    PageHarvester::new(fetcher, Arc::new(ProductListingTransformer), sink, liveness)
}

pub fn activities(
    server: &MockServer,
    memory: Arc<MemoryStore>,
    max_pages: u32,
) -> HarvestActivities {
    activities_with_liveness(server, memory, Arc::new(NoopLiveness), max_pages)
}

pub fn activities_with_liveness(
    server: &MockServer,
    memory: Arc<MemoryStore>,
    liveness: Arc<dyn Liveness>,
    max_pages: u32,
) -> HarvestActivities {
    let fetcher = Arc::new(test_fetcher(&test_config(&server.uri(), None)));
    HarvestActivities::new(memory.clone(), memory, fetcher, liveness, max_pages)
}

pub fn scheduler(
    server: &MockServer,
    memory: Arc<MemoryStore>,
    batch_size: u64,
) -> BatchScheduler {
    BatchScheduler::new(Arc::new(activities(server, memory, 5)), batch_size, 4)
        .expect("valid scheduler")
}

#[allow(dead_code)]
pub fn tracker() -> Arc<LivenessTracker> {
    Arc::new(LivenessTracker::new(180))
}
