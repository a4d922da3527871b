//! Pair harvest tests
//!
//! Stop conditions of the page loop against a mock listing API.

use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::fixtures::{harvester, mount_pages, tracker, work_item, LISTING_PATH};
use crate::common::listing_page;
use shelfwatch::crawler::{Liveness, NoopLiveness, OutcomeKind, StopReason};
use shelfwatch::storage::MemoryStore;

/// Every page non-empty: exactly `max_pages` fetches, then PageCap
#[tokio::test]
async fn test_page_cap_stops_after_max_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_page(2)))
        .expect(50)
        .mount(&server)
        .await;

    let sink = Arc::new(MemoryStore::default());
    let harvester = harvester(&server, sink.clone(), Arc::new(NoopLiveness));

    let report = harvester.harvest(&work_item(), 50).await;

    assert_eq!(report.stop, StopReason::PageCap);
    assert_eq!(report.pages_fetched, 50);
    assert_eq!(report.records_written, 100);
    assert_eq!(sink.record_count(), 100);
    assert!(!report.is_failure());
}

/// The first empty page ends the pair
#[tokio::test]
async fn test_empty_page_exhausts_pair() {
    let server = MockServer::start().await;
    mount_pages(&server, 2, 3).await;

    let sink = Arc::new(MemoryStore::default());
    let harvester = harvester(&server, sink.clone(), Arc::new(NoopLiveness));

    let report = harvester.harvest(&work_item(), 50).await;

    assert_eq!(report.stop, StopReason::Exhausted { page: 3 });
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.records_written, 6);
    assert_eq!(sink.append_calls(), 2);

    let records = sink.records();
    assert!(records.iter().all(|r| r.store_id == "S1"));
    assert_eq!(records[0].rank, 1);
}

/// A page missing the `objects` key counts as empty
#[tokio::test]
async fn test_missing_objects_exhausts_pair() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"is_success": true})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(MemoryStore::default());
    let report = harvester(&server, sink.clone(), Arc::new(NoopLiveness))
        .harvest(&work_item(), 50)
        .await;

    assert_eq!(report.stop, StopReason::Exhausted { page: 1 });
    assert_eq!(sink.append_calls(), 0);
}

/// A failed page stops the pair but keeps what was written before it
#[tokio::test]
async fn test_fetch_failure_stops_pair() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_page(4)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(MemoryStore::default());
    let report = harvester(&server, sink.clone(), Arc::new(NoopLiveness))
        .harvest(&work_item(), 50)
        .await;

    assert_eq!(
        report.stop,
        StopReason::FetchFailed {
            page: 2,
            kind: OutcomeKind::NotFound
        }
    );
    assert!(report.is_failure());
    assert_eq!(report.records_written, 4);
    assert_eq!(sink.record_count(), 4);
}

/// A rejected append is counted and the harvest goes on
#[tokio::test]
async fn test_sink_failure_does_not_abort_pair() {
    let server = MockServer::start().await;
    mount_pages(&server, 3, 2).await;

    let sink = Arc::new(MemoryStore::default());
    sink.fail_next_appends(1);

    let report = harvester(&server, sink.clone(), Arc::new(NoopLiveness))
        .harvest(&work_item(), 50)
        .await;

    assert_eq!(report.stop, StopReason::Exhausted { page: 4 });
    assert_eq!(report.sink_failures, 1);
    assert_eq!(report.records_written, 4);
    assert_eq!(sink.record_count(), 4);
    assert!(!report.is_failure());
}

/// The liveness entry exists only while the pair is in flight
#[tokio::test]
async fn test_liveness_cleared_after_harvest() {
    let server = MockServer::start().await;
    mount_pages(&server, 1, 1).await;

    let liveness = tracker();
    let sink = Arc::new(MemoryStore::default());
    let report = harvester(&server, sink, liveness.clone() as Arc<dyn Liveness>)
        .harvest(&work_item(), 50)
        .await;

    assert_eq!(report.pages_fetched, 2);
    assert_eq!(liveness.active_count().await, 0);
}
