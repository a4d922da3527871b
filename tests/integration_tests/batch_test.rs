//! Batch scheduling tests
//!
//! Runs the scheduler over an in-memory catalog and sink with a mock
//! listing API behind the fetcher.

use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::fixtures::{category, mount_pages, scheduler, store, LISTING_PATH};
use shelfwatch::models::DarkStore;
use shelfwatch::scheduler::{BatchCursor, BatchScheduler, Continuation, SchedulerError};
use shelfwatch::storage::{CursorCheckpoint, MemoryStore};

fn two_stores_one_category() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new(
        vec![store("B"), store("A")],
        vec![category("X", "1")],
    ))
}

/// [A,B] × [X] with batch size 1: two batches, one pair each
#[tokio::test]
async fn test_batches_walk_cross_product() {
    let server = MockServer::start().await;
    mount_pages(&server, 1, 2).await;

    let memory = two_stores_one_category();
    let scheduler = scheduler(&server, memory.clone(), 1);

    let first = scheduler.run_batch(0).await.unwrap();
    assert_eq!(first.total_items, 2);
    assert_eq!((first.start, first.end), (0, 1));
    assert_eq!(first.pairs.len(), 1);
    assert_eq!(first.pairs[0].item.label(), "A@28.6,77.2:X/1");
    assert_eq!(
        first.next,
        Continuation::Continue {
            next_batch_index: 1
        }
    );

    let second = scheduler.run_batch(1).await.unwrap();
    assert_eq!(second.pairs.len(), 1);
    assert_eq!(second.pairs[0].item.label(), "B@28.6,77.2:X/1");
    assert_eq!(second.next, Continuation::Done);

    let stores: Vec<String> = memory.records().into_iter().map(|r| r.store_id).collect();
    assert_eq!(stores, vec!["A", "A", "B", "B"]);
    assert_eq!(memory.prepare_calls(), 2);
}

/// One batch covering everything finishes in a single execution
#[tokio::test]
async fn test_single_batch_done() {
    let server = MockServer::start().await;
    mount_pages(&server, 0, 0).await;

    let memory = Arc::new(MemoryStore::new(
        vec![store("A"), store("B"), store("C")],
        vec![category("1", "1"), category("1", "2")],
    ));
    let report = scheduler(&server, memory, 2000)
        .run_batch(0)
        .await
        .unwrap();

    assert_eq!(report.total_items, 6);
    assert_eq!(report.pairs.len(), 6);
    assert!(report.failed_pairs.is_empty());
    assert!(report.is_done());
}

/// A batch past the end does nothing at all
#[tokio::test]
async fn test_batch_past_end_has_no_side_effects() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let memory = two_stores_one_category();
    let report = scheduler(&server, memory.clone(), 1)
        .run_batch(2)
        .await
        .unwrap();

    assert_eq!(report.next, Continuation::Done);
    assert!(report.pairs.is_empty());
    assert_eq!(memory.prepare_calls(), 0);
    assert_eq!(memory.append_calls(), 0);
}

/// An empty catalog is done immediately
#[tokio::test]
async fn test_empty_catalog_is_done() {
    let server = MockServer::start().await;
    let memory = Arc::new(MemoryStore::new(vec![store("A")], vec![]));

    let report = scheduler(&server, memory.clone(), 10)
        .run_batch(0)
        .await
        .unwrap();

    assert!(report.is_done());
    assert_eq!(report.total_items, 0);
    assert_eq!(memory.prepare_calls(), 0);
}

/// Pair failures are reported, not raised
#[tokio::test]
async fn test_failed_pairs_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let memory = two_stores_one_category();
    let report = scheduler(&server, memory, 10).run_batch(0).await.unwrap();

    assert_eq!(report.failed_pairs, vec!["A@28.6,77.2:X/1", "B@28.6,77.2:X/1"]);
    assert_eq!(report.records_written, 0);
    assert!(report.is_done());
}

/// One store id served at two locations yields two distinguishable failures
#[tokio::test]
async fn test_failed_pairs_keep_store_locations_apart() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let memory = Arc::new(MemoryStore::new(
        vec![DarkStore::new("S", 1.0, 1.0), DarkStore::new("S", 2.0, 2.0)],
        vec![category("X", "1")],
    ));
    let report = scheduler(&server, memory, 10).run_batch(0).await.unwrap();

    assert_eq!(report.total_items, 2);
    assert_eq!(report.failed_pairs, vec!["S@1,1:X/1", "S@2,2:X/1"]);
}

/// Catalog listing failure fails the batch before anything is prepared
#[tokio::test]
async fn test_catalog_failure_is_fatal() {
    let server = MockServer::start().await;
    let memory = two_stores_one_category();
    memory.set_catalog_unavailable(true);

    let err = scheduler(&server, memory.clone(), 1)
        .run_batch(0)
        .await
        .unwrap_err();

    assert!(matches!(err, SchedulerError::Catalog { .. }));
    assert!(err.is_recoverable());
    assert_eq!(memory.prepare_calls(), 0);
}

/// Sink preparation failure fails the batch before any fetch
#[tokio::test]
async fn test_prepare_failure_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let memory = two_stores_one_category();
    memory.set_prepare_failing(true);

    let err = scheduler(&server, memory, 1).run_batch(0).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Prepare { .. }));
}

/// Zero batch size or concurrency is rejected
#[tokio::test]
async fn test_invalid_scheduler_config() {
    let server = MockServer::start().await;
    let activities = Arc::new(super::fixtures::activities(
        &server,
        two_stores_one_category(),
        5,
    ));

    assert!(BatchScheduler::new(activities.clone(), 0, 4).is_err());
    assert!(BatchScheduler::new(activities, 10, 0).is_err());
}

/// The driver runs until Done and marks the checkpoint finished
#[tokio::test]
async fn test_run_until_done_with_checkpoint() {
    let server = MockServer::start().await;
    mount_pages(&server, 1, 1).await;

    let dir = TempDir::new().unwrap();
    let checkpoint = CursorCheckpoint::new(dir.path().join("cursor.json"));

    let memory = Arc::new(MemoryStore::new(
        vec![store("A"), store("B")],
        vec![category("1", "1"), category("1", "2")],
    ));
    let scheduler = scheduler(&server, memory.clone(), 3);

    let summary = scheduler.run_until_done(None, Some(&checkpoint)).await.unwrap();
    assert_eq!(summary.first_batch, 0);
    assert_eq!(summary.batches, 2);
    assert_eq!(summary.pairs, 4);
    assert_eq!(summary.records_written, 4);
    assert_eq!(memory.record_count(), 4);

    let record = checkpoint.load().unwrap().unwrap();
    assert!(record.finished);
    assert_eq!(record.cursor, BatchCursor::new(1, 3));

    // A finished checkpoint starts a new sweep
    assert_eq!(BatchScheduler::resume_index(None, Some(&checkpoint)).unwrap(), 0);
}

/// An unfinished checkpoint resumes at its batch
#[tokio::test]
async fn test_resume_from_unfinished_checkpoint() {
    let server = MockServer::start().await;
    mount_pages(&server, 0, 0).await;

    let dir = TempDir::new().unwrap();
    let checkpoint = CursorCheckpoint::new(dir.path().join("cursor.json"));
    checkpoint.save(BatchCursor::new(1, 3), false).unwrap();

    let memory = Arc::new(MemoryStore::new(
        vec![store("A"), store("B")],
        vec![category("1", "1"), category("1", "2")],
    ));
    let scheduler = scheduler(&server, memory, 3);

    let summary = scheduler.run_until_done(None, Some(&checkpoint)).await.unwrap();
    assert_eq!(summary.first_batch, 1);
    assert_eq!(summary.batches, 1);
    assert_eq!(summary.pairs, 1);

    // An explicit start index wins over the checkpoint
    assert_eq!(
        BatchScheduler::resume_index(Some(7), Some(&checkpoint)).unwrap(),
        7
    );
}
