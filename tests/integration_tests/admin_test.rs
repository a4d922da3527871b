//! Admin API tests
//!
//! Drives the router directly with `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use super::fixtures::{tracker, work_item};
use shelfwatch::admin::{create_router, AppState};
use shelfwatch::crawler::{HarvestPhase, Liveness, LivenessTracker};
use shelfwatch::models::RateWindow;
use shelfwatch::ratelimit::{InMemoryRateAccountant, RateAccountant};

const KEY: &str = "blinkit_scraper";

fn setup() -> (Router, Arc<InMemoryRateAccountant>, Arc<LivenessTracker>) {
    let accountant = Arc::new(InMemoryRateAccountant::new());
    let liveness = tracker();
    let state = AppState::new(
        accountant.clone(),
        vec![RateWindow::new(KEY, 10, 60)],
        liveness.clone(),
    );
    (create_router(state), accountant, liveness)
}

async fn send(router: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let (router, _, _) = setup();
    let (status, body) = send(router, "GET", "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["rate_backend"], "memory");
}

#[tokio::test]
async fn test_rate_limit_status_reflects_usage() {
    let (router, accountant, _) = setup();
    let window = RateWindow::new(KEY, 10, 60);
    for _ in 0..3 {
        assert!(accountant.try_acquire(&window).await);
    }

    let (status, body) = send(router.clone(), "GET", "/api/rate-limits/blinkit_scraper").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["remaining"], 7);
    assert_eq!(body["data"]["used"], 3);
    assert_eq!(body["data"]["limit"], 10);

    let (status, body) = send(router, "GET", "/api/rate-limits").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_reset_clears_budget() {
    let (router, accountant, _) = setup();
    let window = RateWindow::new(KEY, 10, 60);
    assert!(accountant.try_acquire(&window).await);

    let (status, body) = send(router.clone(), "POST", "/api/rate-limits/blinkit_scraper/reset").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cleared"], true);
    assert_eq!(accountant.remaining_capacity(&window).await, 10);

    let (_, body) = send(router, "POST", "/api/rate-limits/blinkit_scraper/reset").await;
    assert_eq!(body["data"]["cleared"], false);
}

#[tokio::test]
async fn test_unknown_key_is_not_found() {
    let (router, _, _) = setup();

    let (status, body) = send(router.clone(), "GET", "/api/rate-limits/other").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = send(router, "POST", "/api/rate-limits/other/reset").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_harvesters_lists_in_flight_pairs() {
    let (router, _, liveness) = setup();
    liveness
        .beat(&work_item(), 3, HarvestPhase::Fetching)
        .await;

    let (status, body) = send(router, "GET", "/api/harvesters").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["active"], 1);
    assert_eq!(body["data"]["stalled"], 0);
    assert_eq!(body["data"]["harvesters"][0]["page"], 3);
    assert_eq!(body["data"]["harvesters"][0]["status"], "active");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    shelfwatch::metrics::init_metrics().unwrap();
    let (router, _, _) = setup();

    let response = router
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("shelfwatch_"));
}
