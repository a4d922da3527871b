//! REST API handlers for the admin server

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::server::AppState;
use crate::crawler::liveness::HarvesterSnapshot;
use crate::metrics;
use crate::ratelimit::{budget_status, BudgetStatus};

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Simple error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub rate_backend: String,
    pub active_harvesters: usize,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub key: String,
    /// Whether any admissions were on record for the key
    pub cleared: bool,
}

#[derive(Debug, Serialize)]
pub struct HarvestersResponse {
    pub heartbeat_timeout_secs: i64,
    pub active: usize,
    pub stalled: usize,
    pub harvesters: Vec<HarvesterSnapshot>,
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        // Rate budget endpoints
        .route("/api/rate-limits", get(list_rate_limits))
        .route("/api/rate-limits/{key}", get(get_rate_limit))
        .route("/api/rate-limits/{key}/reset", post(reset_rate_limit))
        // Liveness
        .route("/api/harvesters", get(list_harvesters))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        rate_backend: state.accountant.backend().to_string(),
        active_harvesters: state.liveness.active_count().await,
    }))
}

async fn list_rate_limits(State(state): State<AppState>) -> impl IntoResponse {
    let mut statuses: Vec<BudgetStatus> = Vec::with_capacity(state.windows.len());
    for window in state.windows.iter() {
        statuses.push(budget_status(state.accountant.as_ref(), window).await);
    }

    Json(ApiResponse::success(statuses))
}

async fn get_rate_limit(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> axum::response::Response {
    let Some(window) = state.window(&key) else {
        return unknown_key(&key);
    };

    let status = budget_status(state.accountant.as_ref(), window).await;
    (StatusCode::OK, Json(ApiResponse::success(status))).into_response()
}

async fn reset_rate_limit(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> axum::response::Response {
    if state.window(&key).is_none() {
        return unknown_key(&key);
    }

    let cleared = state.accountant.reset(&key).await;
    tracing::info!(key = %key, cleared, "Rate budget reset via admin API");

    (
        StatusCode::OK,
        Json(ApiResponse::success(ResetResponse { key, cleared })),
    )
        .into_response()
}

async fn list_harvesters(State(state): State<AppState>) -> impl IntoResponse {
    let harvesters = state.liveness.snapshot().await;
    let stalled = state.liveness.stalled().await.len();

    Json(ApiResponse::success(HarvestersResponse {
        heartbeat_timeout_secs: state.liveness.timeout_secs(),
        active: harvesters.len(),
        stalled,
        harvesters,
    }))
}

async fn metrics_handler() -> axum::response::Response {
    match metrics::encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(format!("Failed to encode metrics: {}", e))),
        )
            .into_response(),
    }
}

fn unknown_key(key: &str) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(format!("Unknown rate limit key: {}", key))),
    )
        .into_response()
}
