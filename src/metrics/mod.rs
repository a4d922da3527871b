//! Prometheus metrics for the shelfwatch harvester
//!
//! This module provides metrics tracking for:
//! - Fetch client: upstream calls by proxy usage and status, call latency
//! - Rate accountant: admission decisions per budget key
//! - Harvesting: activity calls, pages, records, sink failures, pair outcomes
//! - Scheduler: batch completions and duration
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram_vec,
    Counter, CounterVec, Encoder, Gauge, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all harvester metrics
struct HarvestMetrics {
    api_calls: CounterVec,
    api_duration: HistogramVec,
    rate_limit_decisions: CounterVec,
    activity_calls: CounterVec,
    activity_duration: HistogramVec,
    pages_harvested: Counter,
    records_written: Counter,
    sink_failures: Counter,
    pair_outcomes: CounterVec,
    active_harvesters: Gauge,
    batches: CounterVec,
    batch_duration: HistogramVec,
}

/// Global storage for harvester metrics
static HARVEST_METRICS: OnceLock<HarvestMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup.
/// If metric registration fails, subsequent metric operations become no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = shelfwatch::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = HarvestMetrics {
        api_calls: register_counter_vec!(
            "shelfwatch_api_calls_total",
            "Upstream listing API calls by proxy usage and status",
            &["proxy_used", "status"]
        )?,
        api_duration: register_histogram_vec!(
            "shelfwatch_api_call_duration_seconds",
            "Upstream listing API call duration in seconds",
            &["proxy_used"],
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
        )?,
        rate_limit_decisions: register_counter_vec!(
            "shelfwatch_rate_limit_decisions_total",
            "Rate budget admission decisions by key and decision",
            &["key", "decision"]
        )?,
        activity_calls: register_counter_vec!(
            "shelfwatch_activity_calls_total",
            "Harvest activity invocations by activity name",
            &["activity"]
        )?,
        activity_duration: register_histogram_vec!(
            "shelfwatch_activity_duration_seconds",
            "Harvest activity duration in seconds",
            &["activity"],
            vec![0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]
        )?,
        pages_harvested: register_counter!(
            "shelfwatch_pages_harvested_total",
            "Listing pages that produced records"
        )?,
        records_written: register_counter!(
            "shelfwatch_records_written_total",
            "Listing records appended to the sink"
        )?,
        sink_failures: register_counter!(
            "shelfwatch_sink_failures_total",
            "Pages whose records could not be appended"
        )?,
        pair_outcomes: register_counter_vec!(
            "shelfwatch_pair_outcomes_total",
            "Finished pair harvests by stop reason",
            &["stop"]
        )?,
        active_harvesters: register_gauge!(
            "shelfwatch_active_harvesters",
            "Pair harvests currently in flight"
        )?,
        batches: register_counter_vec!(
            "shelfwatch_batches_total",
            "Completed batch executions by continuation",
            &["next"]
        )?,
        batch_duration: register_histogram_vec!(
            "shelfwatch_batch_duration_seconds",
            "Batch execution duration in seconds",
            &["next"],
            vec![1.0, 10.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0]
        )?,
    };

    HARVEST_METRICS.set(metrics).ok();

    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    HARVEST_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record one upstream HTTP attempt
pub fn record_api_call(via_proxy: bool, status: &str, duration_secs: f64) {
    let Some(m) = HARVEST_METRICS.get() else {
        return;
    };

    let proxy_used = if via_proxy { "true" } else { "false" };
    m.api_calls.with_label_values(&[proxy_used, status]).inc();
    m.api_duration
        .with_label_values(&[proxy_used])
        .observe(duration_secs);
}

/// Record an admission decision (`admitted`, `denied` or `fail_open`)
pub fn record_rate_limit_decision(key: &str, decision: &str) {
    if let Some(m) = HARVEST_METRICS.get() {
        m.rate_limit_decisions
            .with_label_values(&[key, decision])
            .inc();
    }
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Count an activity invocation and time it until the guard drops
pub fn start_activity_timer(activity: &str) -> MetricsTimer {
    match HARVEST_METRICS.get() {
        Some(m) => {
            m.activity_calls.with_label_values(&[activity]).inc();
            MetricsTimer::new(
                m.activity_duration
                    .with_label_values(&[activity])
                    .start_timer(),
            )
        }
        None => MetricsTimer::noop(),
    }
}

/// Record a stored page and its record count
pub fn record_page(records: u64) {
    if let Some(m) = HARVEST_METRICS.get() {
        m.pages_harvested.inc();
        m.records_written.inc_by(records as f64);
    }
}

/// Record a page whose records could not be appended
pub fn record_sink_failure() {
    if let Some(m) = HARVEST_METRICS.get() {
        m.sink_failures.inc();
    }
}

/// Record how a pair harvest stopped
pub fn record_pair_outcome(stop: &str) {
    if let Some(m) = HARVEST_METRICS.get() {
        m.pair_outcomes.with_label_values(&[stop]).inc();
    }
}

/// Track in-flight pair harvests
pub fn update_active_harvesters(delta: i64) {
    if let Some(m) = HARVEST_METRICS.get() {
        m.active_harvesters.add(delta as f64);
    }
}

/// Record a finished batch execution (`next` is `continue` or `done`)
pub fn record_batch(next: &str, duration_secs: f64) {
    let Some(m) = HARVEST_METRICS.get() else {
        return;
    };

    m.batches.with_label_values(&[next]).inc();
    m.batch_duration
        .with_label_values(&[next])
        .observe(duration_secs);
}

// ============================================================================
// Tests
// ============================================================================
