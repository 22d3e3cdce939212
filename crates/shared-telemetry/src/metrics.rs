//! Prometheus metrics for the OMR evaluation pipeline.
//!
//! All metrics follow the naming convention: `omr_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., sheets_finalized_total)
//! - **Gauge**: Value that can go up or down (e.g., interventions_open)
//! - **Histogram**: Distribution of values (e.g., stage_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramVec,
    Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry.
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // LEDGER METRICS (C1)
    // =========================================================================

    /// Total ledger blocks appended.
    pub static ref LEDGER_BLOCKS_APPENDED: CounterVec = CounterVec::new(
        Opts::new("omr_ledger_blocks_appended_total", "Total ledger blocks appended"),
        &["kind"]
    ).expect("metric creation failed");

    /// Ledger append duration (includes mining).
    pub static ref LEDGER_APPEND_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "omr_ledger_append_duration_seconds",
            "Time spent appending a ledger block, including mining"
        ).buckets(exponential_buckets(0.0001, 2.0, 15).unwrap())
    ).expect("metric creation failed");

    /// Chain validation failures detected.
    pub static ref LEDGER_INTEGRITY_FAILURES: Counter = Counter::new(
        "omr_ledger_integrity_failures_total",
        "Total chain validation failures detected"
    ).expect("metric creation failed");

    // =========================================================================
    // ORCHESTRATOR METRICS (C6)
    // =========================================================================

    /// Stage transitions by kind and outcome.
    pub static ref STAGE_TRANSITIONS: CounterVec = CounterVec::new(
        Opts::new("omr_orchestrator_stage_transitions_total", "Stage transitions by stage and outcome"),
        &["stage", "outcome"] // outcome: ok/precondition_failed/gate_blocked/adapter_unavailable/cancelled
    ).expect("metric creation failed");

    /// Stage execution duration.
    pub static ref STAGE_DURATION: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "omr_orchestrator_stage_duration_seconds",
            "Time spent executing a single pipeline stage"
        ).buckets(exponential_buckets(0.001, 2.0, 15).unwrap()),
        &["stage"]
    ).expect("metric creation failed");

    /// Sheets currently in each stage.
    pub static ref SHEETS_IN_STAGE: GaugeVec = GaugeVec::new(
        Opts::new("omr_orchestrator_sheets_in_stage", "Number of sheets currently at each stage"),
        &["stage"]
    ).expect("metric creation failed");

    // =========================================================================
    // INTERVENTION METRICS (C5)
    // =========================================================================

    /// Open interventions by priority.
    pub static ref INTERVENTIONS_OPEN: GaugeVec = GaugeVec::new(
        Opts::new("omr_interventions_open", "Number of open intervention items by priority"),
        &["priority"]
    ).expect("metric creation failed");

    /// Interventions opened, by reason kind.
    pub static ref INTERVENTIONS_OPENED_TOTAL: CounterVec = CounterVec::new(
        Opts::new("omr_interventions_opened_total", "Total interventions opened by reason"),
        &["reason"]
    ).expect("metric creation failed");

    // =========================================================================
    // RECONCILIATION METRICS (C4)
    // =========================================================================

    /// Questions reconciled by resulting status.
    pub static ref RECONCILIATION_STATUS: CounterVec = CounterVec::new(
        Opts::new("omr_reconciliation_question_status_total", "Per-question reconciliation outcomes"),
        &["status"]
    ).expect("metric creation failed");

    // =========================================================================
    // ADAPTER METRICS (C3)
    // =========================================================================

    /// External adapter calls by adapter and outcome.
    pub static ref ADAPTER_CALLS: CounterVec = CounterVec::new(
        Opts::new("omr_adapter_calls_total", "External adapter calls by outcome"),
        &["adapter", "outcome"] // outcome: ok/transient/permanent/timeout
    ).expect("metric creation failed");

    /// External adapter call latency.
    pub static ref ADAPTER_DURATION: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "omr_adapter_call_duration_seconds",
            "Time spent in an external adapter call, including retries"
        ).buckets(exponential_buckets(0.005, 2.0, 15).unwrap()),
        &["adapter"]
    ).expect("metric creation failed");

    // =========================================================================
    // HTTP SURFACE METRICS (C7)
    // =========================================================================

    /// HTTP requests by route and status code.
    pub static ref HTTP_REQUESTS: CounterVec = CounterVec::new(
        Opts::new("omr_http_requests_total", "HTTP requests by route and status"),
        &["route", "status"]
    ).expect("metric creation failed");
}

/// Handle for the metrics server/registry lifecycle.
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(LEDGER_BLOCKS_APPENDED.clone()),
        Box::new(LEDGER_APPEND_DURATION.clone()),
        Box::new(LEDGER_INTEGRITY_FAILURES.clone()),
        Box::new(STAGE_TRANSITIONS.clone()),
        Box::new(STAGE_DURATION.clone()),
        Box::new(SHEETS_IN_STAGE.clone()),
        Box::new(INTERVENTIONS_OPEN.clone()),
        Box::new(INTERVENTIONS_OPENED_TOTAL.clone()),
        Box::new(RECONCILIATION_STATUS.clone()),
        Box::new(ADAPTER_CALLS.clone()),
        Box::new(ADAPTER_DURATION.clone()),
        Box::new(HTTP_REQUESTS.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format, for a `/metrics` endpoint.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        // May fail if already registered by another test in this process, which is fine.
        let _ = register_metrics();
    }

    #[test]
    fn test_counter_increment() {
        LEDGER_BLOCKS_APPENDED.with_label_values(&["SHEET_INGESTED"]).inc();
        assert!(LEDGER_BLOCKS_APPENDED.with_label_values(&["SHEET_INGESTED"]).get() >= 1);
    }

    #[test]
    fn test_gauge_set() {
        INTERVENTIONS_OPEN.with_label_values(&["high"]).set(3.0);
        assert_eq!(INTERVENTIONS_OPEN.with_label_values(&["high"]).get(), 3.0);
    }

    #[test]
    fn test_histogram_timer() {
        let _timer = HistogramTimer::new(&STAGE_DURATION.with_label_values(&["quality_assessed"]));
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
}
