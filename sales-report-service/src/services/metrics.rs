//! Prometheus metrics for sales-report-service.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

/// Recorder for the `metrics` facade used by the shared HTTP middleware.
static HTTP_METRICS_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Counter for report runs by dimension and outcome.
pub static REPORT_RUNS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sales_report_runs_total",
        "Total number of report runs",
        &["dimension", "outcome"]
    )
    .expect("Failed to register REPORT_RUNS")
});

/// Counter for failed collection reads.
pub static FETCH_FAILURES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sales_report_fetch_failures_total",
        "Total number of failed collection reads",
        &["collection"]
    )
    .expect("Failed to register FETCH_FAILURES")
});

/// Counter for normalized line items by record kind.
pub static LINE_ITEMS_NORMALIZED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sales_report_line_items_normalized_total",
        "Total number of normalized line items",
        &["kind"]
    )
    .expect("Failed to register LINE_ITEMS_NORMALIZED")
});

/// Histogram for store query duration by collection.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "sales_report_db_query_duration_seconds",
        "Document store query duration in seconds",
        &["collection"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Initialize all metrics. Safe to call more than once.
pub fn init_metrics() {
    HTTP_METRICS_HANDLE.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder already installed");
            None
        }
    });
    Lazy::force(&REPORT_RUNS);
    Lazy::force(&FETCH_FAILURES);
    Lazy::force(&LINE_ITEMS_NORMALIZED);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    let mut output = String::from_utf8_lossy(&buffer).into_owned();

    if let Some(Some(handle)) = HTTP_METRICS_HANDLE.get() {
        output.push_str(&handle.render());
    }
    output
}

/// Record a finished report run. `outcome` is one of `ok`, `fetch_failed`,
/// `superseded`.
pub fn record_report_run(dimension: &str, outcome: &str) {
    REPORT_RUNS.with_label_values(&[dimension, outcome]).inc();
}

pub fn record_fetch_failure(collection: &str) {
    FETCH_FAILURES.with_label_values(&[collection]).inc();
}

pub fn record_line_items(kind: &str, count: usize) {
    LINE_ITEMS_NORMALIZED
        .with_label_values(&[kind])
        .inc_by(count as f64);
}

pub fn record_db_query_duration(collection: &str, duration_secs: f64) {
    DB_QUERY_DURATION
        .with_label_values(&[collection])
        .observe(duration_secs);
}
