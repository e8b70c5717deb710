//! Prometheus metrics for the delay layer.
//!
//! Tracks injected delays and unresolvable dynamic values per scope.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Total number of delays injected
    pub static ref DELAYS_INJECTED_TOTAL: CounterVec = register_counter_vec!(
        "lull_delays_injected_total",
        "Total number of sleep_ms delays injected",
        &["scope"]
    )
    .unwrap();

    /// Injected delay duration in milliseconds
    pub static ref DELAY_INJECTED_MS: HistogramVec = register_histogram_vec!(
        "lull_delay_injected_ms",
        "Histogram of injected delay in milliseconds",
        &["scope"],
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap();

    /// Dynamic values that failed request-time resolution
    pub static ref UNRESOLVED_DELAY_VALUES_TOTAL: CounterVec = register_counter_vec!(
        "lull_unresolved_delay_values_total",
        "Total number of sleep_ms expressions that resolved to an invalid value",
        &["scope"]
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
