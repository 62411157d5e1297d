use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram, IntCounter,
    IntCounterVec, TextEncoder,
};

// Prometheus metrics (default registry)
pub static MESSAGES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "multimap_connector_messages_total",
        "Total inbound messages handled by the producer"
    )
    .expect("register messages_total")
});

pub static OPERATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "multimap_connector_operations_total",
        "Store calls issued, by operation",
        &["operation"]
    )
    .expect("register operations_total")
});

pub static FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "multimap_connector_failures_total",
        "Failed invocations, by error kind",
        &["kind"]
    )
    .expect("register failures_total")
});

pub static RESPONSES_PUBLISHED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "multimap_connector_responses_published_total",
        "Response messages handed to the downstream sink"
    )
    .expect("register responses_published_total")
});

pub static OPERATION_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "multimap_connector_operation_duration_seconds",
        "Store call duration in seconds",
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("register operation_duration")
});

pub fn encode_metrics() -> (axum::http::StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (
        axum::http::StatusCode::OK,
        String::from_utf8(buffer).unwrap_or_default(),
    )
}
