//! Metrics module
//!
//! Prometheus counters and histograms for COS requests, retries and
//! multipart sessions. Recording is a no-op when the `metrics` feature is off.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    // Request metrics
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "cos_requests_total",
        "Total number of COS requests",
        &["method", "outcome"]  // "success", "service_error" or "transport_error"
    ).unwrap();

    pub static ref REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "cos_request_duration_seconds",
        "COS request duration in seconds",
        &["method"],
        vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 60.0]
    ).unwrap();

    // Retry metrics
    pub static ref RETRIES_TOTAL: CounterVec = register_counter_vec!(
        "cos_retries_total",
        "Attempts retried after a retryable error",
        &["operation"]
    ).unwrap();

    // Multipart metrics
    pub static ref MULTIPART_UPLOADS: CounterVec = register_counter_vec!(
        "cos_multipart_uploads_total",
        "Multipart sessions by terminal state",
        &["bucket", "state"]  // "completed", "aborted" or "failed"
    ).unwrap();

    pub static ref PART_BYTES: CounterVec = register_counter_vec!(
        "cos_multipart_part_bytes_total",
        "Bytes sent as multipart parts",
        &["bucket"]
    ).unwrap();
}

/// Record a finished request
pub fn record_request(method: &str, outcome: &str, duration_secs: f64) {
    if !cfg!(feature = "metrics") {
        return;
    }
    REQUESTS_TOTAL.with_label_values(&[method, outcome]).inc();
    REQUEST_DURATION
        .with_label_values(&[method])
        .observe(duration_secs);
}

/// Record a retried attempt
pub fn record_retry(operation: &str) {
    if !cfg!(feature = "metrics") {
        return;
    }
    RETRIES_TOTAL.with_label_values(&[operation]).inc();
}

/// Record a multipart session reaching a terminal state
pub fn record_multipart(bucket: &str, state: &str) {
    if !cfg!(feature = "metrics") {
        return;
    }
    MULTIPART_UPLOADS.with_label_values(&[bucket, state]).inc();
}

/// Record an uploaded part
pub fn record_part_bytes(bucket: &str, bytes: u64) {
    if !cfg!(feature = "metrics") {
        return;
    }
    PART_BYTES.with_label_values(&[bucket]).inc_by(bytes as f64);
}

/// Encode the default registry in the text exposition format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
