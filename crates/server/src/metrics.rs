use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec, IntCounter,
    IntCounterVec, TextEncoder,
};

// Prometheus metrics (default registry)
pub static SUBMISSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "site_index_submissions_total",
        "Submissions handled, by outcome",
        &["outcome"]
    )
    .expect("register submissions_total")
});

pub static LIST_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "site_index_list_requests_total",
        "Listing requests handled, by outcome",
        &["outcome"]
    )
    .expect("register list_requests_total")
});

pub static RATE_LIMITED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "site_index_rate_limited_total",
        "Total requests rejected by rate limiter"
    )
    .expect("register rate_limited_total")
});

pub static REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "site_index_request_duration_seconds",
        "Catalog handler duration in seconds",
        &["endpoint"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("register request_duration")
});

/// Label for a handler result: `ok` or the lowercase error class.
pub fn outcome<T>(result: &Result<T, crate::errors::ApiError>) -> &'static str {
    use crate::errors::ApiError;
    match result {
        Ok(_) => "ok",
        Err(ApiError::BadRequest(_)) => "invalid",
        Err(ApiError::Conflict(_)) => "conflict",
        Err(ApiError::Internal) => "error",
        Err(ApiError::MethodNotAllowed) | Err(ApiError::PayloadTooLarge) | Err(ApiError::RateLimited) => "rejected",
    }
}

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
