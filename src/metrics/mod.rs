//! Metrics module
//!
//! Provides Prometheus metrics for the upload pipeline.

pub mod server;

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    HistogramVec,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "image_relay_uploads_total",
        "Total number of upload requests by outcome",
        &["status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "image_relay_upload_bytes_total",
        "Total bytes forwarded to the media host"
    ).unwrap();

    pub static ref STAGE_DURATION: HistogramVec = register_histogram_vec!(
        "image_relay_stage_duration_seconds",
        "Duration of upload pipeline stages in seconds",
        &["stage"],
        vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    // Remote assets left without a record
    pub static ref ORPHANED_ASSETS: CounterVec = register_counter_vec!(
        "image_relay_orphaned_assets_total",
        "Hosted assets whose record could not be saved",
        &["cleanup"]
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "image_relay_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&["success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record an upload that ended in `status` (rejected, provider_error, ...)
pub fn record_upload_failure(status: &str) {
    UPLOADS_TOTAL.with_label_values(&[status]).inc();
}

/// Record how long a pipeline stage took
pub fn record_stage_duration(stage: &str, duration_secs: f64) {
    STAGE_DURATION
        .with_label_values(&[stage])
        .observe(duration_secs);
}

/// Record an orphaned hosted asset
///
/// `cleanup` is one of "none", "deleted" or "failed".
pub fn record_orphaned_asset(cleanup: &str) {
    ORPHANED_ASSETS.with_label_values(&[cleanup]).inc();
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}
