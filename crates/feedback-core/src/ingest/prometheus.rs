//! Prometheus metrics for the ingestion endpoint.
//!
//! - `feedback_submissions_total{status}` - Accepted submissions by outcome
//! - `feedback_rate_limited_total` - Requests rejected by the rate limiter
//! - `feedback_idempotency_total{result}` - Idempotency lookups (hit, miss, error)
//! - `feedback_gated_total` - Responses persisted over quota
//! - `feedback_notifications_total{result}` - Threshold notifications (sent, failed)

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Later calls return the installed handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!("feedback_submissions_total", "Accepted submissions by status");
    describe_counter!("feedback_rate_limited_total", "Requests rejected by the rate limiter");
    describe_counter!("feedback_idempotency_total", "Idempotency cache lookups by result");
    describe_counter!("feedback_gated_total", "Responses persisted as gated (over quota)");
    describe_counter!(
        "feedback_notifications_total",
        "Usage threshold notifications by delivery result"
    );

    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

pub fn record_submission(status: &'static str) {
    counter!("feedback_submissions_total", "status" => status).increment(1);
}

pub fn record_rate_limited() {
    counter!("feedback_rate_limited_total").increment(1);
}

pub fn record_idempotency(result: &'static str) {
    counter!("feedback_idempotency_total", "result" => result).increment(1);
}

pub fn record_gated() {
    counter!("feedback_gated_total").increment(1);
}

pub fn record_notification(result: &'static str) {
    counter!("feedback_notifications_total", "result" => result).increment(1);
}
