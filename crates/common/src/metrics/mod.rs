//! Metrics and observability utilities
//!
//! Provides Prometheus metrics for workflow operations with
//! standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all ReviewForge metrics
pub const METRICS_PREFIX: &str = "reviewforge";

/// Histogram buckets for request and operation latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s, default store timeout
    10.00,  // 10s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Workflow metrics
    describe_counter!(
        format!("{}_workflow_operations_total", METRICS_PREFIX),
        Unit::Count,
        "Workflow operations by name and outcome"
    );

    describe_histogram!(
        format!("{}_workflow_operation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Workflow operation latency in seconds"
    );

    describe_counter!(
        format!("{}_status_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Manuscript status transitions"
    );

    describe_counter!(
        format!("{}_reviews_submitted_total", METRICS_PREFIX),
        Unit::Count,
        "Total reviews recorded"
    );

    describe_gauge!(
        format!("{}_aggregate_overall_mean", METRICS_PREFIX),
        Unit::Count,
        "Overall mean rating of the last closed review cycle"
    );

    describe_counter!(
        format!("{}_event_subscribers_lagged_total", METRICS_PREFIX),
        Unit::Count,
        "Workflow events dropped for slow subscribers"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record a finished workflow operation; `outcome` is "ok" or an error code
pub fn record_operation(operation: &'static str, outcome: &str, duration_secs: f64) {
    counter!(
        format!("{}_workflow_operations_total", METRICS_PREFIX),
        "operation" => operation,
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_workflow_operation_duration_seconds", METRICS_PREFIX),
        "operation" => operation
    )
    .record(duration_secs);
}

/// Record a manuscript status change
pub fn record_transition(from: &'static str, to: &'static str) {
    counter!(
        format!("{}_status_transitions_total", METRICS_PREFIX),
        "from" => from,
        "to" => to
    )
    .increment(1);
}

pub fn record_review_submitted() {
    counter!(format!("{}_reviews_submitted_total", METRICS_PREFIX)).increment(1);
}

/// Record the aggregate computed when a review cycle closes
pub fn record_aggregation(overall_mean: f64, recommendation: &'static str) {
    gauge!(
        format!("{}_aggregate_overall_mean", METRICS_PREFIX),
        "recommendation" => recommendation
    )
    .set(overall_mean);
}

pub fn record_events_lagged(skipped: u64) {
    counter!(format!("{}_event_subscribers_lagged_total", METRICS_PREFIX)).increment(skipped);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }

        // Store timeout default must land on a bucket boundary
        assert!(LATENCY_BUCKETS.contains(&5.0));
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("GET", "/v1/manuscripts");
        std::thread::sleep(std::time::Duration::from_millis(5));
        metrics.finish(200);
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: calls are no-ops and must not panic
        record_operation("submit", "ok", 0.01);
        record_transition("submitted", "under_review");
        record_review_submitted();
        record_aggregation(7.5, "accept");
        record_events_lagged(3);
    }
}
