//! Prometheus metrics for the research engine.
//!
//! Provides metrics for job lifecycle, optimization sweeps, evaluator
//! activity, progress throttling, and store traffic.
//!
//! # Example
//!
//! ```ignore
//! use research_engine::observability::{MetricsConfig, init_metrics};
//!
//! let config = MetricsConfig::default();
//! init_metrics(&config).expect("Failed to initialize metrics");
//!
//! // Record a submission
//! record_job_submitted(JobKind::Backtest);
//! ```

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

use crate::domain::job::{JobKind, JobStatus};

/// Configuration for the metrics exporter.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP listener.
    pub listen_addr: SocketAddr,
    /// Histogram buckets for job durations (in seconds).
    pub duration_buckets: Vec<f64>,
    /// Histogram buckets for sweep combination counts.
    pub sweep_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9090".parse().expect("valid default address"),
            // Duration buckets from 100ms to 10 minutes
            duration_buckets: vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0],
            // Sweep buckets from 1 to the default combination ceiling
            sweep_buckets: vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0],
        }
    }
}

impl MetricsConfig {
    /// Create a new metrics configuration with custom address.
    #[must_use]
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            listen_addr: addr,
            ..Default::default()
        }
    }
}

/// Initialize the Prometheus metrics exporter.
///
/// This starts an HTTP server that exposes metrics at `/metrics`.
///
/// # Errors
///
/// Returns an error if the metrics exporter fails to start (e.g., port
/// already in use).
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .set_buckets(&config.duration_buckets)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .set_buckets_for_metric(
            Matcher::Full("sweep_combinations".to_string()),
            &config.sweep_buckets,
        )
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(
        addr = %config.listen_addr,
        "Prometheus metrics exporter started"
    );

    Ok(())
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to configure metrics exporter.
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    /// Failed to install metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

// ============================================================================
// Job Lifecycle Metrics
// ============================================================================

/// Record an accepted job submission.
pub fn record_job_submitted(kind: JobKind) {
    counter!(
        "jobs_submitted_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record a job reaching a terminal status.
pub fn record_job_finished(kind: JobKind, status: JobStatus) {
    counter!(
        "jobs_finished_total",
        "kind" => kind.as_str(),
        "status" => status.as_str()
    )
    .increment(1);
}

/// Record wall-clock duration of one job run.
pub fn record_job_duration(kind: JobKind, duration_seconds: f64) {
    histogram!(
        "job_duration_seconds",
        "kind" => kind.as_str()
    )
    .record(duration_seconds);
}

/// Record a cancel request and whether it reached a live job.
pub fn record_cancel_request(accepted: bool) {
    counter!(
        "job_cancel_requests_total",
        "outcome" => if accepted { "accepted" } else { "missed" }
    )
    .increment(1);
}

// ============================================================================
// Optimization Sweep Metrics
// ============================================================================

/// Record the expanded combination count of one sweep.
pub fn record_sweep_size(combinations: usize) {
    histogram!("sweep_combinations").record(combinations as f64);
}

/// Record one evaluator invocation.
pub fn record_evaluator_call() {
    counter!("evaluator_calls_total").increment(1);
}

/// Record one failed or errored evaluator invocation.
pub fn record_evaluator_failure() {
    counter!("evaluator_failures_total").increment(1);
}

// ============================================================================
// Progress and Store Metrics
// ============================================================================

/// Record a progress update dropped by the throttle window.
pub fn record_progress_throttled() {
    counter!("progress_updates_throttled_total").increment(1);
}

/// Record one job store operation.
pub fn record_store_operation(operation: &'static str) {
    counter!(
        "store_operations_total",
        "operation" => operation
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert_eq!(config.listen_addr.port(), 9090);
        assert!(!config.duration_buckets.is_empty());
        assert!(!config.sweep_buckets.is_empty());
    }

    #[test]
    fn test_config_with_addr() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let config = MetricsConfig::with_addr(addr);
        assert_eq!(config.listen_addr.port(), 8080);
    }

    #[test]
    fn test_duration_buckets_cover_long_jobs() {
        let config = MetricsConfig::default();
        let largest = config.duration_buckets.last().copied().unwrap();
        assert!((largest - 600.0).abs() < f64::EPSILON);
    }

    // Recording without an installed recorder must not panic.

    #[test]
    fn test_record_job_lifecycle() {
        record_job_submitted(JobKind::Backtest);
        record_job_finished(JobKind::Optimization, JobStatus::Completed);
        record_job_duration(JobKind::Backtest, 1.25);
        record_cancel_request(true);
        record_cancel_request(false);
    }

    #[test]
    fn test_record_sweep_activity() {
        record_sweep_size(27);
        record_evaluator_call();
        record_evaluator_failure();
    }

    #[test]
    fn test_record_progress_and_store() {
        record_progress_throttled();
        record_store_operation("list");
    }
}
