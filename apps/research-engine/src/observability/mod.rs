//! Observability module for metrics, tracing, and logging.
//!
//! This module provides instrumentation for the research engine,
//! including Prometheus metrics export and distributed tracing.

pub mod metrics;
pub mod tracing;

pub use metrics::{MetricsConfig, MetricsError, init_metrics};
pub use tracing::{
    TracingConfig, TracingError, TracingGuard, config_from_env, init_tracing, span_attrs,
};
