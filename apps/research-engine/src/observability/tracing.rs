//! OpenTelemetry distributed tracing for the research engine.
//!
//! Provides distributed tracing with OTLP export for job lifecycle,
//! sweep execution, and store access spans.
//!
//! # Example
//!
//! ```ignore
//! use research_engine::observability::{TracingConfig, init_tracing};
//!
//! let config = TracingConfig::default();
//! let guard = init_tracing(&config).expect("Failed to initialize tracing");
//! // ... run ...
//! guard.shutdown();
//! ```
//!
//! # Key Spans
//!
//! - `job.submit` - Validation and row creation
//! - `job.run` - Full job execution from `running` to terminal
//! - `sweep.run` - Grid expansion through best-result selection

use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{BatchSpanProcessor, Sampler, SdkTracerProvider};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Configuration for OpenTelemetry tracing.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// OTLP endpoint URL (e.g., "http://localhost:4317").
    pub otlp_endpoint: String,
    /// Service name for resource attributes.
    pub service_name: String,
    /// Service version for resource attributes.
    pub service_version: String,
    /// Sampling ratio (0.0 to 1.0).
    pub sampling_ratio: f64,
    /// Maximum batch size for span export.
    pub batch_size: usize,
    /// Scheduled delay between batch exports.
    pub batch_timeout: Duration,
    /// Whether to enable console logging layer.
    pub enable_console: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: "http://localhost:4317".to_string(),
            service_name: "research-engine".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            sampling_ratio: 1.0,
            batch_size: 512,
            batch_timeout: Duration::from_secs(5),
            enable_console: true,
        }
    }
}

impl TracingConfig {
    /// Create a new tracing configuration with a custom endpoint.
    #[must_use]
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            otlp_endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the service name.
    #[must_use]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Disable console logging layer.
    #[must_use]
    pub fn without_console(mut self) -> Self {
        self.enable_console = false;
        self
    }
}

/// Error type for tracing operations.
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    /// Failed to create OTLP exporter.
    #[error("failed to create OTLP exporter: {0}")]
    ExporterError(String),
    /// Failed to initialize tracing subscriber.
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberError(String),
}

/// Tracer provider handle for graceful shutdown.
pub struct TracingGuard {
    provider: SdkTracerProvider,
}

impl TracingGuard {
    /// Shutdown the tracer provider, flushing any pending spans.
    ///
    /// This should be called before the application exits to ensure
    /// all spans are exported.
    pub fn shutdown(self) {
        if let Err(e) = self.provider.shutdown() {
            tracing::error!(error = %e, "Failed to shutdown tracer provider");
        }
    }
}

/// Initialize OpenTelemetry tracing with OTLP exporter.
///
/// This sets up:
/// - OTLP gRPC exporter with batch processing
/// - Resource attributes (service name, version)
/// - Parent-based ratio sampling
/// - tracing-subscriber with OpenTelemetry layer
/// - Optional console logging layer
///
/// # Returns
///
/// A `TracingGuard` that should be held until shutdown.
///
/// # Errors
///
/// Returns an error if the OTLP exporter or subscriber fails to initialize.
///
/// # Panics
///
/// Panics if the tracing subscriber has already been set.
pub fn init_tracing(config: &TracingConfig) -> Result<TracingGuard, TracingError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()
        .map_err(|e| TracingError::ExporterError(e.to_string()))?;

    let resource = Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", config.service_name.clone()),
            KeyValue::new("service.version", config.service_version.clone()),
        ])
        .build();

    let batch_processor = BatchSpanProcessor::builder(exporter)
        .with_batch_config(
            opentelemetry_sdk::trace::BatchConfigBuilder::default()
                .with_max_export_batch_size(config.batch_size)
                .with_scheduled_delay(config.batch_timeout)
                .build(),
        )
        .build();

    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
            config.sampling_ratio,
        ))))
        .with_span_processor(batch_processor)
        .build();

    let tracer = provider.tracer(config.service_name.clone());

    let otel_layer = OpenTelemetryLayer::new(tracer);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if config.enable_console {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(otel_layer)
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(otel_layer)
            .init();
    }

    tracing::info!(
        endpoint = %config.otlp_endpoint,
        service = %config.service_name,
        "OpenTelemetry tracing initialized"
    );

    Ok(TracingGuard { provider })
}

/// Create a tracing configuration from environment variables.
///
/// Reads the following environment variables:
/// - `OTEL_EXPORTER_OTLP_ENDPOINT` - OTLP endpoint (default: http://localhost:4317)
/// - `OTEL_SERVICE_NAME` - Service name (default: research-engine)
/// - `OTEL_TRACES_SAMPLER_ARG` - Sampling ratio (default: 1.0)
#[must_use]
pub fn config_from_env() -> TracingConfig {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4317".to_string());
    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "research-engine".to_string());
    let sampling_ratio = std::env::var("OTEL_TRACES_SAMPLER_ARG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1.0);

    TracingConfig {
        otlp_endpoint: endpoint,
        service_name,
        sampling_ratio,
        ..Default::default()
    }
}

// ============================================================================
// Span attribute helpers
// ============================================================================

/// Common span attribute keys for job operations.
pub mod span_attrs {
    /// Job ID attribute key.
    pub const JOB_ID: &str = "job.id";
    /// Job kind attribute key (backtest/optimization).
    pub const JOB_KIND: &str = "job.kind";
    /// Terminal status attribute key.
    pub const JOB_STATUS: &str = "job.status";
    /// Strategy identifier attribute key.
    pub const STRATEGY_ID: &str = "strategy.id";
    /// Dataset reference attribute key.
    pub const DATASET_REF: &str = "dataset.ref";
    /// Optimization metric attribute key.
    pub const SWEEP_METRIC: &str = "sweep.metric";
    /// Expanded combination count attribute key.
    pub const SWEEP_COMBINATIONS: &str = "sweep.combinations";
    /// Effective worker count attribute key.
    pub const SWEEP_WORKERS: &str = "sweep.workers";
}

// ============================================================================
// Tests
// ============================================================================
