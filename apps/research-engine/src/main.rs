//! Research Engine Binary
//!
//! Starts the Cream research job engine: builds the store, ports, and
//! orchestrator from configuration, then runs until a shutdown signal and
//! drains in-flight jobs. Job submission is a library concern; outer request
//! surfaces live in other services and call into [`research_engine`] directly.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin research-engine [config.yaml]
//! ```
//!
//! # Environment Variables
//!
//! ## Optional
//! - `RESEARCH_CONFIG`: Config file path (default: config.yaml)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint override
//! - `OTEL_SERVICE_NAME`: Service name for span resources
//! - `RUST_LOG`: Log filter (default: level from config)

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use research_engine::config::{Config, ObservabilityConfig, load_config};
use research_engine::infrastructure::config::Container;
use research_engine::observability::{
    MetricsConfig, TracingGuard, config_from_env, init_metrics, init_tracing,
};
use tokio::signal;
use tracing_subscriber::EnvFilter;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let config = resolve_config()?;
    let tracing_guard = init_logging(&config.observability)?;

    tracing::info!("Starting Cream Research Engine");
    log_config(&config);

    if config.observability.metrics.enabled {
        start_metrics_exporter(&config.observability)?;
    }

    let container = Container::from_config(&config)
        .await
        .context("Failed to build application container")?;
    let orchestrator = container.orchestrator();

    tracing::info!("Research engine ready");

    shutdown_signal().await;

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, orchestrator.shutdown()).await;
    if drained.is_err() {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Shutdown timed out with jobs still in flight"
        );
    }

    if let Some(guard) = tracing_guard {
        guard.shutdown();
    }

    tracing::info!("Research engine stopped");
    Ok(())
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Resolve the configuration from CLI argument, environment, or defaults.
///
/// An explicitly named file must exist; the implicit default path falls back
/// to built-in defaults when absent so the engine runs out of the box.
fn resolve_config() -> anyhow::Result<Config> {
    let explicit = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("RESEARCH_CONFIG").ok());

    match explicit {
        Some(path) => load_config(Some(&path))
            .with_context(|| format!("Failed to load config from '{path}'")),
        None => {
            if std::path::Path::new("config.yaml").exists() {
                load_config(None).context("Failed to load config.yaml")
            } else {
                Ok(Config::default())
            }
        }
    }
}

/// Initialize logging: OTLP tracing when enabled, plain fmt subscriber otherwise.
fn init_logging(config: &ObservabilityConfig) -> anyhow::Result<Option<TracingGuard>> {
    if config.tracing.enabled {
        let mut tracing_config = config_from_env();
        if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_err() {
            tracing_config.otlp_endpoint = config.tracing.otlp_endpoint.clone();
        }
        let guard = init_tracing(&tracing_config).context("Failed to initialize OTLP tracing")?;
        return Ok(Some(guard));
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format == "pretty" {
        builder.pretty().init();
    } else {
        builder.init();
    }
    Ok(None)
}

/// Log the effective configuration.
fn log_config(config: &Config) {
    tracing::info!(
        max_concurrent_jobs = config.orchestrator.max_concurrent_jobs,
        progress_interval_ms = config.orchestrator.progress_interval_ms,
        max_combinations = config.optimization.max_combinations,
        default_workers = config.optimization.default_workers,
        backend = %config.persistence.backend,
        metrics_enabled = config.observability.metrics.enabled,
        tracing_enabled = config.observability.tracing.enabled,
        "Configuration loaded"
    );
}

/// Install the Prometheus exporter HTTP listener.
fn start_metrics_exporter(config: &ObservabilityConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .metrics
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid metrics listen address '{}'", config.metrics.listen_addr))?;
    init_metrics(&MetricsConfig::with_addr(addr)).context("Failed to install metrics exporter")?;
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. Failure to install handlers
/// means the process cannot respond to termination signals, so it is better to
/// fail fast during startup than to have an unresponsive process.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
