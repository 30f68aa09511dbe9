//! Dependency Injection Container
//!
//! Manages creation and wiring of all application components from a loaded
//! [`Config`]. The default wiring ships with an in-memory store, a fixture
//! dataset repository, a static strategy registry, and a deterministic
//! closure-backed evaluator so the engine runs without external services.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use crate::application::ports::{
    DatasetRepositoryPort, Evaluation, EvaluationRequest, EvaluatorPort, FnEvaluator,
    InMemoryDatasetRepository, InMemoryStrategyRegistry, StrategyHandle, StrategyRegistryPort,
};
use crate::config::Config;
use crate::domain::job::{JobStore, StoreError};
use crate::domain::parameters::{ParamValue, ParameterSet};
use crate::infrastructure::persistence::{InMemoryJobStore, PostgresJobStore};
use crate::optimization::{OptimizationEngine, SweepSettings};
use crate::orchestrator::{JobOrchestrator, OrchestratorSettings};

/// Number of bars in each seeded demo dataset.
const DEMO_DATASET_BARS: usize = 512;

/// Dependency injection container.
///
/// Holds all wired dependencies for the application. Use
/// [`Container::from_config`] to construct from a loaded configuration.
pub struct Container {
    store: Arc<dyn JobStore>,
    strategies: Arc<dyn StrategyRegistryPort>,
    datasets: Arc<dyn DatasetRepositoryPort>,
    evaluator: Arc<dyn EvaluatorPort>,
    orchestrator: Arc<JobOrchestrator>,
}

impl Container {
    /// Build the full object graph from configuration.
    ///
    /// Selects the job store backend from `persistence.backend` and seeds the
    /// in-memory ports with demo fixtures.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the Postgres pool cannot be created or the
    /// schema migration fails.
    pub async fn from_config(config: &Config) -> Result<Self, StoreError> {
        let store: Arc<dyn JobStore> = if config.persistence.is_postgres() {
            let store = PostgresJobStore::with_max_connections(
                &config.persistence.url,
                config.persistence.max_connections,
            )
            .await?;
            store.ensure_schema().await?;
            Arc::new(store)
        } else {
            Arc::new(InMemoryJobStore::new())
        };

        Ok(Self::with_store(config, store))
    }

    /// Build the object graph around an already-constructed store.
    #[must_use]
    pub fn with_store(config: &Config, store: Arc<dyn JobStore>) -> Self {
        let strategies: Arc<dyn StrategyRegistryPort> = demo_strategies();
        let datasets: Arc<dyn DatasetRepositoryPort> = demo_datasets();
        let evaluator: Arc<dyn EvaluatorPort> = demo_evaluator();

        let sweep = SweepSettings {
            max_combinations: config.optimization.max_combinations,
            default_workers: config.optimization.default_workers,
            result_cap: config.optimization.result_cap,
            histogram_bins: config.optimization.histogram_bins,
            supported_metrics: config.optimization.supported_metrics.clone(),
        };
        let engine = Arc::new(OptimizationEngine::new(Arc::clone(&evaluator), sweep));

        let settings = OrchestratorSettings {
            max_concurrent_jobs: config.orchestrator.max_concurrent_jobs,
            progress_interval: Duration::from_millis(config.orchestrator.progress_interval_ms),
            per_combination_secs: config.orchestrator.per_combination_secs,
        };
        let orchestrator = Arc::new(JobOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&strategies),
            Arc::clone(&datasets),
            Arc::clone(&evaluator),
            engine,
            settings,
        ));

        Self {
            store,
            strategies,
            datasets,
            evaluator,
            orchestrator,
        }
    }

    /// Get the job store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.store)
    }

    /// Get the strategy registry.
    #[must_use]
    pub fn strategies(&self) -> Arc<dyn StrategyRegistryPort> {
        Arc::clone(&self.strategies)
    }

    /// Get the dataset repository.
    #[must_use]
    pub fn datasets(&self) -> Arc<dyn DatasetRepositoryPort> {
        Arc::clone(&self.datasets)
    }

    /// Get the evaluator.
    #[must_use]
    pub fn evaluator(&self) -> Arc<dyn EvaluatorPort> {
        Arc::clone(&self.evaluator)
    }

    /// Get the job orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> Arc<JobOrchestrator> {
        Arc::clone(&self.orchestrator)
    }
}

// ============================================
// Demo Fixtures
// ============================================

/// Static strategy registry seeded with the built-in demo strategies.
fn demo_strategies() -> Arc<InMemoryStrategyRegistry> {
    let registry = InMemoryStrategyRegistry::new();

    registry.register(StrategyHandle {
        id: "sma_cross".to_string(),
        name: "SMA Crossover".to_string(),
        default_params: ParameterSet::from([
            ("fast".to_string(), ParamValue::Int(10)),
            ("slow".to_string(), ParamValue::Int(30)),
        ]),
    });
    registry.register(StrategyHandle {
        id: "momentum".to_string(),
        name: "Momentum".to_string(),
        default_params: ParameterSet::from([
            ("lookback".to_string(), ParamValue::Int(20)),
            ("threshold".to_string(), ParamValue::Float(0.01)),
        ]),
    });
    registry.register(StrategyHandle {
        id: "breakout".to_string(),
        name: "Channel Breakout".to_string(),
        default_params: ParameterSet::from([
            ("window".to_string(), ParamValue::Int(55)),
            ("atr_mult".to_string(), ParamValue::Float(2.0)),
        ]),
    });

    Arc::new(registry)
}

/// Fixture dataset repository seeded with synthetic candle series.
fn demo_datasets() -> Arc<InMemoryDatasetRepository> {
    let repository = InMemoryDatasetRepository::new();
    repository.insert("BTC-USD:1h", synthetic_candles(DEMO_DATASET_BARS, 40_000.0));
    repository.insert("ETH-USD:1h", synthetic_candles(DEMO_DATASET_BARS, 2_400.0));
    repository.insert("SPY:1d", synthetic_candles(252, 480.0));
    Arc::new(repository)
}

/// Generate a deterministic synthetic candle series around a base price.
fn synthetic_candles(bars: usize, base_price: f64) -> Vec<Value> {
    let start_epoch = 1_704_067_200_i64; // 2024-01-01T00:00:00Z
    (0..bars)
        .map(|i| {
            let t = i as f64;
            let drift = t * base_price * 0.0002;
            let wave = (t / 16.0).sin() * base_price * 0.01;
            let close = base_price + drift + wave;
            let spread = base_price * 0.004;
            json!({
                "timestamp": start_epoch + i as i64 * 3600,
                "open": spread.mul_add(-0.5, close),
                "high": close + spread,
                "low": close - spread,
                "close": close,
                "volume": ((t / 5.0).sin().mul_add(40.0, 120.0)).round(),
            })
        })
        .collect()
}

/// Deterministic closure-backed evaluator.
///
/// Derives a pseudo-metric set from the parameter assignment and dataset
/// length. The same request always yields the same metrics, which keeps sweep
/// results reproducible across worker counts.
fn demo_evaluator() -> Arc<dyn EvaluatorPort> {
    Arc::new(FnEvaluator::new(|request: &EvaluationRequest| {
        let bars = request.dataset.len() as f64;
        if request.dataset.len() < 2 {
            return Ok(Evaluation::failed("Dataset window is too short"));
        }

        // Sorted keys so the seed is independent of map iteration order.
        let mut names: Vec<&String> = request.strategy_params.keys().collect();
        names.sort();
        let mut seed = 0.0_f64;
        for name in names {
            if let Some(value) = request
                .strategy_params
                .get(name)
                .and_then(ParamValue::as_float)
            {
                seed = seed.mul_add(0.7, (value * 0.37).sin());
            }
        }

        let sharpe = seed.mul_add(1.4, 0.8);
        let metrics = HashMap::from([
            ("score".to_string(), seed.mul_add(10.0, bars.ln())),
            ("sharpe".to_string(), sharpe),
            ("sortino".to_string(), sharpe * 1.25),
            ("total_return".to_string(), seed.mul_add(0.3, 0.06)),
            ("win_rate".to_string(), seed.mul_add(0.2, 0.52).clamp(0.0, 1.0)),
            ("profit_factor".to_string(), seed.mul_add(0.5, 1.35).max(0.1)),
            ("max_drawdown".to_string(), seed.mul_add(-0.08, 0.18).clamp(0.01, 0.9)),
        ]);
        Ok(Evaluation::succeeded(metrics))
    }))
}
