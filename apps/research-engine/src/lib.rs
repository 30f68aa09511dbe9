// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Research Engine - Rust Core Library
//!
//! Background job orchestration and parameter-optimization engine for the
//! Cream trading system.
//!
//! # Architecture (Clean Architecture + DDD + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Core business logic (entities, lifecycle invariants)
//!   - `job`: Job record, status state machine, store contract
//!   - `parameters`: Tunable parameter ranges and grid expansion
//!
//! - **Application**: Port definitions
//!   - `ports`: Interfaces for external systems (`EvaluatorPort`,
//!     `DatasetRepositoryPort`, `StrategyRegistryPort`)
//!
//! - **Engine**: Job execution
//!   - `runner`: Per-kind runners driving one job to a terminal state
//!   - `optimization`: Grid expansion, bounded-parallel sweeps, analysis
//!   - `orchestrator`: Public facade, worker pool, cancellation registry
//!
//! - **Infrastructure**: Adapters (implementations)
//!   - `persistence`: Job store backends (in-memory, `PostgreSQL`)
//!   - `config`: Dependency injection container
//!
//! - **Cross-cutting**
//!   - `config`: YAML configuration with env interpolation
//!   - `observability`: Prometheus metrics and OTLP tracing
//!
//! # Coverage
//!
//! Coverage threshold: 90% (Critical tier)

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Runner layer - Per-kind job execution strategies.
pub mod runner;

/// Optimization layer - Parameter sweeps and result analysis.
pub mod optimization;

/// Orchestrator layer - Public job facade and worker pool.
pub mod orchestrator;

/// Infrastructure layer - Adapters and composition root.
pub mod infrastructure;

/// Configuration loading and validation.
pub mod config;

/// Metrics and distributed tracing.
pub mod observability;

// =============================================================================
// Re-exports from Clean Architecture
// =============================================================================

// Domain re-exports
pub use domain::job::{
    BacktestSpec, DEFAULT_LIST_LIMIT, Job, JobFilter, JobKind, JobStats, JobStatus, JobStore,
    OptimizationSpec, StoreError,
};
pub use domain::parameters::{
    ParamValue, ParameterError, ParameterGrid, ParameterRange, ParameterRanges, ParameterSet,
};

// Application re-exports
pub use application::ports::{
    Dataset, DatasetError, DatasetRepositoryPort, Evaluation, EvaluationObserver,
    EvaluationRequest, EvaluatorError, EvaluatorPort, FnEvaluator, InMemoryDatasetRepository,
    InMemoryStrategyRegistry, NoOpObserver, StrategyError, StrategyHandle, StrategyRegistryPort,
};

// Engine re-exports
pub use optimization::{
    OptimizationEngine, OptimizationError, OptimizationReport, ResultEntry, SweepSettings,
};
pub use orchestrator::{
    JobOrchestrator, OptimizationSubmission, OrchestratorError, OrchestratorSettings,
};
pub use runner::{BacktestRunner, OptimizationRunner, ProgressReporter, RunError};

// Infrastructure re-exports
pub use config::{Config, ConfigError, load_config, load_config_from_string};
pub use infrastructure::config::Container;
pub use infrastructure::persistence::{InMemoryJobStore, PostgresJobStore};
