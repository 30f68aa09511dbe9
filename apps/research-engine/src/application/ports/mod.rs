//! Application Ports (Driven)
//!
//! Ports define interfaces for the external collaborators job execution
//! depends on. Each ships with an in-memory implementation so the engine is
//! runnable and testable without external services.

mod datasets;
mod evaluator;
mod strategies;

pub use datasets::{Dataset, DatasetError, DatasetRepositoryPort, InMemoryDatasetRepository};
pub use evaluator::{
    Evaluation, EvaluationObserver, EvaluationRequest, EvaluatorError, EvaluatorPort, FnEvaluator,
    NoOpObserver,
};
pub use strategies::{InMemoryStrategyRegistry, StrategyError, StrategyHandle, StrategyRegistryPort};

#[cfg(test)]
pub use datasets::MockDatasetRepositoryPort;
#[cfg(test)]
pub use strategies::MockStrategyRegistryPort;
