//! Strategy Registry Port (Driven Port)
//!
//! Resolves submitted strategy identifiers to registered strategy handles.
//! Resolution happens before any evaluator work so unknown identifiers fail
//! the job without burning a worker slot.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

use crate::domain::parameters::ParameterSet;

/// Errors from strategy resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StrategyError {
    /// No strategy is registered under the identifier.
    #[error("Strategy not found: {strategy_id}")]
    NotFound {
        /// The identifier that failed to resolve.
        strategy_id: String,
    },
}

/// A resolved strategy registration.
#[derive(Debug, Clone)]
pub struct StrategyHandle {
    /// Stable identifier used in submissions.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Parameter defaults applied beneath submitted overrides.
    pub default_params: ParameterSet,
}

/// Port for looking up registered strategies.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StrategyRegistryPort: Send + Sync {
    /// Resolve an identifier to its handle.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::NotFound`] for unregistered identifiers.
    async fn resolve(&self, strategy_id: &str) -> Result<StrategyHandle, StrategyError>;
}

/// Process-local strategy registry.
#[derive(Debug, Default)]
pub struct InMemoryStrategyRegistry {
    strategies: RwLock<HashMap<String, StrategyHandle>>,
}

impl InMemoryStrategyRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle, replacing any prior registration under its id.
    pub fn register(&self, handle: StrategyHandle) {
        self.strategies.write().insert(handle.id.clone(), handle);
    }

    /// Number of registered strategies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.read().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.read().is_empty()
    }
}

#[async_trait]
impl StrategyRegistryPort for InMemoryStrategyRegistry {
    async fn resolve(&self, strategy_id: &str) -> Result<StrategyHandle, StrategyError> {
        self.strategies
            .read()
            .get(strategy_id)
            .cloned()
            .ok_or_else(|| StrategyError::NotFound {
                strategy_id: strategy_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::parameters::ParamValue;

    use super::*;

    fn sma_cross() -> StrategyHandle {
        let mut defaults = ParameterSet::new();
        defaults.insert("fast".to_string(), ParamValue::Int(10));
        defaults.insert("slow".to_string(), ParamValue::Int(30));
        StrategyHandle {
            id: "sma_cross".to_string(),
            name: "SMA Crossover".to_string(),
            default_params: defaults,
        }
    }

    #[tokio::test]
    async fn resolves_registered_strategy() {
        let registry = InMemoryStrategyRegistry::new();
        registry.register(sma_cross());

        let handle = registry.resolve("sma_cross").await.unwrap();
        assert_eq!(handle.name, "SMA Crossover");
        assert_eq!(handle.default_params.get("fast"), Some(&ParamValue::Int(10)));
    }

    #[tokio::test]
    async fn unknown_strategy_is_not_found() {
        let registry = InMemoryStrategyRegistry::new();

        let err = registry.resolve("missing").await.unwrap_err();
        assert_eq!(
            err,
            StrategyError::NotFound {
                strategy_id: "missing".to_string()
            }
        );
    }
}
