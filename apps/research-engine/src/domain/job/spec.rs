//! Submission payloads carried on the job row.
//!
//! The orchestrator serializes the validated spec into `Job::spec` at
//! creation; the matching runner deserializes it back inside the worker.
//! Workers never re-read caller state.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::parameters::{ParameterRanges, ParameterSet};

/// Submission payload for a single-strategy backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSpec {
    /// Strategy to resolve through the registry.
    pub strategy_id: String,
    /// Concrete strategy parameters.
    #[serde(default)]
    pub strategy_params: ParameterSet,
    /// Dataset reference passed to the dataset repository.
    pub dataset_ref: String,
    /// Opaque evaluator options, forwarded untouched.
    #[serde(default)]
    pub engine_options: Value,
}

impl BacktestSpec {
    /// Check required fields, returning a human-readable violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.strategy_id.trim().is_empty() {
            return Err("backtest requires a strategy_id".to_string());
        }
        if self.dataset_ref.trim().is_empty() {
            return Err("backtest requires a dataset_ref".to_string());
        }
        Ok(())
    }
}

/// Submission payload for a parameter-optimization sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationSpec {
    /// Strategy to resolve through the registry.
    pub strategy_id: String,
    /// Dataset to sweep over.
    pub dataset_id: String,
    /// Tunable dimensions in declaration order.
    pub param_ranges: ParameterRanges,
    /// Metric name selected from the supported set.
    pub optimization_metric: String,
    /// Requested sweep concurrency; `0` defers to configuration and the
    /// effective pool is never below one.
    #[serde(default)]
    pub max_workers: usize,
    /// Trailing validation fraction; values outside `(0, 1)` disable the
    /// hold-out split.
    #[serde(default)]
    pub validation_split: f64,
    /// Opaque evaluator options, forwarded untouched.
    #[serde(default)]
    pub engine_options: Value,
}

impl OptimizationSpec {
    /// Check required fields, returning a human-readable violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.strategy_id.trim().is_empty() {
            return Err("optimization requires a strategy_id".to_string());
        }
        if self.dataset_id.trim().is_empty() {
            return Err("optimization requires a dataset_id".to_string());
        }
        if self.optimization_metric.trim().is_empty() {
            return Err("optimization requires an optimization_metric".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn backtest_spec_defaults() {
        let spec: BacktestSpec = serde_json::from_value(json!({
            "strategy_id": "sma_cross",
            "dataset_ref": "spy-1h-2024"
        }))
        .unwrap();

        assert!(spec.strategy_params.is_empty());
        assert!(spec.engine_options.is_null());
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn backtest_spec_requires_strategy() {
        let spec: BacktestSpec = serde_json::from_value(json!({
            "strategy_id": "  ",
            "dataset_ref": "spy-1h-2024"
        }))
        .unwrap();

        let Err(msg) = spec.validate() else {
            panic!("blank strategy_id should fail validation");
        };
        assert!(msg.contains("strategy_id"));
    }

    #[test]
    fn optimization_spec_round_trip_preserves_range_order() {
        let spec: OptimizationSpec = serde_json::from_value(json!({
            "strategy_id": "sma_cross",
            "dataset_id": "spy-1h-2024",
            "param_ranges": {
                "slow": {"type": "choice", "values": [50, 100]},
                "fast": {"type": "choice", "values": [5, 10]}
            },
            "optimization_metric": "sharpe"
        }))
        .unwrap();

        let names: Vec<&str> = spec
            .param_ranges
            .as_slice()
            .iter()
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(names, vec!["slow", "fast"]);
        assert_eq!(spec.max_workers, 0);
        assert!((spec.validation_split - 0.0).abs() < f64::EPSILON);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn optimization_spec_requires_metric() {
        let spec: OptimizationSpec = serde_json::from_value(json!({
            "strategy_id": "sma_cross",
            "dataset_id": "spy-1h-2024",
            "param_ranges": {},
            "optimization_metric": ""
        }))
        .unwrap();

        assert!(spec.validate().is_err());
    }
}
