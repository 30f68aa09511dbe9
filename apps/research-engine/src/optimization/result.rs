//! Result types for optimization sweeps.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::parameters::ParameterSet;

use super::analysis::SweepAnalysis;

/// Outcome class of one combination inside a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Evaluation succeeded and produced the optimization metric.
    Completed,
    /// Evaluation ran but was judged unusable, or the metric was absent.
    Failed,
    /// The evaluator itself raised an error.
    Error,
}

/// One combination's outcome.
///
/// Failed and errored entries carry `optimization_score = -inf` so they never
/// win best-result selection and sort to the bottom of the ranking. Note that
/// `-inf` serializes to JSON `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEntry {
    /// The evaluated parameter assignment.
    pub parameters: ParameterSet,
    /// Metrics returned by the evaluator (may be empty on error).
    pub metrics: HashMap<String, f64>,
    /// Value of the optimization metric, `-inf` unless completed.
    pub optimization_score: f64,
    /// Outcome class.
    pub status: EntryStatus,
    /// Failure description for failed/errored entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultEntry {
    /// A successful evaluation with its metric value.
    #[must_use]
    pub const fn completed(
        parameters: ParameterSet,
        metrics: HashMap<String, f64>,
        optimization_score: f64,
    ) -> Self {
        Self {
            parameters,
            metrics,
            optimization_score,
            status: EntryStatus::Completed,
            error: None,
        }
    }

    /// An in-band evaluation failure.
    #[must_use]
    pub fn failed(
        parameters: ParameterSet,
        metrics: HashMap<String, f64>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            parameters,
            metrics,
            optimization_score: f64::NEG_INFINITY,
            status: EntryStatus::Failed,
            error: Some(error.into()),
        }
    }

    /// An evaluator error.
    #[must_use]
    pub fn errored(parameters: ParameterSet, error: impl Into<String>) -> Self {
        Self {
            parameters,
            metrics: HashMap::new(),
            optimization_score: f64::NEG_INFINITY,
            status: EntryStatus::Error,
            error: Some(error.into()),
        }
    }

    /// Whether this entry is eligible for best-result selection.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.status == EntryStatus::Completed
    }
}

/// Held-out validation outcome for the winning combination.
///
/// Reported separately from the sweep and never affects selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// Rows in the validation slice.
    pub rows: usize,
    /// Value of the optimization metric on the validation slice, if present.
    pub score: Option<f64>,
    /// Full metrics from the validation run.
    pub metrics: HashMap<String, f64>,
    /// Whether the validation evaluation succeeded.
    pub success: bool,
    /// Failure description when unsuccessful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Complete sweep report, folded into `result_data` on completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    /// The metric the sweep optimized.
    pub optimization_metric: String,
    /// Combinations evaluated (full expansion, before the result cap).
    pub total_combinations: usize,
    /// Entries with status `completed`.
    pub successful_runs: usize,
    /// Entries with status `failed` or `error`.
    pub failed_runs: usize,
    /// Winning parameter assignment, absent when nothing succeeded.
    pub best_parameters: Option<ParameterSet>,
    /// Winning score, absent when nothing succeeded.
    pub best_score: Option<f64>,
    /// Full metrics of the winning run.
    pub best_metrics: Option<HashMap<String, f64>>,
    /// Held-out validation of the winner, when a split was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationOutcome>,
    /// Entries ranked by score descending, capped to bound payload size.
    pub results: Vec<ResultEntry>,
    /// Statistics computed over the complete (uncapped) entry set.
    pub analysis: SweepAnalysis,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::domain::parameters::ParamValue;

    use super::*;

    fn params(x: i64) -> ParameterSet {
        let mut set = ParameterSet::new();
        set.insert("x".to_string(), ParamValue::Int(x));
        set
    }

    #[test]
    fn failed_entry_scores_negative_infinity() {
        let entry = ResultEntry::failed(params(2), HashMap::new(), "no trades");
        assert_eq!(entry.status, EntryStatus::Failed);
        assert!(entry.optimization_score.is_infinite());
        assert!(entry.optimization_score.is_sign_negative());
        assert!(!entry.is_successful());
    }

    #[test]
    fn entry_status_serializes_lowercase() {
        let entry = ResultEntry::errored(params(1), "connection reset");
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["status"], json!("error"));
        // -inf has no JSON representation; serde_json emits null.
        assert_eq!(value["optimization_score"], json!(null));
        assert_eq!(value["error"], json!("connection reset"));
    }

    #[test]
    fn completed_entry_round_trips() {
        let mut metrics = HashMap::new();
        metrics.insert("sharpe".to_string(), 1.8);
        let entry = ResultEntry::completed(params(3), metrics, 1.8);

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["status"], json!("completed"));
        assert_eq!(value["optimization_score"], json!(1.8));
        assert!(value.get("error").is_none());
    }
}
