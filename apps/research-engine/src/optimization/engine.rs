//! Bounded-parallel sweep execution.
//!
//! One evaluator call per combination, `buffer_unordered` over a pool of
//! `max(1, workers)`, completion-order progress reporting, and input-order
//! result collection so rankings and tie-breaks are deterministic regardless
//! of scheduling.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::ports::{Dataset, EvaluationRequest, EvaluatorPort, NoOpObserver};
use crate::domain::job::OptimizationSpec;
use crate::domain::parameters::{ParameterGrid, ParameterSet};
use crate::observability::metrics::{
    record_evaluator_call, record_evaluator_failure, record_sweep_size,
};

use super::analysis::analyze_sweep;
use super::error::OptimizationError;
use super::result::{OptimizationReport, ResultEntry, ValidationOutcome};
use super::split::split_dataset;

/// Tunables for sweep execution.
#[derive(Debug, Clone)]
pub struct SweepSettings {
    /// Hard ceiling on expanded combinations.
    pub max_combinations: usize,
    /// Worker count applied when the spec requests zero.
    pub default_workers: usize,
    /// Ranked entries retained in the report.
    pub result_cap: usize,
    /// Target histogram bucket count.
    pub histogram_bins: usize,
    /// Metric names accepted for optimization (case-sensitive).
    pub supported_metrics: Vec<String>,
}

impl SweepSettings {
    /// Metric names accepted when none are configured.
    pub const DEFAULT_METRICS: [&'static str; 7] = [
        "score",
        "sharpe",
        "sortino",
        "total_return",
        "win_rate",
        "profit_factor",
        "max_drawdown",
    ];

    /// Effective sweep concurrency for a requested worker count.
    ///
    /// Zero defers to the configured default; the result is never below one.
    #[must_use]
    pub fn effective_workers(&self, requested: usize) -> usize {
        let workers = if requested == 0 {
            self.default_workers
        } else {
            requested
        };
        workers.max(1)
    }
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            max_combinations: 1000,
            default_workers: 4,
            result_cap: 50,
            histogram_bins: 10,
            supported_metrics: Self::DEFAULT_METRICS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// Receives `(completed, total)` counts as sweep combinations finish.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Called after each combination completes.
    async fn report(&self, completed: usize, total: usize);
}

/// Sink that discards sweep progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpProgressSink;

#[async_trait]
impl ProgressSink for NoOpProgressSink {
    async fn report(&self, _completed: usize, _total: usize) {}
}

/// Executes parameter sweeps against the evaluator port.
pub struct OptimizationEngine {
    evaluator: Arc<dyn EvaluatorPort>,
    settings: SweepSettings,
}

impl OptimizationEngine {
    /// Create an engine over an evaluator.
    #[must_use]
    pub fn new(evaluator: Arc<dyn EvaluatorPort>, settings: SweepSettings) -> Self {
        Self {
            evaluator,
            settings,
        }
    }

    /// The settings this engine runs with.
    #[must_use]
    pub const fn settings(&self) -> &SweepSettings {
        &self.settings
    }

    /// Check a metric name against the supported set.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizationError::UnsupportedMetric`] for unknown names.
    pub fn ensure_supported_metric(&self, metric: &str) -> Result<(), OptimizationError> {
        if self.settings.supported_metrics.iter().any(|m| m == metric) {
            return Ok(());
        }
        Err(OptimizationError::UnsupportedMetric {
            metric: metric.to_string(),
        })
    }

    /// Expand the spec's ranges, enforcing the combination ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizationError::InvalidParameters`] when a range fails
    /// validation or the expansion exceeds the ceiling.
    pub fn expand_grid(&self, spec: &OptimizationSpec) -> Result<ParameterGrid, OptimizationError> {
        let grid = ParameterGrid::from_ranges(spec.param_ranges.as_slice())?;
        grid.ensure_within(self.settings.max_combinations)?;
        Ok(grid)
    }

    /// Run the full sweep for a validated spec.
    ///
    /// # Errors
    ///
    /// Returns a validation-class error before any evaluation starts, or
    /// [`OptimizationError::Cancelled`] when the token fires mid-sweep.
    pub async fn run(
        &self,
        spec: &OptimizationSpec,
        dataset: &Dataset,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Result<OptimizationReport, OptimizationError> {
        self.ensure_supported_metric(&spec.optimization_metric)?;
        let grid = self.expand_grid(spec)?;
        let combinations = grid.combinations();
        let total = combinations.len();
        let workers = self.settings.effective_workers(spec.max_workers);
        let split = split_dataset(dataset, spec.validation_split);

        record_sweep_size(total);
        info!(
            total_combinations = total,
            workers = workers,
            metric = %spec.optimization_metric,
            train_rows = split.train.len(),
            "Starting optimization sweep"
        );

        let entries = self
            .sweep(spec, &split.train, combinations, workers, cancel, sink)
            .await;
        if cancel.is_cancelled() {
            return Err(OptimizationError::Cancelled);
        }

        let mut best: Option<&ResultEntry> = None;
        for entry in &entries {
            if !entry.is_successful() {
                continue;
            }
            // Strict comparison: the first combination in iteration order
            // keeps a tied score.
            if best.is_none_or(|current| entry.optimization_score > current.optimization_score) {
                best = Some(entry);
            }
        }

        let best_parameters = best.map(|entry| entry.parameters.clone());
        let best_score = best.map(|entry| entry.optimization_score);
        let best_metrics = best.map(|entry| entry.metrics.clone());

        let validation = match (&best_parameters, split.validation.as_ref()) {
            (Some(parameters), Some(holdout)) => {
                if cancel.is_cancelled() {
                    return Err(OptimizationError::Cancelled);
                }
                Some(self.validate(spec, holdout, parameters.clone()).await)
            }
            _ => None,
        };

        let successful_runs = entries.iter().filter(|e| e.is_successful()).count();
        let failed_runs = entries.len() - successful_runs;
        let analysis = analyze_sweep(&entries, grid.names(), self.settings.histogram_bins);

        let mut results = entries;
        results.sort_by(|a, b| b.optimization_score.total_cmp(&a.optimization_score));
        results.truncate(self.settings.result_cap);

        info!(
            successful_runs = successful_runs,
            failed_runs = failed_runs,
            best_score = ?best_score,
            "Optimization sweep complete"
        );

        Ok(OptimizationReport {
            optimization_metric: spec.optimization_metric.clone(),
            total_combinations: total,
            successful_runs,
            failed_runs,
            best_parameters,
            best_score,
            best_metrics,
            validation,
            results,
            analysis,
        })
    }

    async fn sweep(
        &self,
        spec: &OptimizationSpec,
        train: &Dataset,
        combinations: Vec<ParameterSet>,
        workers: usize,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Vec<ResultEntry> {
        let total = combinations.len();
        let mut slots: Vec<Option<ResultEntry>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);

        let mut completions = stream::iter(combinations.into_iter().enumerate().map(
            |(index, params)| {
                let evaluator = Arc::clone(&self.evaluator);
                let cancel = cancel.clone();
                let metric = spec.optimization_metric.clone();
                let request = EvaluationRequest {
                    dataset: train.clone(),
                    strategy_id: spec.strategy_id.clone(),
                    strategy_params: params,
                    engine_options: spec.engine_options.clone(),
                };
                async move {
                    // A combination that has not started when the token fires
                    // is skipped entirely.
                    if cancel.is_cancelled() {
                        return (index, None);
                    }
                    let entry = evaluate_combination(evaluator.as_ref(), request, &metric).await;
                    (index, Some(entry))
                }
            },
        ))
        .buffer_unordered(workers);

        let mut done = 0usize;
        while let Some((index, entry)) = completions.next().await {
            done += 1;
            if let Some(entry) = entry {
                slots[index] = Some(entry);
            }
            sink.report(done, total).await;
        }

        slots.into_iter().flatten().collect()
    }

    async fn validate(
        &self,
        spec: &OptimizationSpec,
        holdout: &Dataset,
        parameters: ParameterSet,
    ) -> ValidationOutcome {
        let request = EvaluationRequest {
            dataset: holdout.clone(),
            strategy_id: spec.strategy_id.clone(),
            strategy_params: parameters,
            engine_options: spec.engine_options.clone(),
        };

        record_evaluator_call();
        match self.evaluator.evaluate(&request, &NoOpObserver).await {
            Ok(evaluation) => {
                if !evaluation.success {
                    record_evaluator_failure();
                }
                ValidationOutcome {
                    rows: holdout.len(),
                    score: evaluation.metrics.get(&spec.optimization_metric).copied(),
                    metrics: evaluation.metrics,
                    success: evaluation.success,
                    error: evaluation.error,
                }
            }
            Err(err) => {
                record_evaluator_failure();
                warn!(error = %err, "Validation run failed");
                ValidationOutcome {
                    rows: holdout.len(),
                    score: None,
                    metrics: HashMap::new(),
                    success: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

/// Evaluate one combination, folding every failure mode into an entry.
async fn evaluate_combination(
    evaluator: &dyn EvaluatorPort,
    request: EvaluationRequest,
    metric: &str,
) -> ResultEntry {
    record_evaluator_call();
    let outcome = evaluator.evaluate(&request, &NoOpObserver).await;
    let parameters = request.strategy_params;

    match outcome {
        Ok(evaluation) if evaluation.success => {
            let score = evaluation
                .metrics
                .get(metric)
                .copied()
                .filter(|score| !score.is_nan());
            match score {
                Some(score) => ResultEntry::completed(parameters, evaluation.metrics, score),
                None => {
                    record_evaluator_failure();
                    ResultEntry::failed(
                        parameters,
                        evaluation.metrics,
                        format!("Metric '{metric}' missing or NaN in evaluation result"),
                    )
                }
            }
        }
        Ok(evaluation) => {
            record_evaluator_failure();
            let message = evaluation
                .error
                .unwrap_or_else(|| "Evaluation unsuccessful".to_string());
            debug!(error = %message, "Combination failed");
            ResultEntry::failed(parameters, evaluation.metrics, message)
        }
        Err(err) => {
            record_evaluator_failure();
            warn!(error = %err, "Evaluator error during sweep");
            ResultEntry::errored(parameters, err.to_string())
        }
    }
}
