//! Backtest Job Runner
//!
//! Drives a single-strategy evaluation job from `pending` to a terminal
//! state: resolve the strategy, load the dataset, hand both to the
//! evaluator, persist the metrics payload.
//!
//! Progress is phase-banded. Fixed fractions mark the setup and finalize
//! phases; evaluator-reported sub-progress is rescaled into the middle band
//! so the stored fraction stays monotone across phases.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::ports::{
    DatasetRepositoryPort, Evaluation, EvaluationObserver, EvaluationRequest, EvaluatorPort,
    StrategyHandle, StrategyRegistryPort,
};
use crate::domain::job::{BacktestSpec, JobKind, JobStatus, JobStore};
use crate::domain::parameters::ParameterSet;
use crate::observability::metrics::{record_job_duration, record_job_finished};
use crate::runner::error::RunError;
use crate::runner::progress::ProgressReporter;

/// Progress fraction after strategy resolution.
const PROGRESS_STRATEGY_RESOLVED: f64 = 0.1;
/// Progress fraction after dataset load.
const PROGRESS_DATASET_LOADED: f64 = 0.2;
/// Band the evaluator's own sub-progress is rescaled into.
const PROGRESS_EVALUATION_BAND: (f64, f64) = (0.3, 0.8);
/// Progress fraction entering result finalization.
const PROGRESS_FINALIZING: f64 = 0.9;

/// Executes backtest jobs against the evaluator port.
pub struct BacktestRunner {
    store: Arc<dyn JobStore>,
    strategies: Arc<dyn StrategyRegistryPort>,
    datasets: Arc<dyn DatasetRepositoryPort>,
    evaluator: Arc<dyn EvaluatorPort>,
}

impl BacktestRunner {
    /// Wire a runner to its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn JobStore>,
        strategies: Arc<dyn StrategyRegistryPort>,
        datasets: Arc<dyn DatasetRepositoryPort>,
        evaluator: Arc<dyn EvaluatorPort>,
    ) -> Self {
        Self {
            store,
            strategies,
            datasets,
            evaluator,
        }
    }

    /// Drive one backtest job to a terminal status.
    ///
    /// The terminal status write goes through the lifecycle guard, so a job
    /// cancelled out from under the runner stays `cancelled`.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`RunError`] after recording the terminal
    /// status, so callers can log the failure cause.
    pub async fn run(
        &self,
        job_id: Uuid,
        spec: &BacktestSpec,
        cancel: &CancellationToken,
        reporter: &ProgressReporter,
    ) -> Result<(), RunError> {
        let started = Instant::now();
        let outcome = self.run_phases(job_id, spec, cancel, reporter).await;
        record_job_duration(JobKind::Backtest, started.elapsed().as_secs_f64());

        match outcome {
            Ok(()) => {
                self.store
                    .update_status(job_id, JobStatus::Completed, None)
                    .await?;
                record_job_finished(JobKind::Backtest, JobStatus::Completed);
                info!(job_id = %job_id, "Backtest job completed");
                Ok(())
            }
            Err(RunError::Cancelled) => {
                self.store
                    .update_status(job_id, JobStatus::Cancelled, None)
                    .await?;
                record_job_finished(JobKind::Backtest, JobStatus::Cancelled);
                info!(job_id = %job_id, "Backtest job cancelled");
                Err(RunError::Cancelled)
            }
            Err(err) => {
                self.store
                    .update_status(job_id, JobStatus::Failed, Some(err.to_string()))
                    .await?;
                record_job_finished(JobKind::Backtest, JobStatus::Failed);
                warn!(job_id = %job_id, error = %err, "Backtest job failed");
                Err(err)
            }
        }
    }

    async fn run_phases(
        &self,
        job_id: Uuid,
        spec: &BacktestSpec,
        cancel: &CancellationToken,
        reporter: &ProgressReporter,
    ) -> Result<(), RunError> {
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        self.store
            .update_status(job_id, JobStatus::Running, None)
            .await?;

        reporter
            .report(
                PROGRESS_STRATEGY_RESOLVED,
                Some("Resolving strategy".to_string()),
                None,
            )
            .await;
        let handle = self.strategies.resolve(&spec.strategy_id).await?;
        let params = merged_params(&handle, &spec.strategy_params);

        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        reporter
            .report(
                PROGRESS_DATASET_LOADED,
                Some("Loading dataset".to_string()),
                None,
            )
            .await;
        let dataset = self.datasets.load(&spec.dataset_ref).await?;
        if let Err(err) = self.datasets.touch_last_accessed(&spec.dataset_ref).await {
            warn!(dataset_ref = %spec.dataset_ref, error = %err, "Last-accessed touch failed");
        }

        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        let request = EvaluationRequest {
            dataset,
            strategy_id: handle.id.clone(),
            strategy_params: params.clone(),
            engine_options: spec.engine_options.clone(),
        };
        let evaluation = self
            .evaluate_with_progress(&request, cancel, reporter)
            .await?;
        if !evaluation.success {
            return Err(RunError::EvaluationFailed {
                message: evaluation
                    .error
                    .unwrap_or_else(|| "Evaluation unsuccessful".to_string()),
            });
        }

        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        reporter
            .report(
                PROGRESS_FINALIZING,
                Some("Finalizing results".to_string()),
                None,
            )
            .await;
        let payload = json!({
            "strategy_id": handle.id,
            "dataset_ref": spec.dataset_ref,
            "parameters": params,
            "metrics": evaluation.metrics,
        });
        self.store.store_results(job_id, payload).await?;
        reporter
            .report(1.0, Some("Complete".to_string()), None)
            .await;
        Ok(())
    }

    /// Run the evaluator while draining its progress channel.
    ///
    /// The observer is synchronous, so sub-progress crosses a channel into
    /// this async loop. Cancellation drops the in-flight evaluation future.
    async fn evaluate_with_progress(
        &self,
        request: &EvaluationRequest,
        cancel: &CancellationToken,
        reporter: &ProgressReporter,
    ) -> Result<Evaluation, RunError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let observer = ChannelObserver { tx };
        let evaluation = self.evaluator.evaluate(request, &observer);
        tokio::pin!(evaluation);

        loop {
            tokio::select! {
                outcome = &mut evaluation => return Ok(outcome?),
                () = cancel.cancelled() => return Err(RunError::Cancelled),
                Some(fraction) = rx.recv() => {
                    reporter
                        .report(
                            rescale_evaluator_progress(fraction),
                            Some("Running backtest".to_string()),
                            None,
                        )
                        .await;
                }
            }
        }
    }
}

/// Strategy defaults overlaid with per-job overrides; overrides win.
fn merged_params(handle: &StrategyHandle, overrides: &ParameterSet) -> ParameterSet {
    let mut params = handle.default_params.clone();
    for (name, value) in overrides {
        params.insert(name.clone(), value.clone());
    }
    params
}

/// Map an evaluator fraction in `[0, 1]` into the evaluation band.
fn rescale_evaluator_progress(fraction: f64) -> f64 {
    let (low, high) = PROGRESS_EVALUATION_BAND;
    fraction.clamp(0.0, 1.0).mul_add(high - low, low)
}

/// Forwards synchronous observer callbacks into the runner's async loop.
struct ChannelObserver {
    tx: mpsc::UnboundedSender<f64>,
}

impl EvaluationObserver for ChannelObserver {
    fn on_progress(&self, fraction: f64) {
        let _ = self.tx.send(fraction);
    }
}
