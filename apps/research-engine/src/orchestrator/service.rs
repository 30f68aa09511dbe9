//! Job Orchestrator
//!
//! The application service behind every public operation: validates
//! submissions, creates job rows, spawns workers, and serves status,
//! results, list, and stats reads. Worker tasks acquire a concurrency
//! permit inside the spawned task, so submission never blocks; accepted
//! jobs queue as `pending` until a permit frees.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::application::ports::{DatasetRepositoryPort, EvaluatorPort, StrategyRegistryPort};
use crate::domain::job::{
    BacktestSpec, Job, JobFilter, JobKind, JobStats, JobStatus, JobStore, OptimizationSpec,
    StoreError,
};
use crate::observability::metrics::{
    record_cancel_request, record_job_submitted, record_store_operation,
};
use crate::optimization::OptimizationEngine;
use crate::orchestrator::error::OrchestratorError;
use crate::orchestrator::registry::JobRegistry;
use crate::runner::{BacktestRunner, OptimizationRunner, ProgressReporter};

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Maximum number of jobs executing at once.
    pub max_concurrent_jobs: usize,
    /// Minimum interval between persisted progress updates.
    pub progress_interval: Duration,
    /// Estimated seconds per sweep combination, used for ETA reporting.
    pub per_combination_secs: f64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            progress_interval: Duration::from_secs(1),
            per_combination_secs: 2.0,
        }
    }
}

/// Accepted-submission receipt for an optimization sweep.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationSubmission {
    /// Created job id.
    pub job_id: Uuid,
    /// Expanded combination count.
    pub total_combinations: usize,
    /// Rough wall-clock estimate for the sweep.
    pub estimated_minutes: f64,
}

/// Application service coordinating submissions, execution, and reads.
pub struct JobOrchestrator {
    store: Arc<dyn JobStore>,
    strategies: Arc<dyn StrategyRegistryPort>,
    datasets: Arc<dyn DatasetRepositoryPort>,
    engine: Arc<OptimizationEngine>,
    backtest_runner: Arc<BacktestRunner>,
    optimization_runner: Arc<OptimizationRunner>,
    registry: Arc<JobRegistry>,
    permits: Arc<Semaphore>,
    settings: OrchestratorSettings,
}

impl JobOrchestrator {
    /// Wire the orchestrator and its runners.
    #[must_use]
    pub fn new(
        store: Arc<dyn JobStore>,
        strategies: Arc<dyn StrategyRegistryPort>,
        datasets: Arc<dyn DatasetRepositoryPort>,
        evaluator: Arc<dyn EvaluatorPort>,
        engine: Arc<OptimizationEngine>,
        settings: OrchestratorSettings,
    ) -> Self {
        let backtest_runner = Arc::new(BacktestRunner::new(
            store.clone(),
            strategies.clone(),
            datasets.clone(),
            evaluator,
        ));
        let optimization_runner = Arc::new(OptimizationRunner::new(
            store.clone(),
            datasets.clone(),
            engine.clone(),
        ));
        Self {
            store,
            strategies,
            datasets,
            engine,
            backtest_runner,
            optimization_runner,
            registry: Arc::new(JobRegistry::new()),
            permits: Arc::new(Semaphore::new(settings.max_concurrent_jobs.max(1))),
            settings,
        }
    }

    /// Validate and enqueue a backtest job.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the spec, strategy, or dataset is
    /// rejected, or `Store` when row creation fails.
    pub async fn submit_backtest(&self, spec: BacktestSpec) -> Result<Uuid, OrchestratorError> {
        spec.validate().map_err(OrchestratorError::Validation)?;
        self.strategies
            .resolve(&spec.strategy_id)
            .await
            .map_err(|e| OrchestratorError::Validation(e.to_string()))?;
        self.datasets
            .load(&spec.dataset_ref)
            .await
            .map_err(|e| OrchestratorError::Validation(e.to_string()))?;

        let payload = serde_json::to_value(&spec).map_err(StoreError::from)?;
        let job_id = self.store.create(JobKind::Backtest, payload).await?;
        record_store_operation("create");
        record_job_submitted(JobKind::Backtest);

        let token = self.accept(job_id).await?;
        info!(job_id = %job_id, strategy_id = %spec.strategy_id, "Backtest job accepted");

        let runner = self.backtest_runner.clone();
        let reporter = self.reporter(job_id);
        self.spawn_job(job_id, JobKind::Backtest, async move {
            // Terminal status and failure detail are recorded by the runner.
            let _ = runner.run(job_id, &spec, &token, &reporter).await;
        });
        Ok(job_id)
    }

    /// Validate and enqueue an optimization sweep job.
    ///
    /// The full grid is expanded here, so an over-ceiling or empty sweep is
    /// rejected before any row exists.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the spec, metric, grid, strategy, or
    /// dataset is rejected, or `Store` when row creation fails.
    pub async fn submit_optimization(
        &self,
        spec: OptimizationSpec,
    ) -> Result<OptimizationSubmission, OrchestratorError> {
        spec.validate().map_err(OrchestratorError::Validation)?;
        self.engine
            .ensure_supported_metric(&spec.optimization_metric)
            .map_err(|e| OrchestratorError::Validation(e.to_string()))?;
        let grid = self
            .engine
            .expand_grid(&spec)
            .map_err(|e| OrchestratorError::Validation(e.to_string()))?;
        let total_combinations = grid.total_combinations();
        if total_combinations == 0 {
            return Err(OrchestratorError::Validation(
                "Parameter ranges expand to zero combinations".to_string(),
            ));
        }
        self.strategies
            .resolve(&spec.strategy_id)
            .await
            .map_err(|e| OrchestratorError::Validation(e.to_string()))?;
        self.datasets
            .load(&spec.dataset_id)
            .await
            .map_err(|e| OrchestratorError::Validation(e.to_string()))?;

        let payload = serde_json::to_value(&spec).map_err(StoreError::from)?;
        let job_id = self.store.create(JobKind::Optimization, payload).await?;
        record_store_operation("create");
        record_job_submitted(JobKind::Optimization);

        let token = self.accept(job_id).await?;
        let workers = self.engine.settings().effective_workers(spec.max_workers);
        let estimated_minutes =
            total_combinations as f64 * self.settings.per_combination_secs / workers as f64 / 60.0;
        info!(
            job_id = %job_id,
            strategy_id = %spec.strategy_id,
            combinations = total_combinations,
            workers,
            "Optimization job accepted"
        );

        let runner = self.optimization_runner.clone();
        let reporter = self.reporter(job_id);
        self.spawn_job(job_id, JobKind::Optimization, async move {
            // Terminal status and failure detail are recorded by the runner.
            let _ = runner.run(job_id, &spec, &token, &reporter).await;
        });
        Ok(OptimizationSubmission {
            job_id,
            total_combinations,
            estimated_minutes,
        })
    }

    /// Request cancellation of a job.
    ///
    /// Fires the live token if the job is still registered and marks the
    /// row `cancelled` while it is non-terminal. Returns whether any live
    /// or active job was affected.
    ///
    /// # Errors
    ///
    /// Returns `Store` when the status read or write fails.
    pub async fn cancel(&self, job_id: Uuid) -> Result<bool, OrchestratorError> {
        let signalled = self.registry.cancel(job_id);
        let job = self.store.get(job_id).await?;
        record_store_operation("get");
        let was_active = job.is_some_and(|job| job.status.is_active());
        if was_active {
            self.store
                .update_status(job_id, JobStatus::Cancelled, None)
                .await?;
            record_store_operation("update_status");
        }

        let accepted = signalled || was_active;
        record_cancel_request(accepted);
        if accepted {
            info!(job_id = %job_id, "Cancellation requested");
        }
        Ok(accepted)
    }

    /// Delete a job row, cancelling the job first if it is live.
    ///
    /// # Errors
    ///
    /// Returns `Store` when deletion fails.
    pub async fn delete(&self, job_id: Uuid) -> Result<bool, OrchestratorError> {
        self.registry.cancel(job_id);
        let deleted = self.store.delete(job_id).await?;
        record_store_operation("delete");
        if deleted {
            info!(job_id = %job_id, "Job deleted");
        }
        Ok(deleted)
    }

    /// Fetch one job row.
    ///
    /// # Errors
    ///
    /// Returns `Store` when the read fails.
    pub async fn get_status(&self, job_id: Uuid) -> Result<Option<Job>, OrchestratorError> {
        let job = self.store.get(job_id).await?;
        record_store_operation("get");
        Ok(job)
    }

    /// Fetch a completed job's result payload.
    ///
    /// # Errors
    ///
    /// Returns `Store` when the read fails.
    pub async fn get_results(&self, job_id: Uuid) -> Result<Option<Value>, OrchestratorError> {
        let results = self.store.get_results(job_id).await?;
        record_store_operation("get_results");
        Ok(results)
    }

    /// List jobs newest-first.
    ///
    /// # Errors
    ///
    /// Returns `Store` when the read fails.
    pub async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, OrchestratorError> {
        let jobs = self.store.list(filter).await?;
        record_store_operation("list");
        Ok(jobs)
    }

    /// Aggregate counts by status, optionally restricted to one kind.
    ///
    /// # Errors
    ///
    /// Returns `Store` when the read fails.
    pub async fn stats(&self, kind: Option<JobKind>) -> Result<JobStats, OrchestratorError> {
        let stats = self.store.stats(kind).await?;
        record_store_operation("stats");
        Ok(stats)
    }

    /// Number of currently registered (queued or running) jobs.
    #[must_use]
    pub fn active_jobs(&self) -> usize {
        self.registry.active_count()
    }

    /// Stop accepting jobs, cancel in-flight work, and wait for every
    /// worker task to finish.
    pub async fn shutdown(&self) {
        let handles = self.registry.shutdown();
        info!(in_flight = handles.len(), "Shutting down orchestrator");
        for (job_id, handle) in handles {
            if let Err(err) = handle.await {
                warn!(job_id = %job_id, error = %err, "Job task join failed");
            }
        }
    }

    /// Register the job for cancellation tracking; reject during shutdown.
    async fn accept(&self, job_id: Uuid) -> Result<CancellationToken, OrchestratorError> {
        match self.registry.try_register(job_id) {
            Some(token) => Ok(token),
            None => {
                self.store
                    .update_status(
                        job_id,
                        JobStatus::Cancelled,
                        Some("Orchestrator is shutting down".to_string()),
                    )
                    .await?;
                Err(OrchestratorError::Validation(
                    "Orchestrator is shutting down".to_string(),
                ))
            }
        }
    }

    fn reporter(&self, job_id: Uuid) -> ProgressReporter {
        ProgressReporter::new(self.store.clone(), job_id, self.settings.progress_interval)
    }

    /// Spawn the worker task for an accepted job.
    ///
    /// The permit is held for the whole run; the task deregisters itself
    /// when done so shutdown only waits on live work.
    fn spawn_job<Fut>(&self, job_id: Uuid, kind: JobKind, work: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let permits = self.permits.clone();
        let registry = self.registry.clone();
        let span = info_span!("job.run", job_id = %job_id, kind = %kind);
        let handle = tokio::spawn(
            async move {
                if let Ok(_permit) = permits.acquire_owned().await {
                    work.await;
                }
                registry.finish(job_id);
            }
            .instrument(span),
        );
        self.registry.attach_handle(job_id, handle);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::application::ports::{
        Evaluation, EvaluationObserver, EvaluationRequest, EvaluatorError, FnEvaluator,
        InMemoryDatasetRepository, InMemoryStrategyRegistry, StrategyHandle,
    };
    use crate::domain::parameters::{ParamValue, ParameterSet};
    use crate::infrastructure::persistence::InMemoryJobStore;
    use crate::optimization::SweepSettings;

    fn scoring_evaluator() -> Arc<dyn EvaluatorPort> {
        Arc::new(FnEvaluator::new(|req: &EvaluationRequest| {
            let x = req
                .strategy_params
                .get("x")
                .and_then(ParamValue::as_int)
                .unwrap_or(1);
            Ok(Evaluation::succeeded(
                [
                    ("score".to_string(), x as f64 * 10.0),
                    ("sharpe".to_string(), 1.0),
                ]
                .into(),
            ))
        }))
    }

    fn orchestrator_with(evaluator: Arc<dyn EvaluatorPort>) -> JobOrchestrator {
        let store = Arc::new(InMemoryJobStore::new());
        let strategies = Arc::new(InMemoryStrategyRegistry::new());
        strategies.register(StrategyHandle {
            id: "sma_cross".to_string(),
            name: "SMA Crossover".to_string(),
            default_params: ParameterSet::from([("fast".to_string(), ParamValue::Int(10))]),
        });
        let datasets = Arc::new(InMemoryDatasetRepository::new());
        datasets.insert(
            "BTC-USD:1m",
            (0..20).map(|i| json!({"close": 100 + i})).collect(),
        );
        let engine = Arc::new(OptimizationEngine::new(
            evaluator.clone(),
            SweepSettings::default(),
        ));
        JobOrchestrator::new(
            store,
            strategies,
            datasets,
            evaluator,
            engine,
            OrchestratorSettings {
                progress_interval: Duration::ZERO,
                ..OrchestratorSettings::default()
            },
        )
    }

    fn backtest_spec() -> BacktestSpec {
        BacktestSpec {
            strategy_id: "sma_cross".to_string(),
            strategy_params: ParameterSet::new(),
            dataset_ref: "BTC-USD:1m".to_string(),
            engine_options: Value::Null,
        }
    }

    fn optimization_spec() -> OptimizationSpec {
        serde_json::from_value(json!({
            "strategy_id": "sma_cross",
            "dataset_id": "BTC-USD:1m",
            "param_ranges": {"x": {"type": "choice", "values": [1, 2, 3]}},
            "optimization_metric": "score",
        }))
        .unwrap()
    }

    async fn wait_for_terminal(orchestrator: &JobOrchestrator, job_id: Uuid) -> Job {
        for _ in 0..400 {
            let job = orchestrator.get_status(job_id).await.unwrap().unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {job_id} did not reach a terminal status");
    }

    #[tokio::test]
    async fn backtest_submission_runs_to_completion() {
        let orchestrator = orchestrator_with(scoring_evaluator());

        let job_id = orchestrator.submit_backtest(backtest_spec()).await.unwrap();
        let job = wait_for_terminal(&orchestrator, job_id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert!((job.progress - 1.0).abs() < f64::EPSILON);
        let results = orchestrator.get_results(job_id).await.unwrap().unwrap();
        assert_eq!(results["strategy_id"], "sma_cross");
    }

    #[tokio::test]
    async fn invalid_spec_is_rejected_without_a_row() {
        let orchestrator = orchestrator_with(scoring_evaluator());
        let mut spec = backtest_spec();
        spec.strategy_id = String::new();

        let err = orchestrator.submit_backtest(spec).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
        assert!(orchestrator.list(&JobFilter::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_strategy_is_rejected_without_a_row() {
        let orchestrator = orchestrator_with(scoring_evaluator());
        let mut spec = backtest_spec();
        spec.strategy_id = "missing".to_string();

        let err = orchestrator.submit_backtest(spec).await.unwrap_err();
        assert!(err.to_string().contains("Strategy not found"));
        assert!(orchestrator.list(&JobFilter::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_grid_is_rejected_without_a_row() {
        let orchestrator = orchestrator_with(scoring_evaluator());
        let spec: OptimizationSpec = serde_json::from_value(json!({
            "strategy_id": "sma_cross",
            "dataset_id": "BTC-USD:1m",
            "param_ranges": {
                "fast": {"type": "range", "start": 1, "stop": 40, "step": 1},
                "slow": {"type": "range", "start": 1, "stop": 40, "step": 1},
            },
            "optimization_metric": "score",
        }))
        .unwrap();

        let err = orchestrator.submit_optimization(spec).await.unwrap_err();
        assert!(err.to_string().contains("combinations"));
        assert!(orchestrator.list(&JobFilter::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn optimization_submission_reports_grid_size_and_completes() {
        let orchestrator = orchestrator_with(scoring_evaluator());

        let receipt = orchestrator
            .submit_optimization(optimization_spec())
            .await
            .unwrap();
        assert_eq!(receipt.total_combinations, 3);
        assert!(receipt.estimated_minutes > 0.0);

        let job = wait_for_terminal(&orchestrator, receipt.job_id).await;
        assert_eq!(job.status, JobStatus::Completed);

        let report = orchestrator
            .get_results(receipt.job_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report["best_parameters"]["x"], 3);
    }

    struct HangingEvaluator;

    #[async_trait::async_trait]
    impl EvaluatorPort for HangingEvaluator {
        async fn evaluate(
            &self,
            _request: &EvaluationRequest,
            _observer: &dyn EvaluationObserver,
        ) -> Result<Evaluation, EvaluatorError> {
            futures::future::pending::<()>().await;
            unreachable!()
        }
    }

    #[tokio::test]
    async fn cancel_stops_a_live_job() {
        let orchestrator = orchestrator_with(Arc::new(HangingEvaluator));

        let job_id = orchestrator.submit_backtest(backtest_spec()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(orchestrator.cancel(job_id).await.unwrap());
        let job = wait_for_terminal(&orchestrator, job_id).await;
        assert_eq!(job.status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancel_unknown_job_is_false() {
        let orchestrator = orchestrator_with(scoring_evaluator());
        assert!(!orchestrator.cancel(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn cancel_completed_job_is_false() {
        let orchestrator = orchestrator_with(scoring_evaluator());

        let job_id = orchestrator.submit_backtest(backtest_spec()).await.unwrap();
        wait_for_terminal(&orchestrator, job_id).await;
        // The worker may still be deregistering; give it a beat.
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!orchestrator.cancel(job_id).await.unwrap());
        let job = orchestrator.get_status(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn delete_reports_row_existence() {
        let orchestrator = orchestrator_with(scoring_evaluator());

        let job_id = orchestrator.submit_backtest(backtest_spec()).await.unwrap();
        wait_for_terminal(&orchestrator, job_id).await;

        assert!(orchestrator.delete(job_id).await.unwrap());
        assert!(orchestrator.get_status(job_id).await.unwrap().is_none());
        assert!(!orchestrator.delete(job_id).await.unwrap());
    }

    #[tokio::test]
    async fn shutdown_rejects_new_submissions() {
        let orchestrator = orchestrator_with(scoring_evaluator());
        orchestrator.shutdown().await;

        let err = orchestrator
            .submit_backtest(backtest_spec())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("shutting down"));

        // The row was created before the registry refused it, and is
        // closed out as cancelled.
        let jobs = orchestrator.list(&JobFilter::new()).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn shutdown_cancels_in_flight_jobs() {
        let orchestrator = orchestrator_with(Arc::new(HangingEvaluator));

        let job_id = orchestrator.submit_backtest(backtest_spec()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        orchestrator.shutdown().await;
        let job = orchestrator.get_status(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(orchestrator.active_jobs(), 0);
    }

    #[tokio::test]
    async fn stats_reflect_finished_jobs() {
        let orchestrator = orchestrator_with(scoring_evaluator());

        let first = orchestrator.submit_backtest(backtest_spec()).await.unwrap();
        let second = orchestrator
            .submit_optimization(optimization_spec())
            .await
            .unwrap()
            .job_id;
        wait_for_terminal(&orchestrator, first).await;
        wait_for_terminal(&orchestrator, second).await;

        let stats = orchestrator.stats(None).await.unwrap();
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.total, 2);

        let backtests = orchestrator.stats(Some(JobKind::Backtest)).await.unwrap();
        assert_eq!(backtests.total, 1);
    }
}
