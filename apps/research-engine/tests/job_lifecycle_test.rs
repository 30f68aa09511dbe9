//! Job Lifecycle Integration Tests
//!
//! End-to-end tests driving jobs through the orchestrator facade with the
//! in-memory store:
//! - Status sequences observed by a poller
//! - Progress monotonicity up to the terminal state
//! - Cancellation before a queued worker starts
//! - Cancel/delete on unknown job ids
//! - Graceful shutdown draining in-flight work

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::float_cmp)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use research_engine::{
    BacktestSpec, Evaluation, EvaluationObserver, EvaluationRequest, EvaluatorError,
    EvaluatorPort, InMemoryDatasetRepository, InMemoryJobStore, InMemoryStrategyRegistry, Job,
    JobOrchestrator, JobStatus, OptimizationEngine, OrchestratorSettings, ParamValue,
    ParameterSet, StrategyHandle, SweepSettings,
};
use serde_json::{Value, json};

// ============================================
// Test Fixtures
// ============================================

/// Synthetic candle rows for the fixture dataset.
fn candle_rows(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| json!({"close": 100.0 + i as f64, "volume": 10 + i}))
        .collect()
}

fn sma_cross() -> StrategyHandle {
    StrategyHandle {
        id: "sma_cross".to_string(),
        name: "SMA Crossover".to_string(),
        default_params: ParameterSet::from([
            ("fast".to_string(), ParamValue::Int(10)),
            ("slow".to_string(), ParamValue::Int(30)),
        ]),
    }
}

/// Evaluator that hangs forever for the `hang` strategy and counts every
/// call. Cancellation must race past the pending future.
struct SwitchedEvaluator {
    calls: AtomicUsize,
}

impl SwitchedEvaluator {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvaluatorPort for SwitchedEvaluator {
    async fn evaluate(
        &self,
        request: &EvaluationRequest,
        _observer: &dyn EvaluationObserver,
    ) -> Result<Evaluation, EvaluatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.strategy_id == "hang" {
            futures::future::pending::<()>().await;
            unreachable!("pending future never resolves");
        }
        Ok(Evaluation::succeeded(HashMap::from([(
            "score".to_string(),
            1.0,
        )])))
    }
}

/// Build an orchestrator over in-memory ports with the given evaluator.
fn orchestrator_with(
    evaluator: Arc<dyn EvaluatorPort>,
    max_concurrent_jobs: usize,
) -> JobOrchestrator {
    let store = Arc::new(InMemoryJobStore::new());
    let strategies = Arc::new(InMemoryStrategyRegistry::new());
    strategies.register(sma_cross());
    strategies.register(StrategyHandle {
        id: "hang".to_string(),
        name: "Hanging Strategy".to_string(),
        default_params: ParameterSet::new(),
    });

    let datasets = Arc::new(InMemoryDatasetRepository::new());
    datasets.insert("BTC-USD:1m", candle_rows(32));

    let engine = Arc::new(OptimizationEngine::new(
        Arc::clone(&evaluator),
        SweepSettings::default(),
    ));

    JobOrchestrator::new(
        store,
        strategies,
        datasets,
        evaluator,
        engine,
        OrchestratorSettings {
            max_concurrent_jobs,
            progress_interval: Duration::ZERO,
            ..OrchestratorSettings::default()
        },
    )
}

fn backtest_spec(strategy_id: &str) -> BacktestSpec {
    BacktestSpec {
        strategy_id: strategy_id.to_string(),
        strategy_params: ParameterSet::new(),
        dataset_ref: "BTC-USD:1m".to_string(),
        engine_options: Value::Null,
    }
}

/// Poll until the job reaches a terminal state, collecting every observed
/// snapshot along the way.
async fn poll_to_terminal(orchestrator: &JobOrchestrator, job_id: uuid::Uuid) -> Vec<Job> {
    let mut observed = Vec::new();
    for _ in 0..500 {
        let job = orchestrator
            .get_status(job_id)
            .await
            .expect("status query should not fail")
            .expect("job row should exist");
        let terminal = job.status.is_terminal();
        observed.push(job);
        if terminal {
            return observed;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("job {job_id} did not reach a terminal state");
}

fn status_rank(status: JobStatus) -> u8 {
    match status {
        JobStatus::Pending => 0,
        JobStatus::Running => 1,
        JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => 2,
    }
}

// ============================================
// Lifecycle Tests
// ============================================

#[tokio::test]
async fn test_backtest_status_sequence_and_progress_are_monotone() {
    let evaluator = Arc::new(SwitchedEvaluator::new());
    let orchestrator = orchestrator_with(evaluator, 2);

    let job_id = orchestrator
        .submit_backtest(backtest_spec("sma_cross"))
        .await
        .expect("submission should be accepted");

    let observed = poll_to_terminal(&orchestrator, job_id).await;

    // Statuses never move backwards and never leave a terminal state.
    let ranks: Vec<u8> = observed.iter().map(|job| status_rank(job.status)).collect();
    assert!(ranks.windows(2).all(|pair| pair[0] <= pair[1]), "{ranks:?}");

    // Progress is non-decreasing at every poll.
    let fractions: Vec<f64> = observed.iter().map(|job| job.progress).collect();
    assert!(
        fractions.windows(2).all(|pair| pair[0] <= pair[1]),
        "{fractions:?}"
    );

    let last = observed.last().unwrap();
    assert_eq!(last.status, JobStatus::Completed);
    assert_eq!(last.progress, 1.0);
    assert!(last.started_at.is_some());
    assert!(last.completed_at.is_some());
    assert!(last.error_message.is_none());
}

#[tokio::test]
async fn test_results_are_absent_until_completed() {
    let evaluator = Arc::new(SwitchedEvaluator::new());
    let orchestrator = orchestrator_with(evaluator, 1);

    // Occupy the single worker slot so the second job stays pending.
    let blocker = orchestrator
        .submit_backtest(backtest_spec("hang"))
        .await
        .expect("blocker submission should be accepted");
    let queued = orchestrator
        .submit_backtest(backtest_spec("sma_cross"))
        .await
        .expect("queued submission should be accepted");

    assert_eq!(
        orchestrator.get_results(queued).await.unwrap(),
        None,
        "pending job must not expose results"
    );

    assert!(orchestrator.cancel(blocker).await.unwrap());
    let observed = poll_to_terminal(&orchestrator, queued).await;
    assert_eq!(observed.last().unwrap().status, JobStatus::Completed);

    let payload = orchestrator
        .get_results(queued)
        .await
        .unwrap()
        .expect("completed job must expose results");
    assert_eq!(payload["strategy_id"], json!("sma_cross"));
    assert_eq!(payload["dataset_ref"], json!("BTC-USD:1m"));
    assert!(payload["metrics"]["score"].is_number());
}

#[tokio::test]
async fn test_cancel_before_worker_starts_runs_no_evaluations() {
    let evaluator = Arc::new(SwitchedEvaluator::new());
    let orchestrator = orchestrator_with(Arc::clone(&evaluator) as Arc<dyn EvaluatorPort>, 1);

    let blocker = orchestrator
        .submit_backtest(backtest_spec("hang"))
        .await
        .expect("blocker submission should be accepted");
    let queued = orchestrator
        .submit_backtest(backtest_spec("sma_cross"))
        .await
        .expect("queued submission should be accepted");

    // Give the blocker time to claim the only permit, then cancel the
    // queued job before any worker picks it up.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let calls_before = evaluator.call_count();
    assert!(orchestrator.cancel(queued).await.unwrap());

    let cancelled = orchestrator.get_status(queued).await.unwrap().unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);

    // Free the pool; the cancelled job's worker must observe the token at
    // its first checkpoint and never call the evaluator.
    assert!(orchestrator.cancel(blocker).await.unwrap());
    poll_to_terminal(&orchestrator, blocker).await;
    orchestrator.shutdown().await;

    assert_eq!(
        evaluator.call_count(),
        calls_before,
        "cancelled queued job must not reach the evaluator"
    );
    let still = orchestrator.get_status(queued).await.unwrap().unwrap();
    assert_eq!(still.status, JobStatus::Cancelled);
}

#[tokio::test]
async fn test_cancel_and_delete_unknown_job_return_false() {
    let evaluator = Arc::new(SwitchedEvaluator::new());
    let orchestrator = orchestrator_with(evaluator, 2);

    let missing = uuid::Uuid::new_v4();
    assert!(!orchestrator.cancel(missing).await.unwrap());
    assert!(!orchestrator.delete(missing).await.unwrap());
}

#[tokio::test]
async fn test_delete_removes_the_row() {
    let evaluator = Arc::new(SwitchedEvaluator::new());
    let orchestrator = orchestrator_with(evaluator, 2);

    let job_id = orchestrator
        .submit_backtest(backtest_spec("sma_cross"))
        .await
        .expect("submission should be accepted");
    poll_to_terminal(&orchestrator, job_id).await;

    assert!(orchestrator.delete(job_id).await.unwrap());
    assert!(orchestrator.get_status(job_id).await.unwrap().is_none());
    assert!(!orchestrator.delete(job_id).await.unwrap());
}

#[tokio::test]
async fn test_shutdown_drains_and_rejects_new_work() {
    let evaluator = Arc::new(SwitchedEvaluator::new());
    let orchestrator = orchestrator_with(evaluator, 2);

    let running = orchestrator
        .submit_backtest(backtest_spec("hang"))
        .await
        .expect("submission should be accepted");
    tokio::time::sleep(Duration::from_millis(20)).await;

    orchestrator.shutdown().await;

    let job = orchestrator.get_status(running).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);

    let rejected = orchestrator.submit_backtest(backtest_spec("sma_cross")).await;
    assert!(rejected.is_err(), "submissions after shutdown must fail");
}
