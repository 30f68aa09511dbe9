//! Optimization Job Runner
//!
//! Drives a parameter sweep job: load the dataset, delegate the sweep to the
//! optimization engine, persist the full report. Combination-level progress
//! from the engine is mapped into the job's `[0, 1]` scale through the
//! throttled reporter.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::ports::DatasetRepositoryPort;
use crate::domain::job::{JobKind, JobStatus, JobStore, OptimizationSpec, StoreError};
use crate::observability::metrics::{record_job_duration, record_job_finished};
use crate::optimization::{OptimizationEngine, ProgressSink};
use crate::runner::error::RunError;
use crate::runner::progress::ProgressReporter;

/// Progress fraction after dataset load, before the sweep.
const PROGRESS_SWEEP_START: f64 = 0.05;
/// Progress fraction when the sweep itself finishes.
const PROGRESS_SWEEP_END: f64 = 0.95;

/// Executes optimization sweep jobs against the engine.
pub struct OptimizationRunner {
    store: Arc<dyn JobStore>,
    datasets: Arc<dyn DatasetRepositoryPort>,
    engine: Arc<OptimizationEngine>,
}

impl OptimizationRunner {
    /// Wire a runner to its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn JobStore>,
        datasets: Arc<dyn DatasetRepositoryPort>,
        engine: Arc<OptimizationEngine>,
    ) -> Self {
        Self {
            store,
            datasets,
            engine,
        }
    }

    /// Drive one sweep job to a terminal status.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`RunError`] after recording the terminal
    /// status, so callers can log the failure cause.
    pub async fn run(
        &self,
        job_id: Uuid,
        spec: &OptimizationSpec,
        cancel: &CancellationToken,
        reporter: &ProgressReporter,
    ) -> Result<(), RunError> {
        let started = Instant::now();
        let outcome = self.run_phases(job_id, spec, cancel, reporter).await;
        record_job_duration(JobKind::Optimization, started.elapsed().as_secs_f64());

        match outcome {
            Ok(()) => {
                self.store
                    .update_status(job_id, JobStatus::Completed, None)
                    .await?;
                record_job_finished(JobKind::Optimization, JobStatus::Completed);
                info!(job_id = %job_id, "Optimization job completed");
                Ok(())
            }
            Err(RunError::Cancelled) => {
                self.store
                    .update_status(job_id, JobStatus::Cancelled, None)
                    .await?;
                record_job_finished(JobKind::Optimization, JobStatus::Cancelled);
                info!(job_id = %job_id, "Optimization job cancelled");
                Err(RunError::Cancelled)
            }
            Err(err) => {
                self.store
                    .update_status(job_id, JobStatus::Failed, Some(err.to_string()))
                    .await?;
                record_job_finished(JobKind::Optimization, JobStatus::Failed);
                warn!(job_id = %job_id, error = %err, "Optimization job failed");
                Err(err)
            }
        }
    }

    async fn run_phases(
        &self,
        job_id: Uuid,
        spec: &OptimizationSpec,
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
                PROGRESS_SWEEP_START,
                Some("Loading dataset".to_string()),
                None,
            )
            .await;
        let dataset = self.datasets.load(&spec.dataset_id).await?;
        if let Err(err) = self.datasets.touch_last_accessed(&spec.dataset_id).await {
            warn!(dataset_id = %spec.dataset_id, error = %err, "Last-accessed touch failed");
        }

        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        let sink = ReporterSink { reporter };
        let report = self.engine.run(spec, &dataset, cancel, &sink).await?;

        if report.successful_runs == 0 {
            return Err(RunError::NoSuccessfulRuns {
                message: format!(
                    "All {} parameter combinations failed",
                    report.total_combinations
                ),
            });
        }

        reporter
            .report(
                PROGRESS_SWEEP_END,
                Some("Storing sweep report".to_string()),
                None,
            )
            .await;
        let payload = serde_json::to_value(&report).map_err(StoreError::from)?;
        self.store.store_results(job_id, payload).await?;
        reporter
            .report(1.0, Some("Complete".to_string()), None)
            .await;
        Ok(())
    }
}

/// Translates engine completion counts into the job progress scale.
struct ReporterSink<'a> {
    reporter: &'a ProgressReporter,
}

#[async_trait]
impl ProgressSink for ReporterSink<'_> {
    async fn report(&self, completed: usize, total: usize) {
        let fraction = if total == 0 {
            1.0
        } else {
            completed as f64 / total as f64
        };
        let progress =
            fraction.mul_add(PROGRESS_SWEEP_END - PROGRESS_SWEEP_START, PROGRESS_SWEEP_START);
        self.reporter
            .report(
                progress,
                Some(format!("Evaluated {completed}/{total} combinations")),
                u32::try_from(total).ok(),
            )
            .await;
    }
}
