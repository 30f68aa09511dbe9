//! Throttled Progress Reporting
//!
//! Wraps [`JobStore::update_progress`] so that frequent updates from a hot
//! evaluation loop do not hammer the store. Updates below `1.0` inside the
//! throttle window are dropped and counted; completion always flushes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::domain::job::JobStore;
use crate::observability::metrics::record_progress_throttled;

/// Throttling decorator around [`JobStore::update_progress`].
///
/// Store errors are logged and swallowed: progress is advisory and must
/// never abort a job.
pub struct ProgressReporter {
    store: Arc<dyn JobStore>,
    job_id: Uuid,
    min_interval: Duration,
    last_sent: Mutex<Option<Instant>>,
}

impl ProgressReporter {
    /// Create a reporter for one job.
    #[must_use]
    pub fn new(store: Arc<dyn JobStore>, job_id: Uuid, min_interval: Duration) -> Self {
        Self {
            store,
            job_id,
            min_interval,
            last_sent: Mutex::new(None),
        }
    }

    /// Forward a progress update unless it falls inside the throttle window.
    ///
    /// Updates with `progress >= 1.0` bypass the throttle so the final
    /// fraction is never lost.
    pub async fn report(&self, progress: f64, step: Option<String>, total_steps: Option<u32>) {
        if progress < 1.0 && self.throttled() {
            record_progress_throttled();
            return;
        }

        if let Err(err) = self
            .store
            .update_progress(self.job_id, progress, step, total_steps)
            .await
        {
            warn!(job_id = %self.job_id, error = %err, "Progress update failed; continuing");
        }
    }

    /// Check and advance the throttle window. The lock guard stays inside
    /// this synchronous call and never crosses an await.
    fn throttled(&self) -> bool {
        let mut last_sent = self.last_sent.lock();
        let now = Instant::now();
        match *last_sent {
            Some(last) if now.duration_since(last) < self.min_interval => true,
            _ => {
                *last_sent = Some(now);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::domain::job::{Job, JobFilter, JobKind, JobStats, JobStatus, StoreError};
    use crate::infrastructure::persistence::InMemoryJobStore;

    async fn seeded(store: &InMemoryJobStore) -> Uuid {
        store
            .create(JobKind::Backtest, json!({"strategy_id": "sma_cross"}))
            .await
            .unwrap()
    }

    async fn stored_progress(store: &InMemoryJobStore, job_id: Uuid) -> f64 {
        store.get(job_id).await.unwrap().unwrap().progress
    }

    #[tokio::test]
    async fn first_update_passes_then_window_drops() {
        let store = Arc::new(InMemoryJobStore::new());
        let job_id = seeded(&store).await;
        let reporter = ProgressReporter::new(store.clone(), job_id, Duration::from_secs(60));

        reporter.report(0.2, Some("warmup".to_string()), None).await;
        reporter.report(0.5, None, None).await;

        assert!((stored_progress(&store, job_id).await - 0.2).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn completion_bypasses_the_throttle() {
        let store = Arc::new(InMemoryJobStore::new());
        let job_id = seeded(&store).await;
        let reporter = ProgressReporter::new(store.clone(), job_id, Duration::from_secs(60));

        reporter.report(0.2, None, None).await;
        reporter.report(1.0, Some("done".to_string()), None).await;

        assert!((stored_progress(&store, job_id).await - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn zero_interval_forwards_everything() {
        let store = Arc::new(InMemoryJobStore::new());
        let job_id = seeded(&store).await;
        let reporter = ProgressReporter::new(store.clone(), job_id, Duration::ZERO);

        reporter.report(0.3, None, None).await;
        reporter.report(0.6, None, None).await;

        assert!((stored_progress(&store, job_id).await - 0.6).abs() < f64::EPSILON);
    }

    struct FailingStore;

    #[async_trait]
    impl JobStore for FailingStore {
        async fn create(&self, _kind: JobKind, _spec: Value) -> Result<Uuid, StoreError> {
            Err(StoreError::Database("store offline".to_string()))
        }

        async fn update_status(
            &self,
            _job_id: Uuid,
            _status: JobStatus,
            _error_message: Option<String>,
        ) -> Result<(), StoreError> {
            Err(StoreError::Database("store offline".to_string()))
        }

        async fn update_progress(
            &self,
            _job_id: Uuid,
            _progress: f64,
            _step: Option<String>,
            _total_steps: Option<u32>,
        ) -> Result<(), StoreError> {
            Err(StoreError::Database("store offline".to_string()))
        }

        async fn store_results(&self, _job_id: Uuid, _payload: Value) -> Result<(), StoreError> {
            Err(StoreError::Database("store offline".to_string()))
        }

        async fn get(&self, _job_id: Uuid) -> Result<Option<Job>, StoreError> {
            Err(StoreError::Database("store offline".to_string()))
        }

        async fn get_results(&self, _job_id: Uuid) -> Result<Option<Value>, StoreError> {
            Err(StoreError::Database("store offline".to_string()))
        }

        async fn list(&self, _filter: &JobFilter) -> Result<Vec<Job>, StoreError> {
            Err(StoreError::Database("store offline".to_string()))
        }

        async fn stats(&self, _kind: Option<JobKind>) -> Result<JobStats, StoreError> {
            Err(StoreError::Database("store offline".to_string()))
        }

        async fn delete(&self, _job_id: Uuid) -> Result<bool, StoreError> {
            Err(StoreError::Database("store offline".to_string()))
        }
    }

    #[tokio::test]
    async fn store_errors_are_swallowed() {
        let reporter = ProgressReporter::new(Arc::new(FailingStore), Uuid::new_v4(), Duration::ZERO);

        reporter.report(0.4, None, None).await;
        reporter.report(1.0, None, None).await;
    }
}
