//! In-memory job store.
//!
//! The default backend: keeps the engine runnable and testable without a
//! database. Insertion order is tracked so listings page newest-first with
//! the same semantics as the `PostgreSQL` backend.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::job::{Job, JobFilter, JobKind, JobStats, JobStatus, JobStore, StoreError};

#[derive(Debug, Default)]
struct StoreInner {
    jobs: HashMap<Uuid, Job>,
    insertion_order: Vec<Uuid>,
}

/// In-memory implementation of [`JobStore`].
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryJobStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().jobs.len()
    }

    /// Whether the store holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().jobs.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, kind: JobKind, spec: Value) -> Result<Uuid, StoreError> {
        let job = Job::new(kind, spec);
        let id = job.id;
        let mut inner = self.inner.write();
        inner.jobs.insert(id, job);
        inner.insertion_order.push(id);
        Ok(id)
    }

    async fn update_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error_message: Option<String>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            job.transition(status, error_message);
        }
        Ok(())
    }

    async fn update_progress(
        &self,
        job_id: Uuid,
        progress: f64,
        step: Option<String>,
        total_steps: Option<u32>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            job.record_progress(progress, step, total_steps);
        }
        Ok(())
    }

    async fn store_results(&self, job_id: Uuid, payload: Value) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            job.result_data = Some(payload);
        }
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.inner.read().jobs.get(&job_id).cloned())
    }

    async fn get_results(&self, job_id: Uuid) -> Result<Option<Value>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .jobs
            .get(&job_id)
            .filter(|job| job.status == JobStatus::Completed)
            .and_then(|job| job.result_data.clone()))
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .insertion_order
            .iter()
            .rev()
            .filter_map(|id| inner.jobs.get(id))
            .filter(|job| filter.kind.is_none_or(|kind| job.kind == kind))
            .filter(|job| filter.status.is_none_or(|status| job.status == status))
            .skip(filter.offset)
            .take(filter.limit)
            .cloned()
            .collect())
    }

    async fn stats(&self, kind: Option<JobKind>) -> Result<JobStats, StoreError> {
        let inner = self.inner.read();
        let mut stats = JobStats::default();
        let mut completed_secs = Vec::new();

        for job in inner.jobs.values() {
            if kind.is_some_and(|k| job.kind != k) {
                continue;
            }
            stats.count(job.status);
            if job.status == JobStatus::Completed {
                if let Some(secs) = job.actual_duration_secs {
                    completed_secs.push(secs);
                }
            }
        }

        if !completed_secs.is_empty() {
            stats.avg_completion_secs =
                Some(completed_secs.iter().sum::<f64>() / completed_secs.len() as f64);
        }
        Ok(stats)
    }

    async fn delete(&self, job_id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        let removed = inner.jobs.remove(&job_id).is_some();
        if removed {
            inner.insertion_order.retain(|id| *id != job_id);
        }
        Ok(removed)
    }
}
