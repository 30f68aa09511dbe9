//! Job Store Trait
//!
//! Defines the persistence abstraction for job rows.
//! Implemented by adapters in the infrastructure layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::record::Job;
use super::status::{JobKind, JobStatus};

/// Default page size for [`JobStore::list`].
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Errors from job store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend (connection/query) error.
    #[error("Database error: {0}")]
    Database(String),

    /// Payload encode/decode error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored row missing a required column.
    #[error("Missing field: {0}")]
    MissingField(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Filter for [`JobStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFilter {
    /// Restrict to one job kind.
    pub kind: Option<JobKind>,
    /// Restrict to one status.
    pub status: Option<JobStatus>,
    /// Page size.
    pub limit: usize,
    /// Rows to skip, newest first.
    pub offset: usize,
}

impl JobFilter {
    /// Unfiltered first page.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            kind: None,
            status: None,
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }

    /// Restrict to one kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: JobKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Restrict to one status.
    #[must_use]
    pub const fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the page size.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Skip leading rows.
    #[must_use]
    pub const fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

impl Default for JobFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts by status plus the average completion time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStats {
    /// Jobs waiting for a worker.
    pub pending: usize,
    /// Jobs currently executing.
    pub running: usize,
    /// Jobs finished successfully.
    pub completed: usize,
    /// Jobs finished with an error.
    pub failed: usize,
    /// Jobs stopped by a cancel request.
    pub cancelled: usize,
    /// All jobs matching the stats filter.
    pub total: usize,
    /// Mean `actual_duration_secs` over completed jobs, if any completed.
    pub avg_completion_secs: Option<f64>,
}

impl JobStats {
    /// Count one job toward the snapshot.
    pub const fn count(&mut self, status: JobStatus) {
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Running => self.running += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
        }
        self.total += 1;
    }

    /// Count for one status.
    #[must_use]
    pub const fn count_for(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::Running => self.running,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
            JobStatus::Cancelled => self.cancelled,
        }
    }
}

/// Persistence contract for job rows.
///
/// All operations are atomic with respect to a single row. Lifecycle
/// semantics (timestamp stamping, terminal-state guard, progress clamping)
/// are those of [`Job::transition`] and [`Job::record_progress`]; every
/// backend must apply them identically.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a `pending` row for a submission payload and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails.
    async fn create(&self, kind: JobKind, spec: Value) -> Result<Uuid, StoreError>;

    /// Apply a status transition.
    ///
    /// A no-op (not an error) when the row no longer exists or the
    /// transition is illegal; the row may have been deleted or cancelled
    /// concurrently.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails.
    async fn update_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error_message: Option<String>,
    ) -> Result<(), StoreError>;

    /// Record a progress update.
    ///
    /// Silently drops the update when the row was deleted. Callers on the
    /// job execution path additionally treat `Err` as non-fatal: progress
    /// reporting never aborts a job.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails.
    async fn update_progress(
        &self,
        job_id: Uuid,
        progress: f64,
        step: Option<String>,
        total_steps: Option<u32>,
    ) -> Result<(), StoreError>;

    /// Persist the opaque result payload without changing status.
    ///
    /// A no-op when the row no longer exists.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails.
    async fn store_results(&self, job_id: Uuid, payload: Value) -> Result<(), StoreError>;

    /// Fetch one job row.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn get(&self, job_id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Fetch the result payload, available only once `completed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn get_results(&self, job_id: Uuid) -> Result<Option<Value>, StoreError>;

    /// List jobs newest-first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, StoreError>;

    /// Counts by status and average completion seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn stats(&self, kind: Option<JobKind>) -> Result<JobStats, StoreError>;

    /// Delete a row, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    async fn delete(&self, job_id: Uuid) -> Result<bool, StoreError>;
}
