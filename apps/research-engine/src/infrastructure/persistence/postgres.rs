//! `PostgreSQL` job store.
//!
//! Durable [`JobStore`] backend. Lifecycle writes load the row inside a
//! transaction, apply [`Job::transition`] / [`Job::record_progress`], and
//! write back, so the state machine is enforced by the same domain code as
//! the in-memory backend. [`PostgresJobStore::ensure_schema`] bootstraps the
//! table idempotently at startup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::job::{Job, JobFilter, JobKind, JobStats, JobStatus, JobStore, StoreError};

const SELECT_COLUMNS: &str = "id, kind, status, progress, current_step, total_steps, \
     created_at, started_at, completed_at, actual_duration_secs, \
     error_message, result_data, spec";

const SCHEMA_DDL: &str = r"
    CREATE TABLE IF NOT EXISTS research_jobs (
        id                   UUID PRIMARY KEY,
        kind                 TEXT NOT NULL,
        status               TEXT NOT NULL,
        progress             DOUBLE PRECISION NOT NULL DEFAULT 0,
        current_step         TEXT,
        total_steps          INTEGER,
        created_at           TIMESTAMPTZ NOT NULL,
        started_at           TIMESTAMPTZ,
        completed_at         TIMESTAMPTZ,
        actual_duration_secs DOUBLE PRECISION,
        error_message        TEXT,
        result_data          JSONB,
        spec                 JSONB NOT NULL
    )
";

/// `PostgreSQL` implementation of [`JobStore`].
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    /// Connect with the default pool size.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be connected.
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        Self::with_max_connections(database_url, 5).await
    }

    /// Connect with a custom pool size.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be connected.
    pub async fn with_max_connections(
        database_url: &str,
        max_connections: u32,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        info!(
            max_connections = max_connections,
            "PostgreSQL connection pool initialized"
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool (for testing).
    #[must_use]
    pub const fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the jobs table and its listing index if they do not exist.
    ///
    /// Idempotent; called once at startup when this backend is selected.
    ///
    /// # Errors
    ///
    /// Returns an error if either DDL statement fails.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA_DDL)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS research_jobs_created_at_idx \
             ON research_jobs (created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        info!("Job store schema ensured");
        Ok(())
    }

    async fn fetch_for_update(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        job_id: Uuid,
    ) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM research_jobs WHERE id = $1 FOR UPDATE"
        ))
        .bind(job_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        row.as_ref().map(Self::row_to_job).transpose()
    }

    async fn write_back(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        job: &Job,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            UPDATE research_jobs SET
                status = $2,
                progress = $3,
                current_step = $4,
                total_steps = $5,
                started_at = $6,
                completed_at = $7,
                actual_duration_secs = $8,
                error_message = $9
            WHERE id = $1
            ",
        )
        .bind(job.id)
        .bind(job.status.as_str())
        .bind(job.progress)
        .bind(&job.current_step)
        .bind(job.total_steps.map(|n| n as i32))
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.actual_duration_secs)
        .bind(&job.error_message)
        .execute(&mut **tx)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    /// Convert a database row to a [`Job`].
    fn row_to_job(row: &sqlx::postgres::PgRow) -> Result<Job, StoreError> {
        let kind_text = row
            .try_get::<String, _>("kind")
            .map_err(|e| StoreError::MissingField(format!("kind: {e}")))?;
        let kind = JobKind::parse(&kind_text)
            .ok_or_else(|| StoreError::Database(format!("Unknown job kind: {kind_text}")))?;

        let status_text = row
            .try_get::<String, _>("status")
            .map_err(|e| StoreError::MissingField(format!("status: {e}")))?;
        let status = JobStatus::parse(&status_text)
            .ok_or_else(|| StoreError::Database(format!("Unknown job status: {status_text}")))?;

        Ok(Job {
            id: row
                .try_get::<Uuid, _>("id")
                .map_err(|e| StoreError::MissingField(format!("id: {e}")))?,
            kind,
            status,
            progress: row
                .try_get::<f64, _>("progress")
                .map_err(|e| StoreError::MissingField(format!("progress: {e}")))?,
            current_step: row
                .try_get::<Option<String>, _>("current_step")
                .map_err(|e| StoreError::MissingField(format!("current_step: {e}")))?,
            total_steps: row
                .try_get::<Option<i32>, _>("total_steps")
                .map_err(|e| StoreError::MissingField(format!("total_steps: {e}")))?
                .map(|n| n as u32),
            created_at: row
                .try_get::<DateTime<Utc>, _>("created_at")
                .map_err(|e| StoreError::MissingField(format!("created_at: {e}")))?,
            started_at: row
                .try_get::<Option<DateTime<Utc>>, _>("started_at")
                .map_err(|e| StoreError::MissingField(format!("started_at: {e}")))?,
            completed_at: row
                .try_get::<Option<DateTime<Utc>>, _>("completed_at")
                .map_err(|e| StoreError::MissingField(format!("completed_at: {e}")))?,
            actual_duration_secs: row
                .try_get::<Option<f64>, _>("actual_duration_secs")
                .map_err(|e| StoreError::MissingField(format!("actual_duration_secs: {e}")))?,
            error_message: row
                .try_get::<Option<String>, _>("error_message")
                .map_err(|e| StoreError::MissingField(format!("error_message: {e}")))?,
            result_data: row
                .try_get::<Option<Value>, _>("result_data")
                .map_err(|e| StoreError::MissingField(format!("result_data: {e}")))?,
            spec: row
                .try_get::<Value, _>("spec")
                .map_err(|e| StoreError::MissingField(format!("spec: {e}")))?,
        })
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn create(&self, kind: JobKind, spec: Value) -> Result<Uuid, StoreError> {
        let job = Job::new(kind, spec);

        sqlx::query(
            r"
            INSERT INTO research_jobs (
                id, kind, status, progress, current_step, total_steps,
                created_at, started_at, completed_at, actual_duration_secs,
                error_message, result_data, spec
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(job.id)
        .bind(job.kind.as_str())
        .bind(job.status.as_str())
        .bind(job.progress)
        .bind(&job.current_step)
        .bind(job.total_steps.map(|n| n as i32))
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.actual_duration_secs)
        .bind(&job.error_message)
        .bind(&job.result_data)
        .bind(&job.spec)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        debug!(job_id = %job.id, kind = %job.kind, "Job row created");
        Ok(job.id)
    }

    async fn update_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error_message: Option<String>,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if let Some(mut job) = Self::fetch_for_update(&mut tx, job_id).await? {
            if job.transition(status, error_message) {
                Self::write_back(&mut tx, &job).await?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn update_progress(
        &self,
        job_id: Uuid,
        progress: f64,
        step: Option<String>,
        total_steps: Option<u32>,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if let Some(mut job) = Self::fetch_for_update(&mut tx, job_id).await? {
            job.record_progress(progress, step, total_steps);
            Self::write_back(&mut tx, &job).await?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn store_results(&self, job_id: Uuid, payload: Value) -> Result<(), StoreError> {
        sqlx::query("UPDATE research_jobs SET result_data = $2 WHERE id = $1")
            .bind(job_id)
            .bind(&payload)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM research_jobs WHERE id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        row.as_ref().map(Self::row_to_job).transpose()
    }

    async fn get_results(&self, job_id: Uuid) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query(
            "SELECT result_data FROM research_jobs WHERE id = $1 AND status = $2",
        )
        .bind(job_id)
        .bind(JobStatus::Completed.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        match row {
            Some(row) => row
                .try_get::<Option<Value>, _>("result_data")
                .map_err(|e| StoreError::MissingField(format!("result_data: {e}"))),
            None => Ok(None),
        }
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {SELECT_COLUMNS}
            FROM research_jobs
            WHERE ($1::text IS NULL OR kind = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(filter.kind.map(|kind| kind.as_str()))
        .bind(filter.status.map(|status| status.as_str()))
        .bind(filter.limit as i64)
        .bind(filter.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.iter().map(Self::row_to_job).collect()
    }

    async fn stats(&self, kind: Option<JobKind>) -> Result<JobStats, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT status, COUNT(*) AS count, AVG(actual_duration_secs) AS avg_secs
            FROM research_jobs
            WHERE ($1::text IS NULL OR kind = $1)
            GROUP BY status
            ",
        )
        .bind(kind.map(|kind| kind.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut stats = JobStats::default();
        for row in rows {
            let status_text = row
                .try_get::<String, _>("status")
                .map_err(|e| StoreError::MissingField(format!("status: {e}")))?;
            let status = JobStatus::parse(&status_text).ok_or_else(|| {
                StoreError::Database(format!("Unknown job status: {status_text}"))
            })?;
            let count = row
                .try_get::<i64, _>("count")
                .map_err(|e| StoreError::MissingField(format!("count: {e}")))?
                .max(0) as usize;

            match status {
                JobStatus::Pending => stats.pending = count,
                JobStatus::Running => stats.running = count,
                JobStatus::Completed => stats.completed = count,
                JobStatus::Failed => stats.failed = count,
                JobStatus::Cancelled => stats.cancelled = count,
            }
            stats.total += count;

            if status == JobStatus::Completed {
                stats.avg_completion_secs = row
                    .try_get::<Option<f64>, _>("avg_secs")
                    .map_err(|e| StoreError::MissingField(format!("avg_secs: {e}")))?;
            }
        }
        Ok(stats)
    }

    async fn delete(&self, job_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM research_jobs WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
