//! The job record and its lifecycle invariants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::status::{JobKind, JobStatus};

/// One trackable unit of submitted work.
///
/// The record owns the lifecycle invariants so every store backend applies
/// identical semantics: [`Job::transition`] guards the state machine and
/// stamps timestamps, [`Job::record_progress`] clamps and keeps progress
/// monotonic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Store-assigned identifier.
    pub id: Uuid,
    /// What this job computes.
    pub kind: JobKind,
    /// Lifecycle status.
    pub status: JobStatus,
    /// Completion fraction in `[0.0, 1.0]`, non-decreasing while active.
    pub progress: f64,
    /// Free-text label of the active phase.
    pub current_step: Option<String>,
    /// Informational step count.
    pub total_steps: Option<u32>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Set exactly once on the first transition to `running`.
    pub started_at: Option<DateTime<Utc>>,
    /// Set exactly once on reaching a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds between `started_at` and `completed_at`.
    pub actual_duration_secs: Option<f64>,
    /// Present only when `status = failed`.
    pub error_message: Option<String>,
    /// Opaque result payload, present only when `status = completed`.
    pub result_data: Option<Value>,
    /// The submission payload the worker executes.
    pub spec: Value,
}

impl Job {
    /// Create a fresh `pending` job for a submission payload.
    #[must_use]
    pub fn new(kind: JobKind, spec: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            status: JobStatus::Pending,
            progress: 0.0,
            current_step: None,
            total_steps: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            actual_duration_secs: None,
            error_message: None,
            result_data: None,
            spec,
        }
    }

    /// Apply a status transition, returning whether it was legal.
    ///
    /// Entering `running` stamps `started_at` once. Entering a terminal
    /// state stamps `completed_at`, computes the actual duration, and (for
    /// `failed`) records the error message. Entering `completed` pins
    /// progress to exactly `1.0`. Illegal transitions leave the record
    /// untouched.
    pub fn transition(&mut self, next: JobStatus, error_message: Option<String>) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }

        self.status = next;

        if next == JobStatus::Running && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }

        if next.is_terminal() {
            let completed = Utc::now();
            self.completed_at = Some(completed);
            self.actual_duration_secs = self
                .started_at
                .map(|started| (completed - started).as_seconds_f64().max(0.0));
        }

        match next {
            JobStatus::Failed => self.error_message = error_message,
            JobStatus::Completed => self.progress = 1.0,
            _ => {}
        }

        true
    }

    /// Record a progress update.
    ///
    /// Values are clamped to `[0, 1]` and never regress; NaN is ignored.
    /// Updates against a terminal record are dropped so `completed` always
    /// reads exactly `1.0`.
    pub fn record_progress(
        &mut self,
        progress: f64,
        step: Option<String>,
        total_steps: Option<u32>,
    ) {
        if self.status.is_terminal() || progress.is_nan() {
            return;
        }

        self.progress = self.progress.max(progress.clamp(0.0, 1.0));
        if step.is_some() {
            self.current_step = step;
        }
        if total_steps.is_some() {
            self.total_steps = total_steps;
        }
    }
}
