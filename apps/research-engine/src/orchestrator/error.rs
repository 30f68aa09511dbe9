//! Error types for job orchestration.

use thiserror::Error;

use crate::domain::job::StoreError;

/// Errors surfaced to callers of the orchestrator API.
///
/// Submission-time problems (bad spec, unknown strategy or dataset, grid
/// over the ceiling) are all `Validation`: they are rejected before a job
/// row exists, so no job is ever created for them.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The submission was rejected before a job row was created.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The job store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
