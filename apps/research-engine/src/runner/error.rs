//! Error types for job execution.

use thiserror::Error;

use crate::application::ports::{DatasetError, EvaluatorError, StrategyError};
use crate::domain::job::StoreError;
use crate::optimization::OptimizationError;

/// Errors from driving one job to a terminal state.
///
/// `Cancelled` is a control signal, not a failure; the runner maps it to
/// `status = cancelled` and every other variant to `status = failed`.
#[derive(Debug, Error)]
pub enum RunError {
    /// The job's cancellation token fired.
    #[error("Job cancelled")]
    Cancelled,

    /// Strategy resolution failed.
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    /// Dataset loading failed.
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// The evaluator raised an error.
    #[error(transparent)]
    Evaluator(#[from] EvaluatorError),

    /// The evaluation ran but was judged unusable.
    #[error("Evaluation failed: {message}")]
    EvaluationFailed {
        /// The evaluator's failure description.
        message: String,
    },

    /// The sweep failed before any evaluation started.
    #[error(transparent)]
    Optimization(OptimizationError),

    /// Every combination in a sweep failed.
    #[error("{message}")]
    NoSuccessfulRuns {
        /// Summary of the failed sweep.
        message: String,
    },

    /// A store write failed on the execution path.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<OptimizationError> for RunError {
    fn from(err: OptimizationError) -> Self {
        match err {
            OptimizationError::Cancelled => Self::Cancelled,
            other => Self::Optimization(other),
        }
    }
}
