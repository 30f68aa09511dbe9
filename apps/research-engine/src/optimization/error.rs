//! Error types for optimization sweeps.

use thiserror::Error;

use crate::domain::parameters::ParameterError;

/// Errors from optimization sweep execution.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptimizationError {
    /// Parameter ranges failed validation or expansion.
    #[error(transparent)]
    InvalidParameters(#[from] ParameterError),

    /// The requested metric is not in the supported set.
    #[error("Unsupported optimization metric: {metric}")]
    UnsupportedMetric {
        /// The rejected metric name.
        metric: String,
    },

    /// The sweep was cancelled before completion.
    #[error("Optimization sweep cancelled")]
    Cancelled,
}
