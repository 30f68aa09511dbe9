//! Evaluator Port (Driven Port)
//!
//! The evaluator is the black-box backtest engine: one call scores one
//! strategy/parameter assignment against one dataset window. Calls must be
//! safe to issue concurrently with independent datasets and parameters.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::datasets::Dataset;
use crate::domain::parameters::ParameterSet;

/// Errors raised by an evaluator outside its own result channel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvaluatorError {
    /// The request was malformed for this evaluator.
    #[error("Invalid evaluation request: {0}")]
    InvalidRequest(String),

    /// The evaluation aborted mid-run.
    #[error("Evaluator execution error: {0}")]
    Execution(String),
}

/// Inputs for one evaluator invocation.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    /// Dataset window to evaluate against.
    pub dataset: Dataset,
    /// Strategy identifier, already resolved through the registry.
    pub strategy_id: String,
    /// Concrete parameter assignment.
    pub strategy_params: ParameterSet,
    /// Opaque options forwarded untouched from the submission.
    pub engine_options: Value,
}

/// Outcome of one evaluator invocation.
///
/// `success = false` is an in-band evaluation failure (the strategy ran and
/// was judged unusable), distinct from an [`EvaluatorError`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    /// Whether the evaluation produced usable metrics.
    pub success: bool,
    /// Named metric values, keyed by metric name.
    pub metrics: HashMap<String, f64>,
    /// Failure description when `success = false`.
    pub error: Option<String>,
}

impl Evaluation {
    /// A successful outcome carrying metrics.
    #[must_use]
    pub const fn succeeded(metrics: HashMap<String, f64>) -> Self {
        Self {
            success: true,
            metrics,
            error: None,
        }
    }

    /// An in-band failure with a description.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            metrics: HashMap::new(),
            error: Some(error.into()),
        }
    }
}

/// Receives an evaluator's own completion estimate while it runs.
///
/// Fractions are best-effort, unthrottled, and in `[0, 1]`; callers that do
/// not care pass [`NoOpObserver`].
pub trait EvaluationObserver: Send + Sync {
    /// Called with the evaluator's completion estimate.
    fn on_progress(&self, fraction: f64);
}

/// Observer that discards sub-progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpObserver;

impl EvaluationObserver for NoOpObserver {
    fn on_progress(&self, _fraction: f64) {}
}

/// Port for the black-box backtest evaluator.
#[async_trait]
pub trait EvaluatorPort: Send + Sync {
    /// Run one evaluation to completion.
    ///
    /// # Errors
    ///
    /// Returns an error only when execution aborts; an unusable strategy is
    /// reported in-band via [`Evaluation::success`].
    async fn evaluate(
        &self,
        request: &EvaluationRequest,
        observer: &dyn EvaluationObserver,
    ) -> Result<Evaluation, EvaluatorError>;
}

/// Closure-backed evaluator for tests, development, and demos.
///
/// The closure receives the full request and returns the outcome; the
/// observer is driven with `0.0` before and `1.0` after the call.
pub struct FnEvaluator<F> {
    f: F,
}

impl<F> FnEvaluator<F>
where
    F: Fn(&EvaluationRequest) -> Result<Evaluation, EvaluatorError> + Send + Sync,
{
    /// Wrap a scoring closure.
    pub const fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> EvaluatorPort for FnEvaluator<F>
where
    F: Fn(&EvaluationRequest) -> Result<Evaluation, EvaluatorError> + Send + Sync,
{
    async fn evaluate(
        &self,
        request: &EvaluationRequest,
        observer: &dyn EvaluationObserver,
    ) -> Result<Evaluation, EvaluatorError> {
        observer.on_progress(0.0);
        let outcome = (self.f)(request);
        observer.on_progress(1.0);
        outcome
    }
}
