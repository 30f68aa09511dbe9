//! Parameter-optimization sweeps.
//!
//! Expands a parameter grid, splits the dataset by position into train and
//! validation slices, runs one evaluator call per combination on a bounded
//! worker pool, then selects, validates, ranks, and analyzes the results.
//!
//! # Determinism
//!
//! Completion order under parallel execution is unspecified, but results are
//! collected back into combination iteration order before selection and
//! ranking, and best-selection uses strict `>` comparisons, so the winner and
//! the ranking are identical for any worker count.

mod analysis;
mod engine;
mod error;
mod result;
mod split;

pub use analysis::{
    HistogramBin, ParameterSensitivity, ScoreSummary, SweepAnalysis, ValueScore, analyze_sweep,
    correlation, parameter_sensitivity, score_histogram, summarize_scores,
};
pub use engine::{NoOpProgressSink, OptimizationEngine, ProgressSink, SweepSettings};
pub use error::OptimizationError;
pub use result::{EntryStatus, OptimizationReport, ResultEntry, ValidationOutcome};
pub use split::{DatasetSplit, split_dataset};
