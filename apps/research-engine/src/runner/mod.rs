//! Job Runners
//!
//! One runner per job kind. A runner owns the full lifecycle of an accepted
//! job: the `running` transition, phase-banded progress through the
//! throttled reporter, result persistence, and the terminal status write.
//! Cancellation is cooperative; runners check the job's token between
//! phases and map a fired token to `cancelled`, never `failed`.

mod backtest;
mod error;
mod optimization;
mod progress;

pub use backtest::BacktestRunner;
pub use error::RunError;
pub use optimization::OptimizationRunner;
pub use progress::ProgressReporter;
