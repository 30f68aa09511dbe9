//! Job kind and lifecycle status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of work a job performs.
///
/// Serialized lowercase; the stored values are a compatibility surface that
/// dashboards and CLIs filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Single-strategy backtest.
    Backtest,
    /// Multi-parameter optimization sweep.
    Optimization,
}

impl JobKind {
    /// Stable string form used in storage and log fields.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Backtest => "backtest",
            Self::Optimization => "optimization",
        }
    }

    /// Parse the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "backtest" => Some(Self::Backtest),
            "optimization" => Some(Self::Optimization),
            _ => None,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job status in the lifecycle.
///
/// Transitions are monotonic along `pending → running → terminal`; nothing
/// leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Row created, worker not yet started.
    Pending,
    /// Worker picked up the job.
    Running,
    /// Finished successfully, results available.
    Completed,
    /// Finished with an error; `error_message` is set.
    Failed,
    /// Stopped by an explicit cancel request.
    Cancelled,
}

impl JobStatus {
    /// Returns true if the job is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the status may still change.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    ///
    /// `pending` may skip straight to a terminal state (a job cancelled
    /// before its worker starts never observes `running`).
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running) || next.is_terminal(),
            Self::Running => next.is_terminal(),
            Self::Completed | Self::Failed | Self::Cancelled => false,
        }
    }

    /// Stable string form used in storage and log fields.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
