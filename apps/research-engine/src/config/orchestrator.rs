//! Orchestrator configuration for the job execution pool.

use serde::{Deserialize, Serialize};

/// Orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum number of jobs executing at once.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    /// Minimum interval between persisted progress updates, in milliseconds.
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
    /// Estimated seconds per sweep combination, used for ETA reporting.
    #[serde(default = "default_per_combination_secs")]
    pub per_combination_secs: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            progress_interval_ms: default_progress_interval_ms(),
            per_combination_secs: default_per_combination_secs(),
        }
    }
}

pub(crate) const fn default_max_concurrent_jobs() -> usize {
    4
}

pub(crate) const fn default_progress_interval_ms() -> u64 {
    1000
}

pub(crate) const fn default_per_combination_secs() -> f64 {
    2.0
}
