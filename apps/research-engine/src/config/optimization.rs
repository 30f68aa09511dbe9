//! Optimization sweep configuration.

use serde::{Deserialize, Serialize};

use crate::optimization::SweepSettings;

/// Optimization sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConfig {
    /// Ceiling on expanded parameter combinations per sweep.
    #[serde(default = "default_max_combinations")]
    pub max_combinations: usize,
    /// Worker count used when a sweep does not request one.
    #[serde(default = "default_workers")]
    pub default_workers: usize,
    /// Maximum ranked entries kept in a stored sweep report.
    #[serde(default = "default_result_cap")]
    pub result_cap: usize,
    /// Bucket count for the score histogram.
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,
    /// Metric names accepted as optimization targets.
    #[serde(default = "default_supported_metrics")]
    pub supported_metrics: Vec<String>,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            max_combinations: default_max_combinations(),
            default_workers: default_workers(),
            result_cap: default_result_cap(),
            histogram_bins: default_histogram_bins(),
            supported_metrics: default_supported_metrics(),
        }
    }
}

pub(crate) const fn default_max_combinations() -> usize {
    1000
}

pub(crate) const fn default_workers() -> usize {
    4
}

pub(crate) const fn default_result_cap() -> usize {
    50
}

pub(crate) const fn default_histogram_bins() -> usize {
    10
}

pub(crate) fn default_supported_metrics() -> Vec<String> {
    SweepSettings::DEFAULT_METRICS
        .iter()
        .map(ToString::to_string)
        .collect()
}
