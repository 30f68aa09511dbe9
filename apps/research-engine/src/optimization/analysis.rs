//! Statistics over completed sweeps.
//!
//! All aggregates are computed over the successful entries only; failed and
//! errored combinations carry `-inf` scores that would poison every moment.
//! Per-value means, correlations, and histogram edges are rounded so result
//! payloads stay stable across runs.

use serde::{Deserialize, Serialize};

use crate::domain::parameters::ParamValue;

use super::result::ResultEntry;

/// Summary statistics over successful optimization scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    /// Number of successful entries.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation (`0.0` for a single entry).
    pub std_dev: f64,
    /// Smallest score.
    pub min: f64,
    /// Largest score.
    pub max: f64,
    /// Interpolated median.
    pub median: f64,
    /// Interpolated first quartile.
    pub q1: f64,
    /// Interpolated third quartile.
    pub q3: f64,
}

/// Mean score for one observed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueScore {
    /// The observed value.
    pub value: ParamValue,
    /// Mean score across entries holding this value, rounded.
    pub mean_score: f64,
    /// Number of entries holding this value.
    pub count: usize,
}

/// Sensitivity of the score to one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSensitivity {
    /// Parameter name.
    pub parameter: String,
    /// Pearson correlation between value and score; absent for non-numeric
    /// dimensions or degenerate (constant) inputs.
    pub correlation: Option<f64>,
    /// Value-to-score aggregate table in first-seen order.
    pub value_scores: Vec<ValueScore>,
}

/// One bucket of the score distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    /// Inclusive lower edge, rounded.
    pub low: f64,
    /// Upper edge (inclusive for the last bucket), rounded.
    pub high: f64,
    /// Scores falling in the bucket.
    pub count: usize,
}

/// Distribution and sensitivity analysis of one sweep.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SweepAnalysis {
    /// Score statistics, absent when nothing succeeded.
    pub summary: Option<ScoreSummary>,
    /// Per-parameter sensitivity in declaration order.
    pub sensitivity: Vec<ParameterSensitivity>,
    /// Coarse score histogram.
    pub score_histogram: Vec<HistogramBin>,
    /// Set when statistics could not be computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Analyze a finished sweep.
///
/// `parameter_names` fixes the sensitivity ordering to grid declaration
/// order; `histogram_bins` is the target bucket count.
#[must_use]
pub fn analyze_sweep(
    entries: &[ResultEntry],
    parameter_names: &[String],
    histogram_bins: usize,
) -> SweepAnalysis {
    let successful: Vec<&ResultEntry> = entries.iter().filter(|e| e.is_successful()).collect();

    if successful.is_empty() {
        return SweepAnalysis {
            summary: None,
            sensitivity: Vec::new(),
            score_histogram: Vec::new(),
            warning: Some("No successful runs; statistics not computed".to_string()),
        };
    }

    let scores: Vec<f64> = successful.iter().map(|e| e.optimization_score).collect();

    SweepAnalysis {
        summary: summarize_scores(&scores),
        sensitivity: parameter_names
            .iter()
            .map(|name| parameter_sensitivity(name, &successful))
            .collect(),
        score_histogram: score_histogram(&scores, histogram_bins),
        warning: None,
    }
}

/// Summary statistics over a score set; `None` when empty.
#[must_use]
pub fn summarize_scores(scores: &[f64]) -> Option<ScoreSummary> {
    if scores.is_empty() {
        return None;
    }

    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let mean = mean(&sorted);
    let std_dev = if n < 2 {
        0.0
    } else {
        let variance = sorted.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        variance.sqrt()
    };

    Some(ScoreSummary {
        count: n,
        mean,
        std_dev,
        min: sorted[0],
        max: sorted[n - 1],
        median: percentile(&sorted, 0.5),
        q1: percentile(&sorted, 0.25),
        q3: percentile(&sorted, 0.75),
    })
}

/// Pearson correlation; `None` for fewer than two pairs or zero variance.
#[must_use]
pub fn correlation(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }

    let mean_x = mean(&xs[..n]);
    let mean_y = mean(&ys[..n]);

    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..n {
        let dx = xs[i] - mean_x;
        let dy = ys[i] - mean_y;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(covariance / (var_x * var_y).sqrt())
}

/// Score sensitivity for one parameter over the successful entries.
#[must_use]
pub fn parameter_sensitivity(name: &str, successful: &[&ResultEntry]) -> ParameterSensitivity {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let mut groups: Vec<(ParamValue, Vec<f64>)> = Vec::new();

    for entry in successful {
        let Some(value) = entry.parameters.get(name) else {
            continue;
        };

        if let Some(numeric) = value.as_float() {
            xs.push(numeric);
            ys.push(entry.optimization_score);
        }

        match groups.iter_mut().find(|(seen, _)| seen == value) {
            Some((_, scores)) => scores.push(entry.optimization_score),
            None => groups.push((value.clone(), vec![entry.optimization_score])),
        }
    }

    ParameterSensitivity {
        parameter: name.to_string(),
        correlation: correlation(&xs, &ys).map(round6),
        value_scores: groups
            .into_iter()
            .map(|(value, scores)| ValueScore {
                value,
                mean_score: round6(mean(&scores)),
                count: scores.len(),
            })
            .collect(),
    }
}

/// Uniform-width histogram over a score set.
///
/// A degenerate set (all scores equal) collapses to a single bucket.
#[must_use]
pub fn score_histogram(scores: &[f64], bins: usize) -> Vec<HistogramBin> {
    if scores.is_empty() || bins == 0 {
        return Vec::new();
    }

    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if max == min {
        return vec![HistogramBin {
            low: round6(min),
            high: round6(max),
            count: scores.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for score in scores {
        let index = (((score - min) / width) as usize).min(bins - 1);
        counts[index] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            low: round6((i as f64).mul_add(width, min)),
            high: round6(((i + 1) as f64).mul_add(width, min)),
            count,
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Interpolated percentile over a sorted slice, `fraction` in `[0, 1]`.
fn percentile(sorted: &[f64], fraction: f64) -> f64 {
    let position = fraction * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    (position - lower as f64).mul_add(sorted[upper] - sorted[lower], sorted[lower])
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
