//! Serializable experiment output.

use crate::provenance::{AccelerationComparison, GrowthFit};
use crate::runner::ExcludedRun;
use chrono::{DateTime, Utc};
use mirror_core::{ExperimentConfig, FitMetric, UpdateMode};
use mirror_metrics::CalibrationRecord;
use serde::Serialize;

/// Per-step mean and standard error across runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimestepStats {
    pub mean: Vec<f64>,
    pub standard_error: Vec<f64>,
}

/// Cross-run averages of the burst/plateau features.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSummary {
    pub burst_rate_mean: f64,
    pub burst_rate_se: f64,
    /// Mean over runs that reached a plateau
    pub plateau_onset_mean: Option<f64>,
    pub runs_reaching_plateau: usize,
    pub plateau_level_mean: f64,
    pub mean_abs_acceleration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunChangepoints {
    pub seed: u64,
    pub changepoints: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionSummary {
    pub condition: UpdateMode,
    pub runs_completed: usize,
    pub low_confidence_runs: usize,
    pub fit_metric: FitMetric,
    pub timestep: TimestepStats,
    pub fit: GrowthFit,
    pub features: FeatureSummary,
    pub transfer_entropy_ab_mean: f64,
    pub transfer_entropy_ba_mean: f64,
    /// Mean bipartition Φ over steps and runs. A single-cut lower bound,
    /// not canonical IIT Φ.
    pub bipartition_phi_lower_bound_mean: f64,
    pub recursive_influence_mean: Option<f64>,
    pub changepoints: Vec<RunChangepoints>,
}

impl ConditionSummary {
    /// Runs with at least one changepoint inside `[lo, hi]`.
    pub fn runs_with_changepoint_in(&self, lo: usize, hi: usize) -> usize {
        self.changepoints
            .iter()
            .filter(|r| r.changepoints.iter().any(|c| (lo..=hi).contains(c)))
            .count()
    }

    /// Mean number of changepoints per completed run.
    pub fn changepoints_per_run(&self) -> f64 {
        mean_count(&self.changepoints)
    }

    /// Median step of each run's first changepoint, over runs that have one.
    pub fn median_first_changepoint(&self) -> Option<f64> {
        median_first(&self.changepoints)
    }
}

fn mean_count(runs: &[RunChangepoints]) -> f64 {
    if runs.is_empty() {
        return 0.0;
    }
    runs.iter().map(|r| r.changepoints.len()).sum::<usize>() as f64 / runs.len() as f64
}

fn median_first(runs: &[RunChangepoints]) -> Option<f64> {
    let mut firsts: Vec<usize> = runs.iter().filter_map(|r| r.changepoints.first().copied()).collect();
    if firsts.is_empty() {
        return None;
    }
    firsts.sort_unstable();
    let mid = firsts.len() / 2;
    Some(if firsts.len() % 2 == 0 {
        (firsts[mid - 1] + firsts[mid]) as f64 / 2.0
    } else {
        firsts[mid] as f64
    })
}

/// Cohen's d with its bootstrap percentile interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectSize {
    pub measure: String,
    pub cohens_d: f64,
    pub ci_low: Option<f64>,
    pub ci_high: Option<f64>,
    pub confidence_level: f64,
}

/// Simultaneous vs Sequential.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionComparison {
    pub acceleration: AccelerationComparison,
    /// `R²` gain of the quadratic fit, first minus second condition
    pub quadratic_improvement_delta: f64,
    pub effect_sizes: Vec<EffectSize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentSummary {
    pub generated_at: DateTime<Utc>,
    pub config: ExperimentConfig,
    pub calibration: Option<CalibrationRecord>,
    /// `1 − |cA − cB|`
    pub complexity_match: f64,
    pub conditions: Vec<ConditionSummary>,
    pub comparison: Option<ConditionComparison>,
    pub excluded_runs: Vec<ExcludedRun>,
}

impl ExperimentSummary {
    pub fn condition(&self, mode: UpdateMode) -> Option<&ConditionSummary> {
        self.conditions.iter().find(|c| c.condition == mode)
    }
}
