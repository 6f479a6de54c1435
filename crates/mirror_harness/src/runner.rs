//! One seeded run, start to finish: simulate, measure, summarise.
//!
//! `RunResult` has no public constructor. The only way to obtain one is
//! `execute_run`, i.e. by actually running the model, which is what lets
//! `provenance` trust any series built from run results.

use crate::features::{growth_features, GrowthFeatures};
use mirror_core::{
    simulate, ExperimentConfig, FitMetric, MirrorResult, RunBudget, Trajectory, UpdateMode,
};
use mirror_metrics::{evaluate, ChangepointParams, MetricParams, MetricValue, RunMetrics};
use serde::Serialize;

/// Outcome of one genuine model execution.
#[derive(Debug, Clone)]
pub struct RunResult {
    condition: UpdateMode,
    seed: u64,
    trajectory: Trajectory,
    metrics: RunMetrics,
    features: GrowthFeatures,
}

impl RunResult {
    fn new(trajectory: Trajectory, metrics: RunMetrics) -> Self {
        let features = growth_features(&trajectory.mean_understanding());
        Self {
            condition: trajectory.mode(),
            seed: trajectory.seed(),
            trajectory,
            metrics,
            features,
        }
    }

    pub fn condition(&self) -> UpdateMode {
        self.condition
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    pub fn transfer_entropy_ab(&self) -> MetricValue {
        self.metrics.transfer_entropy_ab
    }

    pub fn transfer_entropy_ba(&self) -> MetricValue {
        self.metrics.transfer_entropy_ba
    }

    /// Bipartition Φ per step (lower bound on integration).
    pub fn phi_series(&self) -> &[f64] {
        &self.metrics.phi
    }

    pub fn changepoints(&self) -> &[usize] {
        &self.metrics.changepoints
    }

    pub fn features(&self) -> &GrowthFeatures {
        &self.features
    }

    pub fn low_confidence(&self) -> bool {
        self.metrics.low_confidence
    }

    /// The scalar per-step series named by `metric`.
    pub fn series(&self, metric: FitMetric) -> Vec<f64> {
        match metric {
            FitMetric::MeanUnderstanding => self.trajectory.mean_understanding(),
            FitMetric::OrderParameter => self.metrics.order_parameter.clone(),
            FitMetric::SharedSpace => self.metrics.shared_space.clone(),
        }
    }
}

/// A run that produced no result, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedRun {
    pub condition: UpdateMode,
    pub seed: u64,
    pub reason: String,
}

pub fn metric_params(config: &ExperimentConfig) -> MetricParams {
    MetricParams {
        phi_bins: config.phi_bins,
        changepoint: ChangepointParams {
            min_separation: config.changepoint_min_separation,
            penalty_scale: config.changepoint_penalty_scale,
            ..Default::default()
        },
    }
}

/// Simulate and measure one `(condition, seed)` run.
pub fn execute_run(
    config: &ExperimentConfig,
    condition: UpdateMode,
    seed: u64,
    budget: &RunBudget,
) -> MirrorResult<RunResult> {
    let trajectory = simulate(
        condition,
        seed,
        config.dimension,
        (config.agent_a, config.agent_b),
        &config.scheduler_params(),
        budget,
    )?;
    let metrics = evaluate(&trajectory, &metric_params(config))?;
    tracing::debug!(
        "Run {} seed={} done: {} changepoints, TE(A→B)={:.4}",
        condition,
        seed,
        metrics.changepoints.len(),
        metrics.transfer_entropy_ab.value
    );
    Ok(RunResult::new(trajectory, metrics))
}
