//! Parameter sweeps.
//!
//! Re-runs the full experiment for each value of one dynamics knob and keeps
//! the per-condition shape of the growth curve. This is how the effect of
//! energy depletion on burst/plateau is measured rather than assumed, and how
//! the complexity-ceiling hypothesis is checked: complexity does not enter the
//! update rule, so its sweep reproduces the same curve at every level.

use crate::experiment::run_experiment;
use chrono::{DateTime, Utc};
use mirror_core::{ExperimentConfig, MirrorError, MirrorResult, UpdateMode};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepParameter {
    EnergyDepletionRate,
    ConvergenceRate,
    NoiseStd,
    /// Both agents' complexity
    Complexity,
}

impl SweepParameter {
    pub fn as_str(&self) -> &'static str {
        match self {
            SweepParameter::EnergyDepletionRate => "energy_depletion_rate",
            SweepParameter::ConvergenceRate => "convergence_rate",
            SweepParameter::NoiseStd => "noise_std",
            SweepParameter::Complexity => "complexity",
        }
    }

    fn apply(&self, config: &mut ExperimentConfig, value: f64) {
        match self {
            SweepParameter::EnergyDepletionRate => config.energy_depletion_rate = value,
            SweepParameter::ConvergenceRate => config.convergence_rate = value,
            SweepParameter::NoiseStd => config.noise_std = value,
            SweepParameter::Complexity => {
                config.agent_a.complexity = value;
                config.agent_b.complexity = value;
            }
        }
    }
}

impl fmt::Display for SweepParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (value, condition) cell of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepPoint {
    pub value: f64,
    pub condition: UpdateMode,
    pub runs_completed: usize,
    pub runs_excluded: usize,
    pub quadratic_improvement: f64,
    pub burst_rate_mean: f64,
    pub plateau_onset_mean: Option<f64>,
    pub plateau_level_mean: f64,
    pub final_mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub generated_at: DateTime<Utc>,
    pub parameter: SweepParameter,
    pub points: Vec<SweepPoint>,
}

impl SweepReport {
    /// Points of one condition, in sweep order.
    pub fn series(&self, condition: UpdateMode) -> Vec<&SweepPoint> {
        self.points.iter().filter(|p| p.condition == condition).collect()
    }
}

/// Run `base` once per value of `parameter`.
///
/// Calibration does not depend on the swept knobs, so it is skipped per point.
pub async fn run_sweep(
    base: &ExperimentConfig,
    parameter: SweepParameter,
    values: &[f64],
) -> MirrorResult<SweepReport> {
    if values.is_empty() {
        return Err(MirrorError::Config("sweep needs at least one value".into()));
    }
    let mut points = Vec::new();
    for &value in values {
        let mut config = base.clone();
        parameter.apply(&mut config, value);
        config.calibration.enabled = false;
        tracing::info!("Sweep {} = {}", parameter, value);

        let summary = run_experiment(config).await?;
        for condition in &summary.conditions {
            let excluded = summary
                .excluded_runs
                .iter()
                .filter(|r| r.condition == condition.condition)
                .count();
            points.push(SweepPoint {
                value,
                condition: condition.condition,
                runs_completed: condition.runs_completed,
                runs_excluded: excluded,
                quadratic_improvement: condition.fit.quadratic_improvement,
                burst_rate_mean: condition.features.burst_rate_mean,
                plateau_onset_mean: condition.features.plateau_onset_mean,
                plateau_level_mean: condition.features.plateau_level_mean,
                final_mean: condition.timestep.mean.last().copied().unwrap_or(0.0),
            });
        }
    }
    Ok(SweepReport {
        generated_at: Utc::now(),
        parameter,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ExperimentConfig {
        ExperimentConfig {
            dimension: 30,
            num_runs: 6,
            timesteps: 80,
            bootstrap_resamples: 50,
            workers: 2,
            conditions: vec![UpdateMode::Simultaneous],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_sweep_covers_every_value() {
        let report = run_sweep(&base(), SweepParameter::NoiseStd, &[0.05, 0.2])
            .await
            .unwrap();
        assert_eq!(report.points.len(), 2);
        assert_eq!(report.series(UpdateMode::Simultaneous).len(), 2);
        assert_eq!(report.points[0].value, 0.05);
    }

    #[tokio::test]
    async fn test_full_depletion_freezes_growth() {
        // energy 1.0 gone after one step: agents stop perceiving each other
        let report = run_sweep(&base(), SweepParameter::EnergyDepletionRate, &[0.0, 1.0])
            .await
            .unwrap();
        let (none, full) = (&report.points[0], &report.points[1]);
        assert!(full.final_mean <= none.final_mean + 1e-12);
        assert!(full.burst_rate_mean <= none.burst_rate_mean + 1e-12);
    }

    #[tokio::test]
    async fn test_complexity_has_no_ceiling() {
        let report = run_sweep(&base(), SweepParameter::Complexity, &[0.3, 0.5, 0.7, 0.9])
            .await
            .unwrap();
        let first = &report.points[0];
        for p in &report.points[1..] {
            assert_eq!(p.plateau_level_mean, first.plateau_level_mean, "complexity {}", p.value);
            assert_eq!(p.final_mean, first.final_mean);
            assert_eq!(p.quadratic_improvement, first.quadratic_improvement);
        }
        let err = run_sweep(&base(), SweepParameter::Complexity, &[1.5]).await.unwrap_err();
        assert!(matches!(err, MirrorError::Config(_)));
    }

    #[tokio::test]
    async fn test_invalid_value_is_config_error() {
        let err = run_sweep(&base(), SweepParameter::ConvergenceRate, &[2.0])
            .await
            .unwrap_err();
        assert!(matches!(err, MirrorError::Config(_)));
        assert!(run_sweep(&base(), SweepParameter::NoiseStd, &[]).await.is_err());
    }
}
