use crate::agent::AgentTraits;
use crate::error::{MirrorError, MirrorResult};
use crate::scheduler::{SchedulerParams, UpdateMode};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// State vector dimension D
    pub dimension: usize,
    /// Runs per condition
    pub num_runs: usize,
    /// Run i uses seed `base_seed + i`
    pub base_seed: u64,
    pub timesteps: usize,
    /// α: how far an agent moves toward its mirror each step
    pub convergence_rate: f64,
    pub noise_std: f64,
    /// Energy lost per mirroring step (0 disables depletion)
    pub energy_depletion_rate: f64,
    pub changepoint_min_separation: usize,
    /// Multiplier on the changepoint penalty `σ̂² · ln n`
    pub changepoint_penalty_scale: f64,
    pub bootstrap_resamples: usize,
    pub confidence_level: f64,
    /// Bins per agent for the bipartition Φ lower bound
    pub phi_bins: usize,
    /// Concurrent runs; defaults to the machine's available parallelism
    pub workers: usize,
    pub conditions: Vec<UpdateMode>,
    pub fit_metric: FitMetric,
    /// Wall-clock cap per run, in seconds
    pub max_wall_clock_secs: Option<f64>,
    pub agent_a: AgentTraits,
    pub agent_b: AgentTraits,
    pub calibration: CalibrationConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            dimension: 100,
            num_runs: 30,
            base_seed: 4577,
            timesteps: 200,
            convergence_rate: 0.02,
            noise_std: 0.1,
            energy_depletion_rate: 0.0,
            changepoint_min_separation: 10,
            changepoint_penalty_scale: 4.0,
            bootstrap_resamples: 1000,
            confidence_level: 0.95,
            phi_bins: 8,
            workers: default_workers(),
            conditions: UpdateMode::ALL.to_vec(),
            fit_metric: FitMetric::MeanUnderstanding,
            max_wall_clock_secs: None,
            agent_a: AgentTraits::new(0.5, 0.7, 1.0),
            agent_b: AgentTraits::new(0.7, 0.6, 1.0),
            calibration: CalibrationConfig::default(),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl ExperimentConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let config: ExperimentConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Try to load from path; if the file is missing or unreadable, use defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Reject configurations no experiment can run with.
    pub fn validate(&self) -> MirrorResult<()> {
        let fail = |msg: String| Err(MirrorError::Config(msg));

        if self.dimension == 0 {
            return fail("dimension must be >= 1".into());
        }
        if self.num_runs == 0 {
            return fail("num_runs must be >= 1".into());
        }
        // linear and quadratic growth fits need three points
        if self.timesteps < 3 {
            return fail(format!("timesteps must be >= 3, got {}", self.timesteps));
        }
        if self.base_seed.checked_add(self.num_runs as u64).is_none() {
            return fail(format!(
                "base_seed {} + num_runs {} overflows the seed space",
                self.base_seed, self.num_runs
            ));
        }
        if !(0.0..=1.0).contains(&self.convergence_rate) {
            return fail(format!(
                "convergence_rate must be in [0, 1], got {}",
                self.convergence_rate
            ));
        }
        if !self.noise_std.is_finite() || self.noise_std < 0.0 {
            return fail(format!("noise_std must be finite and >= 0, got {}", self.noise_std));
        }
        if !self.energy_depletion_rate.is_finite() || self.energy_depletion_rate < 0.0 {
            return fail(format!(
                "energy_depletion_rate must be finite and >= 0, got {}",
                self.energy_depletion_rate
            ));
        }
        if self.changepoint_min_separation == 0 {
            return fail("changepoint_min_separation must be >= 1".into());
        }
        if !self.changepoint_penalty_scale.is_finite() || self.changepoint_penalty_scale <= 0.0 {
            return fail(format!(
                "changepoint_penalty_scale must be > 0, got {}",
                self.changepoint_penalty_scale
            ));
        }
        if self.bootstrap_resamples == 0 {
            return fail("bootstrap_resamples must be >= 1".into());
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return fail(format!(
                "confidence_level must be in (0, 1), got {}",
                self.confidence_level
            ));
        }
        if self.phi_bins < 2 {
            return fail(format!("phi_bins must be >= 2, got {}", self.phi_bins));
        }
        if self.workers == 0 {
            return fail("workers must be >= 1".into());
        }
        if self.conditions.is_empty() {
            return fail("at least one condition is required".into());
        }
        if self.conditions.len() == 2 && self.conditions[0] == self.conditions[1] {
            return fail(format!("condition {} is listed twice", self.conditions[0]));
        }
        if self.conditions.len() > 2 {
            return fail("conditions may list each update mode at most once".into());
        }
        if let Some(secs) = self.max_wall_clock_secs {
            if !secs.is_finite() || secs <= 0.0 {
                return fail(format!("max_wall_clock_secs must be > 0, got {secs}"));
            }
        }
        self.agent_a.validate("agent_a")?;
        self.agent_b.validate("agent_b")?;
        self.calibration.validate()
    }

    /// Dynamics parameters handed to the scheduler.
    pub fn scheduler_params(&self) -> SchedulerParams {
        SchedulerParams {
            timesteps: self.timesteps,
            convergence_rate: self.convergence_rate,
            noise_std: self.noise_std,
            energy_depletion_rate: self.energy_depletion_rate,
        }
    }

    /// Seeds of the independent runs: `base_seed + i` for `i < num_runs`.
    pub fn seeds(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.num_runs as u64).map(move |i| self.base_seed + i)
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

/// Scalar trajectory the growth fits are computed on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMetric {
    #[default]
    MeanUnderstanding,
    OrderParameter,
    SharedSpace,
}

/// Toy problem used to check the correlation transfer entropy against a
/// discretized estimate before any simulation runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub enabled: bool,
    /// Quantile bins per variable for the discretized estimate
    pub bins: usize,
    /// Samples of the coupled AR(1) pair
    pub length: usize,
    /// Coupling of x into y's next value
    pub coupling: f64,
    /// Allowed absolute error in nats
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bins: 6,
            length: 5000,
            coupling: 0.6,
            tolerance: 0.06,
            seed: 7,
        }
    }
}

impl CalibrationConfig {
    fn validate(&self) -> MirrorResult<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.bins < 2 {
            return Err(MirrorError::Config(format!(
                "calibration.bins must be >= 2, got {}",
                self.bins
            )));
        }
        if self.length < 20 {
            return Err(MirrorError::Config(format!(
                "calibration.length must be >= 20, got {}",
                self.length
            )));
        }
        if !self.coupling.is_finite() || !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(MirrorError::Config(
                "calibration.coupling and calibration.tolerance must be finite, tolerance > 0".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let cfg = ExperimentConfig::default();
        assert_eq!(cfg.dimension, 100);
        assert_eq!(cfg.num_runs, 30);
        assert_eq!(cfg.base_seed, 4577);
        assert_eq!(cfg.timesteps, 200);
        assert_eq!(cfg.convergence_rate, 0.02);
        assert_eq!(cfg.noise_std, 0.1);
        assert_eq!(cfg.energy_depletion_rate, 0.0);
        assert_eq!(cfg.changepoint_min_separation, 10);
        assert_eq!(cfg.bootstrap_resamples, 1000);
        assert_eq!(cfg.conditions, UpdateMode::ALL.to_vec());
        assert_eq!(cfg.agent_b.openness, 0.6);
        assert!(cfg.workers >= 1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
num_runs = 5
timesteps = 60
"#;
        let cfg: ExperimentConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.num_runs, 5);
        assert_eq!(cfg.timesteps, 60);
        // Defaults for unspecified fields
        assert_eq!(cfg.dimension, 100);
        assert_eq!(cfg.fit_metric, FitMetric::MeanUnderstanding);
        assert!(cfg.calibration.enabled);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
dimension = 32
num_runs = 10
base_seed = 1
timesteps = 120
convergence_rate = 0.05
noise_std = 0.2
energy_depletion_rate = 0.001
changepoint_min_separation = 8
changepoint_penalty_scale = 6.0
bootstrap_resamples = 200
confidence_level = 0.9
phi_bins = 6
workers = 2
conditions = ["sequential"]
fit_metric = "order_parameter"
max_wall_clock_secs = 30.0

[agent_a]
complexity = 0.4
openness = 0.9

[agent_b]
energy = 0.8

[calibration]
bins = 4
tolerance = 0.1
"#;
        let cfg: ExperimentConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.dimension, 32);
        assert_eq!(cfg.conditions, vec![UpdateMode::Sequential]);
        assert_eq!(cfg.fit_metric, FitMetric::OrderParameter);
        assert_eq!(cfg.max_wall_clock_secs, Some(30.0));
        assert_eq!(cfg.agent_a.openness, 0.9);
        // Missing trait fields fall back to the trait defaults
        assert_eq!(cfg.agent_a.energy, 1.0);
        assert_eq!(cfg.agent_b.energy, 0.8);
        assert_eq!(cfg.calibration.bins, 4);
        assert_eq!(cfg.calibration.length, 5000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            ExperimentConfig {
                dimension: 0,
                ..Default::default()
            },
            ExperimentConfig {
                convergence_rate: 1.5,
                ..Default::default()
            },
            ExperimentConfig {
                noise_std: -0.1,
                ..Default::default()
            },
            ExperimentConfig {
                timesteps: 2,
                ..Default::default()
            },
            ExperimentConfig {
                conditions: vec![],
                ..Default::default()
            },
            ExperimentConfig {
                agent_a: AgentTraits::new(0.5, 2.0, 1.0),
                ..Default::default()
            },
            ExperimentConfig {
                base_seed: u64::MAX,
                ..Default::default()
            },
            ExperimentConfig {
                conditions: vec![UpdateMode::Sequential, UpdateMode::Sequential],
                ..Default::default()
            },
        ];
        for cfg in bad {
            assert!(
                matches!(cfg.validate(), Err(MirrorError::Config(_))),
                "should reject {cfg:?}"
            );
        }
    }

    #[test]
    fn test_seeds_are_consecutive() {
        let cfg = ExperimentConfig {
            num_runs: 3,
            base_seed: 10,
            ..Default::default()
        };
        assert_eq!(cfg.seeds().collect::<Vec<_>>(), vec![10, 11, 12]);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let cfg = ExperimentConfig::load_or_default("/nonexistent/mirror.toml");
        assert_eq!(cfg.num_runs, 30);
    }

    #[test]
    fn test_load_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "num_runs = \"many\"").unwrap();
        let err = ExperimentConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML config"));
    }
}
