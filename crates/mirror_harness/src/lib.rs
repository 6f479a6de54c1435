//! # Mirror Harness
//!
//! Statistically honest comparison of update orders. An experiment runs
//! `num_runs` independently seeded simulations per condition, measures each
//! one and aggregates:
//!
//! - per-step mean ± standard error of the fitted metric
//! - linear vs quadratic fits (R², quadratic improvement)
//! - gradient comparison with a Welch t-test
//! - Cohen's d with bootstrap percentile intervals
//!
//! Fits only accept `GrowthSeries` built from `RunResult`s, and only the
//! runner can create a `RunResult`. The least-squares routines themselves are
//! private to this crate, so `fit_growth` is the only way to fit anything:
//!
//! ```compile_fail
//! let y: Vec<f64> = (0..200).map(|x| 2.0 * (x as f64).powi(2)).collect();
//! let _ = mirror_harness::stats::polyfit(&y, 2);
//! ```
//!
//! ```
//! use mirror_core::MirrorError;
//! use mirror_harness::{fit_growth, GrowthSeries};
//!
//! let y: Vec<f64> = (0..200).map(|x| 2.0 * (x as f64).powi(2)).collect();
//! let err = fit_growth(&GrowthSeries::external("y = 2x²", y)).unwrap_err();
//! assert!(matches!(err, MirrorError::ValidationIntegrity(_)));
//! ```

pub mod experiment;
pub mod features;
pub mod provenance;
pub mod runner;
mod stats;
pub mod summary;
pub mod sweep;

pub use experiment::{run_experiment, run_experiment_with_cancel};
pub use features::{growth_features, GrowthFeatures};
pub use provenance::{
    compare_acceleration, fit_growth, AccelerationComparison, GrowthFit, GrowthSeries, Provenance,
};
pub use runner::{execute_run, ExcludedRun, RunResult};
pub use stats::{PolyFit, TTest};
pub use summary::{
    ConditionComparison, ConditionSummary, EffectSize, ExperimentSummary, FeatureSummary,
    RunChangepoints, TimestepStats,
};
pub use sweep::{run_sweep, SweepParameter, SweepPoint, SweepReport};
