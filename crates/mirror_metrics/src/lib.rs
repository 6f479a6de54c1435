//! # Mirror Metrics
//!
//! Per-run measurements on a finished `Trajectory`:
//!
//! - **transfer**: correlation transfer entropy (Gaussian approximation) and
//!   its calibration against a discretized estimate
//! - **phi**: bipartition Φ, a single-cut lower bound on integration
//! - **order**: order parameter ψ = |A·B|
//! - **shared**: shared space ψ·min(uA, uB)
//! - **changepoint**: PELT phase-transition detector
//!
//! Metrics never fail on short runs: below `MIN_RELIABLE_LENGTH` steps they
//! return a defined value flagged `low_confidence`.

pub mod changepoint;
pub mod order;
pub mod phi;
pub mod shared;
pub mod transfer;

pub use changepoint::{detect_changepoints, ChangepointParams};
pub use order::{order_parameter, order_parameter_series};
pub use phi::{bipartition_phi, bipartition_phi_series};
pub use shared::{complexity_match, shared_space_series};
pub use transfer::{
    calibrate, correlation_transfer_entropy, trajectory_transfer_entropy, CalibrationRecord,
};

use mirror_core::{MirrorResult, Trajectory};
use serde::Serialize;

/// Runs shorter than this are flagged low confidence.
pub const MIN_RELIABLE_LENGTH: usize = 20;

/// A scalar metric with its reliability flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricValue {
    pub value: f64,
    pub low_confidence: bool,
}

impl MetricValue {
    pub fn new(value: f64, low_confidence: bool) -> Self {
        Self {
            value,
            low_confidence,
        }
    }

    pub fn low_confidence(value: f64) -> Self {
        Self::new(value, true)
    }
}

/// Knobs of the metric suite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricParams {
    pub phi_bins: usize,
    pub changepoint: ChangepointParams,
}

impl Default for MetricParams {
    fn default() -> Self {
        Self {
            phi_bins: 8,
            changepoint: ChangepointParams::default(),
        }
    }
}

/// Everything the suite computes for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetrics {
    pub transfer_entropy_ab: MetricValue,
    pub transfer_entropy_ba: MetricValue,
    /// Bipartition Φ per step (lower bound, not canonical IIT Φ)
    pub phi: Vec<f64>,
    pub order_parameter: Vec<f64>,
    pub shared_space: Vec<f64>,
    /// Steps at which ψ changes regime
    pub changepoints: Vec<usize>,
    /// Mean |corr| of the two mirrors over steps where both mirrored
    pub recursive_influence: Option<f64>,
    pub low_confidence: bool,
}

/// Run the whole suite on one trajectory.
pub fn evaluate(trajectory: &Trajectory, params: &MetricParams) -> MirrorResult<RunMetrics> {
    let (transfer_entropy_ab, transfer_entropy_ba) = trajectory_transfer_entropy(trajectory)?;
    let phi = bipartition_phi_series(trajectory, params.phi_bins)?;
    let order_parameter = order_parameter_series(trajectory)?;
    let shared_space = shared_space_series(trajectory)?;
    let changepoints = detect_changepoints(&order_parameter, &params.changepoint);

    let influence = trajectory.recursive_influence();
    let recursive_influence = if influence.is_empty() {
        None
    } else {
        Some(influence.iter().sum::<f64>() / influence.len() as f64)
    };

    let low_confidence = trajectory.len() < MIN_RELIABLE_LENGTH
        || transfer_entropy_ab.low_confidence
        || transfer_entropy_ba.low_confidence;
    if low_confidence {
        tracing::debug!(seed = trajectory.seed(), steps = trajectory.len(), "metrics are low confidence");
    }

    Ok(RunMetrics {
        transfer_entropy_ab,
        transfer_entropy_ba,
        phi,
        order_parameter,
        shared_space,
        changepoints,
        recursive_influence,
        low_confidence,
    })
}
