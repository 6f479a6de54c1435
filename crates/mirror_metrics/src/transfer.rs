//! Transfer Entropy
//!
//! `correlation_transfer_entropy` is the Gaussian approximation
//!
//! ```text
//! TE(X→Y) = −½ ln(1 − ρ²),   ρ = pcorr(x_t, y_{t+1} | y_t)
//! ```
//!
//! which is exact for jointly Gaussian linear processes and only an
//! approximation otherwise. State trajectories are reduced to scalars by
//! projecting onto the initial separation axis `normalize(A₀ − B₀)` and then
//! first-differenced, so the estimate sees step-to-step motion rather than
//! the slow drift shared by both agents.
//!
//! `binned_transfer_entropy` is the plug-in estimate on quantile bins. It is
//! used to calibrate the approximation on a toy coupled AR(1) pair.

use crate::{MetricValue, MIN_RELIABLE_LENGTH};
use mirror_core::vector::{dot, normalize, pearson};
use mirror_core::{CalibrationConfig, MirrorResult, StateVector, Trajectory};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::Serialize;

/// Below this many steps TE is reported as 0.
pub const MIN_TE_LENGTH: usize = 5;

/// |ρ| is clamped here so that the log stays finite.
const MAX_PARTIAL_CORRELATION: f64 = 1.0 - 1e-9;

// ============================================================================
// Gaussian approximation
// ============================================================================

/// Gaussian TE from `x` to `y` on two equal-length scalar series, in nats.
pub fn gaussian_transfer_entropy(x: &[f64], y: &[f64]) -> MirrorResult<f64> {
    let n = x.len().min(y.len());
    if n < 3 {
        return Ok(0.0);
    }
    let x_past = &x[..n - 1];
    let y_past = &y[..n - 1];
    let y_next = &y[1..n];

    let r_xf = pearson(x_past, y_next)?;
    let r_xy = pearson(x_past, y_past)?;
    let r_yf = pearson(y_next, y_past)?;

    let denom = ((1.0 - r_xy * r_xy) * (1.0 - r_yf * r_yf)).max(1e-12).sqrt();
    let rho = ((r_xf - r_xy * r_yf) / denom)
        .clamp(-MAX_PARTIAL_CORRELATION, MAX_PARTIAL_CORRELATION);
    Ok(0.5 * (1.0 / (1.0 - rho * rho)).ln())
}

/// Project both agents' states (initial state first) onto the initial
/// separation axis. Falls back to A₀ when A₀ = B₀.
pub fn separation_projections(trajectory: &Trajectory) -> MirrorResult<(Vec<f64>, Vec<f64>)> {
    let (a0, b0) = trajectory.initial_states();
    let diff: Vec<f64> = a0
        .as_slice()
        .iter()
        .zip(b0.as_slice())
        .map(|(a, b)| a - b)
        .collect();
    let axis = match normalize(&diff) {
        Ok(axis) => axis,
        Err(_) => a0.clone(),
    };

    let xs = project(std::iter::once(a0).chain(trajectory.states_a()), &axis)?;
    let ys = project(std::iter::once(b0).chain(trajectory.states_b()), &axis)?;
    Ok((xs, ys))
}

fn project<'a>(
    states: impl Iterator<Item = &'a StateVector>,
    axis: &StateVector,
) -> MirrorResult<Vec<f64>> {
    states
        .map(|s| dot(s.as_slice(), axis.as_slice()))
        .collect()
}

fn first_difference(v: &[f64]) -> Vec<f64> {
    v.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Correlation transfer entropy of a raw scalar pair, after differencing.
///
/// `x`/`y` hold T+1 samples for a T-step run. Fewer than `MIN_TE_LENGTH`
/// steps give 0; fewer than `MIN_RELIABLE_LENGTH` are flagged low confidence.
pub fn correlation_transfer_entropy(x: &[f64], y: &[f64]) -> MirrorResult<MetricValue> {
    let steps = x.len().min(y.len()).saturating_sub(1);
    if steps < MIN_TE_LENGTH {
        return Ok(MetricValue::low_confidence(0.0));
    }
    let te = gaussian_transfer_entropy(&first_difference(x), &first_difference(y))?;
    Ok(MetricValue::new(te, steps < MIN_RELIABLE_LENGTH))
}

/// `(TE(A→B), TE(B→A))` for one run.
pub fn trajectory_transfer_entropy(
    trajectory: &Trajectory,
) -> MirrorResult<(MetricValue, MetricValue)> {
    let (xa, xb) = separation_projections(trajectory)?;
    Ok((
        correlation_transfer_entropy(&xa, &xb)?,
        correlation_transfer_entropy(&xb, &xa)?,
    ))
}

// ============================================================================
// Discretized estimate & calibration
// ============================================================================

/// Quantile bin index of every sample (equal-count bins).
fn quantile_bins(v: &[f64], bins: usize) -> Vec<usize> {
    let mut sorted = v.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let edges: Vec<f64> = (1..bins).map(|k| sorted[n * k / bins]).collect();
    v.iter()
        .map(|x| edges.partition_point(|e| e <= x))
        .collect()
}

/// Plug-in TE from `x` to `y` on `bins` quantile bins per variable, in nats.
pub fn binned_transfer_entropy(x: &[f64], y: &[f64], bins: usize) -> f64 {
    let n = x.len().min(y.len());
    if n < 3 || bins < 2 {
        return 0.0;
    }
    let qx = quantile_bins(&x[..n], bins);
    let qy = quantile_bins(&y[..n], bins);
    let samples = n - 1;

    let b = bins;
    let mut c_fyx = vec![0usize; b * b * b];
    let mut c_fy = vec![0usize; b * b];
    let mut c_yx = vec![0usize; b * b];
    let mut c_y = vec![0usize; b];
    for t in 0..samples {
        let (f, y0, x0) = (qy[t + 1], qy[t], qx[t]);
        c_fyx[(f * b + y0) * b + x0] += 1;
        c_fy[f * b + y0] += 1;
        c_yx[y0 * b + x0] += 1;
        c_y[y0] += 1;
    }

    let mut te = 0.0;
    for f in 0..b {
        for y0 in 0..b {
            for x0 in 0..b {
                let c = c_fyx[(f * b + y0) * b + x0];
                if c == 0 {
                    continue;
                }
                let num = (c * c_y[y0]) as f64;
                let den = (c_fy[f * b + y0] * c_yx[y0 * b + x0]) as f64;
                te += c as f64 / samples as f64 * (num / den).ln();
            }
        }
    }
    te
}

/// `x' = 0.5x + e`, `y' = 0.5y + c·x + e'` with unit Gaussian innovations.
pub fn coupled_ar_pair(length: usize, coupling: f64, seed: u64) -> (Vec<f64>, Vec<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut xs = Vec::with_capacity(length + 1);
    let mut ys = Vec::with_capacity(length + 1);
    let (mut x, mut y) = (0.0f64, 0.0f64);
    xs.push(x);
    ys.push(y);
    for _ in 0..length {
        let ex: f64 = rng.sample(StandardNormal);
        let ey: f64 = rng.sample(StandardNormal);
        let next_y = 0.5 * y + coupling * x + ey;
        x = 0.5 * x + ex;
        y = next_y;
        xs.push(x);
        ys.push(y);
    }
    (xs, ys)
}

/// Outcome of checking the Gaussian approximation against the binned estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationRecord {
    pub bins: usize,
    pub length: usize,
    pub coupling: f64,
    pub gaussian_te: f64,
    pub binned_te: f64,
    /// Closed form for the toy pair: `½ ln(1 + c² / (1 − 0.25))`
    pub analytic_te: f64,
    pub absolute_error: f64,
    pub tolerance: f64,
    pub passed: bool,
}

pub fn calibrate(config: &CalibrationConfig) -> MirrorResult<CalibrationRecord> {
    let (xs, ys) = coupled_ar_pair(config.length, config.coupling, config.seed);
    let gaussian_te = gaussian_transfer_entropy(&xs, &ys)?;
    let binned_te = binned_transfer_entropy(&xs, &ys, config.bins);
    let absolute_error = (gaussian_te - binned_te).abs();
    let stationary_var_x = 1.0 / (1.0 - 0.25);
    Ok(CalibrationRecord {
        bins: config.bins,
        length: config.length,
        coupling: config.coupling,
        gaussian_te,
        binned_te,
        analytic_te: 0.5 * (1.0 + config.coupling.powi(2) * stationary_var_x).ln(),
        absolute_error,
        tolerance: config.tolerance,
        passed: absolute_error <= config.tolerance,
    })
}
