//! State Vector Algebra
//!
//! Fixed-dimension unit vectors and the three elementary operations the
//! mirroring dynamics are built from:
//! - `normalize(v) = v / ‖v‖`
//! - `dot(v, w)`
//! - `blend(v, w, α) = (1 − α)·v + α·w`
//!
//! Everything here is pure. A `StateVector` can only be obtained through
//! `normalize`, so its Euclidean norm is 1 wherever one exists.

use crate::error::{MirrorError, MirrorResult};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::Serialize;

/// Norms at or below this are treated as zero.
pub const NORM_EPSILON: f64 = 1e-12;

/// A unit-norm state vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StateVector(Vec<f64>);

impl StateVector {
    /// Draw a random direction: i.i.d. standard normal components, normalized.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, dimension: usize) -> MirrorResult<Self> {
        let raw: Vec<f64> = (0..dimension).map(|_| rng.sample(StandardNormal)).collect();
        normalize(&raw)
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn norm(&self) -> f64 {
        norm(&self.0)
    }

    /// True when every component is finite.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|x| x.is_finite())
    }

    pub fn dot(&self, other: &StateVector) -> MirrorResult<f64> {
        dot(&self.0, &other.0)
    }
}

impl AsRef<[f64]> for StateVector {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

/// Euclidean norm of a raw slice.
pub fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// `v / ‖v‖`. Fails with `DegenerateVector` when the norm is ~0 or not finite.
pub fn normalize(v: &[f64]) -> MirrorResult<StateVector> {
    let n = norm(v);
    if !n.is_finite() || n <= NORM_EPSILON {
        return Err(MirrorError::DegenerateVector { norm: n });
    }
    Ok(StateVector(v.iter().map(|x| x / n).collect()))
}

/// Inner product of two equal-length slices.
pub fn dot(v: &[f64], w: &[f64]) -> MirrorResult<f64> {
    check_dims(v, w)?;
    Ok(v.iter().zip(w).map(|(a, b)| a * b).sum())
}

/// Convex combination `(1 − α)·v + α·w`. The result is NOT normalized.
pub fn blend(v: &[f64], w: &[f64], alpha: f64) -> MirrorResult<Vec<f64>> {
    check_dims(v, w)?;
    Ok(v
        .iter()
        .zip(w)
        .map(|(a, b)| (1.0 - alpha) * a + alpha * b)
        .collect())
}

/// Pearson correlation of two equal-length samples. Zero when either side is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> MirrorResult<f64> {
    check_dims(x, y)?;
    let n = x.len();
    if n < 2 {
        return Ok(0.0);
    }
    let mx = x.iter().sum::<f64>() / n as f64;
    let my = y.iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (da, db) = (a - mx, b - my);
        sxy += da * db;
        sxx += da * da;
        syy += db * db;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return Ok(0.0);
    }
    Ok(sxy / (sxx * syy).sqrt())
}

fn check_dims(v: &[f64], w: &[f64]) -> MirrorResult<()> {
    if v.len() != w.len() {
        return Err(MirrorError::DimensionMismatch {
            expected: v.len(),
            actual: w.len(),
        });
    }
    Ok(())
}
