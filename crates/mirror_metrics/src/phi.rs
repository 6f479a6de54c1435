//! Bipartition Φ
//!
//! A single-cut integration measure over the {A | B} bipartition:
//!
//! ```text
//! Φ = H(A, B) − max(H(A), H(B))
//! ```
//!
//! where the D paired components `(a_i, b_i)` of one step are treated as
//! samples, each side binned on its own equal-width grid. This is a lower
//! bound / approximation of canonical IIT Φ, NOT the canonical quantity:
//! only one partition is examined and there is no cause-effect repertoire.

use mirror_core::{MirrorError, MirrorResult, StateVector, Trajectory};

/// Equal-width bin of every component over the vector's own range.
fn equal_width_bins(v: &[f64], bins: usize) -> Vec<usize> {
    let lo = v.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = hi - lo;
    v.iter()
        .map(|x| {
            if width <= 0.0 {
                0
            } else {
                (((x - lo) / width * bins as f64) as usize).min(bins - 1)
            }
        })
        .collect()
}

/// Shannon entropy (nats) of a histogram.
fn entropy(counts: &[usize], total: usize) -> f64 {
    let n = total as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.ln()
        })
        .sum()
}

/// Φ of one step, in nats. Always ≥ 0.
pub fn bipartition_phi(a: &StateVector, b: &StateVector, bins: usize) -> MirrorResult<f64> {
    if a.dimension() != b.dimension() {
        return Err(MirrorError::DimensionMismatch {
            expected: a.dimension(),
            actual: b.dimension(),
        });
    }
    if bins < 2 {
        return Err(MirrorError::Config(format!("phi bins must be >= 2, got {bins}")));
    }
    let n = a.dimension();
    let qa = equal_width_bins(a.as_slice(), bins);
    let qb = equal_width_bins(b.as_slice(), bins);

    let mut ha = vec![0usize; bins];
    let mut hb = vec![0usize; bins];
    let mut hab = vec![0usize; bins * bins];
    for (&i, &j) in qa.iter().zip(&qb) {
        ha[i] += 1;
        hb[j] += 1;
        hab[i * bins + j] += 1;
    }

    let joint = entropy(&hab, n);
    let marginal = entropy(&ha, n).max(entropy(&hb, n));
    Ok((joint - marginal).max(0.0))
}

/// Φ at every step of a run.
pub fn bipartition_phi_series(trajectory: &Trajectory, bins: usize) -> MirrorResult<Vec<f64>> {
    trajectory
        .snapshots()
        .iter()
        .map(|s| bipartition_phi(&s.state_a, &s.state_b, bins))
        .collect()
}
