//! Phase-Transition Detector
//!
//! Offline changepoint detection with PELT (Killick et al. 2012) over a
//! piecewise-linear cost: each segment costs the squared residuals of its own
//! least-squares line, every extra segment costs a penalty
//!
//! ```text
//! β = scale · max(σ̂², 10⁻² · var(y), floor²) · ln n
//! ```
//!
//! σ̂ is a robust noise scale, `1.4826 · MAD(Δ²y) / √6`. Second differences
//! cancel any local trend, so a ramp is one segment and only a change of
//! level or slope opens a new one. The floors keep a noiseless curve from
//! being cut into pieces. Changepoints closer than the minimum separation are
//! then thinned, keeping the one whose removal costs more.

use serde::{Deserialize, Serialize};

/// Series with (population) variance below this have no changepoints.
const FLAT_VARIANCE: f64 = 1e-12;

/// Penalty floor as a fraction of the series variance.
const RELATIVE_NOISE_FLOOR: f64 = 1e-2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangepointParams {
    pub min_separation: usize,
    pub penalty_scale: f64,
    /// Shortest segment PELT may produce
    pub min_segment: usize,
    /// Smallest noise scale assumed, in units of the series
    pub noise_floor: f64,
}

impl Default for ChangepointParams {
    fn default() -> Self {
        Self {
            min_separation: 10,
            penalty_scale: 4.0,
            min_segment: 5,
            noise_floor: 0.02,
        }
    }
}

/// Prefix sums for O(1) linear-fit segment costs.
struct SegmentCost {
    sums: Vec<[f64; 5]>,
}

impl SegmentCost {
    fn new(y: &[f64]) -> Self {
        let mut sums = Vec::with_capacity(y.len() + 1);
        let mut acc = [0.0; 5];
        sums.push(acc);
        for (i, &v) in y.iter().enumerate() {
            let x = i as f64;
            acc[0] += x;
            acc[1] += x * x;
            acc[2] += v;
            acc[3] += v * v;
            acc[4] += x * v;
            sums.push(acc);
        }
        Self { sums }
    }

    /// Residual sum of squares of `y[a..b]` around its least-squares line.
    fn cost(&self, a: usize, b: usize) -> f64 {
        let m = (b - a) as f64;
        let d: [f64; 5] = std::array::from_fn(|k| self.sums[b][k] - self.sums[a][k]);
        let (mx, my) = (d[0] / m, d[2] / m);
        let sxx = d[1] - m * mx * mx;
        let syy = d[3] - m * my * my;
        let sxy = d[4] - m * mx * my;
        let explained = if sxx > 1e-12 { sxy * sxy / sxx } else { 0.0 };
        (syy - explained).max(0.0)
    }

    /// Cost added by merging the segments on either side of `cps[i]`.
    fn merge_cost(&self, cps: &[usize], i: usize, n: usize) -> f64 {
        let left = if i > 0 { cps[i - 1] } else { 0 };
        let right = cps.get(i + 1).copied().unwrap_or(n);
        self.cost(left, right) - self.cost(left, cps[i]) - self.cost(cps[i], right)
    }
}

/// PELT segmentation. Returns segment start indices (excluding 0), ascending.
pub fn pelt(y: &[f64], penalty: f64, min_segment: usize) -> Vec<usize> {
    let n = y.len();
    let min_segment = min_segment.max(1);
    if n < 2 * min_segment {
        return Vec::new();
    }
    let costs = SegmentCost::new(y);

    let mut best = vec![f64::INFINITY; n + 1];
    let mut last = vec![0usize; n + 1];
    best[0] = -penalty;
    let mut candidates: Vec<usize> = vec![0];

    for t in min_segment..=n {
        let mut f_t = f64::INFINITY;
        let mut arg = 0;
        for &s in &candidates {
            if t - s < min_segment {
                continue;
            }
            let c = best[s] + costs.cost(s, t) + penalty;
            if c < f_t {
                f_t = c;
                arg = s;
            }
        }
        best[t] = f_t;
        last[t] = arg;

        // Prune: s can never be optimal again once F(s) + C(s, t) > F(t)
        candidates.retain(|&s| t - s < min_segment || best[s] + costs.cost(s, t) <= f_t);
        candidates.push(t + 1 - min_segment);
    }

    let mut changepoints = Vec::new();
    let mut t = n;
    while t > 0 {
        let s = last[t];
        if s > 0 {
            changepoints.push(s);
        }
        t = s;
    }
    changepoints.reverse();
    changepoints
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    values[values.len() / 2]
}

/// Robust per-sample noise scale from second differences.
fn robust_noise_scale(y: &[f64]) -> f64 {
    let mut diffs: Vec<f64> = y.windows(3).map(|w| w[2] - 2.0 * w[1] + w[0]).collect();
    if diffs.is_empty() {
        return 0.0;
    }
    let m = median(&mut diffs);
    let mut deviations: Vec<f64> = diffs.iter().map(|d| (d - m).abs()).collect();
    1.4826 * median(&mut deviations) / 6f64.sqrt()
}

fn variance(y: &[f64]) -> f64 {
    let n = y.len() as f64;
    let mean = y.iter().sum::<f64>() / n;
    y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Penalty per extra segment for `y`.
pub fn penalty(y: &[f64], params: &ChangepointParams) -> f64 {
    let sigma = robust_noise_scale(y);
    let noise_var = (sigma * sigma)
        .max(RELATIVE_NOISE_FLOOR * variance(y))
        .max(params.noise_floor * params.noise_floor);
    params.penalty_scale * noise_var * (y.len() as f64).ln()
}

/// Changepoints of `y`: strictly increasing, at least `min_separation` apart.
pub fn detect_changepoints(y: &[f64], params: &ChangepointParams) -> Vec<usize> {
    let n = y.len();
    if n < 2 * params.min_segment.max(1) || y.iter().any(|v| !v.is_finite()) {
        return Vec::new();
    }
    if variance(y) < FLAT_VARIANCE {
        return Vec::new();
    }
    let raw = pelt(y, penalty(y, params), params.min_segment);
    enforce_separation(y, raw, params.min_separation)
}

/// Drop the weaker of any two changepoints closer than `min_separation`.
fn enforce_separation(y: &[f64], mut cps: Vec<usize>, min_separation: usize) -> Vec<usize> {
    let costs = SegmentCost::new(y);
    let n = y.len();
    while let Some(i) = cps.windows(2).position(|w| w[1] - w[0] < min_separation) {
        if costs.merge_cost(&cps, i, n) >= costs.merge_cost(&cps, i + 1, n) {
            cps.remove(i + 1);
        } else {
            cps.remove(i);
        }
    }
    cps
}
