//! Statistics used by the harness.
//!
//! Everything works on plain slices so it can be tested in isolation; the
//! integrity rules (who may fit what) live in `provenance`.

use mirror_core::{MirrorError, MirrorResult};
use rand::Rng;
use serde::Serialize;

// ============================================================================
// Descriptive
// ============================================================================

pub fn mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f64>() / v.len() as f64
}

/// Sample standard deviation (n − 1 denominator). Zero for fewer than 2 values.
pub fn sample_sd(v: &[f64]) -> f64 {
    if v.len() < 2 {
        return 0.0;
    }
    let m = mean(v);
    let ss: f64 = v.iter().map(|x| (x - m).powi(2)).sum();
    (ss / (v.len() - 1) as f64).sqrt()
}

/// `sd / √n`.
pub fn standard_error(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    sample_sd(v) / (v.len() as f64).sqrt()
}

/// Linear-interpolated quantile of an ascending slice, `q` in [0, 1].
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

// ============================================================================
// Derivatives
// ============================================================================

/// Discrete gradient: central differences inside, one-sided at the ends.
pub fn gradient(y: &[f64]) -> Vec<f64> {
    let n = y.len();
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..n)
            .map(|i| {
                if i == 0 {
                    y[1] - y[0]
                } else if i == n - 1 {
                    y[n - 1] - y[n - 2]
                } else {
                    (y[i + 1] - y[i - 1]) / 2.0
                }
            })
            .collect(),
    }
}

/// `y[i+1] − 2y[i] + y[i−1]` for every interior point.
pub fn second_difference(y: &[f64]) -> Vec<f64> {
    y.windows(3).map(|w| w[2] - 2.0 * w[1] + w[0]).collect()
}

/// Mean |second difference|; 0 for series shorter than 3.
pub fn mean_abs_acceleration(y: &[f64]) -> f64 {
    let acc: Vec<f64> = second_difference(y).iter().map(|a| a.abs()).collect();
    mean(&acc)
}

// ============================================================================
// Polynomial least squares
// ============================================================================

/// Least-squares polynomial in the step index `x = 0, 1, …, n−1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolyFit {
    pub degree: usize,
    /// Ascending powers: `y ≈ Σ c_k x^k`
    pub coefficients: Vec<f64>,
    pub r_squared: f64,
}

impl PolyFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * x + c)
    }
}

/// Solve `A·c = r` in place by Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut r: Vec<f64>) -> Option<Vec<f64>> {
    let m = r.len();
    for i in 0..m {
        let pivot = (i..m).max_by(|&p, &q| a[p][i].abs().total_cmp(&a[q][i].abs()))?;
        if a[pivot][i].abs() < 1e-300 {
            return None;
        }
        a.swap(i, pivot);
        r.swap(i, pivot);
        let pivot_row = a[i].clone();
        let pivot_r = r[i];
        for k in i + 1..m {
            let f = a[k][i] / pivot_row[i];
            for j in i..m {
                a[k][j] -= f * pivot_row[j];
            }
            r[k] -= f * pivot_r;
        }
    }
    let mut c = vec![0.0; m];
    for i in (0..m).rev() {
        let tail: f64 = (i + 1..m).map(|j| a[i][j] * c[j]).sum();
        c[i] = (r[i] - tail) / a[i][i];
    }
    Some(c)
}

/// Fit a degree-`degree` polynomial with R².
///
/// x is rescaled to [0, 1] for the normal equations and the coefficients are
/// mapped back to step units. A constant series has R² = 0.
pub fn polyfit(y: &[f64], degree: usize) -> MirrorResult<PolyFit> {
    let n = y.len();
    let m = degree + 1;
    if n < m {
        return Err(MirrorError::InsufficientTrajectoryLength {
            required: m,
            actual: n,
        });
    }
    let scale = if n > 1 { (n - 1) as f64 } else { 1.0 };
    let xs: Vec<f64> = (0..n).map(|i| i as f64 / scale).collect();

    let mut ata = vec![vec![0.0; m]; m];
    let mut aty = vec![0.0; m];
    for (x, yv) in xs.iter().zip(y) {
        let powers: Vec<f64> = (0..m).map(|k| x.powi(k as i32)).collect();
        for i in 0..m {
            aty[i] += powers[i] * yv;
            for j in 0..m {
                ata[i][j] += powers[i] * powers[j];
            }
        }
    }
    let scaled = solve(ata, aty).ok_or(MirrorError::InsufficientTrajectoryLength {
        required: m,
        actual: n,
    })?;
    let coefficients: Vec<f64> = scaled
        .iter()
        .enumerate()
        .map(|(k, c)| c / scale.powi(k as i32))
        .collect();

    let fit = PolyFit {
        degree,
        coefficients,
        r_squared: 0.0,
    };
    let mu = mean(y);
    let sst: f64 = y.iter().map(|v| (v - mu).powi(2)).sum();
    let sse: f64 = y
        .iter()
        .enumerate()
        .map(|(i, v)| (v - fit.predict(i as f64)).powi(2))
        .sum();
    let r_squared = if sst > 0.0 { 1.0 - sse / sst } else { 0.0 };
    Ok(PolyFit { r_squared, ..fit })
}

// ============================================================================
// Hypothesis testing
// ============================================================================

/// Welch two-sample t-test result. `p_value` is two-sided.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TTest {
    pub t: f64,
    pub df: f64,
    pub p_value: f64,
}

/// Welch's unequal-variance t-test of `mean(a) − mean(b)`.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> MirrorResult<TTest> {
    for sample in [a, b] {
        if sample.len() < 2 {
            return Err(MirrorError::InsufficientTrajectoryLength {
                required: 2,
                actual: sample.len(),
            });
        }
    }
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let (va, vb) = (sample_sd(a).powi(2) / na, sample_sd(b).powi(2) / nb);
    let diff = mean(a) - mean(b);
    let se2 = va + vb;

    if se2 <= 0.0 {
        let df = na + nb - 2.0;
        return Ok(if diff == 0.0 {
            TTest { t: 0.0, df, p_value: 1.0 }
        } else {
            TTest {
                t: diff.signum() * f64::INFINITY,
                df,
                p_value: 0.0,
            }
        });
    }

    let t = diff / se2.sqrt();
    let df = se2.powi(2) / (va.powi(2) / (na - 1.0) + vb.powi(2) / (nb - 1.0));
    Ok(TTest {
        t,
        df,
        p_value: student_t_two_sided_p(t, df),
    })
}

/// Two-sided tail probability of Student's t: `I_{df/(df+t²)}(df/2, ½)`.
pub fn student_t_two_sided_p(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    regularized_incomplete_beta(df / 2.0, 0.5, df / (df + t * t)).clamp(0.0, 1.0)
}

const LANCZOS_G: f64 = 7.0;
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// ln Γ(x) (Lanczos approximation).
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin().abs()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut a = LANCZOS[0];
    for (i, c) in LANCZOS.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    let t = x + LANCZOS_G + 0.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

/// Continued fraction for the incomplete beta (modified Lentz).
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 3e-14;
    const TINY: f64 = 1e-300;
    let guard = |v: f64| if v.abs() < TINY { TINY } else { v };

    let (qab, qap, qam) = (a + b, a + 1.0, a - 1.0);
    let mut c = 1.0;
    let mut d = 1.0 / guard(1.0 - qab * x / qap);
    let mut h = d;
    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        h *= d * c;
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Regularized incomplete beta function `I_x(a, b)`.
pub fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let front = (ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln()).exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

// ============================================================================
// Effect sizes
// ============================================================================

/// Cohen's d with pooled SD. `None` when either group has fewer than 2 values;
/// 0 when the pooled SD is 0.
pub fn cohens_d(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() < 2 || b.len() < 2 {
        return None;
    }
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let pooled_var =
        ((na - 1.0) * sample_sd(a).powi(2) + (nb - 1.0) * sample_sd(b).powi(2)) / (na + nb - 2.0);
    if pooled_var <= 0.0 {
        return Some(0.0);
    }
    Some((mean(a) - mean(b)) / pooled_var.sqrt())
}

/// Percentile bootstrap CI of a two-sample statistic.
///
/// Each resample draws both groups with replacement at their own sizes.
/// Resamples where the statistic is undefined are skipped.
pub fn bootstrap_ci<R, F>(
    a: &[f64],
    b: &[f64],
    statistic: F,
    resamples: usize,
    confidence: f64,
    rng: &mut R,
) -> Option<(f64, f64)>
where
    R: Rng + ?Sized,
    F: Fn(&[f64], &[f64]) -> Option<f64>,
{
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let mut draws = Vec::with_capacity(resamples);
    let mut ra = vec![0.0; a.len()];
    let mut rb = vec![0.0; b.len()];
    for _ in 0..resamples {
        for slot in ra.iter_mut() {
            *slot = a[rng.gen_range(0..a.len())];
        }
        for slot in rb.iter_mut() {
            *slot = b[rng.gen_range(0..b.len())];
        }
        if let Some(v) = statistic(&ra, &rb).filter(|v| v.is_finite()) {
            draws.push(v);
        }
    }
    if draws.is_empty() {
        return None;
    }
    draws.sort_by(f64::total_cmp);
    let tail = (1.0 - confidence) / 2.0;
    Some((quantile(&draws, tail), quantile(&draws, 1.0 - tail)))
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn arb_sample() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(-10.0f64..10.0, 2..40)
    }

    fn arb_series() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(0.0f64..1.0, 3..200)
    }

    proptest! {
        #[test]
        fn r_squared_is_bounded_and_nested(y in arb_series()) {
            let linear = polyfit(&y, 1).unwrap();
            let quadratic = polyfit(&y, 2).unwrap();
            prop_assert!(linear.r_squared >= -1e-9 && linear.r_squared <= 1.0 + 1e-9);
            prop_assert!(quadratic.r_squared <= 1.0 + 1e-9);
            // a quadratic can always reproduce the best line
            prop_assert!(quadratic.r_squared + 1e-7 >= linear.r_squared);
        }

        #[test]
        fn quantile_stays_within_range(mut v in arb_sample(), q in 0.0f64..1.0) {
            v.sort_by(f64::total_cmp);
            let x = quantile(&v, q);
            prop_assert!(x >= v[0] && x <= v[v.len() - 1]);
        }

        #[test]
        fn gradient_keeps_length(y in arb_series()) {
            prop_assert_eq!(gradient(&y).len(), y.len());
        }

        #[test]
        fn cohens_d_is_antisymmetric(a in arb_sample(), b in arb_sample()) {
            let ab = cohens_d(&a, &b).unwrap();
            let ba = cohens_d(&b, &a).unwrap();
            prop_assert!((ab + ba).abs() < 1e-9);
        }

        #[test]
        fn p_value_is_a_probability(t in -50.0f64..50.0, df in 1.0f64..200.0) {
            let p = student_t_two_sided_p(t, df);
            prop_assert!((0.0..=1.0).contains(&p));
        }

        #[test]
        fn bootstrap_interval_is_ordered(a in arb_sample(), b in arb_sample(), seed in any::<u64>()) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            if let Some((lo, hi)) = bootstrap_ci(&a, &b, cohens_d, 200, 0.95, &mut rng) {
                prop_assert!(lo <= hi);
            }
        }
    }
}
