//! Burst / plateau features of a single growth curve.
//!
//! Understanding typically rises fast early (burst) and then flattens
//! (plateau). Three numbers summarise that shape:
//! - burst rate: the steepest gradient inside the first `BURST_WINDOW` steps
//! - plateau onset: first step after the burst whose gradient drops below
//!   `PLATEAU_GRADIENT`
//! - plateau level: mean of the last `PLATEAU_TAIL` steps

use crate::stats::{gradient, mean, mean_abs_acceleration};
use serde::Serialize;

pub const BURST_WINDOW: usize = 30;
pub const PLATEAU_GRADIENT: f64 = 0.005;
pub const PLATEAU_TAIL: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GrowthFeatures {
    pub burst_rate: f64,
    /// Step at which the burst rate is reached
    pub burst_step: usize,
    pub plateau_onset: Option<usize>,
    pub plateau_level: f64,
    /// Mean |second difference| over the whole curve
    pub mean_abs_acceleration: f64,
}

pub fn growth_features(series: &[f64]) -> GrowthFeatures {
    let grad = gradient(series);
    let window = &grad[..grad.len().min(BURST_WINDOW)];

    let (burst_step, burst_rate) = window
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, g)| if g > best.1 { (i, g) } else { best });
    let burst_rate = if burst_rate.is_finite() { burst_rate } else { 0.0 };

    let plateau_onset = grad
        .iter()
        .enumerate()
        .skip(burst_step + 1)
        .find(|(_, g)| **g < PLATEAU_GRADIENT)
        .map(|(i, _)| i);

    let tail = &series[series.len().saturating_sub(PLATEAU_TAIL)..];

    GrowthFeatures {
        burst_rate,
        burst_step,
        plateau_onset,
        plateau_level: mean(tail),
        mean_abs_acceleration: mean_abs_acceleration(series),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturating_curve() {
        let y: Vec<f64> = (0..200).map(|t| 1.0 - (-(t as f64) / 10.0).exp()).collect();
        let f = growth_features(&y);
        assert_eq!(f.burst_step, 0);
        assert!(f.burst_rate > 0.09, "burst={}", f.burst_rate);
        let onset = f.plateau_onset.unwrap();
        assert!((29..=31).contains(&onset), "onset={onset}");
        assert!((f.plateau_level - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_late_burst_inside_window() {
        let y: Vec<f64> = (0..100)
            .map(|t| if t < 20 { 0.0 } else { (0.05 * (t - 20) as f64).min(0.6) })
            .collect();
        let f = growth_features(&y);
        assert!((f.burst_rate - 0.05).abs() < 1e-12);
        assert!(f.burst_step >= 20 && f.burst_step < 30);
        // the ramp saturates at t = 32
        assert_eq!(f.plateau_onset, Some(33));
    }

    #[test]
    fn test_flat_and_empty() {
        let f = growth_features(&[0.0; 50]);
        assert_eq!(f.burst_rate, 0.0);
        assert_eq!(f.plateau_onset, Some(1));
        assert_eq!(f.mean_abs_acceleration, 0.0);

        let f = growth_features(&[]);
        assert_eq!(f.burst_rate, 0.0);
        assert_eq!(f.plateau_onset, None);
        assert_eq!(f.plateau_level, 0.0);
    }
}
