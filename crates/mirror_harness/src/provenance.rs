//! Growth series with provenance, and the fits that require it.
//!
//! Every statistical claim the harness makes is a fit on a `GrowthSeries`.
//! A series remembers where its numbers came from:
//! - `Runs`: averaged from `RunResult`s of one condition, one seed each
//! - `External`: anything else (hand-written, synthetic, loaded from disk)
//!
//! Fitting an `External` series is refused with `ValidationIntegrity`, so a
//! quadratic curve typed in by hand can never be reported as a finding.

use crate::runner::RunResult;
use crate::stats::{gradient, mean, mean_abs_acceleration, polyfit, welch_t_test, PolyFit, TTest};
use mirror_core::{FitMetric, MirrorError, MirrorResult, UpdateMode};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    Runs { condition: UpdateMode, seeds: Vec<u64> },
    External { label: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthSeries {
    values: Vec<f64>,
    provenance: Provenance,
}

impl GrowthSeries {
    /// Per-step mean of `metric` across runs of one condition.
    pub fn from_runs(runs: &[&RunResult], metric: FitMetric) -> MirrorResult<Self> {
        let first = runs.first().ok_or_else(|| {
            MirrorError::ValidationIntegrity("growth series needs at least one run".into())
        })?;
        let condition = first.condition();
        let mut seeds = BTreeSet::new();
        for run in runs {
            if run.condition() != condition {
                return Err(MirrorError::ValidationIntegrity(format!(
                    "series mixes conditions {} and {}",
                    condition,
                    run.condition()
                )));
            }
            if !seeds.insert(run.seed()) {
                return Err(MirrorError::ValidationIntegrity(format!(
                    "seed {} appears twice; runs must be independent",
                    run.seed()
                )));
            }
        }

        let series: Vec<Vec<f64>> = runs.iter().map(|r| r.series(metric)).collect();
        let len = series[0].len();
        if series.iter().any(|s| s.len() != len) {
            return Err(MirrorError::ValidationIntegrity(
                "runs of different length cannot be averaged".into(),
            ));
        }
        let values = (0..len)
            .map(|t| series.iter().map(|s| s[t]).sum::<f64>() / series.len() as f64)
            .collect();

        Ok(Self {
            values,
            provenance: Provenance::Runs {
                condition,
                seeds: seeds.into_iter().collect(),
            },
        })
    }

    /// The `metric` series of a single run.
    pub fn from_run(run: &RunResult, metric: FitMetric) -> Self {
        Self {
            values: run.series(metric),
            provenance: Provenance::Runs {
                condition: run.condition(),
                seeds: vec![run.seed()],
            },
        }
    }

    /// Numbers that did not come from model runs. They can be inspected but never fitted.
    pub fn external(label: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            values,
            provenance: Provenance::External {
                label: label.into(),
            },
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Condition of a run-derived series.
    pub fn condition(&self) -> Option<UpdateMode> {
        match &self.provenance {
            Provenance::Runs { condition, .. } => Some(*condition),
            Provenance::External { .. } => None,
        }
    }

    fn verify(&self) -> MirrorResult<()> {
        match &self.provenance {
            Provenance::Runs { .. } => Ok(()),
            Provenance::External { label } => Err(MirrorError::ValidationIntegrity(format!(
                "refusing to fit '{label}': values were not produced by model runs"
            ))),
        }
    }
}

// ============================================================================
// Fits
// ============================================================================

/// Linear vs quadratic description of a growth curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthFit {
    pub linear: PolyFit,
    pub quadratic: PolyFit,
    /// `R²(quadratic) − R²(linear)`
    pub quadratic_improvement: f64,
}

pub fn fit_growth(series: &GrowthSeries) -> MirrorResult<GrowthFit> {
    series.verify()?;
    if series.len() < 3 {
        return Err(MirrorError::InsufficientTrajectoryLength {
            required: 3,
            actual: series.len(),
        });
    }
    let linear = polyfit(series.values(), 1)?;
    let quadratic = polyfit(series.values(), 2)?;
    let quadratic_improvement = quadratic.r_squared - linear.r_squared;
    Ok(GrowthFit {
        linear,
        quadratic,
        quadratic_improvement,
    })
}

/// Gradient comparison of two conditions' mean curves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccelerationComparison {
    pub first: UpdateMode,
    pub second: UpdateMode,
    /// Welch test on the two gradient series
    pub gradient_test: TTest,
    pub mean_gradient_first: f64,
    pub mean_gradient_second: f64,
    pub mean_abs_acceleration_first: f64,
    pub mean_abs_acceleration_second: f64,
    /// first / second; absent when the second curve has no curvature
    pub acceleration_ratio: Option<f64>,
}

pub fn compare_acceleration(
    first: &GrowthSeries,
    second: &GrowthSeries,
) -> MirrorResult<AccelerationComparison> {
    first.verify()?;
    second.verify()?;
    let (Some(c1), Some(c2)) = (first.condition(), second.condition()) else {
        return Err(MirrorError::ValidationIntegrity(
            "acceleration comparison needs run-derived series".into(),
        ));
    };
    if c1 == c2 {
        return Err(MirrorError::ValidationIntegrity(format!(
            "acceleration comparison needs two different conditions, got {c1} twice"
        )));
    }

    let g1 = gradient(first.values());
    let g2 = gradient(second.values());
    let gradient_test = welch_t_test(&g1, &g2)?;
    let a1 = mean_abs_acceleration(first.values());
    let a2 = mean_abs_acceleration(second.values());

    Ok(AccelerationComparison {
        first: c1,
        second: c2,
        gradient_test,
        mean_gradient_first: mean(&g1),
        mean_gradient_second: mean(&g2),
        mean_abs_acceleration_first: a1,
        mean_abs_acceleration_second: a2,
        acceleration_ratio: (a2 > 0.0).then(|| a1 / a2),
    })
}
