//! Experiment orchestration.
//!
//! 1. validate the config and calibrate transfer entropy
//! 2. fan out `num_runs` seeded runs per condition on a bounded worker pool
//! 3. barrier: wait for every run
//! 4. aggregate per condition, then compare conditions
//!
//! Runs that fail on their own (divergence, budget, degenerate vector) are
//! excluded and listed in the summary; anything else aborts the experiment.

use crate::features::GrowthFeatures;
use crate::provenance::{compare_acceleration, fit_growth, GrowthSeries};
use crate::runner::{execute_run, ExcludedRun, RunResult};
use crate::stats::{bootstrap_ci, cohens_d, mean, standard_error};
use crate::summary::{
    ConditionComparison, ConditionSummary, EffectSize, ExperimentSummary, FeatureSummary,
    RunChangepoints, TimestepStats,
};
use mirror_core::{ExperimentConfig, MirrorError, MirrorResult, RunBudget, UpdateMode};
use mirror_metrics::{calibrate, complexity_match};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Run the configured experiment to completion.
pub async fn run_experiment(config: ExperimentConfig) -> MirrorResult<ExperimentSummary> {
    run_experiment_with_cancel(config, Arc::new(AtomicBool::new(false))).await
}

/// As `run_experiment`; setting `cancel` stops in-flight runs at their next step.
pub async fn run_experiment_with_cancel(
    config: ExperimentConfig,
    cancel: Arc<AtomicBool>,
) -> MirrorResult<ExperimentSummary> {
    config.validate()?;
    tracing::info!(
        "Starting experiment: {} runs x {} conditions, D={}, T={}, alpha={}, sigma={}",
        config.num_runs,
        config.conditions.len(),
        config.dimension,
        config.timesteps,
        config.convergence_rate,
        config.noise_std
    );

    let calibration = if config.calibration.enabled {
        let record = calibrate(&config.calibration)?;
        if record.passed {
            tracing::info!(
                "TE calibration passed: gaussian={:.4} binned={:.4} (error {:.4})",
                record.gaussian_te,
                record.binned_te,
                record.absolute_error
            );
        } else {
            tracing::warn!(
                "TE calibration failed: gaussian={:.4} binned={:.4}, error {:.4} > tolerance {:.4}",
                record.gaussian_te,
                record.binned_te,
                record.absolute_error,
                record.tolerance
            );
        }
        Some(record)
    } else {
        None
    };

    let config = Arc::new(config);
    let (completed, excluded) = execute_all(&config, &cancel).await?;
    tracing::info!(
        "All runs joined: {} completed, {} excluded",
        completed.len(),
        excluded.len()
    );

    let mut conditions = Vec::new();
    for &condition in &config.conditions {
        let runs: Vec<&RunResult> = completed.iter().filter(|r| r.condition() == condition).collect();
        if runs.is_empty() {
            tracing::warn!("No completed runs for condition {}, skipping aggregation", condition);
            continue;
        }
        conditions.push(summarize_condition(&config, condition, &runs)?);
    }

    let comparison = compare_conditions(&config, &completed)?;

    Ok(ExperimentSummary {
        generated_at: chrono::Utc::now(),
        config: (*config).clone(),
        calibration,
        complexity_match: complexity_match(config.agent_a.complexity, config.agent_b.complexity),
        conditions,
        comparison,
        excluded_runs: excluded,
    })
}

// ============================================================================
// Fan-out
// ============================================================================

fn run_budget(config: &ExperimentConfig, cancel: Arc<AtomicBool>) -> RunBudget {
    let budget = RunBudget::unlimited().with_cancel_flag(cancel);
    let deadline = config
        .max_wall_clock_secs
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .and_then(|d| Instant::now().checked_add(d));
    match deadline {
        Some(deadline) => budget.with_deadline(deadline),
        None => budget,
    }
}

async fn execute_all(
    config: &Arc<ExperimentConfig>,
    cancel: &Arc<AtomicBool>,
) -> MirrorResult<(Vec<RunResult>, Vec<ExcludedRun>)> {
    let semaphore = Arc::new(Semaphore::new(config.workers));
    let mut tasks = JoinSet::new();

    for &condition in &config.conditions {
        for seed in config.seeds() {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| MirrorError::Worker(e.to_string()))?;
            let config = Arc::clone(config);
            let cancel = Arc::clone(cancel);
            tasks.spawn_blocking(move || {
                let _permit = permit;
                // the wall-clock budget starts when the run does
                let budget = run_budget(&config, cancel);
                (condition, seed, execute_run(&config, condition, seed, &budget))
            });
        }
    }

    let mut completed = Vec::new();
    let mut excluded = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (condition, seed, outcome) = joined.map_err(|e| MirrorError::Worker(e.to_string()))?;
        match outcome {
            Ok(run) => completed.push(run),
            Err(e) if e.is_per_run() => {
                tracing::warn!("Excluding run {} seed={}: {}", condition, seed, e);
                excluded.push(ExcludedRun {
                    condition,
                    seed,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    completed.sort_by_key(|r| (r.condition(), r.seed()));
    excluded.sort_by_key(|r| (r.condition, r.seed));
    Ok((completed, excluded))
}

// ============================================================================
// Aggregation
// ============================================================================

fn timestep_stats(runs: &[&RunResult], config: &ExperimentConfig) -> TimestepStats {
    let series: Vec<Vec<f64>> = runs.iter().map(|r| r.series(config.fit_metric)).collect();
    let len = series.iter().map(Vec::len).min().unwrap_or(0);
    let mut means = Vec::with_capacity(len);
    let mut errors = Vec::with_capacity(len);
    for t in 0..len {
        let column: Vec<f64> = series.iter().map(|s| s[t]).collect();
        means.push(mean(&column));
        errors.push(standard_error(&column));
    }
    TimestepStats {
        mean: means,
        standard_error: errors,
    }
}

fn feature_summary(features: &[&GrowthFeatures]) -> FeatureSummary {
    let burst: Vec<f64> = features.iter().map(|f| f.burst_rate).collect();
    let onsets: Vec<f64> = features
        .iter()
        .filter_map(|f| f.plateau_onset.map(|o| o as f64))
        .collect();
    let levels: Vec<f64> = features.iter().map(|f| f.plateau_level).collect();
    let accel: Vec<f64> = features.iter().map(|f| f.mean_abs_acceleration).collect();
    FeatureSummary {
        burst_rate_mean: mean(&burst),
        burst_rate_se: standard_error(&burst),
        plateau_onset_mean: (!onsets.is_empty()).then(|| mean(&onsets)),
        runs_reaching_plateau: onsets.len(),
        plateau_level_mean: mean(&levels),
        mean_abs_acceleration: mean(&accel),
    }
}

fn summarize_condition(
    config: &ExperimentConfig,
    condition: UpdateMode,
    runs: &[&RunResult],
) -> MirrorResult<ConditionSummary> {
    let series = GrowthSeries::from_runs(runs, config.fit_metric)?;
    let fit = fit_growth(&series)?;
    tracing::info!(
        "{}: {} runs, R2 linear={:.4} quadratic={:.4} (improvement {:.4})",
        condition,
        runs.len(),
        fit.linear.r_squared,
        fit.quadratic.r_squared,
        fit.quadratic_improvement
    );

    let te_ab: Vec<f64> = runs.iter().map(|r| r.transfer_entropy_ab().value).collect();
    let te_ba: Vec<f64> = runs.iter().map(|r| r.transfer_entropy_ba().value).collect();
    let phi: Vec<f64> = runs.iter().map(|r| mean(r.phi_series())).collect();
    let influence: Vec<f64> = runs
        .iter()
        .filter_map(|r| r.metrics().recursive_influence)
        .collect();
    let features: Vec<&GrowthFeatures> = runs.iter().map(|r| r.features()).collect();

    Ok(ConditionSummary {
        condition,
        runs_completed: runs.len(),
        low_confidence_runs: runs.iter().filter(|r| r.low_confidence()).count(),
        fit_metric: config.fit_metric,
        timestep: timestep_stats(runs, config),
        fit,
        features: feature_summary(&features),
        transfer_entropy_ab_mean: mean(&te_ab),
        transfer_entropy_ba_mean: mean(&te_ba),
        bipartition_phi_lower_bound_mean: mean(&phi),
        recursive_influence_mean: (!influence.is_empty()).then(|| mean(&influence)),
        changepoints: runs
            .iter()
            .map(|r| RunChangepoints {
                seed: r.seed(),
                changepoints: r.changepoints().to_vec(),
            })
            .collect(),
    })
}

/// Effect sizes and acceleration test, Simultaneous vs Sequential.
fn compare_conditions(
    config: &ExperimentConfig,
    completed: &[RunResult],
) -> MirrorResult<Option<ConditionComparison>> {
    let sim: Vec<&RunResult> = completed
        .iter()
        .filter(|r| r.condition() == UpdateMode::Simultaneous)
        .collect();
    let seq: Vec<&RunResult> = completed
        .iter()
        .filter(|r| r.condition() == UpdateMode::Sequential)
        .collect();
    if sim.len() < 2 || seq.len() < 2 {
        return Ok(None);
    }

    let sim_series = GrowthSeries::from_runs(&sim, config.fit_metric)?;
    let seq_series = GrowthSeries::from_runs(&seq, config.fit_metric)?;
    let acceleration = compare_acceleration(&sim_series, &seq_series)?;
    let quadratic_improvement_delta =
        fit_growth(&sim_series)?.quadratic_improvement - fit_growth(&seq_series)?.quadratic_improvement;

    let per_run_improvement = |runs: &[&RunResult]| -> MirrorResult<Vec<f64>> {
        runs.iter()
            .map(|r| {
                fit_growth(&GrowthSeries::from_run(r, config.fit_metric))
                    .map(|f| f.quadratic_improvement)
            })
            .collect()
    };
    let measures: [(&str, Vec<f64>, Vec<f64>); 3] = [
        (
            "quadratic_improvement",
            per_run_improvement(&sim)?,
            per_run_improvement(&seq)?,
        ),
        (
            "mean_abs_acceleration",
            sim.iter().map(|r| r.features().mean_abs_acceleration).collect(),
            seq.iter().map(|r| r.features().mean_abs_acceleration).collect(),
        ),
        (
            "burst_rate",
            sim.iter().map(|r| r.features().burst_rate).collect(),
            seq.iter().map(|r| r.features().burst_rate).collect(),
        ),
    ];

    let mut effect_sizes = Vec::with_capacity(measures.len());
    for (stream, (name, a, b)) in measures.iter().enumerate() {
        let Some(d) = cohens_d(a, b) else { continue };
        let mut rng = ChaCha8Rng::seed_from_u64(config.base_seed);
        rng.set_stream(stream as u64);
        let ci = bootstrap_ci(
            a,
            b,
            cohens_d,
            config.bootstrap_resamples,
            config.confidence_level,
            &mut rng,
        );
        tracing::info!("Effect size {}: d={:.3} CI={:?}", name, d, ci);
        effect_sizes.push(EffectSize {
            measure: name.to_string(),
            cohens_d: d,
            ci_low: ci.map(|c| c.0),
            ci_high: ci.map(|c| c.1),
            confidence_level: config.confidence_level,
        });
    }

    Ok(Some(ConditionComparison {
        acceleration,
        quadratic_improvement_delta,
        effect_sizes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_core::CalibrationConfig;

    fn quick_config() -> ExperimentConfig {
        ExperimentConfig {
            dimension: 30,
            num_runs: 4,
            timesteps: 60,
            bootstrap_resamples: 100,
            workers: 2,
            calibration: CalibrationConfig {
                length: 1000,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_experiment_shapes() {
        let summary = run_experiment(quick_config()).await.unwrap();
        assert_eq!(summary.conditions.len(), 2);
        assert!(summary.excluded_runs.is_empty());
        for c in &summary.conditions {
            assert_eq!(c.runs_completed, 4);
            assert_eq!(c.timestep.mean.len(), 60);
            assert_eq!(c.timestep.standard_error.len(), 60);
            assert_eq!(c.changepoints.len(), 4);
        }
        let cmp = summary.comparison.as_ref().unwrap();
        assert_eq!(cmp.effect_sizes.len(), 3);
        assert!(summary.calibration.is_some());
        assert!((summary.complexity_match - 0.8).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_same_config_same_numbers() {
        let a = run_experiment(quick_config()).await.unwrap();
        let b = run_experiment(quick_config()).await.unwrap();
        assert_eq!(a.conditions, b.conditions);
        assert_eq!(a.comparison, b.comparison);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_running() {
        let config = ExperimentConfig {
            dimension: 0,
            ..quick_config()
        };
        assert!(matches!(run_experiment(config).await, Err(MirrorError::Config(_))));

        // too short to fit, rejected before any run is simulated
        let config = ExperimentConfig {
            timesteps: 2,
            ..quick_config()
        };
        match run_experiment(config).await {
            Err(MirrorError::Config(msg)) => assert!(msg.contains("timesteps"), "{msg}"),
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_runs_are_excluded() {
        let cancel = Arc::new(AtomicBool::new(true));
        let summary = run_experiment_with_cancel(quick_config(), cancel).await.unwrap();
        assert!(summary.conditions.is_empty());
        assert!(summary.comparison.is_none());
        assert_eq!(summary.excluded_runs.len(), 8);
        assert!(summary.excluded_runs[0].reason.contains("budget"));
    }

    #[tokio::test]
    async fn test_single_condition_has_no_comparison() {
        let config = ExperimentConfig {
            conditions: vec![UpdateMode::Sequential],
            ..quick_config()
        };
        let summary = run_experiment(config).await.unwrap();
        assert_eq!(summary.conditions.len(), 1);
        assert!(summary.comparison.is_none());
    }
}
