//! Rendering results as JSON or a plain-text table.

use anyhow::{Context, Result};
use clap::ValueEnum;
use mirror_harness::{ExperimentSummary, SweepReport};
use mirror_metrics::CalibrationRecord;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}

/// Render `value` and write it to `path`, or stdout when `path` is `None`.
pub fn emit<T: Serialize>(
    value: &T,
    format: OutputFormat,
    path: Option<&Path>,
    table: fn(&T) -> String,
) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(value).context("Failed to serialize result")?
        }
        OutputFormat::Table => table(value),
    };
    match path {
        Some(path) => {
            std::fs::write(path, rendered + "\n")
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Wrote result to {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

fn opt(v: Option<f64>, precision: usize) -> String {
    match v {
        Some(v) => format!("{v:.precision$}"),
        None => "-".to_string(),
    }
}

pub fn summary_table(summary: &ExperimentSummary) -> String {
    let mut out = String::new();
    let c = &summary.config;
    let _ = writeln!(
        out,
        "D={} runs={} T={} alpha={} sigma={} depletion={} seed={}",
        c.dimension,
        c.num_runs,
        c.timesteps,
        c.convergence_rate,
        c.noise_std,
        c.energy_depletion_rate,
        c.base_seed
    );
    if let Some(cal) = &summary.calibration {
        let _ = writeln!(
            out,
            "TE calibration: {} (gaussian {:.4}, binned {:.4}, error {:.4})",
            if cal.passed { "passed" } else { "FAILED" },
            cal.gaussian_te,
            cal.binned_te,
            cal.absolute_error
        );
    }
    let _ = writeln!(
        out,
        "\n{:<13} {:>5} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>7} {:>9}",
        "condition", "runs", "R2 lin", "R2 quad", "improve", "burst", "plateau", "TE a>b", "TE b>a", "phi>=", "cp/run", "cp 30-50"
    );
    for s in &summary.conditions {
        let _ = writeln!(
            out,
            "{:<13} {:>5} {:>8.4} {:>8.4} {:>8.4} {:>8.4} {:>8} {:>8.4} {:>8.4} {:>8.4} {:>7.2} {:>9}",
            s.condition.as_str(),
            s.runs_completed,
            s.fit.linear.r_squared,
            s.fit.quadratic.r_squared,
            s.fit.quadratic_improvement,
            s.features.burst_rate_mean,
            opt(s.features.plateau_onset_mean, 1),
            s.transfer_entropy_ab_mean,
            s.transfer_entropy_ba_mean,
            s.bipartition_phi_lower_bound_mean,
            s.changepoints_per_run(),
            format!("{}/{}", s.runs_with_changepoint_in(30, 50), s.runs_completed)
        );
    }

    if let Some(cmp) = &summary.comparison {
        let acc = &cmp.acceleration;
        let _ = writeln!(
            out,
            "\n{} vs {}: gradient t={:.3} df={:.1} p={:.4}, |accel| ratio {}",
            acc.first,
            acc.second,
            acc.gradient_test.t,
            acc.gradient_test.df,
            acc.gradient_test.p_value,
            opt(acc.acceleration_ratio, 3)
        );
        for e in &cmp.effect_sizes {
            let _ = writeln!(
                out,
                "  {:<22} d={:>7.3}  {:.0}% CI [{}, {}]",
                e.measure,
                e.cohens_d,
                e.confidence_level * 100.0,
                opt(e.ci_low, 3),
                opt(e.ci_high, 3)
            );
        }
    }

    for x in &summary.excluded_runs {
        let _ = writeln!(out, "excluded: {} seed={} ({})", x.condition, x.seed, x.reason);
    }
    out
}

pub fn sweep_table(report: &SweepReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>10} {:<13} {:>5} {:>5} {:>8} {:>8} {:>8} {:>8} {:>8}",
        report.parameter.as_str(),
        "condition",
        "runs",
        "excl",
        "improve",
        "burst",
        "plateau",
        "level",
        "final"
    );
    for p in &report.points {
        let _ = writeln!(
            out,
            "{:>10} {:<13} {:>5} {:>5} {:>8.4} {:>8.4} {:>8} {:>8.4} {:>8.4}",
            p.value,
            p.condition.as_str(),
            p.runs_completed,
            p.runs_excluded,
            p.quadratic_improvement,
            p.burst_rate_mean,
            opt(p.plateau_onset_mean, 1),
            p.plateau_level_mean,
            p.final_mean
        );
    }
    out
}

pub fn calibration_table(record: &CalibrationRecord) -> String {
    format!(
        "coupling={} length={} bins={}\n\
         analytic  {:.4}\n\
         gaussian  {:.4}\n\
         binned    {:.4}\n\
         error     {:.4} (tolerance {:.4}): {}",
        record.coupling,
        record.length,
        record.bins,
        record.analytic_te,
        record.gaussian_te,
        record.binned_te,
        record.absolute_error,
        record.tolerance,
        if record.passed { "passed" } else { "FAILED" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_core::CalibrationConfig;
    use mirror_metrics::calibrate;

    #[test]
    fn test_calibration_table_mentions_verdict() {
        let record = calibrate(&CalibrationConfig {
            length: 2000,
            ..Default::default()
        })
        .unwrap();
        let table = calibration_table(&record);
        assert!(table.contains("gaussian"));
        assert!(table.contains(if record.passed { "passed" } else { "FAILED" }));
    }

    #[test]
    fn test_opt_renders_missing_as_dash() {
        assert_eq!(opt(None, 2), "-");
        assert_eq!(opt(Some(1.23456), 2), "1.23");
    }
}
