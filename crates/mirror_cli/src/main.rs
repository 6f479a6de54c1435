//! `mirror`: run reciprocal mirroring experiments from the command line.
//!
//! - `mirror run`: N seeded runs per condition, fits, effect sizes
//! - `mirror sweep`: the same experiment across values of one dynamics knob
//! - `mirror calibrate`: transfer entropy estimator check on a coupled AR pair
//!
//! Results go to stdout (or `--output`) as JSON or a plain table; logs go to
//! stderr so the JSON stays machine-readable.

mod report;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use mirror_core::{ExperimentConfig, FitMetric, UpdateMode};
use mirror_harness::{run_experiment_with_cancel, run_sweep, SweepParameter};
use mirror_metrics::calibrate;
use report::OutputFormat;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mirror", author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv); RUST_LOG applies when absent
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "MIRROR_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the Simultaneous vs Sequential experiment
    Run {
        #[command(flatten)]
        experiment: ExperimentArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Repeat the experiment across values of one parameter
    Sweep {
        #[command(flatten)]
        experiment: ExperimentArgs,
        #[command(flatten)]
        output: OutputArgs,
        /// Parameter to vary
        #[arg(long, value_enum)]
        parameter: SweepArg,
        /// Comma-separated values, e.g. 0,0.005,0.01
        #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
        values: Vec<f64>,
    },
    /// Check the transfer entropy estimator against a known coupling
    Calibrate {
        #[command(flatten)]
        experiment: ExperimentArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
}

/// Config file plus the overrides most often changed between runs.
#[derive(Args, Debug)]
struct ExperimentArgs {
    /// TOML experiment config; defaults are used when omitted
    #[arg(short, long, env = "MIRROR_CONFIG")]
    config: Option<PathBuf>,

    /// Runs per condition
    #[arg(long, env = "MIRROR_RUNS")]
    runs: Option<usize>,

    /// Base seed; run i uses seed + i
    #[arg(long, env = "MIRROR_SEED")]
    seed: Option<u64>,

    /// Steps per run
    #[arg(long)]
    timesteps: Option<usize>,

    /// State vector dimension
    #[arg(long)]
    dimension: Option<usize>,

    /// Concurrent runs
    #[arg(long, env = "MIRROR_WORKERS")]
    workers: Option<usize>,

    /// Restrict to one or both conditions (repeatable)
    #[arg(long = "condition", value_enum)]
    conditions: Vec<ConditionArg>,

    /// Series the growth fits are computed on
    #[arg(long, value_enum)]
    fit_metric: Option<FitMetricArg>,

    /// Skip the transfer entropy calibration step
    #[arg(long)]
    no_calibration: bool,
}

#[derive(Args, Debug)]
struct OutputArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConditionArg {
    Simultaneous,
    Sequential,
}

impl From<ConditionArg> for UpdateMode {
    fn from(arg: ConditionArg) -> Self {
        match arg {
            ConditionArg::Simultaneous => UpdateMode::Simultaneous,
            ConditionArg::Sequential => UpdateMode::Sequential,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FitMetricArg {
    MeanUnderstanding,
    OrderParameter,
    SharedSpace,
}

impl From<FitMetricArg> for FitMetric {
    fn from(arg: FitMetricArg) -> Self {
        match arg {
            FitMetricArg::MeanUnderstanding => FitMetric::MeanUnderstanding,
            FitMetricArg::OrderParameter => FitMetric::OrderParameter,
            FitMetricArg::SharedSpace => FitMetric::SharedSpace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SweepArg {
    EnergyDepletionRate,
    ConvergenceRate,
    NoiseStd,
    Complexity,
}

impl From<SweepArg> for SweepParameter {
    fn from(arg: SweepArg) -> Self {
        match arg {
            SweepArg::EnergyDepletionRate => SweepParameter::EnergyDepletionRate,
            SweepArg::ConvergenceRate => SweepParameter::ConvergenceRate,
            SweepArg::NoiseStd => SweepParameter::NoiseStd,
            SweepArg::Complexity => SweepParameter::Complexity,
        }
    }
}

impl ExperimentArgs {
    /// Load the config file (if any) and apply command-line overrides.
    fn resolve(&self) -> Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::load(path)
                .with_context(|| format!("Cannot use config {}", path.display()))?,
            None => ExperimentConfig::default(),
        };
        if let Some(runs) = self.runs {
            config.num_runs = runs;
        }
        if let Some(seed) = self.seed {
            config.base_seed = seed;
        }
        if let Some(timesteps) = self.timesteps {
            config.timesteps = timesteps;
        }
        if let Some(dimension) = self.dimension {
            config.dimension = dimension;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if !self.conditions.is_empty() {
            config.conditions = self.conditions.iter().map(|&c| c.into()).collect();
        }
        if let Some(metric) = self.fit_metric {
            config.fit_metric = metric.into();
        }
        if self.no_calibration {
            config.calibration.enabled = false;
        }
        config.validate().context("Invalid experiment config")?;
        Ok(config)
    }
}

fn init_logging(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Cancel flag raised by Ctrl-C; in-flight runs stop at their next step.
fn cancel_on_ctrl_c() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling remaining runs");
            flag.store(true, Ordering::Relaxed);
        }
    });
    cancel
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    match cli.command {
        Command::Run { experiment, output } => {
            let config = experiment.resolve()?;
            let summary = run_experiment_with_cancel(config, cancel_on_ctrl_c())
                .await
                .context("Experiment failed")?;
            if !summary.excluded_runs.is_empty() {
                tracing::warn!("{} runs were excluded", summary.excluded_runs.len());
            }
            report::emit(&summary, output.format, output.output.as_deref(), report::summary_table)?;
        }
        Command::Sweep {
            experiment,
            output,
            parameter,
            values,
        } => {
            let config = experiment.resolve()?;
            let sweep = run_sweep(&config, parameter.into(), &values)
                .await
                .context("Sweep failed")?;
            report::emit(&sweep, output.format, output.output.as_deref(), report::sweep_table)?;
        }
        Command::Calibrate { experiment, output } => {
            let config = experiment.resolve()?;
            let record = calibrate(&config.calibration).context("Calibration failed")?;
            report::emit(&record, output.format, output.output.as_deref(), report::calibration_table)?;
            if !record.passed {
                anyhow::bail!(
                    "calibration error {:.4} exceeds tolerance {:.4}",
                    record.absolute_error,
                    record.tolerance
                );
            }
        }
    }
    Ok(())
}
