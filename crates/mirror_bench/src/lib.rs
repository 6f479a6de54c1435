//! mirror_bench: end-to-end scenarios for reciprocal mirroring.
//!
//! Runs the full pipeline at reference scale and checks the behaviors the
//! model is supposed to show:
//! - Simultaneous updating grows with curvature, Sequential barely does
//! - Simultaneous ψ takes off earlier and more often, without a staircase of
//!   spurious changepoints
//! - frozen agents (α = 0 or openness = 0) stay exactly where they started
//! - energy depletion caps how far understanding gets

use mirror_core::{AgentTraits, ExperimentConfig, MirrorResult, RunBudget, StateVector, UpdateMode};
use mirror_harness::{execute_run, RunResult};

/// Reference setup: D=100, 30 runs from seed 4577, T=200, α=0.02, σ=0.1.
pub fn reference_config() -> ExperimentConfig {
    ExperimentConfig {
        dimension: 100,
        num_runs: 30,
        base_seed: 4577,
        timesteps: 200,
        convergence_rate: 0.02,
        noise_std: 0.1,
        ..Default::default()
    }
}

/// One unbudgeted run of `config`.
pub fn single_run(
    config: &ExperimentConfig,
    condition: UpdateMode,
    seed: u64,
) -> MirrorResult<RunResult> {
    execute_run(config, condition, seed, &RunBudget::unlimited())
}

/// Largest componentwise distance between two states.
pub fn max_drift(a: &StateVector, b: &StateVector) -> f64 {
    a.as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

/// Both agents closed off: they perceive nothing of each other.
pub fn closed_agents(config: &ExperimentConfig) -> ExperimentConfig {
    ExperimentConfig {
        agent_a: AgentTraits::new(config.agent_a.complexity, 0.0, 1.0),
        agent_b: AgentTraits::new(config.agent_b.complexity, 0.0, 1.0),
        ..config.clone()
    }
}
