//! Interaction Scheduler
//!
//! Drives two agents through T mirroring steps and records a `Trajectory`.
//!
//! Two update orders are supported:
//! - **Simultaneous**: both mirrors are computed from the step t−1 states,
//!   then both are committed (compute phase, then apply phase).
//! - **Sequential**: turn-taking. Even steps A mirrors B's current state,
//!   odd steps B mirrors A's. Only the acting agent updates.
//!
//! Schedules sit behind the `InteractionSchedule` trait so that experiment
//! code can treat the update order as data.

use crate::agent::{Agent, AgentTraits};
use crate::error::{MirrorError, MirrorResult};
use crate::noise::{AgentSlot, NoiseSource};
use crate::trajectory::{Snapshot, Trajectory};
use crate::vector::pearson;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

// ============================================================================
// Parameters
// ============================================================================

/// Update order of a run. Also the experimental condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    Simultaneous,
    Sequential,
}

impl UpdateMode {
    pub const ALL: [UpdateMode; 2] = [UpdateMode::Simultaneous, UpdateMode::Sequential];

    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateMode::Simultaneous => "simultaneous",
            UpdateMode::Sequential => "sequential",
        }
    }

    /// The schedule implementing this update order.
    pub fn schedule(&self) -> &'static dyn InteractionSchedule {
        match self {
            UpdateMode::Simultaneous => &SimultaneousSchedule,
            UpdateMode::Sequential => &SequentialSchedule,
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-step dynamics knobs shared by both agents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerParams {
    pub timesteps: usize,
    /// α in `blend(state, mirror, α)`
    pub convergence_rate: f64,
    /// σ of the per-component perception noise
    pub noise_std: f64,
    /// Energy lost per step by each agent that mirrored (0 disables decay)
    pub energy_depletion_rate: f64,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self {
            timesteps: 200,
            convergence_rate: 0.02,
            noise_std: 0.1,
            energy_depletion_rate: 0.0,
        }
    }
}

/// Cooperative limits on a run, checked once per step.
#[derive(Debug, Clone, Default)]
pub struct RunBudget {
    max_steps: Option<usize>,
    deadline: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
}

impl RunBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_max_steps(mut self, steps: usize) -> Self {
        self.max_steps = Some(steps);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Fails with `BudgetExhausted` if step `step` may not start.
    pub fn check(&self, seed: u64, step: usize) -> MirrorResult<()> {
        let cancelled = self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed));
        let over_steps = self.max_steps.is_some_and(|max| step >= max);
        let over_time = self.deadline.is_some_and(|d| Instant::now() >= d);
        if cancelled || over_steps || over_time {
            return Err(MirrorError::BudgetExhausted { seed, steps: step });
        }
        Ok(())
    }
}

/// The two agents of one run.
#[derive(Debug, Clone)]
pub struct AgentPair {
    pub a: Agent,
    pub b: Agent,
}

impl AgentPair {
    pub fn new(a: Agent, b: Agent) -> MirrorResult<Self> {
        if a.state().dimension() != b.state().dimension() {
            return Err(MirrorError::DimensionMismatch {
                expected: a.state().dimension(),
                actual: b.state().dimension(),
            });
        }
        Ok(Self { a, b })
    }

    /// Both agents drawn from the run's noise source.
    pub fn seeded(
        noise: &NoiseSource,
        dimension: usize,
        traits_a: AgentTraits,
        traits_b: AgentTraits,
    ) -> MirrorResult<Self> {
        let a = Agent::initialize_with(&mut noise.init_stream(AgentSlot::A), dimension, traits_a)?;
        let b = Agent::initialize_with(&mut noise.init_stream(AgentSlot::B), dimension, traits_b)?;
        Self::new(a, b)
    }

    fn is_finite(&self) -> bool {
        self.a.is_finite() && self.b.is_finite()
    }
}

// ============================================================================
// Schedules
// ============================================================================

/// One update order.
pub trait InteractionSchedule: Send + Sync {
    fn mode(&self) -> UpdateMode;

    /// Advance the pair by step `t`. Returns the recursive influence when both
    /// agents mirrored during the step.
    fn step(
        &self,
        pair: &mut AgentPair,
        t: usize,
        params: &SchedulerParams,
        noise: &NoiseSource,
    ) -> MirrorResult<Option<f64>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SimultaneousSchedule;

impl InteractionSchedule for SimultaneousSchedule {
    fn mode(&self) -> UpdateMode {
        UpdateMode::Simultaneous
    }

    fn step(
        &self,
        pair: &mut AgentPair,
        t: usize,
        params: &SchedulerParams,
        noise: &NoiseSource,
    ) -> MirrorResult<Option<f64>> {
        // Compute phase: both mirrors see only t−1 states
        let mirror_a = pair.a.compute_mirror(
            pair.b.state(),
            params.noise_std,
            &mut noise.mirror_stream(AgentSlot::A, t),
        )?;
        let mirror_b = pair.b.compute_mirror(
            pair.a.state(),
            params.noise_std,
            &mut noise.mirror_stream(AgentSlot::B, t),
        )?;

        // Apply phase
        pair.a.converge(&mirror_a, params.convergence_rate)?;
        pair.b.converge(&mirror_b, params.convergence_rate)?;
        pair.a.update_understanding(pair.b.state())?;
        pair.b.update_understanding(pair.a.state())?;
        pair.a.deplete_energy(params.energy_depletion_rate);
        pair.b.deplete_energy(params.energy_depletion_rate);

        let influence = pearson(mirror_a.as_slice(), mirror_b.as_slice())?.abs();
        Ok(Some(influence))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialSchedule;

impl InteractionSchedule for SequentialSchedule {
    fn mode(&self) -> UpdateMode {
        UpdateMode::Sequential
    }

    fn step(
        &self,
        pair: &mut AgentPair,
        t: usize,
        params: &SchedulerParams,
        noise: &NoiseSource,
    ) -> MirrorResult<Option<f64>> {
        let (actor, partner, slot) = if t % 2 == 0 {
            (&mut pair.a, &pair.b, AgentSlot::A)
        } else {
            (&mut pair.b, &pair.a, AgentSlot::B)
        };
        let mirror = actor.compute_mirror(
            partner.state(),
            params.noise_std,
            &mut noise.mirror_stream(slot, t),
        )?;
        actor.converge(&mirror, params.convergence_rate)?;
        actor.update_understanding(partner.state())?;
        actor.deplete_energy(params.energy_depletion_rate);
        Ok(None)
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Run `params.timesteps` steps of `schedule` on `pair`.
///
/// A non-finite value at any step ends the run with `NumericDivergence`;
/// the budget is checked before every step.
pub fn run_trajectory(
    schedule: &dyn InteractionSchedule,
    mut pair: AgentPair,
    params: &SchedulerParams,
    noise: &NoiseSource,
    budget: &RunBudget,
) -> MirrorResult<Trajectory> {
    let seed = noise.seed();
    let mut trajectory = Trajectory::begin(schedule.mode(), seed, &pair.a, &pair.b, params.timesteps);

    for t in 0..params.timesteps {
        budget.check(seed, t)?;
        let influence = schedule
            .step(&mut pair, t, params, noise)
            .map_err(|e| match e {
                MirrorError::DegenerateVector { norm } if !norm.is_finite() => {
                    MirrorError::NumericDivergence { seed, step: t }
                }
                other => other,
            })?;
        if !pair.is_finite() || influence.is_some_and(|v| !v.is_finite()) {
            return Err(MirrorError::NumericDivergence { seed, step: t });
        }
        trajectory.push(Snapshot::capture(t, &pair.a, &pair.b, influence));
    }

    tracing::trace!(seed, mode = %schedule.mode(), steps = trajectory.len(), "run finished");
    Ok(trajectory)
}

/// Seed both agents from `seed` and run `mode` to completion.
pub fn simulate(
    mode: UpdateMode,
    seed: u64,
    dimension: usize,
    traits: (AgentTraits, AgentTraits),
    params: &SchedulerParams,
    budget: &RunBudget,
) -> MirrorResult<Trajectory> {
    let noise = NoiseSource::new(seed);
    let pair = AgentPair::seeded(&noise, dimension, traits.0, traits.1)?;
    run_trajectory(mode.schedule(), pair, params, &noise, budget)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{blend, normalize, StateVector};

    fn default_traits() -> (AgentTraits, AgentTraits) {
        (AgentTraits::new(0.5, 0.7, 1.0), AgentTraits::new(0.7, 0.6, 1.0))
    }

    fn short(timesteps: usize) -> SchedulerParams {
        SchedulerParams {
            timesteps,
            ..Default::default()
        }
    }

    #[test]
    fn test_trajectory_length_and_unit_norm() {
        for mode in UpdateMode::ALL {
            let traj = simulate(mode, 4577, 100, default_traits(), &short(50), &RunBudget::unlimited())
                .unwrap();
            assert_eq!(traj.len(), 50);
            for (i, snap) in traj.snapshots().iter().enumerate() {
                assert_eq!(snap.t, i);
                assert!((snap.state_a.norm() - 1.0).abs() < 1e-6, "{mode} step {i}");
                assert!((snap.state_b.norm() - 1.0).abs() < 1e-6, "{mode} step {i}");
            }
        }
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let p = short(30);
        let t1 = simulate(UpdateMode::Simultaneous, 9, 20, default_traits(), &p, &RunBudget::unlimited())
            .unwrap();
        let t2 = simulate(UpdateMode::Simultaneous, 9, 20, default_traits(), &p, &RunBudget::unlimited())
            .unwrap();
        assert_eq!(t1.mean_understanding(), t2.mean_understanding());
    }

    #[test]
    fn test_simultaneous_uses_previous_states() {
        let a0 = normalize(&[1.0, 0.3, 0.0]).unwrap();
        let b0 = normalize(&[0.6, 0.8, 0.1]).unwrap();
        let mut a = Agent::with_state(a0.clone(), AgentTraits::default()).unwrap();
        let mut b = Agent::with_state(b0.clone(), AgentTraits::default()).unwrap();
        a.update_understanding(&b0).unwrap();
        b.update_understanding(&a0).unwrap();
        let pair = AgentPair::new(a, b).unwrap();
        let params = SchedulerParams {
            timesteps: 1,
            convergence_rate: 0.1,
            noise_std: 0.0,
            energy_depletion_rate: 0.0,
        };

        let traj = run_trajectory(
            &SimultaneousSchedule,
            pair,
            &params,
            &NoiseSource::new(0),
            &RunBudget::unlimited(),
        )
        .unwrap();

        // Noise-free mirrors are exactly the partner's t−1 state
        let expect_a = normalize(&blend(a0.as_slice(), b0.as_slice(), 0.1).unwrap()).unwrap();
        let expect_b = normalize(&blend(b0.as_slice(), a0.as_slice(), 0.1).unwrap()).unwrap();
        let snap = &traj.snapshots()[0];
        for (x, y) in snap.state_a.as_slice().iter().zip(expect_a.as_slice()) {
            assert!((x - y).abs() < 1e-12);
        }
        for (x, y) in snap.state_b.as_slice().iter().zip(expect_b.as_slice()) {
            assert!((x - y).abs() < 1e-12, "B must mirror A's t-1 state, not its update");
        }
        assert!(snap.recursive_influence.is_some());
    }

    #[test]
    fn test_sequential_alternates_actor() {
        let traj = simulate(UpdateMode::Sequential, 5, 30, default_traits(), &short(4), &RunBudget::unlimited())
            .unwrap();
        let (a0, b0) = traj.initial_states();
        let s = traj.snapshots();
        assert_ne!(&s[0].state_a, a0);
        assert_eq!(&s[0].state_b, b0);
        assert_eq!(s[1].state_a, s[0].state_a);
        assert_ne!(s[1].state_b, s[0].state_b);
        assert!(s.iter().all(|snap| snap.recursive_influence.is_none()));
    }

    #[test]
    fn test_sequential_depletes_only_actor() {
        let params = SchedulerParams {
            timesteps: 1,
            energy_depletion_rate: 0.1,
            ..Default::default()
        };
        let traj = simulate(UpdateMode::Sequential, 5, 10, default_traits(), &params, &RunBudget::unlimited())
            .unwrap();
        let snap = &traj.snapshots()[0];
        assert!((snap.energy_a - 0.9).abs() < 1e-12);
        assert_eq!(snap.energy_b, 1.0);
    }

    #[test]
    fn test_zero_rate_freezes_states() {
        let params = SchedulerParams {
            convergence_rate: 0.0,
            ..short(40)
        };
        for mode in UpdateMode::ALL {
            let traj = simulate(mode, 12, 25, default_traits(), &params, &RunBudget::unlimited()).unwrap();
            let (a0, b0) = traj.initial_states();
            for snap in traj.snapshots() {
                for (x, y) in snap.state_a.as_slice().iter().zip(a0.as_slice()) {
                    assert!((x - y).abs() < 1e-12);
                }
                for (x, y) in snap.state_b.as_slice().iter().zip(b0.as_slice()) {
                    assert!((x - y).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_infinite_noise_is_divergence() {
        let params = SchedulerParams {
            noise_std: f64::INFINITY,
            ..short(10)
        };
        let err = simulate(UpdateMode::Simultaneous, 77, 8, default_traits(), &params, &RunBudget::unlimited())
            .unwrap_err();
        assert_eq!(err, MirrorError::NumericDivergence { seed: 77, step: 0 });
    }

    #[test]
    fn test_step_budget_exhausts() {
        let budget = RunBudget::unlimited().with_max_steps(5);
        let err = simulate(UpdateMode::Simultaneous, 3, 8, default_traits(), &short(20), &budget).unwrap_err();
        assert_eq!(err, MirrorError::BudgetExhausted { seed: 3, steps: 5 });
    }

    #[test]
    fn test_cancel_flag_stops_run() {
        let flag = Arc::new(AtomicBool::new(true));
        let budget = RunBudget::unlimited().with_cancel_flag(flag);
        let err = simulate(UpdateMode::Sequential, 3, 8, default_traits(), &short(20), &budget).unwrap_err();
        assert!(matches!(err, MirrorError::BudgetExhausted { steps: 0, .. }));
    }

    #[test]
    fn test_pair_dimension_mismatch() {
        let a = Agent::with_state(StateVector::random(&mut NoiseSource::new(1).stream(0), 3).unwrap(), AgentTraits::default())
            .unwrap();
        let b = Agent::with_state(StateVector::random(&mut NoiseSource::new(1).stream(1), 4).unwrap(), AgentTraits::default())
            .unwrap();
        assert!(matches!(
            AgentPair::new(a, b),
            Err(MirrorError::DimensionMismatch { expected: 3, actual: 4 })
        ));
    }
}
