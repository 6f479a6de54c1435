//! Trajectory: the immutable per-step record of one run.

use crate::agent::{Agent, UnderstandingPhase};
use crate::scheduler::UpdateMode;
use crate::vector::StateVector;
use serde::Serialize;

/// Both agents as they stood after step `t`.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub t: usize,
    pub state_a: StateVector,
    pub state_b: StateVector,
    pub understanding_a: f64,
    pub understanding_b: f64,
    pub energy_a: f64,
    pub energy_b: f64,
    pub phase_a: UnderstandingPhase,
    pub phase_b: UnderstandingPhase,
    /// |corr(mirror_a, mirror_b)| when both agents mirrored during this step
    pub recursive_influence: Option<f64>,
}

impl Snapshot {
    pub(crate) fn capture(t: usize, a: &Agent, b: &Agent, recursive_influence: Option<f64>) -> Self {
        Self {
            t,
            state_a: a.state().clone(),
            state_b: b.state().clone(),
            understanding_a: a.understanding(),
            understanding_b: b.understanding(),
            energy_a: a.energy(),
            energy_b: b.energy(),
            phase_a: a.phase(),
            phase_b: b.phase(),
            recursive_influence,
        }
    }

    pub fn mean_understanding(&self) -> f64 {
        0.5 * (self.understanding_a + self.understanding_b)
    }
}

/// Ordered snapshots of one run, plus the states the run started from.
///
/// Only the scheduler builds trajectories; consumers get read access.
#[derive(Debug, Clone, Serialize)]
pub struct Trajectory {
    mode: UpdateMode,
    seed: u64,
    initial_a: StateVector,
    initial_b: StateVector,
    snapshots: Vec<Snapshot>,
}

impl Trajectory {
    pub(crate) fn begin(mode: UpdateMode, seed: u64, a: &Agent, b: &Agent, capacity: usize) -> Self {
        Self {
            mode,
            seed,
            initial_a: a.state().clone(),
            initial_b: b.state().clone(),
            snapshots: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// States before the first step: `(A₀, B₀)`.
    pub fn initial_states(&self) -> (&StateVector, &StateVector) {
        (&self.initial_a, &self.initial_b)
    }

    pub fn states_a(&self) -> impl Iterator<Item = &StateVector> {
        self.snapshots.iter().map(|s| &s.state_a)
    }

    pub fn states_b(&self) -> impl Iterator<Item = &StateVector> {
        self.snapshots.iter().map(|s| &s.state_b)
    }

    pub fn understanding_a(&self) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.understanding_a).collect()
    }

    pub fn understanding_b(&self) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.understanding_b).collect()
    }

    /// Per-step mean of both agents' understanding.
    pub fn mean_understanding(&self) -> Vec<f64> {
        self.snapshots.iter().map(Snapshot::mean_understanding).collect()
    }

    /// Recursive influence over the steps in which both agents mirrored.
    pub fn recursive_influence(&self) -> Vec<f64> {
        self.snapshots
            .iter()
            .filter_map(|s| s.recursive_influence)
            .collect()
    }
}
