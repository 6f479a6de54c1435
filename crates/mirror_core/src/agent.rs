//! Agent Model
//!
//! One agent = one unit state vector plus four scalar traits in [0, 1]:
//! complexity, openness, energy and understanding. Understanding is derived
//! state (similarity to the partner), never a free parameter. Complexity does
//! not enter the update rule: it is reported (as complexity match) and can be
//! swept, but two runs differing only in complexity follow the same path.
//!
//! The mirroring step is split the way the scheduler needs it:
//! 1. `compute_mirror` is pure and returns a new vector,
//! 2. `converge` commits a mirror into the agent's own state.

use crate::error::{MirrorError, MirrorResult};
use crate::noise::gaussian;
use crate::vector::{blend, normalize, StateVector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Static per-agent parameters, as read from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentTraits {
    /// Complexity (0.0 - 1.0): recorded per agent, reported as complexity match
    pub complexity: f64,
    /// Openness (0.0 - 1.0): willingness to take in the partner at all
    pub openness: f64,
    /// Starting energy (0.0 - 1.0)
    pub energy: f64,
}

impl Default for AgentTraits {
    fn default() -> Self {
        Self {
            complexity: 0.5,
            openness: 0.7,
            energy: 1.0,
        }
    }
}

impl AgentTraits {
    pub fn new(complexity: f64, openness: f64, energy: f64) -> Self {
        Self {
            complexity,
            openness,
            energy,
        }
    }

    /// All traits must lie in [0, 1].
    pub fn validate(&self, label: &str) -> MirrorResult<()> {
        for (name, v) in [
            ("complexity", self.complexity),
            ("openness", self.openness),
            ("energy", self.energy),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(MirrorError::Config(format!(
                    "{label}.{name} must be in [0, 1], got {v}"
                )));
            }
        }
        Ok(())
    }
}

/// Coarse stage of understanding, in quartiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum UnderstandingPhase {
    /// understanding < 0.25
    Initial,
    /// 0.25 ≤ understanding < 0.5
    Emerging,
    /// 0.5 ≤ understanding < 0.75
    Established,
    /// understanding ≥ 0.75
    Integrated,
}

impl UnderstandingPhase {
    pub fn from_understanding(u: f64) -> Self {
        if u < 0.25 {
            UnderstandingPhase::Initial
        } else if u < 0.5 {
            UnderstandingPhase::Emerging
        } else if u < 0.75 {
            UnderstandingPhase::Established
        } else {
            UnderstandingPhase::Integrated
        }
    }
}

/// A mirroring agent. Owns its state exclusively.
#[derive(Debug, Clone)]
pub struct Agent {
    state: StateVector,
    complexity: f64,
    openness: f64,
    energy: f64,
    understanding: f64,
}

impl Agent {
    /// Fresh agent with a seeded random unit vector and zero understanding.
    pub fn initialize(seed: u64, dimension: usize, traits: AgentTraits) -> MirrorResult<Self> {
        Self::initialize_with(&mut ChaCha8Rng::seed_from_u64(seed), dimension, traits)
    }

    /// Same as `initialize`, drawing the initial direction from `rng`.
    pub fn initialize_with<R: Rng + ?Sized>(
        rng: &mut R,
        dimension: usize,
        traits: AgentTraits,
    ) -> MirrorResult<Self> {
        if dimension == 0 {
            return Err(MirrorError::Config("dimension must be >= 1".into()));
        }
        let state = StateVector::random(rng, dimension)?;
        Self::with_state(state, traits)
    }

    /// Agent with an explicit starting state (used by scenario construction).
    pub fn with_state(state: StateVector, traits: AgentTraits) -> MirrorResult<Self> {
        traits.validate("agent")?;
        Ok(Self {
            state,
            complexity: traits.complexity,
            openness: traits.openness,
            energy: traits.energy,
            understanding: 0.0,
        })
    }

    pub fn state(&self) -> &StateVector {
        &self.state
    }

    pub fn complexity(&self) -> f64 {
        self.complexity
    }

    pub fn openness(&self) -> f64 {
        self.openness
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn understanding(&self) -> f64 {
        self.understanding
    }

    pub fn phase(&self) -> UnderstandingPhase {
        UnderstandingPhase::from_understanding(self.understanding)
    }

    /// Trait gain applied to everything the agent perceives.
    pub fn gain(&self) -> f64 {
        self.openness * self.energy
    }

    /// `normalize(openness · energy · (understanding · other + noise))`.
    ///
    /// An agent with zero gain perceives nothing and mirrors its own state,
    /// which makes the following `converge` a no-op. A positive gain only
    /// scales the raw vector, so it is factored out before normalizing; tiny
    /// residual energies then do not trip the degenerate-norm check.
    pub fn compute_mirror<R: Rng + ?Sized>(
        &self,
        other: &StateVector,
        noise_std: f64,
        rng: &mut R,
    ) -> MirrorResult<StateVector> {
        if other.dimension() != self.state.dimension() {
            return Err(MirrorError::DimensionMismatch {
                expected: self.state.dimension(),
                actual: other.dimension(),
            });
        }
        let gain = self.gain();
        if gain <= 0.0 {
            return Ok(self.state.clone());
        }
        let noise = gaussian(rng, other.dimension(), noise_std);
        let raw: Vec<f64> = other
            .as_slice()
            .iter()
            .zip(noise)
            .map(|(o, n)| self.understanding * o + n)
            .collect();
        normalize(&raw)
    }

    /// `state ← normalize(blend(state, mirror, rate))`.
    pub fn converge(&mut self, mirror: &StateVector, rate: f64) -> MirrorResult<()> {
        let mixed = blend(self.state.as_slice(), mirror.as_slice(), rate)?;
        self.state = normalize(&mixed)?;
        Ok(())
    }

    /// Store `clamp(dot(state, other), 0, 1)` as the new understanding.
    pub fn update_understanding(&mut self, other: &StateVector) -> MirrorResult<f64> {
        let similarity = self.state.dot(other)?;
        self.understanding = if similarity.is_nan() {
            similarity
        } else {
            similarity.clamp(0.0, 1.0)
        };
        Ok(self.understanding)
    }

    /// `energy ← max(0, energy − rate)`.
    pub fn deplete_energy(&mut self, rate: f64) {
        if rate > 0.0 {
            self.energy = (self.energy - rate).max(0.0);
        }
    }

    /// True when the state and every scalar are finite.
    pub fn is_finite(&self) -> bool {
        self.state.is_finite() && self.understanding.is_finite() && self.energy.is_finite()
    }
}
