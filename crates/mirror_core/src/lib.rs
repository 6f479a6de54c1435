//! # Mirror Core
//!
//! Two agents, each a unit vector in R^D, repeatedly perceive each other
//! through noise and drift toward what they perceive:
//!
//! - mirror: `m = normalize(openness · energy · (understanding · other + noise))`
//! - converge: `state ← normalize((1 − α)·state + α·m)`
//! - understand: `understanding = clamp(state · other, 0, 1)`
//!
//! The order in which the two agents update (simultaneous or turn-taking)
//! is the experimental condition. Every run is deterministic in its seed.

pub mod agent;
pub mod config;
pub mod error;
pub mod noise;
pub mod scheduler;
pub mod trajectory;
pub mod vector;

pub use agent::{Agent, AgentTraits, UnderstandingPhase};
pub use config::{CalibrationConfig, ExperimentConfig, FitMetric};
pub use error::{MirrorError, MirrorResult};
pub use noise::{AgentSlot, NoiseSource};
pub use scheduler::{
    run_trajectory, simulate, AgentPair, InteractionSchedule, RunBudget, SchedulerParams,
    SequentialSchedule, SimultaneousSchedule, UpdateMode,
};
pub use trajectory::{Snapshot, Trajectory};
pub use vector::StateVector;
