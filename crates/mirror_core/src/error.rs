//! Error taxonomy shared by every crate in the workspace.

use thiserror::Error;

/// Root error type for mirroring simulations and their analysis.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MirrorError {
    /// A vector with (near) zero norm cannot be normalized.
    /// Callers should reseed or increase the dimension.
    #[error("degenerate vector: norm {norm:.3e} cannot be normalized")]
    DegenerateVector { norm: f64 },

    /// Two vectors of different length met in one operation.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A non-finite value appeared mid-run. The run is excluded from aggregates.
    #[error("numeric divergence in run seed={seed} at step {step}")]
    NumericDivergence { seed: u64, step: usize },

    /// The cooperative step / wall-clock budget ran out before the run finished.
    #[error("run budget exhausted for seed={seed} after {steps} steps")]
    BudgetExhausted { seed: u64, steps: usize },

    /// A statistical fit needs more points than it was given.
    #[error("insufficient trajectory length: need at least {required} points, got {actual}")]
    InsufficientTrajectoryLength { required: usize, actual: usize },

    /// Fitting was attempted on data that did not come from executed runs.
    #[error("validation integrity violation: {0}")]
    ValidationIntegrity(String),

    /// Invalid configuration, reported before any simulation work.
    #[error("config error: {0}")]
    Config(String),

    /// A run worker could not be scheduled or joined.
    #[error("worker failure: {0}")]
    Worker(String),
}

impl MirrorError {
    /// Whether this error only disqualifies a single run rather than the experiment.
    pub fn is_per_run(&self) -> bool {
        matches!(
            self,
            MirrorError::DegenerateVector { .. }
                | MirrorError::NumericDivergence { .. }
                | MirrorError::BudgetExhausted { .. }
        )
    }
}

pub type MirrorResult<T> = Result<T, MirrorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_run_classification() {
        assert!(MirrorError::NumericDivergence { seed: 1, step: 3 }.is_per_run());
        assert!(MirrorError::BudgetExhausted { seed: 1, steps: 3 }.is_per_run());
        assert!(MirrorError::DegenerateVector { norm: 0.0 }.is_per_run());
        assert!(!MirrorError::ValidationIntegrity("synthetic".into()).is_per_run());
        assert!(!MirrorError::Config("bad".into()).is_per_run());
        assert!(!MirrorError::Worker("panicked".into()).is_per_run());
    }

    #[test]
    fn test_messages_carry_seed() {
        let msg = MirrorError::NumericDivergence { seed: 4577, step: 12 }.to_string();
        assert!(msg.contains("4577"));
        assert!(msg.contains("12"));
    }
}
