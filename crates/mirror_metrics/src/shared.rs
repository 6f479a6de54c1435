//! Shared space: how much of the alignment both agents actually understand.

use crate::order::order_parameter;
use mirror_core::{MirrorResult, Trajectory};

/// `s(t) = ψ(t) · min(uA(t), uB(t))`.
pub fn shared_space_series(trajectory: &Trajectory) -> MirrorResult<Vec<f64>> {
    trajectory
        .snapshots()
        .iter()
        .map(|s| {
            let psi = order_parameter(&s.state_a, &s.state_b)?;
            Ok(psi * s.understanding_a.min(s.understanding_b))
        })
        .collect()
}

/// `1 − |cA − cB|`: 1 for agents of equal complexity.
pub fn complexity_match(complexity_a: f64, complexity_b: f64) -> f64 {
    1.0 - (complexity_a - complexity_b).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_core::{simulate, AgentTraits, RunBudget, SchedulerParams, UpdateMode};

    #[test]
    fn test_shared_space_bounded_by_psi() {
        let params = SchedulerParams {
            timesteps: 40,
            ..Default::default()
        };
        let traj = simulate(
            UpdateMode::Sequential,
            3,
            20,
            (AgentTraits::default(), AgentTraits::default()),
            &params,
            &RunBudget::unlimited(),
        )
        .unwrap();
        let shared = shared_space_series(&traj).unwrap();
        let psi = crate::order::order_parameter_series(&traj).unwrap();
        for (s, p) in shared.iter().zip(&psi) {
            assert!(*s >= 0.0 && *s <= *p + 1e-12);
        }
    }

    #[test]
    fn test_complexity_match() {
        assert!((complexity_match(0.5, 0.7) - 0.8).abs() < 1e-12);
        assert_eq!(complexity_match(0.3, 0.3), 1.0);
    }
}
