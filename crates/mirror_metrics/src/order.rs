//! Order parameter ψ(t) = |stateA(t) · stateB(t)|.
//!
//! ψ is 0 for orthogonal agents and 1 for (anti-)aligned ones. It is the
//! series the changepoint detector runs on.

use mirror_core::{MirrorResult, StateVector, Trajectory};

pub fn order_parameter(a: &StateVector, b: &StateVector) -> MirrorResult<f64> {
    Ok(a.dot(b)?.abs())
}

/// ψ for every snapshot of the run.
pub fn order_parameter_series(trajectory: &Trajectory) -> MirrorResult<Vec<f64>> {
    trajectory
        .snapshots()
        .iter()
        .map(|s| order_parameter(&s.state_a, &s.state_b))
        .collect()
}
