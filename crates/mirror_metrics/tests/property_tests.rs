//! Property-based tests for mirror_metrics.

use mirror_core::vector::normalize;
use mirror_metrics::changepoint::{detect_changepoints, ChangepointParams};
use mirror_metrics::transfer::{binned_transfer_entropy, gaussian_transfer_entropy};
use mirror_metrics::bipartition_phi;
use proptest::prelude::*;

fn arb_series() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-5.0f64..5.0, 0..300)
}

proptest! {
    /// **Core invariant**: changepoints are strictly increasing, inside the
    /// series and never closer than the minimum separation.
    #[test]
    fn changepoints_are_separated(
        y in arb_series(),
        min_separation in 1usize..20,
        penalty_scale in 0.5f64..10.0,
    ) {
        let params = ChangepointParams {
            min_separation,
            penalty_scale,
            ..Default::default()
        };
        let cps = detect_changepoints(&y, &params);
        for w in cps.windows(2) {
            prop_assert!(w[1] > w[0]);
            prop_assert!(w[1] - w[0] >= min_separation);
        }
        for c in &cps {
            prop_assert!(*c > 0 && *c < y.len());
        }
    }

    #[test]
    fn constant_series_never_changes(level in -3.0f64..3.0, n in 0usize..300) {
        let y = vec![level; n];
        prop_assert!(detect_changepoints(&y, &ChangepointParams::default()).is_empty());
    }

    /// A trend alone is never a transition.
    #[test]
    fn straight_line_never_changes(
        intercept in -1.0f64..1.0,
        slope in -0.05f64..0.05,
        n in 0usize..300,
    ) {
        let y: Vec<f64> = (0..n).map(|t| intercept + slope * t as f64).collect();
        let cps = detect_changepoints(&y, &ChangepointParams::default());
        prop_assert!(cps.is_empty(), "cps={:?}", cps);
    }

    #[test]
    fn phi_is_non_negative(
        a in prop::collection::vec(-1.0f64..1.0, 16),
        b in prop::collection::vec(-1.0f64..1.0, 16),
        bins in 2usize..12,
    ) {
        if let (Ok(a), Ok(b)) = (normalize(&a), normalize(&b)) {
            let phi = bipartition_phi(&a, &b, bins).unwrap();
            prop_assert!(phi >= 0.0 && phi.is_finite());
            // bounded by the larger marginal's maximum entropy
            prop_assert!(phi <= (bins as f64).ln() + 1e-9);
        }
    }

    #[test]
    fn transfer_entropy_is_finite_and_non_negative(
        x in prop::collection::vec(-5.0f64..5.0, 0..200),
        y in prop::collection::vec(-5.0f64..5.0, 0..200),
    ) {
        let te = gaussian_transfer_entropy(&x, &y).unwrap();
        prop_assert!(te.is_finite() && te >= 0.0);
        let binned = binned_transfer_entropy(&x, &y, 4);
        prop_assert!(binned.is_finite() && binned >= -1e-9);
    }
}
