//! Property-based tests for the harness's public fitting surface.

use mirror_core::MirrorError;
use mirror_harness::{compare_acceleration, fit_growth, GrowthSeries};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Curves of the shapes a fabricated growth series would take.
fn arb_fabricated() -> impl Strategy<Value = Vec<f64>> {
    (0usize..3, -2.0f64..2.0, -0.1f64..0.1, 3usize..200).prop_map(|(degree, a, b, n)| {
        (0..n)
            .map(|x| {
                let x = x as f64;
                match degree {
                    0 => a,
                    1 => a + b * x,
                    _ => a + b * x + 0.01 * x * x,
                }
            })
            .collect()
    })
}

proptest! {
    /// **Core invariant**: data that did not come from runs is never fitted,
    /// whatever its shape or length.
    #[test]
    fn external_series_are_never_fitted(values in arb_fabricated(), label in "[a-z ]{0,12}") {
        let series = GrowthSeries::external(label, values);
        prop_assert!(matches!(fit_growth(&series), Err(MirrorError::ValidationIntegrity(_))));
    }

    #[test]
    fn external_series_are_never_compared(a in arb_fabricated(), b in arb_fabricated()) {
        let a = GrowthSeries::external("a", a);
        let b = GrowthSeries::external("b", b);
        prop_assert!(matches!(
            compare_acceleration(&a, &b),
            Err(MirrorError::ValidationIntegrity(_))
        ));
    }
}
