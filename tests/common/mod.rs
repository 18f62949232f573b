#![allow(dead_code)]

pub use sweepdag_test_utils::builders;
pub use sweepdag_test_utils::{build_scheduler, init_tracing, run_on_cluster, sweep_fixed_source};

use sweepdag::quadrature::{AngularQuadrature, Direction};

/// Quadrature with a single unit-weight direction.
pub fn single_direction(omega: [f64; 3]) -> AngularQuadrature {
    AngularQuadrature::from_directions(vec![Direction::new(omega, 1.0).unwrap()]).unwrap()
}

/// Relative comparison, falling back to absolute near zero.
pub fn assert_close(a: &[f64], b: &[f64], tol: f64) {
    assert_eq!(a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        let scale = x.abs().max(y.abs()).max(1.0);
        assert!((x - y).abs() <= tol * scale, "entry {i}: {x} vs {y}");
    }
}
