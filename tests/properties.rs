//! Property-based tests for the discretization, the regularizer and the
//! objective derivatives.

use contin_rs::regularization::{curvature_penalty, fourth_difference, second_difference};
use contin_rs::{
    trapezoid_weights, Bounds, ContinObjective, KernelKind, Objective, ProblemParams, Samples,
};
use proptest::prelude::*;

fn decay_samples(n: usize, tau: f64) -> Samples {
    let t: Vec<f64> = (0..n).map(|i| 0.05 * i as f64).collect();
    let y: Vec<f64> = t.iter().map(|t| (-t / tau).exp() + 0.1).collect();
    let var: Vec<f64> = (0..n).map(|i| 0.5 + 0.1 * (i % 3) as f64).collect();
    Samples::new(t, y, var).unwrap()
}

fn kernel_kind() -> impl Strategy<Value = KernelKind> {
    prop_oneof![Just(KernelKind::Exponential), Just(KernelKind::Lorentzian)]
}

proptest! {
    /// Trapezoidal weights integrate constants exactly.
    #[test]
    fn quadrature_integrates_constants(m in 3usize..400, dtau in 1e-3f64..50.0) {
        let c = trapezoid_weights(m, dtau);
        prop_assert_eq!(c.len(), m);
        prop_assert_eq!(c[0], 0.5 * dtau);
        prop_assert_eq!(c[m - 1], 0.5 * dtau);
        let sum: f64 = c.iter().sum();
        let expected = (m - 1) as f64 * dtau;
        prop_assert!((sum - expected).abs() <= 1e-12 * expected);
    }

    /// The τ grid spans the requested range and is strictly increasing.
    #[test]
    fn grid_spans_range(
        m in 3usize..60,
        tau0 in 1e-3f64..5.0,
        width in 1e-2f64..100.0,
        kind in kernel_kind(),
    ) {
        let samples = decay_samples(10, 1.0);
        let tau1 = tau0 + width;
        let params = ProblemParams::new(&samples, 0.1, (tau0, tau1), m, kind).unwrap();
        prop_assert_eq!(params.tau()[0], tau0);
        prop_assert_eq!(params.tau()[m - 1], tau1);
        prop_assert!(params.tau().windows(2).all(|w| w[1] > w[0]));
        let sum: f64 = params.quadrature().iter().sum();
        prop_assert!((sum - width).abs() <= 1e-10 * width.max(1.0));
    }

    /// D2 annihilates affine sequences away from the boundary.
    #[test]
    fn second_difference_of_affine(m in 3usize..100, a in -50.0f64..50.0, b in -5.0f64..5.0) {
        let x: Vec<f64> = (0..m).map(|i| a + b * i as f64).collect();
        let mut d = vec![0.0; m];
        second_difference(&x, &mut d);
        for &v in &d[1..m - 1] {
            prop_assert!(v.abs() <= 1e-9 * (1.0 + a.abs() + b.abs() * m as f64));
        }
    }

    /// xᵀ D2ᵀD2 x = ‖D2 x‖² and the penalty is non-negative.
    #[test]
    fn fourth_difference_is_gram(x in prop::collection::vec(-10.0f64..10.0, 3..40)) {
        let m = x.len();
        let mut scratch = vec![0.0; m];
        let mut d4 = vec![0.0; m];
        fourth_difference(&x, &mut scratch, &mut d4);
        let quad: f64 = x.iter().zip(&d4).map(|(a, b)| a * b).sum();
        let penalty = curvature_penalty(&x);
        prop_assert!(penalty >= 0.0);
        prop_assert!((quad - penalty).abs() <= 1e-9 * penalty.max(1.0));
    }

    /// The Hessian-vector product is symmetric: uᵀ(Hv) = vᵀ(Hu).
    #[test]
    fn hessian_symmetry(
        n in 5usize..60,
        m in 3usize..15,
        alpha in 0.0f64..3.0,
        kind in kernel_kind(),
        seed in 0u64..1000,
    ) {
        let samples = decay_samples(n, 0.8);
        let params = ProblemParams::new(&samples, alpha, (0.2, 3.0), m, kind).unwrap();
        let mut objective = ContinObjective::new(&params);
        let dim = m + 1;
        let s = seed as f64;
        let x: Vec<f64> = (0..dim).map(|k| (s + k as f64).sin().abs()).collect();
        let u: Vec<f64> = (0..dim).map(|k| (0.3 * s + 1.7 * k as f64).cos()).collect();
        let v: Vec<f64> = (0..dim).map(|k| (0.7 * s - 0.9 * k as f64).sin()).collect();
        let mut hu = vec![0.0; dim];
        let mut hv = vec![0.0; dim];
        objective.hessian_vec(&x, &u, &mut hu);
        objective.hessian_vec(&x, &v, &mut hv);
        let uhv: f64 = u.iter().zip(&hv).map(|(a, b)| a * b).sum();
        let vhu: f64 = v.iter().zip(&hu).map(|(a, b)| a * b).sum();
        prop_assert!((uhv - vhu).abs() <= 1e-9 * uhv.abs().max(1.0));
        // Positive semidefinite.
        let uhu: f64 = u.iter().zip(&hu).map(|(a, b)| a * b).sum();
        prop_assert!(uhu >= -1e-9 * uhu.abs().max(1.0));
    }

    /// The objective is a sum of weighted squares.
    #[test]
    fn objective_is_nonnegative(
        x in prop::collection::vec(-5.0f64..5.0, 8),
        alpha in 0.0f64..10.0,
    ) {
        let samples = decay_samples(30, 0.5);
        let params = ProblemParams::new(&samples, alpha, (0.1, 2.0), 7, KernelKind::Exponential)
            .unwrap();
        let mut objective = ContinObjective::new(&params);
        let (misfit, curvature) = objective.components(&x);
        prop_assert!(misfit >= 0.0 && curvature >= 0.0);
        let value = objective.value(&x);
        prop_assert!((value - (misfit + alpha * alpha * curvature)).abs() <= 1e-9 * value.max(1.0));
    }

    /// Projection lands inside the box and is idempotent.
    #[test]
    fn projection_is_idempotent(x in prop::collection::vec(-200.0f64..200.0, 1..30)) {
        let bounds = Bounds::uniform(x.len(), 0.0, 100.0).unwrap();
        let mut p = x.clone();
        bounds.project(&mut p);
        prop_assert!(bounds.contains(&p));
        let mut q = p.clone();
        bounds.project(&mut q);
        prop_assert_eq!(p, q);
    }
}
