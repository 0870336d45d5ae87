use contin_rs::regularization::{curvature_penalty, second_difference};
use contin_rs::synthetic::{multi_exponential, DecayComponent};
use contin_rs::{check_gradient, ContinObjective, KernelKind, Objective, ProblemParams, Samples};

fn two_exponentials(n: usize) -> Samples {
    let components = [DecayComponent::new(1.0, 0.4), DecayComponent::new(2.0, 1.6)];
    multi_exponential(&components, 0.0, 4.0, n).unwrap()
}

fn noisy_weights(n: usize) -> Samples {
    let t: Vec<f64> = (0..n).map(|i| 0.02 * i as f64).collect();
    let y: Vec<f64> = t
        .iter()
        .enumerate()
        .map(|(i, t)| 1.5 * (-t / 0.7).exp() + 0.01 * ((i * 7919 % 13) as f64 - 6.0))
        .collect();
    let var: Vec<f64> = (0..n).map(|i| 0.25 + 0.05 * (i % 5) as f64).collect();
    Samples::new(t, y, var).unwrap()
}

fn test_point(m: usize) -> Vec<f64> {
    let mut x: Vec<f64> = (0..m).map(|j| 1.0 + 0.3 * (j as f64).sin()).collect();
    x.push(0.2);
    x
}

fn unit(n: usize, k: usize) -> Vec<f64> {
    let mut e = vec![0.0; n];
    e[k] = 1.0;
    e
}

#[test]
fn quadrature_sums_to_range() {
    let samples = two_exponentials(50);
    for &(tau0, tau1, m) in &[(0.1, 4.0, 10), (0.5, 0.6, 3), (1e-3, 250.0, 64)] {
        let params = ProblemParams::new(&samples, 0.1, (tau0, tau1), m, KernelKind::Exponential)
            .unwrap();
        let sum: f64 = params.quadrature().iter().sum();
        assert!(
            (sum - (tau1 - tau0)).abs() <= 1e-12 * (tau1 - tau0).max(1.0),
            "sum {sum} for [{tau0}, {tau1}]"
        );
        assert_eq!(params.tau().first().copied(), Some(tau0));
        assert_eq!(params.tau().last().copied(), Some(tau1));
    }
}

#[test]
fn second_difference_of_a_line() {
    let x: Vec<f64> = (0..9).map(|i| -3.0 + 0.75 * i as f64).collect();
    let mut d = vec![0.0; x.len()];
    second_difference(&x, &mut d);
    for &v in &d[1..8] {
        assert!(v.abs() < 1e-12);
    }
    assert_eq!(d[0], -2.0 * x[0] + x[1]);
    assert_eq!(d[8], x[7] - 2.0 * x[8]);
}

#[test]
fn forward_difference_gradient() {
    let h = 1e-5;
    for (samples, kernel) in [
        (two_exponentials(1000), KernelKind::Exponential),
        (noisy_weights(300), KernelKind::Exponential),
        (noisy_weights(300), KernelKind::Lorentzian),
    ] {
        let params = ProblemParams::new(&samples, 0.3, (0.1, 4.0), 10, kernel).unwrap();
        let n = params.dim();
        let mut objective = ContinObjective::new(&params);
        let x = test_point(10);
        let mut hv = vec![0.0; n];
        for check in check_gradient(&mut objective, &x, h) {
            // f is quadratic: the forward-difference error is h/2 H_kk.
            objective.hessian_vec(&x, &unit(n, check.index), &mut hv);
            let h_kk = hv[check.index];
            let err = (check.finite_difference - check.analytic).abs();
            assert!(
                err <= h * h_kk + 1e-6 * (1.0 + check.analytic.abs()),
                "{kernel} component {}: analytic {} fd {} (H_kk {h_kk})",
                check.index,
                check.analytic,
                check.finite_difference
            );
        }
    }
}

#[test]
fn hessian_vec_matches_gradient_differences() {
    let samples = noisy_weights(400);
    for alpha in [0.0, 0.05, 2.0] {
        let params = ProblemParams::new(&samples, alpha, (0.2, 3.0), 12, KernelKind::Exponential)
            .unwrap();
        let n = params.dim();
        let mut objective = ContinObjective::new(&params);
        let x = test_point(12);
        let v: Vec<f64> = (0..n).map(|k| ((k * 37 % 11) as f64 - 5.0) / 5.0).collect();
        let h = 1e-4;

        let mut g0 = vec![0.0; n];
        let mut g1 = vec![0.0; n];
        let mut hv = vec![0.0; n];
        objective.gradient(&x, &mut g0);
        let shifted: Vec<f64> = x.iter().zip(&v).map(|(a, b)| a + h * b).collect();
        objective.gradient(&shifted, &mut g1);
        objective.hessian_vec(&x, &v, &mut hv);

        for k in 0..n {
            let fd = (g1[k] - g0[k]) / h;
            assert!(
                (fd - hv[k]).abs() <= 1e-4 * (1.0 + hv[k].abs()),
                "alpha {alpha}, component {k}: fd {fd} vs hv {}",
                hv[k]
            );
        }
    }
}

#[test]
fn hessian_is_symmetric() {
    let samples = noisy_weights(200);
    let params = ProblemParams::new(&samples, 0.4, (0.2, 3.0), 8, KernelKind::Lorentzian).unwrap();
    let n = params.dim();
    let mut objective = ContinObjective::new(&params);
    let x = test_point(8);
    let u: Vec<f64> = (0..n).map(|k| (k as f64 * 0.7).cos()).collect();
    let v: Vec<f64> = (0..n).map(|k| (k as f64 * 1.3).sin()).collect();
    let mut hu = vec![0.0; n];
    let mut hv = vec![0.0; n];
    objective.hessian_vec(&x, &u, &mut hu);
    objective.hessian_vec(&x, &v, &mut hv);
    let vhu: f64 = v.iter().zip(&hu).map(|(a, b)| a * b).sum();
    let uhv: f64 = u.iter().zip(&hv).map(|(a, b)| a * b).sum();
    assert!((vhu - uhv).abs() <= 1e-9 * vhu.abs().max(1.0));
}

#[test]
fn objective_decomposes() {
    let samples = noisy_weights(100);
    let params = ProblemParams::new(&samples, 0.5, (0.2, 3.0), 6, KernelKind::Exponential).unwrap();
    let mut objective = ContinObjective::new(&params);
    let x = test_point(6);

    let mut z = vec![0.0; params.n_samples()];
    params.predict(&x, &mut z);
    let misfit: f64 = (0..params.n_samples())
        .map(|i| params.weights()[i] * (params.y()[i] - z[i]).powi(2))
        .sum();
    let expected = misfit + 0.25 * curvature_penalty(&x[..6]);

    let mut grad = vec![0.0; 7];
    let combined = objective.value_and_gradient(&x, &mut grad);
    assert!((objective.value(&x) - expected).abs() <= 1e-10 * expected);
    assert!((combined - expected).abs() <= 1e-10 * expected);

    // Offset derivative is 2 Σ w (z - y).
    let d_b: f64 = (0..params.n_samples())
        .map(|i| 2.0 * params.weights()[i] * (z[i] - params.y()[i]))
        .sum();
    assert!((grad[6] - d_b).abs() <= 1e-10 * d_b.abs().max(1.0));
}
