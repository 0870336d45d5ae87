//! Penalized weighted least squares objective of the inversion.
//!
//! For x = (g, b) with predicted signal z = A g + b, `A[i][j] = c_j K[i][j]`:
//!
//! ```text
//! f(x)    = Σ_i w_i (y_i - z_i)² + α² Σ_j (D2 g)_j²
//! ∂f/∂g   = 2 Aᵀ W (z - y) + 2α² D2 D2 g
//! ∂f/∂b   = 2 Σ_i w_i (z_i - y_i)
//! H v     = 2 Jᵀ W J v + 2α² [D2 D2 v_g; 0],   J = [A 1]
//! ```
//!
//! f is quadratic, so the Hessian does not depend on x; products are formed
//! matrix-free in O(n m).

use crate::problem::ProblemParams;
use crate::regularization::{curvature_penalty, fourth_difference};
use crate::solver::Objective;

/// Evaluator bound to a read-only [`ProblemParams`].
///
/// Scratch buffers are allocated once in [`ContinObjective::new`]; evaluations
/// do not allocate.
#[derive(Debug, Clone)]
pub struct ContinObjective<'a> {
    params: &'a ProblemParams,
    z: Vec<f64>,
    scratch_n: Vec<f64>,
    scratch_m: Vec<f64>,
    d4: Vec<f64>,
    adjoint: Vec<f64>,
}

impl<'a> ContinObjective<'a> {
    pub fn new(params: &'a ProblemParams) -> Self {
        let n = params.n_samples();
        let m = params.n_tau();
        Self {
            params,
            z: vec![0.0; n],
            scratch_n: vec![0.0; n],
            scratch_m: vec![0.0; m],
            d4: vec![0.0; m],
            adjoint: vec![0.0; m],
        }
    }

    pub fn params(&self) -> &'a ProblemParams {
        self.params
    }

    /// Returns (data misfit Σ w (y - z)², curvature Σ (D2 g)²) at x.
    ///
    /// The objective value is `misfit + α² curvature`.
    pub fn components(&mut self, x: &[f64]) -> (f64, f64) {
        let m = self.params.n_tau();
        self.params.predict(x, &mut self.z);
        (self.misfit(), curvature_penalty(&x[..m]))
    }

    fn misfit(&self) -> f64 {
        let y = self.params.y();
        let w = self.params.weights();
        let mut sum = 0.0;
        for i in 0..self.z.len() {
            let r = y[i] - self.z[i];
            sum += w[i] * r * r;
        }
        sum
    }

    /// Gradient from the predicted signal currently held in `self.z`.
    fn gradient_from_prediction(&mut self, g: &[f64], grad: &mut [f64]) {
        let params = self.params;
        let m = params.n_tau();
        let y = params.y();
        let w = params.weights();

        // scratch_n = W (z - y)
        let mut sum = 0.0;
        for i in 0..self.z.len() {
            let r = w[i] * (self.z[i] - y[i]);
            self.scratch_n[i] = r;
            sum += r;
        }
        params.apply_design_transpose(&self.scratch_n, &mut self.adjoint);
        fourth_difference(g, &mut self.scratch_m, &mut self.d4);

        let reg = 2.0 * params.alpha() * params.alpha();
        for j in 0..m {
            grad[j] = 2.0 * self.adjoint[j] + reg * self.d4[j];
        }
        grad[m] = 2.0 * sum;
    }
}

impl Objective for ContinObjective<'_> {
    fn dim(&self) -> usize {
        self.params.dim()
    }

    fn value(&mut self, x: &[f64]) -> f64 {
        let (misfit, curvature) = self.components(x);
        let alpha = self.params.alpha();
        misfit + alpha * alpha * curvature
    }

    fn gradient(&mut self, x: &[f64], grad: &mut [f64]) {
        debug_assert_eq!(grad.len(), self.dim());
        let m = self.params.n_tau();
        self.params.predict(x, &mut self.z);
        self.gradient_from_prediction(&x[..m], grad);
    }

    fn value_and_gradient(&mut self, x: &[f64], grad: &mut [f64]) -> f64 {
        debug_assert_eq!(grad.len(), self.dim());
        let m = self.params.n_tau();
        let alpha = self.params.alpha();
        self.params.predict(x, &mut self.z);
        let value = self.misfit() + alpha * alpha * curvature_penalty(&x[..m]);
        self.gradient_from_prediction(&x[..m], grad);
        value
    }

    fn hessian_vec(&mut self, _x: &[f64], v: &[f64], hv: &mut [f64]) {
        let params = self.params;
        let m = params.n_tau();
        debug_assert_eq!(v.len(), m + 1);
        debug_assert_eq!(hv.len(), m + 1);
        let w = params.weights();

        // scratch_n = W (A v_g + v_b)
        params.predict(v, &mut self.scratch_n);
        let mut sum = 0.0;
        for (u, &w_i) in self.scratch_n.iter_mut().zip(w) {
            *u *= w_i;
            sum += *u;
        }
        params.apply_design_transpose(&self.scratch_n, &mut self.adjoint);
        fourth_difference(&v[..m], &mut self.scratch_m, &mut self.d4);

        let reg = 2.0 * params.alpha() * params.alpha();
        for j in 0..m {
            hv[j] = 2.0 * self.adjoint[j] + reg * self.d4[j];
        }
        hv[m] = 2.0 * sum;
    }
}

/// One coordinate of a gradient check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientCheck {
    pub index: usize,
    pub analytic: f64,
    pub finite_difference: f64,
}

impl GradientCheck {
    /// |analytic - fd| / max(1, |analytic|).
    pub fn relative_error(&self) -> f64 {
        (self.analytic - self.finite_difference).abs() / self.analytic.abs().max(1.0)
    }
}

/// Compares the analytic gradient with forward differences
/// `(f(x + h e_k) - f(x)) / h` on every coordinate.
pub fn check_gradient<O: Objective + ?Sized>(objective: &mut O, x: &[f64], h: f64) -> Vec<GradientCheck> {
    let n = objective.dim();
    let mut grad = vec![0.0; n];
    let f0 = objective.value_and_gradient(x, &mut grad);
    let mut probe = x.to_vec();
    let mut checks = Vec::with_capacity(n);
    for k in 0..n {
        probe[k] = x[k] + h;
        let fh = objective.value(&probe);
        probe[k] = x[k];
        let check = GradientCheck {
            index: k,
            analytic: grad[k],
            finite_difference: (fh - f0) / h,
        };
        log::trace!(
            "grad[{k}] = ({:.6}, {:.6})",
            check.analytic,
            check.finite_difference
        );
        checks.push(check);
    }
    checks
}
