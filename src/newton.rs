//! Projected Newton-CG for smooth objectives on a box.
//!
//! Each iteration:
//! - Splits the variables into an ε-active set (sitting on a bound with the
//!   gradient pushing outward) and the free set, with
//!   ε = min(active_eps, ‖P(x - ∇f) - x‖₂).
//! - Solves `H_FF d_F = -g_F` with conjugate gradients using only
//!   Hessian-vector products; active components of `d` are zero.
//! - Backtracks along the projection arc `x(t) = P(x + t d)` until
//!   `f(x(t)) <= f(x) + σ ∇f·(x(t) - x)`.
//! - Falls back to a projected steepest-descent step, starting from the
//!   Cauchy step length `g_Fᵀg_F / g_FᵀH g_F`, when the Newton direction fails.

use std::time::Instant;

use crate::bounds::Bounds;
use crate::report::{IterationReport, Reporter, SolveStatus, SolverStats};
use crate::solver::{
    budget_status, check_dims, dot, finish_stats, max_abs_diff, stall_status, step_converged,
    BoxMinimizer, Objective, ReporterSlot, SolveError, SolverOptions,
};

/// Tuning of [`ProjectedNewton`].
#[derive(Debug, Clone)]
pub struct NewtonOptions {
    /// Upper bound on ε for the active-set test.
    pub active_eps: f64,
    /// Sufficient decrease constant σ of the arc search.
    pub sigma: f64,
    /// Maximum step halvings per direction.
    pub max_backtracks: usize,
    /// CG iterations per outer iteration, as a multiple of the free count.
    pub cg_iters_factor: usize,
}

impl Default for NewtonOptions {
    fn default() -> Self {
        Self {
            active_eps: 1e-8,
            sigma: 1e-4,
            max_backtracks: 60,
            cg_iters_factor: 4,
        }
    }
}

/// Projected Newton-CG backend.
#[derive(Debug, Clone, Default)]
pub struct ProjectedNewton {
    options: NewtonOptions,
    work: Workspace,
}

#[derive(Debug, Clone, Default)]
struct Workspace {
    grad: Vec<f64>,
    direction: Vec<f64>,
    residual: Vec<f64>,
    search: Vec<f64>,
    hp: Vec<f64>,
    x_trial: Vec<f64>,
    free: Vec<bool>,
}

impl Workspace {
    fn resize(&mut self, n: usize) {
        self.grad.resize(n, 0.0);
        self.direction.resize(n, 0.0);
        self.residual.resize(n, 0.0);
        self.search.resize(n, 0.0);
        self.hp.resize(n, 0.0);
        self.x_trial.resize(n, 0.0);
        self.free.resize(n, true);
    }
}

struct Counters {
    fn_evals: usize,
    grad_evals: usize,
    hv_evals: usize,
}

struct ArcStep {
    cost: f64,
    step_length: f64,
    evals: usize,
}

impl ProjectedNewton {
    pub fn new(options: NewtonOptions) -> Self {
        Self {
            options,
            work: Workspace::default(),
        }
    }

    pub fn options(&self) -> &NewtonOptions {
        &self.options
    }

    /// Marks the ε-free variables and returns how many there are.
    fn classify(&mut self, bounds: &Bounds, x: &[f64], eps: f64) -> usize {
        let lower = bounds.lower();
        let upper = bounds.upper();
        let mut count = 0;
        for i in 0..x.len() {
            let g = self.work.grad[i];
            let at_lower = x[i] <= lower[i] + eps && g > 0.0;
            let at_upper = x[i] >= upper[i] - eps && g < 0.0;
            self.work.free[i] = !(at_lower || at_upper);
            if self.work.free[i] {
                count += 1;
            }
        }
        count
    }

    /// Approximately solves H_FF d_F = -g_F. Returns the CG iteration count.
    fn conjugate_gradient(
        &mut self,
        objective: &mut dyn Objective,
        x: &[f64],
        free_count: usize,
        counters: &mut Counters,
    ) -> usize {
        let w = &mut self.work;
        let n = x.len();
        for i in 0..n {
            w.direction[i] = 0.0;
            w.residual[i] = if w.free[i] { -w.grad[i] } else { 0.0 };
            w.search[i] = w.residual[i];
        }
        let mut rr = dot(&w.residual, &w.residual);
        let g_norm = rr.sqrt();
        let tol = g_norm.sqrt().min(0.1) * g_norm;
        let max_iters = self.options.cg_iters_factor.max(1) * free_count.max(1);

        for k in 0..max_iters {
            objective.hessian_vec(x, &w.search, &mut w.hp);
            counters.hv_evals += 1;
            for i in 0..n {
                if !w.free[i] {
                    w.hp[i] = 0.0;
                }
            }
            let curvature = dot(&w.search, &w.hp);
            if !(curvature > f64::EPSILON * dot(&w.search, &w.search)) {
                if k == 0 {
                    w.direction.copy_from_slice(&w.search);
                }
                return k;
            }
            let step = rr / curvature;
            for i in 0..n {
                w.direction[i] += step * w.search[i];
                w.residual[i] -= step * w.hp[i];
            }
            let rr_next = dot(&w.residual, &w.residual);
            if rr_next.sqrt() <= tol {
                return k + 1;
            }
            let beta = rr_next / rr;
            rr = rr_next;
            for i in 0..n {
                w.search[i] = w.residual[i] + beta * w.search[i];
            }
        }
        max_iters
    }

    /// Backtracks along P(x + t d) starting from `t0`.
    fn arc_search(
        &mut self,
        objective: &mut dyn Objective,
        bounds: &Bounds,
        x: &[f64],
        cost: f64,
        t0: f64,
        counters: &mut Counters,
    ) -> Option<ArcStep> {
        let w = &mut self.work;
        let mut t = t0;
        for evals in 1..=self.options.max_backtracks {
            let mut decrease = 0.0;
            for i in 0..x.len() {
                w.x_trial[i] = bounds.clamp(i, x[i] + t * w.direction[i]);
                decrease += w.grad[i] * (w.x_trial[i] - x[i]);
            }
            let trial = objective.value(&w.x_trial);
            counters.fn_evals += 1;
            if decrease < 0.0 && trial.is_finite() && trial <= cost + self.options.sigma * decrease {
                return Some(ArcStep {
                    cost: trial,
                    step_length: t,
                    evals,
                });
            }
            t *= 0.5;
        }
        None
    }

    /// Loads d = -g on the free set and returns the Cauchy step length.
    fn steepest_descent(&mut self, objective: &mut dyn Objective, x: &[f64], counters: &mut Counters) -> f64 {
        let w = &mut self.work;
        for i in 0..x.len() {
            w.direction[i] = if w.free[i] { -w.grad[i] } else { 0.0 };
        }
        objective.hessian_vec(x, &w.direction, &mut w.hp);
        counters.hv_evals += 1;
        for i in 0..x.len() {
            if !w.free[i] {
                w.hp[i] = 0.0;
            }
        }
        let gg = dot(&w.direction, &w.direction);
        let ghg = dot(&w.direction, &w.hp);
        if ghg > 0.0 && ghg.is_finite() {
            gg / ghg
        } else {
            1.0
        }
    }
}

impl BoxMinimizer for ProjectedNewton {
    fn name(&self) -> &'static str {
        "projected-newton-cg"
    }

    fn minimize(
        &mut self,
        objective: &mut dyn Objective,
        bounds: &Bounds,
        x: &mut [f64],
        options: &SolverOptions,
        reporter: Option<&mut dyn Reporter>,
    ) -> Result<SolverStats, SolveError> {
        let n = objective.dim();
        check_dims(n, bounds, x)?;
        let start_time = options.verbose.then(Instant::now);
        let mut reporter = ReporterSlot::new(reporter, options.verbose);
        self.work.resize(n);

        bounds.project(x);
        let mut counters = Counters {
            fn_evals: 1,
            grad_evals: 1,
            hv_evals: 0,
        };
        let mut cost = objective.value_and_gradient(x, &mut self.work.grad);
        let mut grad_inf = bounds.projected_gradient_inf(x, &self.work.grad);
        let mut last_step_norm = 0.0;

        let stats = |status, iterations, cost, grad_inf, step_norm, c: &Counters| SolverStats {
            status,
            iterations,
            cost,
            grad_inf,
            step_norm,
            fn_evals: c.fn_evals,
            grad_evals: c.grad_evals,
            hv_evals: c.hv_evals,
        };

        if !cost.is_finite() {
            let stats = stats(SolveStatus::NumericalFailure, 0, cost, grad_inf, 0.0, &counters);
            return Ok(finish_stats(stats, x, start_time, &mut reporter));
        }

        for iter in 0..options.max_iters {
            if grad_inf <= options.grad_tol {
                let stats = stats(SolveStatus::ConvergedGradient, iter, cost, grad_inf, last_step_norm, &counters);
                return Ok(finish_stats(stats, x, start_time, &mut reporter));
            }
            if cost <= options.cost_tol {
                let stats = stats(SolveStatus::ConvergedCost, iter, cost, grad_inf, last_step_norm, &counters);
                return Ok(finish_stats(stats, x, start_time, &mut reporter));
            }

            let eps = self
                .options
                .active_eps
                .min(bounds.projected_gradient_norm(x, &self.work.grad));
            let free_count = self.classify(bounds, x, eps);

            let mut inner = self.conjugate_gradient(objective, x, free_count, &mut counters);
            let mut accepted = if dot(&self.work.grad, &self.work.direction) < 0.0 {
                self.arc_search(objective, bounds, x, cost, 1.0, &mut counters)
            } else {
                None
            };
            if accepted.is_none() {
                let t0 = self.steepest_descent(objective, x, &mut counters);
                inner = 0;
                accepted = self.arc_search(objective, bounds, x, cost, t0, &mut counters);
            }

            let Some(step) = accepted else {
                // No representable decrease left along either direction.
                log::debug!(
                    "projected newton stalled at iteration {iter}, f = {cost:e}, proj grad = {grad_inf:e}"
                );
                let status = stall_status(grad_inf, options);
                let stats = stats(status, iter, cost, grad_inf, 0.0, &counters);
                return Ok(finish_stats(stats, x, start_time, &mut reporter));
            };

            let step_norm = max_abs_diff(&self.work.x_trial, x);
            last_step_norm = step_norm;
            x.copy_from_slice(&self.work.x_trial);
            cost = step.cost;
            objective.gradient(x, &mut self.work.grad);
            counters.grad_evals += 1;
            grad_inf = bounds.projected_gradient_inf(x, &self.work.grad);

            if let Some(reporter) = reporter.as_mut() {
                reporter.on_iteration(
                    &IterationReport {
                        iteration: iter,
                        cost,
                        grad_inf,
                        step_length: step.step_length,
                        step_norm,
                        line_search_evals: step.evals,
                        inner_iterations: inner,
                    },
                    x,
                );
            }

            if step_converged(step_norm, x, options) {
                let status = if grad_inf <= options.grad_tol {
                    SolveStatus::ConvergedGradient
                } else {
                    SolveStatus::ConvergedStep
                };
                let stats = stats(status, iter + 1, cost, grad_inf, step_norm, &counters);
                return Ok(finish_stats(stats, x, start_time, &mut reporter));
            }
        }

        let stats = stats(
            budget_status(cost, grad_inf, options),
            options.max_iters,
            cost,
            grad_inf,
            last_step_norm,
            &counters,
        );
        Ok(finish_stats(stats, x, start_time, &mut reporter))
    }
}
