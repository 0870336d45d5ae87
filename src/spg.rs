//! Spectral projected gradient (SPG2) with a non-monotone line search.
//!
//! Direction `d = P(x - λ ∇f) - x` with the Barzilai-Borwein step
//! `λ = sᵀs / sᵀy`, accepted when
//! `f(x + t d) <= max(last M values) + γ t ∇fᵀd`; rejected trial steps shrink
//! through safeguarded quadratic interpolation. Only values and gradients are
//! used.

use std::collections::VecDeque;
use std::time::Instant;

use crate::bounds::Bounds;
use crate::report::{IterationReport, Reporter, SolveStatus, SolverStats};
use crate::solver::{
    budget_status, check_dims, dot, finish_stats, max_abs_diff, stall_status, step_converged,
    BoxMinimizer, Objective, ReporterSlot, SolveError, SolverOptions,
};

/// SPG parameters.
#[derive(Debug, Clone)]
pub struct SpgOptions {
    /// Number of past values in the non-monotone reference.
    pub memory: usize,
    /// Sufficient decrease constant.
    pub gamma: f64,
    /// Interpolated step must lie in [sigma1, sigma2 * t].
    pub sigma1: f64,
    pub sigma2: f64,
    /// Safeguards of the spectral step λ.
    pub lambda_min: f64,
    pub lambda_max: f64,
    /// Trial steps per iteration before giving up.
    pub max_backtracks: usize,
}

impl Default for SpgOptions {
    fn default() -> Self {
        Self {
            memory: 10,
            gamma: 1e-4,
            sigma1: 0.1,
            sigma2: 0.9,
            lambda_min: 1e-30,
            lambda_max: 1e30,
            max_backtracks: 100,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpgSolver {
    options: SpgOptions,
    grad: Vec<f64>,
    grad_next: Vec<f64>,
    direction: Vec<f64>,
    x_trial: Vec<f64>,
}

impl SpgSolver {
    pub fn new(options: SpgOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &SpgOptions {
        &self.options
    }

    fn clamp_lambda(&self, lambda: f64) -> f64 {
        lambda.max(self.options.lambda_min).min(self.options.lambda_max)
    }
}

impl BoxMinimizer for SpgSolver {
    fn name(&self) -> &'static str {
        "spg"
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
        self.grad.resize(n, 0.0);
        self.grad_next.resize(n, 0.0);
        self.direction.resize(n, 0.0);
        self.x_trial.resize(n, 0.0);

        bounds.project(x);
        let mut fn_evals = 1;
        let mut grad_evals = 1;
        let mut cost = objective.value_and_gradient(x, &mut self.grad);
        let mut grad_inf = bounds.projected_gradient_inf(x, &self.grad);
        let mut last_step_norm = 0.0;
        let memory = self.options.memory.max(1);
        let mut history: VecDeque<f64> = VecDeque::with_capacity(memory);
        history.push_back(cost);

        macro_rules! done {
            ($status:expr, $iterations:expr) => {{
                let stats = SolverStats {
                    status: $status,
                    iterations: $iterations,
                    cost,
                    grad_inf,
                    step_norm: last_step_norm,
                    fn_evals,
                    grad_evals,
                    hv_evals: 0,
                };
                return Ok(finish_stats(stats, x, start_time, &mut reporter));
            }};
        }

        if !cost.is_finite() {
            done!(SolveStatus::NumericalFailure, 0);
        }
        let mut lambda = if grad_inf > 0.0 {
            self.clamp_lambda(1.0 / grad_inf)
        } else {
            1.0
        };

        for iter in 0..options.max_iters {
            if grad_inf <= options.grad_tol {
                done!(SolveStatus::ConvergedGradient, iter);
            }
            if cost <= options.cost_tol {
                done!(SolveStatus::ConvergedCost, iter);
            }

            for i in 0..n {
                self.direction[i] = bounds.clamp(i, x[i] - lambda * self.grad[i]) - x[i];
            }
            let gtd = dot(&self.grad, &self.direction);
            let reference = history.iter().copied().fold(f64::NEG_INFINITY, f64::max);

            let mut t = 1.0;
            let mut accepted = None;
            for evals in 1..=self.options.max_backtracks {
                for i in 0..n {
                    self.x_trial[i] = x[i] + t * self.direction[i];
                }
                let trial = objective.value(&self.x_trial);
                fn_evals += 1;
                if trial.is_finite() && trial <= reference + self.options.gamma * t * gtd {
                    accepted = Some((trial, t, evals));
                    break;
                }
                let denom = trial - cost - t * gtd;
                let t_interp = -0.5 * t * t * gtd / denom;
                t = if trial.is_finite()
                    && t_interp >= self.options.sigma1
                    && t_interp <= self.options.sigma2 * t
                {
                    t_interp
                } else {
                    0.5 * t
                };
            }

            let Some((trial_cost, step_length, evals)) = accepted else {
                log::debug!(
                    "spg line search failed at iteration {iter}, f = {cost:e}, proj grad = {grad_inf:e}"
                );
                let status = if gtd.is_finite() {
                    stall_status(grad_inf, options)
                } else {
                    SolveStatus::NumericalFailure
                };
                done!(status, iter);
            };

            objective.gradient(&self.x_trial, &mut self.grad_next);
            grad_evals += 1;

            let mut sts = 0.0;
            let mut sty = 0.0;
            for i in 0..n {
                let s = self.x_trial[i] - x[i];
                let y = self.grad_next[i] - self.grad[i];
                sts += s * s;
                sty += s * y;
            }
            lambda = if sty <= 0.0 {
                self.options.lambda_max
            } else {
                self.clamp_lambda(sts / sty)
            };

            let step_norm = max_abs_diff(&self.x_trial, x);
            last_step_norm = step_norm;
            x.copy_from_slice(&self.x_trial);
            core::mem::swap(&mut self.grad, &mut self.grad_next);
            cost = trial_cost;
            grad_inf = bounds.projected_gradient_inf(x, &self.grad);
            if history.len() == memory {
                history.pop_front();
            }
            history.push_back(cost);

            if let Some(reporter) = reporter.as_mut() {
                reporter.on_iteration(
                    &IterationReport {
                        iteration: iter,
                        cost,
                        grad_inf,
                        step_length,
                        step_norm,
                        line_search_evals: evals,
                        inner_iterations: 0,
                    },
                    x,
                );
            }

            if step_converged(step_norm, x, options) {
                if grad_inf <= options.grad_tol {
                    done!(SolveStatus::ConvergedGradient, iter + 1);
                }
                done!(SolveStatus::ConvergedStep, iter + 1);
            }
        }

        done!(budget_status(cost, grad_inf, options), options.max_iters);
    }
}
