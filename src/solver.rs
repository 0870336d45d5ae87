use core::fmt;

use std::time::{Duration, Instant};

use crate::bounds::Bounds;
use crate::report::{emit_line, format_iterate, Reporter, SolveStatus, SolverStats, StdoutReporter};

/// Smooth objective f: Rⁿ → R consumed by a [`BoxMinimizer`].
pub trait Objective {
    /// Number of variables n.
    fn dim(&self) -> usize;
    /// f(x).
    fn value(&mut self, x: &[f64]) -> f64;
    /// ∇f(x).
    fn gradient(&mut self, x: &[f64], grad: &mut [f64]);
    /// ∇²f(x) v.
    fn hessian_vec(&mut self, x: &[f64], v: &[f64], hv: &mut [f64]);

    /// Optional combined evaluation; default calls value then gradient.
    fn value_and_gradient(&mut self, x: &[f64], grad: &mut [f64]) -> f64 {
        let value = self.value(x);
        self.gradient(x, grad);
        value
    }
}

/// A box-constrained minimizer: min f(x) subject to `bounds`.
///
/// `x` holds the starting point on entry (projected onto the box first) and
/// the final iterate on return, whether or not the method converged.
pub trait BoxMinimizer {
    fn name(&self) -> &'static str;

    fn minimize(
        &mut self,
        objective: &mut dyn Objective,
        bounds: &Bounds,
        x: &mut [f64],
        options: &SolverOptions,
        reporter: Option<&mut dyn Reporter>,
    ) -> Result<SolverStats, SolveError>;
}

/// Errors specific to a solve call.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveError {
    /// The provided x has the wrong length.
    DimensionMismatch { expected: usize, actual: usize },
    /// The bounds have the wrong length.
    BoundsMismatch { expected: usize, actual: usize },
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { expected, actual } => {
                write!(f, "x length {actual} does not match expected {expected}")
            }
            Self::BoundsMismatch { expected, actual } => {
                write!(f, "bounds length {actual} does not match expected {expected}")
            }
        }
    }
}

impl std::error::Error for SolveError {}

/// Options shared by the box-constrained backends.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Maximum number of iterations.
    pub max_iters: usize,
    /// Converge when ‖P(x - ∇f) - x‖∞ <= grad_tol.
    pub grad_tol: f64,
    /// Converge when ‖Δx‖∞ <= step_tol * (‖x‖∞ + step_tol).
    pub step_tol: f64,
    /// Converge when f(x) <= cost_tol.
    pub cost_tol: f64,
    /// A failed line search with ‖P(x - ∇f) - x‖∞ above this is a
    /// numerical failure rather than a stationary stop.
    pub stall_tol: f64,
    /// Emit per-iteration diagnostics to stdout by default.
    pub verbose: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iters: 100_000,
            grad_tol: 1e-6,
            step_tol: 1e-14,
            cost_tol: f64::NEG_INFINITY,
            stall_tol: 1e-3,
            verbose: false,
        }
    }
}

pub(crate) enum ReporterSlot<'a> {
    External(&'a mut dyn Reporter),
    Local(StdoutReporter),
    None,
}

impl<'a> ReporterSlot<'a> {
    pub(crate) fn new(reporter: Option<&'a mut dyn Reporter>, verbose: bool) -> Self {
        match reporter {
            Some(r) => Self::External(r),
            None if verbose => Self::Local(StdoutReporter::new()),
            None => Self::None,
        }
    }

    pub(crate) fn as_mut(&mut self) -> Option<&mut dyn Reporter> {
        match self {
            Self::External(r) => Some(*r),
            Self::Local(r) => Some(r),
            Self::None => None,
        }
    }
}

/// Checks x and bounds against the objective dimension.
pub(crate) fn check_dims(n: usize, bounds: &Bounds, x: &[f64]) -> Result<(), SolveError> {
    if x.len() != n {
        return Err(SolveError::DimensionMismatch {
            expected: n,
            actual: x.len(),
        });
    }
    if bounds.len() != n {
        return Err(SolveError::BoundsMismatch {
            expected: n,
            actual: bounds.len(),
        });
    }
    Ok(())
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    let mut sum = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        sum += x * y;
    }
    sum
}

pub(crate) fn max_abs(x: &[f64]) -> f64 {
    let mut max = 0.0;
    for &v in x {
        let v = v.abs();
        if v > max {
            max = v;
        }
    }
    max
}

pub(crate) fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    let mut max = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let v = (x - y).abs();
        if v > max {
            max = v;
        }
    }
    max
}

/// Status once the iteration budget is spent; the last accepted iterate may
/// already satisfy a stopping test.
pub(crate) fn budget_status(cost: f64, grad_inf: f64, options: &SolverOptions) -> SolveStatus {
    if grad_inf <= options.grad_tol {
        SolveStatus::ConvergedGradient
    } else if cost <= options.cost_tol {
        SolveStatus::ConvergedCost
    } else {
        SolveStatus::MaxIterations
    }
}

/// Status when no trial step gives a decrease.
pub(crate) fn stall_status(grad_inf: f64, options: &SolverOptions) -> SolveStatus {
    if grad_inf <= options.grad_tol {
        SolveStatus::ConvergedGradient
    } else if grad_inf <= options.stall_tol {
        SolveStatus::ConvergedStep
    } else {
        SolveStatus::NumericalFailure
    }
}

pub(crate) fn step_converged(step_norm: f64, x: &[f64], options: &SolverOptions) -> bool {
    step_norm <= options.step_tol * (max_abs(x) + options.step_tol)
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs >= 1.0 {
        format!("{:.3} s", secs)
    } else if secs >= 1e-3 {
        format!("{:.3} ms", secs * 1e3)
    } else if secs >= 1e-6 {
        format!("{:.3} us", secs * 1e6)
    } else {
        format!("{:.0} ns", secs * 1e9)
    }
}

pub(crate) fn finish_stats(
    stats: SolverStats,
    x: &[f64],
    start_time: Option<Instant>,
    reporter: &mut ReporterSlot<'_>,
) -> SolverStats {
    if let Some(reporter) = reporter.as_mut() {
        reporter.on_finish();
    }
    if let Some(start) = start_time {
        let elapsed = format_duration(start.elapsed());
        emit_line(&format!(
            "{} after {} iterations: {}",
            stats.status,
            stats.iterations,
            format_iterate(x, 3, stats.cost)
        ));
        emit_line(&format!("time: {elapsed}"));
    }
    stats
}
