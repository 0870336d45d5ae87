use core::fmt;
use std::io;

use crate::bounds::{Bounds, BoundsError};
use crate::kernel::KernelKind;
use crate::newton::ProjectedNewton;
use crate::objective::ContinObjective;
use crate::problem::{write_columns, ProblemError, ProblemParams, Samples};
use crate::regularization::curvature_penalty;
use crate::report::{Reporter, SolveStatus, SolverStats};
use crate::solver::{BoxMinimizer, SolveError, SolverOptions};

/// Errors of an inversion run.
#[derive(Debug, Clone, PartialEq)]
pub enum InversionError {
    /// The inputs could not be discretized.
    Problem(ProblemError),
    /// The configured box is empty or malformed.
    Bounds(BoundsError),
    /// The backend rejected the call.
    Solve(SolveError),
    /// The backend stopped before reaching its optimality test.
    OptimizerNonconvergence { status: SolveStatus, iterations: usize },
}

impl fmt::Display for InversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Problem(err) => write!(f, "invalid problem: {err}"),
            Self::Bounds(err) => write!(f, "invalid bounds: {err}"),
            Self::Solve(err) => write!(f, "solver error: {err}"),
            Self::OptimizerNonconvergence { status, iterations } => {
                write!(f, "optimizer did not converge: {status} after {iterations} iterations")
            }
        }
    }
}

impl std::error::Error for InversionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Problem(err) => Some(err),
            Self::Bounds(err) => Some(err),
            Self::Solve(err) => Some(err),
            Self::OptimizerNonconvergence { .. } => None,
        }
    }
}

impl From<ProblemError> for InversionError {
    fn from(err: ProblemError) -> Self {
        Self::Problem(err)
    }
}

impl From<BoundsError> for InversionError {
    fn from(err: BoundsError) -> Self {
        Self::Bounds(err)
    }
}

impl From<SolveError> for InversionError {
    fn from(err: SolveError) -> Self {
        Self::Solve(err)
    }
}

/// Box constraints, starting point and solver options of an inversion.
#[derive(Debug, Clone)]
pub struct InversionOptions {
    /// Box for every amplitude g_j.
    pub amplitude_bounds: (f64, f64),
    /// Box for the offset b.
    pub offset_bounds: (f64, f64),
    /// Starting value of every g_j.
    pub initial_amplitude: f64,
    /// Starting value of b.
    pub initial_offset: f64,
    pub solver: SolverOptions,
}

impl Default for InversionOptions {
    fn default() -> Self {
        Self {
            amplitude_bounds: (0.0, 100.0),
            offset_bounds: (f64::NEG_INFINITY, f64::INFINITY),
            initial_amplitude: 1.0,
            initial_offset: 0.0,
            solver: SolverOptions::default(),
        }
    }
}

impl InversionOptions {
    /// Bounds for x = (g_0 … g_{m-1}, b).
    pub fn bounds(&self, m: usize) -> Result<Bounds, BoundsError> {
        let (g_lo, g_hi) = self.amplitude_bounds;
        let (b_lo, b_hi) = self.offset_bounds;
        let mut lower = vec![g_lo; m + 1];
        let mut upper = vec![g_hi; m + 1];
        lower[m] = b_lo;
        upper[m] = b_hi;
        Bounds::new(lower, upper)
    }

    /// Starting point x = (g_0 … g_{m-1}, b).
    pub fn initial_point(&self, m: usize) -> Vec<f64> {
        let mut x = vec![self.initial_amplitude; m + 1];
        x[m] = self.initial_offset;
        x
    }
}

/// Recovered spectral function s(τ_j) = g_j and offset b.
#[derive(Debug, Clone)]
pub struct InversionResult {
    tau: Vec<f64>,
    amplitudes: Vec<f64>,
    offset: f64,
    fitted: Vec<f64>,
    stats: SolverStats,
}

impl InversionResult {
    /// Support grid τ.
    pub fn tau(&self) -> &[f64] {
        &self.tau
    }

    /// Amplitudes g at each τ_j.
    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Predicted signal at the sample times.
    pub fn fitted(&self) -> &[f64] {
        &self.fitted
    }

    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }

    pub fn status(&self) -> SolveStatus {
        self.stats.status
    }

    pub fn is_converged(&self) -> bool {
        self.stats.status.is_converged()
    }

    /// Σ_j (D2 g)_j² of the recovered amplitudes.
    pub fn curvature(&self) -> f64 {
        curvature_penalty(&self.amplitudes)
    }

    /// Turns a non-converged run into [`InversionError::OptimizerNonconvergence`].
    pub fn ensure_converged(&self) -> Result<(), InversionError> {
        if self.is_converged() {
            Ok(())
        } else {
            Err(InversionError::OptimizerNonconvergence {
                status: self.stats.status,
                iterations: self.stats.iterations,
            })
        }
    }

    /// Writes `τ<TAB>g` rows, one per grid point. The offset is not included.
    pub fn write_tsv<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        write_columns(out, &self.tau, &self.amplitudes)
    }
}

/// Minimizes the regularized objective of `params` with `minimizer`.
///
/// Non-convergence is reported through the result's status, not as an error.
pub fn invert_with(
    params: &ProblemParams,
    minimizer: &mut dyn BoxMinimizer,
    options: &InversionOptions,
    reporter: Option<&mut dyn Reporter>,
) -> Result<InversionResult, InversionError> {
    let m = params.n_tau();
    let bounds = options.bounds(m)?;
    let mut x = options.initial_point(m);
    let mut objective = ContinObjective::new(params);

    log::debug!(
        "inverting {} samples on {} grid points with {} (alpha = {})",
        params.n_samples(),
        m,
        minimizer.name(),
        params.alpha()
    );
    let stats = minimizer.minimize(&mut objective, &bounds, &mut x, &options.solver, reporter)?;
    if stats.status.is_converged() {
        log::info!("convergence in {} iterations", stats.iterations);
    } else {
        log::warn!("stopped with {} iterations: {}", stats.iterations, stats.status);
    }

    let mut fitted = vec![0.0; params.n_samples()];
    params.predict(&x, &mut fitted);
    let offset = x[m];
    x.truncate(m);
    Ok(InversionResult {
        tau: params.tau().to_vec(),
        amplitudes: x,
        offset,
        fitted,
        stats,
    })
}

/// Discretizes the samples and inverts them with the projected Newton-CG
/// backend. The problem parameters live only for the duration of the call.
pub fn invert(
    samples: &Samples,
    alpha: f64,
    tau_range: (f64, f64),
    m: usize,
    kernel: KernelKind,
    options: &InversionOptions,
) -> Result<InversionResult, InversionError> {
    let params = ProblemParams::new(samples, alpha, tau_range, m, kernel)?;
    let mut minimizer = ProjectedNewton::default();
    invert_with(&params, &mut minimizer, options, None)
}
