//! Regularized inversion of linear Fredholm equations (CONTIN-style).
//!
//! Given samples `y(t_i)` with variances `var_i`, this crate recovers a
//! non-negative spectral function `s(τ)` and a constant offset `b` such that
//! `y(t) ≈ ∫ K(t, τ) s(τ) dτ + b`.
//!
//! How it works (high level):
//! - Discretize τ on an equally spaced grid; the integral becomes
//!   `Σ_j c_j K(t_i, τ_j) g_j` with trapezoidal weights `c`.
//! - Minimize `Σ w_i (y_i - z_i)² + α² ‖D2 g‖²` over `x = (g, b)` inside a
//!   box (non-negative amplitudes by default). `D2` is the second difference
//!   with natural boundaries and `α` sets the smoothness.
//! - The objective supplies value, gradient and Hessian-vector products to any
//!   [`BoxMinimizer`]; two backends ship with the crate
//!   ([`ProjectedNewton`] and [`SpgSolver`]).
//!
//! Calling it:
//! - Build [`Samples`] (or synthesize them with [`synthetic::multi_exponential`]).
//! - Call [`invert`], or build [`ProblemParams`] yourself and use
//!   [`invert_with`] to pick the backend and attach a [`Reporter`].
//!
//! Example:
//! ```rust,no_run
//! use contin_rs::synthetic::{multi_exponential, DecayComponent};
//! use contin_rs::{invert, InversionOptions, KernelKind};
//!
//! let components = [DecayComponent::new(1.0, 0.4), DecayComponent::new(2.0, 1.6)];
//! let samples = multi_exponential(&components, 0.0, 4.0, 1000).unwrap();
//! let result = invert(
//!     &samples,
//!     0.01,
//!     (0.1, 4.0),
//!     10,
//!     KernelKind::Exponential,
//!     &InversionOptions::default(),
//! )
//! .unwrap();
//! assert!(result.is_converged());
//! for (tau, g) in result.tau().iter().zip(result.amplitudes()) {
//!     println!("{tau:.3}\t{g:.3}");
//! }
//! println!("offset: {}", result.offset());
//! ```

mod bounds;
mod inversion;
mod kernel;
mod newton;
mod objective;
mod problem;
pub mod regularization;
mod report;
mod solver;
mod spg;
pub mod synthetic;

pub use bounds::{Bounds, BoundsError};
pub use inversion::{invert, invert_with, InversionError, InversionOptions, InversionResult};
pub use kernel::{KernelKind, UnknownKernel};
pub use newton::{NewtonOptions, ProjectedNewton};
pub use objective::{check_gradient, ContinObjective, GradientCheck};
pub use problem::{trapezoid_weights, ProblemError, ProblemParams, Samples, MIN_GRID_POINTS};
pub use report::{EchoReporter, IterationReport, Reporter, SolveStatus, SolverStats, StdoutReporter};
pub use solver::{BoxMinimizer, Objective, SolveError, SolverOptions};
pub use spg::{SpgOptions, SpgSolver};
