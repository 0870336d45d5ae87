use core::fmt;
use std::io;

use faer_core::Mat;

use crate::kernel::KernelKind;

/// Smallest support grid that still carries a second-difference stencil.
pub const MIN_GRID_POINTS: usize = 3;

/// Errors raised while building the discretized problem.
#[derive(Debug, Clone, PartialEq)]
pub enum ProblemError {
    /// A dimension is too small or two inputs disagree in length.
    InvalidDimension {
        field: &'static str,
        requirement: &'static str,
        actual: usize,
    },
    /// A value is outside its admissible range.
    InvalidInput {
        field: &'static str,
        index: Option<usize>,
        value: f64,
        reason: &'static str,
    },
    /// The kernel cannot be evaluated at grid point `index`.
    DomainError {
        kernel: KernelKind,
        index: usize,
        tau: f64,
    },
}

impl fmt::Display for ProblemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDimension {
                field,
                requirement,
                actual,
            } => write!(f, "invalid dimension for {field}: {requirement}, got {actual}"),
            Self::InvalidInput {
                field,
                index: Some(index),
                value,
                reason,
            } => write!(f, "invalid {field}[{index}] = {value}: {reason}"),
            Self::InvalidInput {
                field,
                index: None,
                value,
                reason,
            } => write!(f, "invalid {field} = {value}: {reason}"),
            Self::DomainError { kernel, index, tau } => {
                write!(f, "{kernel} kernel undefined at tau[{index}] = {tau}")
            }
        }
    }
}

impl std::error::Error for ProblemError {}

/// Observed samples (t_i, y_i, var_i).
///
/// Lengths agree, there is at least one sample and every variance is a
/// positive finite number.
#[derive(Debug, Clone, PartialEq)]
pub struct Samples {
    t: Vec<f64>,
    y: Vec<f64>,
    variance: Vec<f64>,
}

impl Samples {
    /// Creates a validated sample set.
    pub fn new(t: Vec<f64>, y: Vec<f64>, variance: Vec<f64>) -> Result<Self, ProblemError> {
        if t.is_empty() {
            return Err(ProblemError::InvalidDimension {
                field: "samples",
                requirement: "need at least 1 sample",
                actual: 0,
            });
        }
        if y.len() != t.len() {
            return Err(ProblemError::InvalidDimension {
                field: "y",
                requirement: "must match the length of t",
                actual: y.len(),
            });
        }
        if variance.len() != t.len() {
            return Err(ProblemError::InvalidDimension {
                field: "variance",
                requirement: "must match the length of t",
                actual: variance.len(),
            });
        }
        for (index, &value) in variance.iter().enumerate() {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ProblemError::InvalidInput {
                    field: "variance",
                    index: Some(index),
                    value,
                    reason: "must be positive and finite",
                });
            }
        }
        Ok(Self { t, y, variance })
    }

    /// Samples with unit variance everywhere.
    pub fn with_unit_variance(t: Vec<f64>, y: Vec<f64>) -> Result<Self, ProblemError> {
        let variance = vec![1.0; t.len()];
        Self::new(t, y, variance)
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn t(&self) -> &[f64] {
        &self.t
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn variance(&self) -> &[f64] {
        &self.variance
    }

    /// Writes `t<TAB>y` rows.
    pub fn write_tsv<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        write_columns(out, &self.t, &self.y)
    }
}

pub(crate) fn write_columns<W: io::Write>(out: &mut W, a: &[f64], b: &[f64]) -> io::Result<()> {
    for (x, y) in a.iter().zip(b.iter()) {
        writeln!(out, "{x:.6}\t{y:.6}")?;
    }
    Ok(())
}

/// Discretized inversion problem.
///
/// Holds the kernel matrix `K` (n×m), the trapezoidal quadrature weights `c`,
/// the noise weights `w = 1 / var`, the support grid and the regularization
/// strength. The quadrature-weighted design matrix `A[i][j] = c_j K[i][j]` is
/// cached next to `K`. Nothing here changes after construction.
#[derive(Debug, Clone)]
pub struct ProblemParams {
    samples: Samples,
    kernel_kind: KernelKind,
    tau: Vec<f64>,
    kernel: Mat<f64>,
    design: Mat<f64>,
    quadrature: Vec<f64>,
    weights: Vec<f64>,
    weight_sum: f64,
    alpha: f64,
}

impl ProblemParams {
    /// Builds the discretized problem on `m` equally spaced points of
    /// `[tau_range.0, tau_range.1]`.
    pub fn new(
        samples: &Samples,
        alpha: f64,
        tau_range: (f64, f64),
        m: usize,
        kernel_kind: KernelKind,
    ) -> Result<Self, ProblemError> {
        if m < MIN_GRID_POINTS {
            return Err(ProblemError::InvalidDimension {
                field: "tau grid",
                requirement: "need at least 3 points",
                actual: m,
            });
        }
        if !(alpha >= 0.0 && alpha.is_finite()) {
            return Err(ProblemError::InvalidInput {
                field: "alpha",
                index: None,
                value: alpha,
                reason: "must be non-negative and finite",
            });
        }
        let (tau0, tau1) = tau_range;
        if !tau0.is_finite() {
            return Err(ProblemError::InvalidInput {
                field: "tau0",
                index: None,
                value: tau0,
                reason: "must be finite",
            });
        }
        if !(tau1.is_finite() && tau1 > tau0) {
            return Err(ProblemError::InvalidInput {
                field: "tau1",
                index: None,
                value: tau1,
                reason: "must be finite and greater than tau0",
            });
        }

        let dtau = (tau1 - tau0) / (m - 1) as f64;
        let mut tau: Vec<f64> = (0..m).map(|j| tau0 + j as f64 * dtau).collect();
        // Pin the right end so the grid spans the requested range exactly.
        tau[m - 1] = tau1;

        let t = samples.t();
        for (index, &tau_j) in tau.iter().enumerate() {
            if t.iter().any(|&t_i| !kernel_kind.is_defined(t_i, tau_j)) {
                return Err(ProblemError::DomainError {
                    kernel: kernel_kind,
                    index,
                    tau: tau_j,
                });
            }
        }

        let quadrature = trapezoid_weights(m, dtau);
        let weights: Vec<f64> = samples.variance().iter().map(|v| 1.0 / v).collect();
        let weight_sum = weights.iter().sum();

        let n = samples.len();
        let kernel = Mat::<f64>::from_fn(n, m, |i, j| kernel_kind.eval(t[i], tau[j]));
        let design = Mat::<f64>::from_fn(n, m, |i, j| quadrature[j] * kernel.read(i, j));

        log::debug!(
            "discretized {kernel_kind} kernel: n = {n}, m = {m}, tau in [{tau0}, {tau1}], alpha = {alpha}"
        );

        Ok(Self {
            samples: samples.clone(),
            kernel_kind,
            tau,
            kernel,
            design,
            quadrature,
            weights,
            weight_sum,
            alpha,
        })
    }

    /// Same as [`ProblemParams::new`] with an integer kernel selector
    /// (0 = exponential, 1 = lorentzian).
    pub fn with_selector(
        samples: &Samples,
        alpha: f64,
        tau_range: (f64, f64),
        m: usize,
        selector: i64,
    ) -> Result<Self, ProblemError> {
        let kind = KernelKind::try_from(selector).map_err(|err| ProblemError::InvalidInput {
            field: "kernel",
            index: None,
            value: err.0 as f64,
            reason: "expected 0 (exponential) or 1 (lorentzian)",
        })?;
        Self::new(samples, alpha, tau_range, m, kind)
    }

    /// Number of samples n.
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// Number of grid points m.
    pub fn n_tau(&self) -> usize {
        self.tau.len()
    }

    /// Length of the coefficient vector (g, b).
    pub fn dim(&self) -> usize {
        self.tau.len() + 1
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    pub fn t(&self) -> &[f64] {
        self.samples.t()
    }

    pub fn y(&self) -> &[f64] {
        self.samples.y()
    }

    pub fn tau(&self) -> &[f64] {
        &self.tau
    }

    pub fn kernel_kind(&self) -> KernelKind {
        self.kernel_kind
    }

    /// Kernel matrix K, n×m.
    pub fn kernel_matrix(&self) -> &Mat<f64> {
        &self.kernel
    }

    /// Quadrature-weighted kernel `A[i][j] = c_j K[i][j]`.
    pub fn design_matrix(&self) -> &Mat<f64> {
        &self.design
    }

    /// Trapezoidal weights c.
    pub fn quadrature(&self) -> &[f64] {
        &self.quadrature
    }

    /// Noise weights w = 1 / var.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Σ w_i.
    pub fn weight_sum(&self) -> f64 {
        self.weight_sum
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Predicted signal z = A g + b for x = (g, b).
    pub fn predict(&self, x: &[f64], z: &mut [f64]) {
        let m = self.n_tau();
        debug_assert_eq!(x.len(), m + 1);
        debug_assert_eq!(z.len(), self.n_samples());
        z.fill(x[m]);
        self.apply_design(&x[..m], z);
    }

    /// z += A g.
    pub(crate) fn apply_design(&self, g: &[f64], z: &mut [f64]) {
        let n = self.n_samples();
        // Column-major storage: walk one column at a time.
        for (j, &g_j) in g.iter().enumerate() {
            if g_j == 0.0 {
                continue;
            }
            for i in 0..n {
                z[i] += self.design.read(i, j) * g_j;
            }
        }
    }

    /// out_j = Σ_i A[i][j] r_i.
    pub(crate) fn apply_design_transpose(&self, r: &[f64], out: &mut [f64]) {
        let n = self.n_samples();
        for (j, out_j) in out.iter_mut().enumerate() {
            let mut sum = 0.0;
            for i in 0..n {
                sum += self.design.read(i, j) * r[i];
            }
            *out_j = sum;
        }
    }
}

/// Trapezoidal rule on an equally spaced grid of `m` points with spacing `dtau`.
pub fn trapezoid_weights(m: usize, dtau: f64) -> Vec<f64> {
    let mut c = vec![dtau; m];
    if let Some(first) = c.first_mut() {
        *first = 0.5 * dtau;
    }
    if let Some(last) = c.last_mut() {
        *last = 0.5 * dtau;
    }
    c
}
