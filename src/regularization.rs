//! Discrete second-difference operator with natural boundaries.
//!
//! `D2` is the m×m tridiagonal matrix with `-2` on the diagonal and `1` on the
//! off-diagonals, i.e. the notional neighbours `x_{-1}` and `x_m` are zero.
//! The matrix is symmetric, so `D2ᵀ D2 = D2 D2` and the adjoint of the
//! curvature penalty is obtained by applying the stencil twice.

/// out = D2 x. `x` and `out` have the same length, at least 2.
pub fn second_difference(x: &[f64], out: &mut [f64]) {
    let m = x.len();
    debug_assert_eq!(out.len(), m);
    debug_assert!(m >= 2);
    for i in 1..m - 1 {
        out[i] = x[i - 1] - 2.0 * x[i] + x[i + 1];
    }
    out[0] = -2.0 * x[0] + x[1];
    out[m - 1] = x[m - 2] - 2.0 * x[m - 1];
}

/// out = D2 (D2 x), using `scratch` for the intermediate vector.
pub fn fourth_difference(x: &[f64], scratch: &mut [f64], out: &mut [f64]) {
    second_difference(x, scratch);
    second_difference(scratch, out);
}

/// Σ_j (D2 x)_j², the curvature penalty without the α² factor.
pub fn curvature_penalty(x: &[f64]) -> f64 {
    let m = x.len();
    let mut sum = 0.0;
    for i in 0..m {
        let left = if i > 0 { x[i - 1] } else { 0.0 };
        let right = if i + 1 < m { x[i + 1] } else { 0.0 };
        let d = left - 2.0 * x[i] + right;
        sum += d * d;
    }
    sum
}
