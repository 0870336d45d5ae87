//! Noise-free multi-exponential test signals.

use crate::problem::{ProblemError, Samples};

/// One decay mode: `intensity * exp(-t / tau)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayComponent {
    pub intensity: f64,
    pub tau: f64,
}

impl DecayComponent {
    pub fn new(intensity: f64, tau: f64) -> Self {
        Self { intensity, tau }
    }
}

/// y(t) = Σ_k I_k exp(-t / τ_k) on `n` equally spaced times in `[t0, t1]`,
/// with unit variance.
pub fn multi_exponential(
    components: &[DecayComponent],
    t0: f64,
    t1: f64,
    n: usize,
) -> Result<Samples, ProblemError> {
    let dt = if n > 1 { (t1 - t0) / (n - 1) as f64 } else { 0.0 };
    let t: Vec<f64> = (0..n).map(|i| t0 + dt * i as f64).collect();
    let y = t
        .iter()
        .map(|&t| {
            components
                .iter()
                .map(|c| c.intensity * (-t / c.tau).exp())
                .sum()
        })
        .collect();
    Samples::with_unit_variance(t, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_components() {
        let components = [DecayComponent::new(1.0, 0.4), DecayComponent::new(2.0, 1.6)];
        let samples = multi_exponential(&components, 0.0, 4.0, 5).unwrap();
        assert_eq!(samples.t(), &[0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!((samples.y()[0] - 3.0).abs() < 1e-12);
        let expected = (-2.5f64).exp() + 2.0 * (-0.625f64).exp();
        assert!((samples.y()[1] - expected).abs() < 1e-12);
        assert!(samples.variance().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn empty_request_fails() {
        assert!(multi_exponential(&[DecayComponent::new(1.0, 1.0)], 0.0, 1.0, 0).is_err());
    }
}
