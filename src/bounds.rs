use core::fmt;

/// Component-wise box `lower <= x <= upper`.
///
/// Infinite bounds are allowed; NaN is not.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

/// Validation errors for [`Bounds`].
#[derive(Debug, Clone, PartialEq)]
pub enum BoundsError {
    /// lower and upper have different lengths.
    LengthMismatch { lower: usize, upper: usize },
    /// lower[index] > upper[index].
    Inverted { index: usize, lower: f64, upper: f64 },
    /// A bound is NaN.
    NotANumber { index: usize },
}

impl fmt::Display for BoundsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthMismatch { lower, upper } => {
                write!(f, "lower bound length {lower} does not match upper bound length {upper}")
            }
            Self::Inverted {
                index,
                lower,
                upper,
            } => write!(f, "empty box at {index}: lower {lower} > upper {upper}"),
            Self::NotANumber { index } => write!(f, "bound at {index} is NaN"),
        }
    }
}

impl std::error::Error for BoundsError {}

impl Bounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, BoundsError> {
        if lower.len() != upper.len() {
            return Err(BoundsError::LengthMismatch {
                lower: lower.len(),
                upper: upper.len(),
            });
        }
        for (index, (&lo, &hi)) in lower.iter().zip(upper.iter()).enumerate() {
            if lo.is_nan() || hi.is_nan() {
                return Err(BoundsError::NotANumber { index });
            }
            if lo > hi {
                return Err(BoundsError::Inverted {
                    index,
                    lower: lo,
                    upper: hi,
                });
            }
        }
        Ok(Self { lower, upper })
    }

    /// Same interval on every component.
    pub fn uniform(n: usize, lower: f64, upper: f64) -> Result<Self, BoundsError> {
        Self::new(vec![lower; n], vec![upper; n])
    }

    /// (-inf, inf) on every component.
    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; n],
            upper: vec![f64::INFINITY; n],
        }
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Clamps x into the box in place.
    pub fn project(&self, x: &mut [f64]) {
        debug_assert_eq!(x.len(), self.len());
        for ((v, &lo), &hi) in x.iter_mut().zip(&self.lower).zip(&self.upper) {
            *v = v.max(lo).min(hi);
        }
    }

    #[inline]
    pub(crate) fn clamp(&self, index: usize, value: f64) -> f64 {
        value.max(self.lower[index]).min(self.upper[index])
    }

    pub fn contains(&self, x: &[f64]) -> bool {
        x.len() == self.len()
            && x
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(&v, (&lo, &hi))| v >= lo && v <= hi)
    }

    /// ‖P(x - g) - x‖∞, zero exactly at first-order stationary points.
    pub fn projected_gradient_inf(&self, x: &[f64], grad: &[f64]) -> f64 {
        let mut max: f64 = 0.0;
        for i in 0..x.len() {
            let step = (self.clamp(i, x[i] - grad[i]) - x[i]).abs();
            max = max.max(step);
        }
        max
    }

    /// ‖P(x - g) - x‖₂.
    pub(crate) fn projected_gradient_norm(&self, x: &[f64], grad: &[f64]) -> f64 {
        let mut sum = 0.0;
        for i in 0..x.len() {
            let step = self.clamp(i, x[i] - grad[i]) - x[i];
            sum += step * step;
        }
        sum.sqrt()
    }
}
