use core::f64::consts::FRAC_1_PI;
use core::fmt;

/// Kernel family K(t, τ) linking a decay mode τ to the signal at time t.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KernelKind {
    /// K(t, τ) = exp(-t / τ). Requires τ > 0.
    #[default]
    Exponential,
    /// K(t, τ) = τ / (π (t² + τ²)).
    Lorentzian,
}

/// Unknown kernel selector passed through an integer interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownKernel(pub i64);

impl fmt::Display for UnknownKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown kernel selector {} (expected 0 = exponential, 1 = lorentzian)",
            self.0
        )
    }
}

impl std::error::Error for UnknownKernel {}

impl TryFrom<i64> for KernelKind {
    type Error = UnknownKernel;

    fn try_from(selector: i64) -> Result<Self, Self::Error> {
        match selector {
            0 => Ok(Self::Exponential),
            1 => Ok(Self::Lorentzian),
            other => Err(UnknownKernel(other)),
        }
    }
}

impl KernelKind {
    /// Integer selector used by host interfaces.
    pub fn selector(self) -> i64 {
        match self {
            Self::Exponential => 0,
            Self::Lorentzian => 1,
        }
    }

    /// Human readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Exponential => "exponential",
            Self::Lorentzian => "lorentzian",
        }
    }

    /// Returns true when K(t, τ) is defined for this τ at every sample time.
    ///
    /// The exponential kernel degenerates for τ <= 0. The lorentzian is only
    /// undefined at t = τ = 0.
    pub fn is_defined(self, t: f64, tau: f64) -> bool {
        match self {
            Self::Exponential => tau > 0.0,
            Self::Lorentzian => t != 0.0 || tau != 0.0,
        }
    }

    /// Evaluate K(t, τ). Callers check `is_defined` first.
    #[inline]
    pub fn eval(self, t: f64, tau: f64) -> f64 {
        match self {
            Self::Exponential => (-t / tau).exp(),
            Self::Lorentzian => FRAC_1_PI * tau / (t * t + tau * tau),
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
