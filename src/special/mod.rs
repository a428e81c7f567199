//! Special-function backends.
//!
//! The memory model only ever needs the natural log of the Beta function,
//! `ln B(a, b) = ln Γ(a) + ln Γ(b) - ln Γ(a + b)`. It is expressed as a narrow
//! trait so the numerical backend can be swapped without touching the
//! posterior computation.

use statrs::function::beta::checked_ln_beta;

/// Natural log of the Beta function.
///
/// Implementations return `NaN` for arguments outside the domain
/// (`a <= 0` or `b <= 0`) instead of panicking; callers surface that as a
/// constraint violation.
pub trait LogBeta: Send + Sync {
    fn ln_beta(&self, a: f64, b: f64) -> f64;
}

/// `statrs` backed log-Beta (Lanczos log-Gamma).
#[derive(Debug, Clone, Copy, Default)]
pub struct StatrsLogBeta;

impl LogBeta for StatrsLogBeta {
    fn ln_beta(&self, a: f64, b: f64) -> f64 {
        checked_ln_beta(a, b).unwrap_or(f64::NAN)
    }
}

/// Log of the binomial coefficient `C(n, k)` via the Beta function:
/// `ln C(n, k) = -ln B(1 + n - k, 1 + k) - ln(n + 1)`.
pub fn binomial_ln<B: LogBeta + ?Sized>(backend: &B, n: u32, k: u32) -> f64 {
    let n = f64::from(n);
    let k = f64::from(k);
    -backend.ln_beta(1.0 + n - k, 1.0 + k) - (n + 1.0).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-10;

    #[test]
    fn test_ln_beta_known_values() {
        let backend = StatrsLogBeta;
        // B(1, 1) = 1
        assert!(backend.ln_beta(1.0, 1.0).abs() < EPSILON);
        // B(2, 3) = 1/12
        assert!((backend.ln_beta(2.0, 3.0) - (1.0_f64 / 12.0).ln()).abs() < EPSILON);
        // B(0.5, 0.5) = π
        assert!((backend.ln_beta(0.5, 0.5) - std::f64::consts::PI.ln()).abs() < EPSILON);
    }

    #[test]
    fn test_ln_beta_symmetric() {
        let backend = StatrsLogBeta;
        let ab = backend.ln_beta(3.7, 12.25);
        let ba = backend.ln_beta(12.25, 3.7);
        assert!((ab - ba).abs() < EPSILON);
    }

    #[test]
    fn test_ln_beta_out_of_domain_is_nan() {
        let backend = StatrsLogBeta;
        assert!(backend.ln_beta(0.0, 1.0).is_nan());
        assert!(backend.ln_beta(1.0, -3.0).is_nan());
    }

    #[test]
    fn test_binomial_ln() {
        let backend = StatrsLogBeta;
        // C(5, 2) = 10
        assert!((binomial_ln(&backend, 5, 2) - 10.0_f64.ln()).abs() < 1e-9);
        // C(n, 0) = C(n, n) = 1
        assert!(binomial_ln(&backend, 7, 0).abs() < 1e-9);
        assert!(binomial_ln(&backend, 7, 7).abs() < 1e-9);
        assert!(binomial_ln(&backend, 0, 0).abs() < 1e-12);
    }
}
