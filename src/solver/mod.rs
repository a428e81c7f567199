//! Bracketed scalar root finding.
//!
//! Both solvers require `f(low)` and `f(high)` to have opposite signs. When the
//! iteration cap is hit they return the best estimate so far rather than an
//! error, mirroring the binary search used for optimal review intervals.

use tracing::debug;

use crate::error::{EbisuError, Result};
use crate::types::MAX_SOLVER_ITERATIONS;

/// Find `x` in `[low, high]` with `f(x) = 0` to within `tolerance`.
pub trait RootFinder: Send + Sync {
    fn find_root(&self, f: &dyn Fn(f64) -> f64, low: f64, high: f64, tolerance: f64)
        -> Result<f64>;
}

/// Brent's method: inverse quadratic interpolation and secant steps, falling
/// back to bisection whenever the interpolated step is not trustworthy.
#[derive(Debug, Clone, Copy)]
pub struct BrentSolver {
    pub max_iterations: u32,
}

impl Default for BrentSolver {
    fn default() -> Self {
        Self {
            max_iterations: MAX_SOLVER_ITERATIONS,
        }
    }
}

impl BrentSolver {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
        }
    }
}

impl RootFinder for BrentSolver {
    fn find_root(
        &self,
        f: &dyn Fn(f64) -> f64,
        low: f64,
        high: f64,
        tolerance: f64,
    ) -> Result<f64> {
        let (mut a, mut b) = (low, high);
        let (mut fa, mut fb) = (f(a), f(b));

        if fa == 0.0 {
            return Ok(a);
        }
        if fb == 0.0 {
            return Ok(b);
        }
        check_bracket(fa, fb, low, high)?;

        let mut c = b;
        let mut fc = fb;
        let mut d = b - a;
        let mut e = d;

        for iteration in 0..self.max_iterations {
            if (fb > 0.0) == (fc > 0.0) {
                c = a;
                fc = fa;
                d = b - a;
                e = d;
            }
            if fc.abs() < fb.abs() {
                a = b;
                b = c;
                c = a;
                fa = fb;
                fb = fc;
                fc = fa;
            }

            let tol1 = 2.0 * f64::EPSILON * b.abs() + 0.5 * tolerance;
            let xm = 0.5 * (c - b);
            if xm.abs() <= tol1 || fb == 0.0 {
                return Ok(b);
            }

            if e.abs() >= tol1 && fa.abs() > fb.abs() {
                let s = fb / fa;
                let (mut p, mut q) = if a == c {
                    // Secant
                    (2.0 * xm * s, 1.0 - s)
                } else {
                    // Inverse quadratic interpolation
                    let qa = fa / fc;
                    let r = fb / fc;
                    (
                        s * (2.0 * xm * qa * (qa - r) - (b - a) * (r - 1.0)),
                        (qa - 1.0) * (r - 1.0) * (s - 1.0),
                    )
                };
                if p > 0.0 {
                    q = -q;
                }
                p = p.abs();

                let min1 = 3.0 * xm * q - (tol1 * q).abs();
                let min2 = (e * q).abs();
                if 2.0 * p < min1.min(min2) {
                    e = d;
                    d = p / q;
                } else {
                    d = xm;
                    e = d;
                }
            } else {
                d = xm;
                e = d;
            }

            a = b;
            fa = fb;
            b += if d.abs() > tol1 { d } else { tol1.copysign(xm) };
            fb = f(b);
            if fb.is_nan() {
                return Err(EbisuError::BracketingFailure {
                    reason: "objective returned NaN inside bracket".to_string(),
                    model: None,
                    percentile: None,
                    low,
                    high,
                    iterations: iteration + 1,
                });
            }
        }

        debug!(
            max_iterations = self.max_iterations,
            estimate = b,
            "brent solver hit iteration cap"
        );
        Ok(b)
    }
}

/// Plain bisection. Slower than [`BrentSolver`] but trivially robust.
#[derive(Debug, Clone, Copy)]
pub struct BisectionSolver {
    pub max_iterations: u32,
}

impl Default for BisectionSolver {
    fn default() -> Self {
        Self {
            max_iterations: MAX_SOLVER_ITERATIONS,
        }
    }
}

impl RootFinder for BisectionSolver {
    fn find_root(
        &self,
        f: &dyn Fn(f64) -> f64,
        low: f64,
        high: f64,
        tolerance: f64,
    ) -> Result<f64> {
        let mut low_x = low;
        let mut high_x = high;
        let f_low = f(low_x);
        let f_high = f(high_x);

        if f_low == 0.0 {
            return Ok(low_x);
        }
        if f_high == 0.0 {
            return Ok(high_x);
        }
        check_bracket(f_low, f_high, low, high)?;
        let rising = f_low < 0.0;

        for _ in 0..self.max_iterations {
            let mid = (low_x + high_x) / 2.0;
            if (high_x - low_x).abs() / 2.0 < tolerance {
                return Ok(mid);
            }

            let f_mid = f(mid);
            if f_mid == 0.0 {
                return Ok(mid);
            }
            if (f_mid < 0.0) == rising {
                low_x = mid;
            } else {
                high_x = mid;
            }
        }

        Ok((low_x + high_x) / 2.0)
    }
}

fn check_bracket(f_low: f64, f_high: f64, low: f64, high: f64) -> Result<()> {
    let straddles = f_low.is_finite() && f_high.is_finite() && (f_low > 0.0) != (f_high > 0.0);
    if straddles {
        Ok(())
    } else {
        Err(EbisuError::BracketingFailure {
            reason: format!("no sign change: f(low)={f_low}, f(high)={f_high}"),
            model: None,
            percentile: None,
            low,
            high,
            iterations: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const TOLERANCE: f64 = 1e-10;

    fn solvers() -> Vec<Box<dyn RootFinder>> {
        vec![
            Box::new(BrentSolver::default()),
            Box::new(BisectionSolver::default()),
        ]
    }

    #[test]
    fn test_sqrt_two() {
        let f = |x: f64| x * x - 2.0;
        for solver in solvers() {
            let root = solver.find_root(&f, 0.0, 2.0, TOLERANCE).unwrap();
            assert!((root - std::f64::consts::SQRT_2).abs() < 1e-8);
        }
    }

    #[test]
    fn test_decreasing_function() {
        // exp(-x) - 0.25 = 0 at x = ln 4
        let f = |x: f64| (-x).exp() - 0.25;
        for solver in solvers() {
            let root = solver.find_root(&f, -3.0, 3.0, TOLERANCE).unwrap();
            assert!((root - 4.0_f64.ln()).abs() < 1e-8);
        }
    }

    #[test]
    fn test_endpoint_root() {
        let f = |x: f64| x - 1.0;
        for solver in solvers() {
            assert_eq!(solver.find_root(&f, 1.0, 5.0, TOLERANCE).unwrap(), 1.0);
        }
    }

    #[test]
    fn test_no_sign_change_fails() {
        let f = |x: f64| x * x + 1.0;
        for solver in solvers() {
            let err = solver.find_root(&f, -1.0, 1.0, TOLERANCE).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BracketingFailure);
        }
    }

    #[test]
    fn test_nan_inside_bracket_reports_iteration() {
        let solver = BrentSolver::default();
        let f = |x: f64| if x > 0.2 && x < 0.8 { f64::NAN } else { x - 0.5 };
        let err = solver.find_root(&f, 0.0, 1.0, TOLERANCE).unwrap_err();
        match err {
            EbisuError::BracketingFailure { iterations, .. } => {
                assert_eq!(iterations, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_iteration_cap_returns_estimate() {
        let solver = BrentSolver::new(2);
        let f = |x: f64| x.powi(3) - 7.0;
        let root = solver.find_root(&f, 0.0, 10.0, 1e-14).unwrap();
        assert!(root > 0.0 && root < 10.0);
    }
}
