//! Bracketed scalar root finding.
//!
//! Brent's method combines bisection, secant and inverse quadratic
//! interpolation. It never leaves the bracket, so convergence is guaranteed
//! once a sign change is established, and it is superlinear on smooth
//! residuals such as the surface energy balance.
//!
//! # Scientific References
//! - Brent, R.P. (1973). "Algorithms for Minimization without Derivatives", ch. 4
//! - Press, W.H. et al. (1992). "Numerical Recipes", 2nd ed., §9.3

use tracing::trace;

use crate::error::NumericalError;

/// Machine precision used in the convergence test.
const EPS: f64 = f64::EPSILON;

/// Outcome of a successful root search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Root {
    /// Abscissa of the root
    pub x: f64,
    /// Residual at `x`
    pub residual: f64,
    /// Function evaluations after the two bracket checks
    pub iterations: usize,
}

/// Find a root of `f` in `[lower, upper]` to absolute tolerance `tolerance`.
///
/// # Errors
/// - [`NumericalError::BracketInvalid`] when `f(lower)` and `f(upper)` share a sign
/// - [`NumericalError::NonFinite`] when `f` returns NaN or infinity
/// - [`NumericalError::MaxIterations`] when `max_iterations` is exhausted
#[allow(clippy::many_single_char_names)]
pub fn brent<F>(
    mut f: F,
    lower: f64,
    upper: f64,
    tolerance: f64,
    max_iterations: usize,
) -> Result<Root, NumericalError>
where
    F: FnMut(f64) -> f64,
{
    let mut a = lower;
    let mut b = upper;
    let mut fa = finite(f(a), a)?;
    let mut fb = finite(f(b), b)?;

    if fa == 0.0 {
        return Ok(Root {
            x: a,
            residual: 0.0,
            iterations: 0,
        });
    }
    if fb == 0.0 {
        return Ok(Root {
            x: b,
            residual: 0.0,
            iterations: 0,
        });
    }
    if fa.signum() == fb.signum() {
        return Err(NumericalError::BracketInvalid {
            lower,
            upper,
            f_lower: fa,
            f_upper: fb,
        });
    }

    let mut c = b;
    let mut fc = fb;
    let mut d = b - a;
    let mut e = d;

    for iteration in 1..=max_iterations {
        if fb.signum() == fc.signum() {
            // Root lies between a and b: rename so that c is the far end.
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

        let tol1 = 2.0 * EPS * b.abs() + 0.5 * tolerance;
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol1 || fb == 0.0 {
            trace!(iterations = iteration, root = b, "brent converged");
            return Ok(Root {
                x: b,
                residual: fb,
                iterations: iteration,
            });
        }

        if e.abs() >= tol1 && fa.abs() > fb.abs() {
            let s = fb / fa;
            let (mut p, mut q) = if a == c {
                // Secant step
                (2.0 * xm * s, 1.0 - s)
            } else {
                // Inverse quadratic interpolation
                let q = fa / fc;
                let r = fb / fc;
                (
                    s * (2.0 * xm * q * (q - r) - (b - a) * (r - 1.0)),
                    (q - 1.0) * (r - 1.0) * (s - 1.0),
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
        b += if d.abs() > tol1 {
            d
        } else {
            tol1.copysign(xm)
        };
        fb = finite(f(b), b)?;
    }

    Err(NumericalError::MaxIterations {
        iterations: max_iterations,
        residual: fb,
    })
}

fn finite(value: f64, at: f64) -> Result<f64, NumericalError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(NumericalError::NonFinite { at })
    }
}
