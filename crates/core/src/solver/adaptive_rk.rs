//! Adaptive Runge-Kutta integration with Cash-Karp embedded error control.
//!
//! The 5th-order solution advances the state; the embedded 4th-order
//! solution estimates the local error. Steps are accepted when the largest
//! error component, scaled by `|y| + |h·dy/dt|`, is within the relative
//! tolerance. Rejected steps shrink by at most a factor of ten; accepted
//! steps grow by at most a factor of five.
//!
//! The state is a fixed-size `nalgebra` vector so the water stores of a
//! single ODE live on the stack.
//!
//! # Scientific References
//! - Cash, J.R. & Karp, A.H. (1990). "A variable order Runge-Kutta method for
//!   initial value problems with rapidly varying right-hand sides"
//!   ACM Transactions on Mathematical Software, 16(3), 201-222
//! - Press, W.H. et al. (1992). "Numerical Recipes", 2nd ed., §16.2

use nalgebra::SVector;
use tracing::trace;

use crate::config::SolverSettings;
use crate::error::NumericalError;

const SAFETY: f64 = 0.9;
const PGROW: f64 = -0.2;
const PSHRNK: f64 = -0.25;
/// `(5 / SAFETY)^(1 / PGROW)`: below this error the step grows by the maximum factor.
const ERRCON: f64 = 1.89e-4;
const TINY: f64 = 1.0e-30;

// Cash-Karp tableau
const A2: f64 = 0.2;
const A3: f64 = 0.3;
const A4: f64 = 0.6;
const A5: f64 = 1.0;
const A6: f64 = 0.875;
const B21: f64 = 0.2;
const B31: f64 = 3.0 / 40.0;
const B32: f64 = 9.0 / 40.0;
const B41: f64 = 0.3;
const B42: f64 = -0.9;
const B43: f64 = 1.2;
const B51: f64 = -11.0 / 54.0;
const B52: f64 = 2.5;
const B53: f64 = -70.0 / 27.0;
const B54: f64 = 35.0 / 27.0;
const B61: f64 = 1631.0 / 55296.0;
const B62: f64 = 175.0 / 512.0;
const B63: f64 = 575.0 / 13824.0;
const B64: f64 = 44275.0 / 110592.0;
const B65: f64 = 253.0 / 4096.0;
const C1: f64 = 37.0 / 378.0;
const C3: f64 = 250.0 / 621.0;
const C4: f64 = 125.0 / 594.0;
const C6: f64 = 512.0 / 1771.0;
const DC1: f64 = C1 - 2825.0 / 27648.0;
const DC3: f64 = C3 - 18575.0 / 48384.0;
const DC4: f64 = C4 - 13525.0 / 55296.0;
const DC5: f64 = -277.0 / 14336.0;
const DC6: f64 = C6 - 0.25;

/// Step control parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveSettings {
    /// Relative error tolerance per step
    pub relative_tolerance: f64,
    /// First trial step
    pub initial_step: f64,
    /// Smallest acceptable proposed step; 0 disables the check
    pub min_step: f64,
    /// Cap on accepted plus rejected steps
    pub max_steps: usize,
}

impl Default for AdaptiveSettings {
    fn default() -> Self {
        Self {
            relative_tolerance: 1e-4,
            initial_step: 1e-3,
            min_step: 0.0,
            max_steps: 10_000,
        }
    }
}

impl From<&SolverSettings> for AdaptiveSettings {
    fn from(settings: &SolverSettings) -> Self {
        Self {
            relative_tolerance: settings.ode_relative_tolerance,
            initial_step: settings.ode_initial_step,
            min_step: settings.ode_min_step,
            max_steps: settings.ode_max_steps,
        }
    }
}

/// Result of an integration.
#[derive(Debug, Clone, PartialEq)]
pub struct Integration<const N: usize> {
    /// State at the end of the interval
    pub y: SVector<f64, N>,
    /// Accepted steps
    pub accepted: usize,
    /// Rejected trial steps
    pub rejected: usize,
}

/// Integrate `dy/dt = derivs(t, y)` from `t_start` to `t_end`.
///
/// # Errors
/// - [`NumericalError::StepUnderflow`] when a shrinking step no longer advances `t`
///   or falls below `min_step`
/// - [`NumericalError::TooManySteps`] when `max_steps` is exhausted
/// - [`NumericalError::NonFinite`] when the derivative or the state is NaN or infinite
pub fn integrate<const N: usize, F>(
    y_start: SVector<f64, N>,
    t_start: f64,
    t_end: f64,
    settings: &AdaptiveSettings,
    mut derivs: F,
) -> Result<Integration<N>, NumericalError>
where
    F: FnMut(f64, &SVector<f64, N>) -> SVector<f64, N>,
{
    let mut t = t_start;
    let mut y = y_start;
    let mut h = settings.initial_step.copysign(t_end - t_start);
    let mut accepted = 0;
    let mut rejected = 0;

    while accepted + rejected < settings.max_steps {
        let dydt = derivs(t, &y);
        check_finite(&dydt, t)?;

        let yscal = y.abs() + (dydt * h).abs() + SVector::repeat(TINY);

        if (t + h - t_end) * (t + h - t_start) > 0.0 {
            h = t_end - t;
        }

        let step = quality_step(&y, &dydt, t, h, &yscal, settings, &mut derivs)?;
        rejected += step.rejected;
        accepted += 1;
        t = step.t;
        y = step.y;
        check_finite(&y, t)?;

        if (t - t_end) * (t_end - t_start) >= 0.0 {
            trace!(accepted, rejected, "adaptive integration complete");
            return Ok(Integration {
                y,
                accepted,
                rejected,
            });
        }

        if step.next_step.abs() <= settings.min_step {
            return Err(NumericalError::StepUnderflow {
                t,
                step: step.next_step,
            });
        }
        h = step.next_step;
    }

    Err(NumericalError::TooManySteps {
        steps: settings.max_steps,
    })
}

struct QualityStep<const N: usize> {
    t: f64,
    y: SVector<f64, N>,
    next_step: f64,
    rejected: usize,
}

/// Take one accepted step, shrinking `h` until the error estimate passes.
fn quality_step<const N: usize, F>(
    y: &SVector<f64, N>,
    dydt: &SVector<f64, N>,
    t: f64,
    mut h: f64,
    yscal: &SVector<f64, N>,
    settings: &AdaptiveSettings,
    derivs: &mut F,
) -> Result<QualityStep<N>, NumericalError>
where
    F: FnMut(f64, &SVector<f64, N>) -> SVector<f64, N>,
{
    let mut rejected = 0;
    loop {
        let (y_trial, y_err) = cash_karp(y, dydt, t, h, derivs);
        let err_max = y_err.component_div(yscal).abs().max() / settings.relative_tolerance;
        if !err_max.is_finite() {
            return Err(NumericalError::NonFinite { at: t + h });
        }

        if err_max <= 1.0 {
            let next_step = if err_max > ERRCON {
                SAFETY * h * err_max.powf(PGROW)
            } else {
                5.0 * h
            };
            return Ok(QualityStep {
                t: t + h,
                y: y_trial,
                next_step,
                rejected,
            });
        }

        rejected += 1;
        if rejected >= settings.max_steps {
            return Err(NumericalError::TooManySteps {
                steps: settings.max_steps,
            });
        }
        let shrunk = SAFETY * h * err_max.powf(PSHRNK);
        h = if h >= 0.0 {
            shrunk.max(0.1 * h)
        } else {
            shrunk.min(0.1 * h)
        };
        if t + h == t {
            return Err(NumericalError::StepUnderflow { t, step: h });
        }
    }
}

/// One Cash-Karp step: returns the 5th-order state and the embedded error estimate.
fn cash_karp<const N: usize, F>(
    y: &SVector<f64, N>,
    dydt: &SVector<f64, N>,
    t: f64,
    h: f64,
    derivs: &mut F,
) -> (SVector<f64, N>, SVector<f64, N>)
where
    F: FnMut(f64, &SVector<f64, N>) -> SVector<f64, N>,
{
    let k1 = dydt;
    let k2 = derivs(t + A2 * h, &(y + k1 * (B21 * h)));
    let k3 = derivs(t + A3 * h, &(y + (k1 * B31 + k2 * B32) * h));
    let k4 = derivs(t + A4 * h, &(y + (k1 * B41 + k2 * B42 + k3 * B43) * h));
    let k5 = derivs(
        t + A5 * h,
        &(y + (k1 * B51 + k2 * B52 + k3 * B53 + k4 * B54) * h),
    );
    let k6 = derivs(
        t + A6 * h,
        &(y + (k1 * B61 + k2 * B62 + k3 * B63 + k4 * B64 + k5 * B65) * h),
    );

    let y_out = y + (k1 * C1 + k3 * C3 + k4 * C4 + k6 * C6) * h;
    let y_err = (k1 * DC1 + k3 * DC3 + k4 * DC4 + k5 * DC5 + k6 * DC6) * h;
    (y_out, y_err)
}

fn check_finite<const N: usize>(v: &SVector<f64, N>, t: f64) -> Result<(), NumericalError> {
    if v.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(NumericalError::NonFinite { at: t })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Vector1, Vector2};

    #[test]
    fn exponential_decay_matches_closed_form() {
        let settings = AdaptiveSettings {
            relative_tolerance: 1e-8,
            ..AdaptiveSettings::default()
        };
        let out = integrate(Vector1::new(1.0), 0.0, 2.0, &settings, |_, y| -y).unwrap();
        assert_relative_eq!(out.y[0], (-2.0f64).exp(), max_relative = 1e-6);
    }

    #[test]
    fn unit_interval_with_default_settings() {
        // Canopy-style pseudo-time interval [1, 2]
        let out = integrate(
            Vector2::new(1.0, 0.0),
            1.0,
            2.0,
            &AdaptiveSettings::default(),
            |_, y| Vector2::new(-0.5 * y[0], 0.5 * y[0]),
        )
        .unwrap();
        assert_relative_eq!(out.y[0], (-0.5f64).exp(), max_relative = 1e-3);
        assert_relative_eq!(out.y[0] + out.y[1], 1.0, max_relative = 1e-9);
        assert!(out.accepted > 0);
    }

    #[test]
    fn zero_derivative_takes_growing_steps() {
        let out = integrate(
            Vector1::new(0.3),
            1.0,
            2.0,
            &AdaptiveSettings::default(),
            |_, _| Vector1::zeros(),
        )
        .unwrap();
        assert_eq!(out.y[0], 0.3);
        // 0.001 growing ×5 per step reaches the end in a handful of steps
        assert!(out.accepted < 10, "accepted {}", out.accepted);
    }

    #[test]
    fn step_cap_is_enforced() {
        let settings = AdaptiveSettings {
            max_steps: 3,
            ..AdaptiveSettings::default()
        };
        let err = integrate(Vector1::new(1.0), 0.0, 100.0, &settings, |_, y| -y).unwrap_err();
        assert!(matches!(err, NumericalError::TooManySteps { steps: 3 }));
    }

    #[test]
    fn nan_derivative_is_reported() {
        let err = integrate(
            Vector1::new(1.0),
            1.0,
            2.0,
            &AdaptiveSettings::default(),
            |_, _| Vector1::new(f64::NAN),
        )
        .unwrap_err();
        assert!(matches!(err, NumericalError::NonFinite { .. }));
    }

    #[test]
    fn settings_follow_solver_configuration() {
        let solver = SolverSettings {
            ode_relative_tolerance: 1e-6,
            ..SolverSettings::default()
        };
        let settings = AdaptiveSettings::from(&solver);
        assert_eq!(settings.relative_tolerance, 1e-6);
        assert_eq!(settings.initial_step, 1e-3);
        assert_eq!(settings.min_step, 0.0);
    }
}
