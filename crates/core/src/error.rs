//! Error and warning types for the soil column engine.
//!
//! Fatal conditions are [`SoilError`] values and abort the current timestep:
//! the orchestrator returns them to the caller without committing any state.
//! Numerical kernels report their own [`NumericalError`], which the
//! orchestrator wraps with phase, layer and step context.
//!
//! Non-fatal conditions are [`Warning`] values. They are emitted through
//! `tracing` as they occur and accumulated in the step diagnostics.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::simulation::StepPhase;

/// Result alias used throughout the crate.
pub type SoilResult<T> = Result<T, SoilError>;

/// Failure of a numerical kernel (root finder, ODE integrator, relaxation).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumericalError {
    /// The root-finding interval does not contain a sign change.
    #[error("root not bracketed: f({lower}) = {f_lower}, f({upper}) = {f_upper}")]
    BracketInvalid {
        /// Lower bracket bound
        lower: f64,
        /// Upper bracket bound
        upper: f64,
        /// Residual at the lower bound
        f_lower: f64,
        /// Residual at the upper bound
        f_upper: f64,
    },

    /// An iterative method hit its iteration cap.
    #[error("no convergence after {iterations} iterations (last residual {residual:e})")]
    MaxIterations {
        /// Iterations performed
        iterations: usize,
        /// Residual of the last iterate
        residual: f64,
    },

    /// The adaptive step shrank until it no longer advanced the independent variable.
    #[error("step size underflow at t = {t} (h = {step:e})")]
    StepUnderflow {
        /// Pseudo-time reached
        t: f64,
        /// Step size that failed to advance `t`
        step: f64,
    },

    /// The integrator needed more steps than allowed.
    #[error("exceeded {steps} integration steps")]
    TooManySteps {
        /// Step cap
        steps: usize,
    },

    /// A derivative or residual evaluated to NaN or infinity.
    #[error("non-finite value encountered at {at}")]
    NonFinite {
        /// Abscissa at which the value appeared
        at: f64,
    },
}

impl NumericalError {
    /// Iteration or step count carried by the error, if any.
    pub fn iterations(&self) -> usize {
        match self {
            Self::MaxIterations { iterations, .. } => *iterations,
            Self::TooManySteps { steps } => *steps,
            Self::BracketInvalid { .. } | Self::StepUnderflow { .. } | Self::NonFinite { .. } => 0,
        }
    }

    /// Best available measure of how far from convergence the kernel was.
    pub fn residual(&self) -> f64 {
        match self {
            Self::BracketInvalid {
                f_lower, f_upper, ..
            } => f_lower.abs().min(f_upper.abs()),
            Self::MaxIterations { residual, .. } => *residual,
            Self::StepUnderflow { step, .. } => *step,
            Self::TooManySteps { .. } | Self::NonFinite { .. } => f64::NAN,
        }
    }
}

/// Fatal conditions that stop the simulation run.
#[derive(Debug, Error)]
pub enum SoilError {
    /// A root find, ODE integration or relaxation loop failed.
    #[error(
        "{phase} did not converge at step {step} (layer {layer:?}, {iterations} iterations, residual {residual:e})"
    )]
    NonConvergence {
        /// Phase in which the failure occurred
        phase: StepPhase,
        /// Timestep index from the forcing context
        step: u64,
        /// Offending layer, when the kernel runs per layer
        layer: Option<usize>,
        /// Iterations or steps performed
        iterations: usize,
        /// Last residual
        residual: f64,
        /// Kernel-level cause
        #[source]
        source: NumericalError,
    },

    /// No wetting zone remains in the surface layer.
    #[error("soil desiccated at step {step}: no wetting zone left ({unmet_demand:.3e} m of drying demand unmet)")]
    SoilDesiccated {
        /// Timestep index from the forcing context
        step: u64,
        /// Drying demand (m of wetted depth) that could not be served
        unmet_demand: f64,
    },

    /// Configuration failed validation.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What failed
        message: String,
    },

    /// The state passed to the model does not match its configuration.
    #[error("state has {actual} layers but the model is configured for {expected}")]
    LayerCountMismatch {
        /// Configured layer count
        expected: usize,
        /// Layer count of the supplied state
        actual: usize,
    },
}

impl SoilError {
    /// Wrap a kernel failure with orchestration context.
    pub fn non_convergence(
        phase: StepPhase,
        step: u64,
        layer: Option<usize>,
        source: NumericalError,
    ) -> Self {
        Self::NonConvergence {
            phase,
            step,
            layer,
            iterations: source.iterations(),
            residual: source.residual(),
            source,
        }
    }

    /// Shorthand for a configuration validation failure.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Non-fatal conditions noted while stepping the column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Warning {
    /// Column water change disagrees with the flux accounting.
    MassBalance {
        /// Actual minus expected storage change (mm)
        residual_mm: f64,
        /// Tolerance applied (mm)
        tolerance_mm: f64,
    },

    /// An energy budget does not close: the surface balance at the solved
    /// temperature, or the soil heat content against conducted heat.
    EnergyBalance {
        /// Which budget failed
        budget: &'static str,
        /// Unexplained energy as a mean flux (W/m²)
        residual_w_m2: f64,
        /// Tolerance applied (W/m²)
        tolerance_w_m2: f64,
    },

    /// A state variable left its physical range and was clamped.
    PhysicalBounds {
        /// Name of the quantity
        quantity: &'static str,
        /// Layer index, when the quantity is per layer
        layer: Option<usize>,
        /// Value before clamping
        value: f64,
        /// Value after clamping
        clamped_to: f64,
    },

    /// A quantity was positive but negligibly small and was zeroed.
    NumericUnderflow {
        /// Name of the quantity
        quantity: &'static str,
        /// Value that was zeroed
        value: f64,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MassBalance {
                residual_mm,
                tolerance_mm,
            } => write!(
                f,
                "mass balance residual {residual_mm:.3e} mm exceeds {tolerance_mm:.3e} mm"
            ),
            Warning::EnergyBalance {
                budget,
                residual_w_m2,
                tolerance_w_m2,
            } => write!(
                f,
                "{budget} energy balance residual {residual_w_m2:.3e} W/m² exceeds {tolerance_w_m2:.3e} W/m²"
            ),
            Warning::PhysicalBounds {
                quantity,
                layer: Some(layer),
                value,
                clamped_to,
            } => write!(
                f,
                "{quantity} in layer {layer} was {value:.6e}, clamped to {clamped_to:.6e}"
            ),
            Warning::PhysicalBounds {
                quantity,
                layer: None,
                value,
                clamped_to,
            } => write!(f, "{quantity} was {value:.6e}, clamped to {clamped_to:.6e}"),
            Warning::NumericUnderflow { quantity, value } => {
                write!(f, "{quantity} of {value:.3e} treated as zero")
            }
        }
    }
}

/// Per-step warning sink: logs each warning as it arrives and keeps it for
/// the diagnostics record.
#[derive(Debug, Clone, Default)]
pub struct WarningLog {
    step: u64,
    entries: Vec<Warning>,
}

impl WarningLog {
    /// Create an empty log for the given timestep.
    pub fn new(step: u64) -> Self {
        Self {
            step,
            entries: Vec::new(),
        }
    }

    /// Record a warning.
    pub fn push(&mut self, warning: Warning) {
        warn!(step = self.step, "{}", warning);
        self.entries.push(warning);
    }

    /// Warnings recorded so far.
    pub fn entries(&self) -> &[Warning] {
        &self.entries
    }

    /// Consume the log, returning its warnings.
    pub fn into_entries(self) -> Vec<Warning> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_convergence_carries_kernel_context() {
        let err = SoilError::non_convergence(
            StepPhase::HeatDiffusion,
            42,
            Some(3),
            NumericalError::MaxIterations {
                iterations: 10_000,
                residual: 1.5e-3,
            },
        );

        match &err {
            SoilError::NonConvergence {
                step,
                layer,
                iterations,
                residual,
                ..
            } => {
                assert_eq!(*step, 42);
                assert_eq!(*layer, Some(3));
                assert_eq!(*iterations, 10_000);
                assert!((residual - 1.5e-3).abs() < 1e-12);
            }
            other => panic!("unexpected error {other:?}"),
        }

        let message = err.to_string();
        assert!(message.contains("step 42"), "{message}");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn bracket_error_reports_smaller_residual() {
        let err = NumericalError::BracketInvalid {
            lower: 0.0,
            upper: 1.0,
            f_lower: 3.0,
            f_upper: -0.5,
        };
        // Same sign is the real failure case; residual is still the closer end.
        assert!((err.residual() - 0.5).abs() < 1e-12);
        assert_eq!(err.iterations(), 0);
    }

    #[test]
    fn warning_log_accumulates() {
        let mut log = WarningLog::new(7);
        log.push(Warning::NumericUnderflow {
            quantity: "surface water",
            value: 1e-12,
        });
        log.push(Warning::MassBalance {
            residual_mm: 0.2,
            tolerance_mm: 1e-6,
        });
        assert_eq!(log.entries().len(), 2);
        assert!(log.entries()[1].to_string().contains("mass balance"));
        assert_eq!(log.into_entries().len(), 2);
    }
}
