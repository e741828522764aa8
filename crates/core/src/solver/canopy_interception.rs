//! Rainfall interception by the canopy.
//!
//! Two stores evolve over one timestep, mapped onto pseudo-time `[1, 2]`:
//! the canopy store and the water that reaches the ground.
//!
//! ```text
//! dC/dt = (1 - p) P - D(C) - E × min(1, C / S)
//! dG/dt = p P + D(C)
//! D(C)  = Ds × exp(b (C - S)) × minutes       C > S
//! ```
//!
//! with throughfall fraction `p`, precipitation `P` and potential wet-canopy
//! evaporation `E` in mm per step, and storage capacity `S` (mm). Canopy
//! evaporation is recovered from the water budget afterwards so that the
//! three outputs always close exactly.
//!
//! # Scientific References
//! - Rutter, A.J. et al. (1971). "A predictive model of rainfall interception
//!   in forests, 1. Derivation of the model from observations in a plantation
//!   of Corsican pine". Agricultural Meteorology, 9, 367-384

use nalgebra::Vector2;

use super::adaptive_rk::{integrate, AdaptiveSettings};
use crate::config::VegetationConfig;
use crate::error::{NumericalError, Warning, WarningLog};
use crate::physics::constants::{RUTTER_DRAINAGE_EXPONENT, RUTTER_DRAINAGE_RATE};

/// Store values below this fraction of capacity are treated as empty.
const EMPTY_STORE_FRACTION: f64 = 1e-5;

/// Pseudo-time interval covering one step.
const STEP_START: f64 = 1.0;
const STEP_END: f64 = 2.0;

/// Canopy water balance for one step (mm).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanopyOutcome {
    /// Canopy store at the end of the step
    pub store_mm: f64,
    /// Throughfall plus drainage reaching the ground
    pub ground_water_mm: f64,
    /// Evaporation from the wet canopy, including any store snapped to zero
    pub evaporation_mm: f64,
    /// Accepted integration steps
    pub accepted_steps: usize,
}

/// Interception integrator parameterised by canopy storage and throughfall.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanopyInterception {
    /// Storage capacity `S` (mm)
    pub max_storage: f64,
    /// Throughfall fraction `p`
    pub throughfall: f64,
    /// Timestep length (min), scaling the Rutter drainage rate
    pub step_minutes: f64,
}

impl CanopyInterception {
    /// Build from vegetation configuration for a step of `step_minutes`.
    pub fn new(vegetation: &VegetationConfig, step_minutes: f64) -> Self {
        Self {
            max_storage: vegetation.max_canopy_storage,
            throughfall: vegetation.throughfall,
            step_minutes,
        }
    }

    /// Drainage from the canopy (mm per step) at store `store`.
    pub fn drainage(&self, store: f64) -> f64 {
        if store > self.max_storage {
            RUTTER_DRAINAGE_RATE
                * (RUTTER_DRAINAGE_EXPONENT * (store - self.max_storage)).exp()
                * self.step_minutes
        } else {
            0.0
        }
    }

    /// Integrate the canopy over one step.
    ///
    /// # Arguments
    /// * `store` - Canopy store at the start of the step (mm)
    /// * `precipitation` - Precipitation during the step (mm)
    /// * `potential_evaporation` - Wet-canopy evaporation demand (mm per step)
    /// * `settings` - Integrator step control
    /// * `warnings` - Sink for underflow and bounds warnings
    ///
    /// # Errors
    /// Propagates [`NumericalError`] from the adaptive integrator.
    pub fn step(
        &self,
        store: f64,
        precipitation: f64,
        potential_evaporation: f64,
        settings: &AdaptiveSettings,
        warnings: &mut WarningLog,
    ) -> Result<CanopyOutcome, NumericalError> {
        let mut store0 = store;
        if store0 > 0.0 && store0 < EMPTY_STORE_FRACTION * self.max_storage {
            warnings.push(Warning::NumericUnderflow {
                quantity: "canopy storage",
                value: store0,
            });
            store0 = 0.0;
        }

        let precipitation = precipitation.max(0.0);
        let demand = potential_evaporation.max(0.0);
        let intercepted = (1.0 - self.throughfall) * precipitation;
        let direct = self.throughfall * precipitation;

        let result = integrate(
            Vector2::new(store0, 0.0),
            STEP_START,
            STEP_END,
            settings,
            |_, y| {
                let canopy = y[0];
                let drain = self.drainage(canopy);
                let wetness = (canopy / self.max_storage).clamp(0.0, 1.0);
                Vector2::new(
                    intercepted - drain - demand * wetness,
                    direct + drain,
                )
            },
        )?;

        let mut store1 = result.y[0];
        let ground = result.y[1].max(0.0);
        if store1 < 0.0 {
            warnings.push(Warning::PhysicalBounds {
                quantity: "canopy storage",
                layer: None,
                value: store1,
                clamped_to: 0.0,
            });
            store1 = 0.0;
        }

        Ok(CanopyOutcome {
            store_mm: store1,
            ground_water_mm: ground,
            evaporation_mm: store - store1 + precipitation - ground,
            accepted_steps: result.accepted,
        })
    }
}
