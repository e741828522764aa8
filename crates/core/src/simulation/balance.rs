//! Mass and energy closure checks.
//!
//! Both checks only flag. A residual outside tolerance becomes a warning and
//! the state is left as the solvers produced it.

use crate::error::{Warning, WarningLog};
use crate::solver::heat_diffusion::ConductionBudget;

/// Water crossing the column boundary during one step (mm).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WaterBudget {
    /// Precipitation
    pub precipitation: f64,
    /// Soil surface evaporation
    pub soil_evaporation: f64,
    /// Dew onto the soil surface
    pub dew: f64,
    /// Evaporation of canopy interception
    pub canopy_evaporation: f64,
    /// Root extraction
    pub transpiration: f64,
    /// Surface and saturation-excess runoff
    pub runoff: f64,
    /// Drainage out of the bottom layer
    pub discharge: f64,
}

impl WaterBudget {
    /// Expected change in column water storage.
    pub fn net_input(&self) -> f64 {
        self.precipitation + self.dew
            - self.soil_evaporation
            - self.canopy_evaporation
            - self.transpiration
            - self.runoff
            - self.discharge
    }

    /// Actual minus expected storage change.
    pub fn residual(&self, water_before: f64, water_after: f64) -> f64 {
        (water_after - water_before) - self.net_input()
    }
}

/// Absolute mass tolerance (mm): relative tolerance of the column water,
/// with a 1 mm floor so a near-empty column is not held to round-off.
pub fn mass_tolerance(relative: f64, column_water_mm: f64) -> f64 {
    relative * column_water_mm.abs().max(1.0)
}

/// Flag a mass residual outside tolerance.
pub fn check_mass(residual_mm: f64, tolerance_mm: f64, warnings: &mut WarningLog) {
    if residual_mm.abs() > tolerance_mm || !residual_mm.is_finite() {
        warnings.push(Warning::MassBalance {
            residual_mm,
            tolerance_mm,
        });
    }
}

/// Flag a surface energy residual outside tolerance.
pub fn check_energy(residual_w_m2: f64, tolerance_w_m2: f64, warnings: &mut WarningLog) {
    flag_energy("surface", residual_w_m2, tolerance_w_m2, warnings);
}

/// Soil heat residual as a mean flux over a step of `seconds`.
pub fn heat_residual(budget: &ConductionBudget, seconds: f64) -> f64 {
    budget.residual() / seconds
}

/// Flag a soil heat content change that the conducted heat does not explain.
pub fn check_heat(residual_w_m2: f64, tolerance_w_m2: f64, warnings: &mut WarningLog) {
    flag_energy("soil heat", residual_w_m2, tolerance_w_m2, warnings);
}

fn flag_energy(
    budget: &'static str,
    residual_w_m2: f64,
    tolerance_w_m2: f64,
    warnings: &mut WarningLog,
) {
    if residual_w_m2.abs() > tolerance_w_m2 || !residual_w_m2.is_finite() {
        warnings.push(Warning::EnergyBalance {
            budget,
            residual_w_m2,
            tolerance_w_m2,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn balanced_budget_has_zero_residual() {
        let budget = WaterBudget {
            precipitation: 5.0,
            soil_evaporation: 0.4,
            canopy_evaporation: 0.3,
            transpiration: 0.2,
            runoff: 1.0,
            discharge: 0.1,
            dew: 0.0,
        };
        assert_abs_diff_eq!(budget.residual(300.0, 303.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn tolerance_has_a_floor() {
        assert_eq!(mass_tolerance(1e-6, 0.2), 1e-6);
        assert_abs_diff_eq!(mass_tolerance(1e-6, 400.0), 4e-4, epsilon = 1e-15);
    }

    #[test]
    fn only_out_of_tolerance_residuals_are_flagged() {
        let mut log = WarningLog::new(1);
        check_mass(1e-7, 1e-6, &mut log);
        check_energy(0.1, 0.5, &mut log);
        assert!(log.entries().is_empty());

        check_mass(-2e-6, 1e-6, &mut log);
        check_energy(f64::NAN, 0.5, &mut log);
        assert_eq!(log.entries().len(), 2);
    }

    #[test]
    fn unexplained_soil_heat_is_flagged() {
        let closed = ConductionBudget {
            storage_change: 9.0e4,
            surface_input: 1.0e5,
            bottom_loss: 1.0e4,
        };
        let leaky = ConductionBudget {
            storage_change: 2.1e5,
            ..closed
        };

        let mut log = WarningLog::new(7);
        check_heat(heat_residual(&closed, 1800.0), 0.5, &mut log);
        assert!(log.entries().is_empty());

        check_heat(heat_residual(&leaky, 1800.0), 0.5, &mut log);
        match log.entries() {
            [Warning::EnergyBalance {
                budget,
                residual_w_m2,
                ..
            }] => {
                assert_eq!(*budget, "soil heat");
                assert_abs_diff_eq!(*residual_w_m2, 1.2e5 / 1800.0, epsilon = 1e-9);
            }
            other => panic!("unexpected warnings {other:?}"),
        }
    }
}
