//! Surface energy balance of the soil skin.
//!
//! The skin temperature `Ts` is the root of the sum of four fluxes, each
//! positive when it heats the surface:
//!
//! ```text
//! Qh = cp ρ gah (Tair - Ts)                                    sensible
//! Qe = λ g (Mw / R Ts) (ea - esurf) × 1000                     latent
//! Qn = 0.85 Rsoil - ε σ Ts⁴                                    net radiation
//! Qc = -k₁ (Ts - T₁) / (Δz₁ / 2)                               ground
//! ```
//!
//! Vapour leaves the wet soil through the dry surface zone, so the latent
//! conductance combines the aerodynamic conductance with a diffusive soil
//! conductance in series:
//!
//! ```text
//! gws   = φ₁ Dv / (τ drythick)
//! g     = gah gws / (gah + gws)
//! esurf = esat(Ts) exp(10⁶ Ψ₁ Vw / (R Ts))     Ψ₁ in MPa
//! ```
//!
//! Latent exchange stops entirely on a frozen surface or when the surface
//! layer holds no liquid water.
//!
//! # Scientific References
//! - Williams, M. et al. (2001). "Primary production of an arctic watershed:
//!   an uncertainty analysis". Ecological Applications, 11(6), 1800-1816
//! - Choudhury, B.J. & Monteith, J.L. (1988). "A four-layer model for the heat
//!   budget of homogeneous land surfaces". Q. J. R. Meteorol. Soc., 114, 373-398

use serde::{Deserialize, Serialize};

use super::root_finding::brent;
use crate::config::SolverSettings;
use crate::core_types::column::SoilColumnState;
use crate::core_types::forcing::TimeStepContext;
use crate::error::NumericalError;
use crate::physics::atmosphere::{
    air_density, latent_heat_vaporisation, saturation_vapour_pressure,
};
use crate::physics::constants::{
    CP_AIR, FREEZE, GAS_CONSTANT, MM_PER_M, SOIL_ABSORPTIVITY, SOIL_TORTUOSITY,
    STEFAN_BOLTZMANN, VAPOUR_DIFFUSIVITY, WATER_MOLAR_MASS, WATER_MOLAR_VOLUME,
};
use crate::physics::soil_thermal::thermal_conductivity;

/// Surface fluxes at one skin temperature (W/m², positive towards the surface).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceFluxes {
    /// Sensible heat from the air
    pub sensible: f64,
    /// Latent heat; negative while evaporating, positive during dew fall
    pub latent: f64,
    /// Absorbed minus emitted radiation
    pub net_radiation: f64,
    /// Conduction from the surface layer
    pub ground: f64,
}

impl SurfaceFluxes {
    /// Energy balance residual: the sum of all four fluxes.
    pub fn residual(&self) -> f64 {
        self.sensible + self.latent + self.net_radiation + self.ground
    }
}

/// Everything the surface balance needs, frozen for the duration of one solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceEnergyBalance {
    /// Air temperature (K)
    pub air_temperature: f64,
    /// Vapour pressure deficit (kPa)
    pub vapour_pressure_deficit: f64,
    /// Radiation reaching the soil (W/m²)
    pub soil_radiation: f64,
    /// Longwave emissivity of the surface
    pub emissivity: f64,
    /// Aerodynamic conductance (m/s)
    pub aerodynamic_conductance: f64,
    /// Thickness of the dry surface zone (m)
    pub dry_thickness: f64,
    /// Porosity of the surface layer
    pub surface_porosity: f64,
    /// Liquid water fraction of the surface layer
    pub surface_liquid_fraction: f64,
    /// Water potential of the surface layer (MPa)
    pub surface_water_potential: f64,
    /// Thermal conductivity of the surface layer (W/m/K)
    pub surface_conductivity: f64,
    /// Midpoint temperature of the surface layer (K)
    pub surface_layer_temperature: f64,
    /// Thickness of the surface layer (m)
    pub surface_layer_thickness: f64,
}

/// Solved skin temperature and the fluxes it produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSolution {
    /// Skin temperature (K)
    pub temperature: f64,
    /// Fluxes at the skin temperature
    pub fluxes: SurfaceFluxes,
    /// Root finder iterations
    pub iterations: usize,
}

impl SurfaceEnergyBalance {
    /// Collect the balance inputs from the column state and forcing.
    ///
    /// # Arguments
    /// * `state` - Column state at the start of the step
    /// * `ctx` - Atmospheric forcing
    /// * `emissivity` - Surface longwave emissivity
    /// * `aerodynamic_conductance` - Conductance between tower and soil (m/s)
    pub fn from_state(
        state: &SoilColumnState,
        ctx: &TimeStepContext,
        emissivity: f64,
        aerodynamic_conductance: f64,
    ) -> Self {
        let top = &state.layers[0];
        Self {
            air_temperature: ctx.air_temperature.value(),
            vapour_pressure_deficit: ctx.vapour_pressure_deficit,
            soil_radiation: ctx.soil_radiation,
            emissivity,
            aerodynamic_conductance,
            dry_thickness: state.wetting.dry_thickness(),
            surface_porosity: top.porosity,
            surface_liquid_fraction: top.liquid_fraction(),
            surface_water_potential: top.water_potential(),
            surface_conductivity: thermal_conductivity(top),
            surface_layer_temperature: top.temperature,
            surface_layer_thickness: top.thickness,
        }
    }

    /// Conductance of vapour through the dry zone (m/s).
    pub fn soil_vapour_conductance(&self) -> f64 {
        self.surface_porosity * VAPOUR_DIFFUSIVITY / (SOIL_TORTUOSITY * self.dry_thickness)
    }

    /// Relative humidity of the soil air at the surface (Kelvin equation).
    pub fn surface_relative_humidity(&self, ts: f64) -> f64 {
        let potential_pa = 1e6 * self.surface_water_potential;
        (potential_pa * WATER_MOLAR_VOLUME / (GAS_CONSTANT * ts)).exp()
    }

    /// Latent heat flux (W/m²) at skin temperature `ts`.
    pub fn latent_flux(&self, ts: f64) -> f64 {
        if ts < FREEZE || self.surface_liquid_fraction <= 0.0 {
            return 0.0;
        }
        let gah = self.aerodynamic_conductance;
        let gws = self.soil_vapour_conductance();
        let conductance = gah * gws / (gah + gws);

        let ea = (saturation_vapour_pressure(self.air_temperature) - self.vapour_pressure_deficit)
            .max(0.0);
        let esurf = saturation_vapour_pressure(ts) * self.surface_relative_humidity(ts);

        latent_heat_vaporisation(ts)
            * conductance
            * (WATER_MOLAR_MASS / (GAS_CONSTANT * ts))
            * (ea - esurf)
            * MM_PER_M
    }

    /// All four fluxes at skin temperature `ts`.
    pub fn fluxes(&self, ts: f64) -> SurfaceFluxes {
        let ta = self.air_temperature;
        SurfaceFluxes {
            sensible: CP_AIR * air_density(ta) * self.aerodynamic_conductance * (ta - ts),
            latent: self.latent_flux(ts),
            net_radiation: SOIL_ABSORPTIVITY * self.soil_radiation
                - self.emissivity * STEFAN_BOLTZMANN * ts.powi(4),
            ground: -self.surface_conductivity * (ts - self.surface_layer_temperature)
                / (0.5 * self.surface_layer_thickness),
        }
    }

    /// Solve for the skin temperature within `air ± half width`.
    ///
    /// # Errors
    /// Propagates the root finder's [`NumericalError`]; an unbracketed root
    /// is reported, never replaced with a bracket end.
    pub fn solve(&self, settings: &SolverSettings) -> Result<SurfaceSolution, NumericalError> {
        let ta = self.air_temperature;
        let root = brent(
            |ts| self.fluxes(ts).residual(),
            ta - settings.root_bracket_half_width,
            ta + settings.root_bracket_half_width,
            settings.root_tolerance,
            settings.root_max_iterations,
        )?;
        Ok(SurfaceSolution {
            temperature: root.x,
            fluxes: self.fluxes(root.x),
            iterations: root.iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance() -> SurfaceEnergyBalance {
        SurfaceEnergyBalance {
            air_temperature: 288.15,
            vapour_pressure_deficit: 0.8,
            soil_radiation: 300.0,
            emissivity: 0.96,
            aerodynamic_conductance: 0.02,
            dry_thickness: 0.005,
            surface_porosity: 0.45,
            surface_liquid_fraction: 0.3,
            surface_water_potential: -0.01,
            surface_conductivity: 1.0,
            surface_layer_temperature: 285.0,
            surface_layer_thickness: 0.1,
        }
    }

    #[test]
    fn solved_temperature_closes_the_balance() {
        let seb = balance();
        let settings = SolverSettings::default();
        let solution = seb.solve(&settings).unwrap();

        assert!((solution.temperature - seb.air_temperature).abs() < 50.0);
        // |dR/dTs| is well below 1000 W/m²/K, so a 1e-4 K root is within 0.1 W/m²
        assert!(
            solution.fluxes.residual().abs() < settings.energy_balance_tolerance,
            "residual {}",
            solution.fluxes.residual()
        );
    }

    #[test]
    fn wet_warm_surface_evaporates() {
        let seb = balance();
        let ts = seb.solve(&SolverSettings::default()).unwrap().temperature;
        assert!(seb.latent_flux(ts) < 0.0);
    }

    #[test]
    fn drying_soil_lowers_surface_humidity() {
        let wilting = SurfaceEnergyBalance {
            surface_water_potential: -1.5,
            ..balance()
        };
        let rh = wilting.surface_relative_humidity(293.15);
        let expected = (-1.5e6 * WATER_MOLAR_VOLUME / (GAS_CONSTANT * 293.15)).exp();
        assert!((rh - expected).abs() < 1e-12);
        assert!(rh > 0.985 && rh < 0.99, "rh = {rh}");

        let parched = SurfaceEnergyBalance {
            surface_water_potential: -100.0,
            ..balance()
        };
        assert!(parched.surface_relative_humidity(293.15) < 0.5);
        assert!(balance().surface_relative_humidity(293.15) > 0.9999);
    }

    #[test]
    fn frozen_surface_has_no_latent_flux() {
        let seb = balance();
        assert_eq!(seb.latent_flux(272.0), 0.0);
        assert_eq!(seb.fluxes(FREEZE - 1e-9).latent, 0.0);
    }

    #[test]
    fn dry_surface_layer_has_no_latent_flux() {
        let seb = SurfaceEnergyBalance {
            surface_liquid_fraction: 0.0,
            surface_water_potential: f64::NEG_INFINITY,
            ..balance()
        };
        assert_eq!(seb.latent_flux(300.0), 0.0);
        let solution = seb.solve(&SolverSettings::default()).unwrap();
        assert_eq!(solution.fluxes.latent, 0.0);
    }

    #[test]
    fn thicker_dry_zone_throttles_evaporation() {
        let thin = balance();
        let thick = SurfaceEnergyBalance {
            dry_thickness: 0.05,
            ..balance()
        };
        assert!(thick.latent_flux(295.0).abs() < thin.latent_flux(295.0).abs());
    }

    #[test]
    fn saturated_air_over_cold_soil_gives_dew() {
        let seb = SurfaceEnergyBalance {
            vapour_pressure_deficit: 0.0,
            ..balance()
        };
        // Surface colder than air with saturated air: condensation
        assert!(seb.latent_flux(280.0) > 0.0);
    }

    #[test]
    fn impossible_forcing_is_not_bracketed() {
        let seb = SurfaceEnergyBalance {
            soil_radiation: 1.0e7,
            ..balance()
        };
        let err = seb.solve(&SolverSettings::default()).unwrap_err();
        assert!(matches!(err, NumericalError::BracketInvalid { .. }));
    }
}
