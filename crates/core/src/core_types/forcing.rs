//! Per-timestep forcing supplied by the meteorological driver and the canopy model.

use serde::{Deserialize, Serialize};

use super::units::Kelvin;

/// Read-only atmospheric forcing for one timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeStepContext {
    /// Index of the timestep within the run
    pub step_index: u64,
    /// Air temperature at the measurement height
    pub air_temperature: Kelvin,
    /// Vapour pressure deficit (kPa)
    pub vapour_pressure_deficit: f64,
    /// Wind speed at the measurement height (m/s)
    pub wind_speed: f64,
    /// Shortwave plus longwave radiation reaching the soil surface (W/m²)
    pub soil_radiation: f64,
    /// Precipitation rate (mm/s)
    pub precipitation_rate: f64,
    /// Atmospheric pressure (kPa)
    pub atmospheric_pressure: f64,
    /// Timestep length (s)
    pub step_seconds: f64,
}

impl TimeStepContext {
    /// Precipitation falling during the step (mm)
    pub fn precipitation_mm(&self) -> f64 {
        self.precipitation_rate.max(0.0) * self.step_seconds
    }

    /// Timestep length in hours
    pub fn step_hours(&self) -> f64 {
        self.step_seconds / 3600.0
    }

    /// Timestep length in minutes
    pub fn step_minutes(&self) -> f64 {
        self.step_seconds / 60.0
    }
}

impl Default for TimeStepContext {
    /// A mild, dry, calm half-hour.
    fn default() -> Self {
        Self {
            step_index: 0,
            air_temperature: Kelvin::new(288.15),
            vapour_pressure_deficit: 0.5,
            wind_speed: 2.0,
            soil_radiation: 150.0,
            precipitation_rate: 0.0,
            atmospheric_pressure: 101.3,
            step_seconds: 1800.0,
        }
    }
}

/// Water demand handed over by the canopy model for one timestep.
///
/// Fluxes are latent heat equivalents (W/m²).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanopyDemand {
    /// Modelled transpiration
    pub transpiration: f64,
    /// Potential evaporation from a fully wet canopy
    pub wet_canopy_evaporation: f64,
    /// Measured (sap-flow) transpiration overriding the modelled value
    pub measured_transpiration: Option<f64>,
    /// Per-layer share of root uptake; empty means the configured rooting profile
    pub uptake_fraction: Vec<f64>,
}

impl CanopyDemand {
    /// Transpiration to extract (W/m²), honouring the measured override when enabled.
    pub fn effective_transpiration(&self, use_measured: bool) -> f64 {
        match self.measured_transpiration {
            Some(measured) if use_measured => measured,
            _ => self.transpiration,
        }
        .max(0.0)
    }
}
