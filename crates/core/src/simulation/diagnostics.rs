//! Per-step outputs handed to the I/O layer.

use serde::Serialize;

use crate::error::Warning;
use crate::solver::surface_energy::SurfaceFluxes;

/// Everything a timestep reports besides the mutated state.
///
/// Water amounts are mm per step, fluxes W/m².
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepDiagnostics {
    /// Timestep index from the forcing
    pub step_index: u64,
    /// Solved surface skin temperature (K)
    pub surface_temperature: f64,
    /// Surface energy fluxes at the solved temperature
    pub fluxes: SurfaceFluxes,
    /// True when the frozen surface routed precipitation to snow and skipped the canopy
    pub canopy_skipped: bool,

    /// Precipitation during the step
    pub precipitation_mm: f64,
    /// Precipitation added to the snowpack
    pub snowfall_mm: f64,
    /// Snow melted into surface water
    pub snowmelt_mm: f64,
    /// Snow water equivalent at the end of the step
    pub swe_mm: f64,
    /// Canopy store at the end of the step
    pub canopy_storage_mm: f64,

    /// Evaporation from the soil surface
    pub soil_evaporation_mm: f64,
    /// Condensation onto the soil surface
    pub dew_mm: f64,
    /// Evaporation of intercepted water
    pub canopy_evaporation_mm: f64,
    /// Transpiration actually extracted from the soil
    pub transpiration_mm: f64,
    /// Transpiration actually extracted, as latent heat
    pub transpiration_w_m2: f64,
    /// Soil evaporation plus canopy evaporation plus transpiration, less dew
    pub evapotranspiration_mm: f64,
    /// Evapotranspiration as latent heat
    pub evapotranspiration_w_m2: f64,

    /// Water entering the soil surface
    pub infiltration_mm: f64,
    /// Surface and saturation-excess runoff
    pub runoff_mm: f64,
    /// Drainage out of the bottom of the column
    pub discharge_mm: f64,

    /// Thaw front depths after the step (m)
    pub thaw_fronts: Vec<f64>,
    /// Heat diffusion relaxation sweeps
    pub heat_iterations: usize,
    /// Change in profile heat content from conduction (J/m²)
    pub heat_storage_change: f64,
    /// Heat conducted in across the surface (J/m²)
    pub ground_heat_input: f64,
    /// Heat conducted into the fixed bottom layer (J/m²)
    pub bottom_heat_loss: f64,
    /// Heat content change not explained by conduction, as a mean flux (W/m²)
    pub heat_residual_w_m2: f64,
    /// Column water change minus net inputs
    pub mass_residual_mm: f64,
    /// Surface energy balance residual at the solved temperature
    pub energy_residual_w_m2: f64,

    /// Non-fatal conditions noted during the step
    pub warnings: Vec<Warning>,
}
