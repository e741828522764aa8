//! Soil and atmosphere property functions used by the solvers.

pub mod atmosphere;
pub mod constants;
pub mod soil_hydraulics;
pub mod soil_thermal;

pub use soil_hydraulics::{field_capacity, porosity, SaxtonParameters, SoilTexture};
pub use soil_thermal::{thermal_conductivity, volumetric_heat_capacity};
