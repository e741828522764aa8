//! Physical constants shared by the soil column solvers.

/// Freezing point of water (K)
pub const FREEZE: f64 = crate::core_types::units::FREEZING_POINT_K;

/// Stefan-Boltzmann constant (W/m²K⁴)
pub const STEFAN_BOLTZMANN: f64 = 5.67e-8;

/// Specific heat capacity of air (J/kg/K)
pub const CP_AIR: f64 = 1012.0;

/// Numerator of the ideal-gas air density approximation `rho = 353 / T` (kg K/m³)
pub const AIR_DENSITY_FACTOR: f64 = 353.0;

/// Universal gas constant (J/mol/K)
pub const GAS_CONSTANT: f64 = 8.314;

/// Partial molar volume of liquid water (m³/mol)
pub const WATER_MOLAR_VOLUME: f64 = 18.0e-6;

/// Molar mass of water (kg/mol)
pub const WATER_MOLAR_MASS: f64 = 0.018;

/// Von Karman constant
pub const VON_KARMAN: f64 = 0.41;

/// Diffusivity of water vapour in air at 20°C (m²/s)
pub const VAPOUR_DIFFUSIVITY: f64 = 24.2e-6;

/// Tortuosity of the dry soil pore network
pub const SOIL_TORTUOSITY: f64 = 2.5;

/// Surface water below this depth is treated as none (mm)
pub const SURFACE_WATER_UNDERFLOW_MM: f64 = 1e-9;

/// Minimum thickness of the dry surface zone (m)
pub const MIN_DRY_THICKNESS: f64 = 0.001;

/// Fraction of incoming radiation absorbed by the soil surface
pub const SOIL_ABSORPTIVITY: f64 = 0.85;

/// Volumetric heat capacity of liquid water (J/m³/K)
pub const HEAT_CAPACITY_WATER: f64 = 4.18e6;

/// Volumetric heat capacity of ice (J/m³/K)
pub const HEAT_CAPACITY_ICE: f64 = 1.93e6;

/// Volumetric heat capacity of mineral solids (J/m³/K)
pub const HEAT_CAPACITY_MINERAL: f64 = 2.0e6;

/// Volumetric heat capacity of organic solids (J/m³/K)
pub const HEAT_CAPACITY_ORGANIC: f64 = 2.5e6;

/// Thermal conductivity of air (W/m/K)
pub const CONDUCTIVITY_AIR: f64 = 0.025;

/// Thermal conductivity of clay minerals (W/m/K)
pub const CONDUCTIVITY_CLAY: f64 = 1.16;

/// Thermal conductivity of sand minerals (W/m/K)
pub const CONDUCTIVITY_SAND: f64 = 1.57;

/// Thermal conductivity of organic matter (W/m/K)
pub const CONDUCTIVITY_ORGANIC: f64 = 0.25;

/// Thermal conductivity of liquid water (W/m/K)
pub const CONDUCTIVITY_WATER: f64 = 0.56;

/// Thermal conductivity of ice (W/m/K)
pub const CONDUCTIVITY_ICE: f64 = 2.24;

/// Rutter canopy drainage rate at saturation (mm/min)
pub const RUTTER_DRAINAGE_RATE: f64 = 0.002;

/// Rutter canopy drainage exponent (1/mm)
pub const RUTTER_DRAINAGE_EXPONENT: f64 = 3.7;

/// Millimetres of water per metre
pub const MM_PER_M: f64 = 1000.0;
