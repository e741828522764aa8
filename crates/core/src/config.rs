//! Static configuration for a soil column run.
//!
//! Everything here is resolved once at setup and then read by the solvers;
//! no site name ever reaches the physics. Site-specific behaviour is carried
//! by [`SiteParameters`] values instead.
//!
//! All structs deserialise with `#[serde(default)]`, so a driver can supply a
//! partial description and inherit the documented defaults. Parsing files is
//! the caller's business; call [`ModelConfig::validate`] after loading.

use serde::{Deserialize, Serialize};

use crate::error::{SoilError, SoilResult};
use crate::physics::soil_hydraulics::SoilTexture;

/// Configuration of one soil layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilLayerConfig {
    /// Layer thickness (m)
    pub thickness: f64,
    /// Sand and clay percentages
    pub texture: SoilTexture,
    /// Mineral share of the solid phase (0-1)
    pub mineral_fraction: f64,
    /// Organic share of the solid phase (0-1)
    pub organic_fraction: f64,
    /// Initial volumetric water content
    pub initial_water_fraction: f64,
    /// Initial temperature (K)
    pub initial_temperature: f64,
    /// Replaces the texture-derived field capacity when set
    pub field_capacity_override: Option<f64>,
}

impl Default for SoilLayerConfig {
    fn default() -> Self {
        Self {
            thickness: 0.1,
            texture: SoilTexture::default(),
            mineral_fraction: 0.95,
            organic_fraction: 0.05,
            initial_water_fraction: 0.3,
            initial_temperature: 283.15,
            field_capacity_override: None,
        }
    }
}

/// Layered soil profile and surface properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilConfig {
    /// Layers ordered top to bottom
    pub layers: Vec<SoilLayerConfig>,
    /// Longwave emissivity of the soil surface
    pub surface_emissivity: f64,
    /// Initial dry-zone thickness at the top of the surface layer (m)
    pub initial_dry_thickness: f64,
    /// Initial surface temperature (K); defaults to the top layer temperature
    pub initial_surface_temperature: Option<f64>,
}

impl Default for SoilConfig {
    fn default() -> Self {
        let thicknesses = [0.1, 0.1, 0.2, 0.2, 0.4, 0.5];
        Self {
            layers: thicknesses
                .iter()
                .map(|&thickness| SoilLayerConfig {
                    thickness,
                    ..SoilLayerConfig::default()
                })
                .collect(),
            surface_emissivity: 0.96,
            initial_dry_thickness: 0.002,
            initial_surface_temperature: None,
        }
    }
}

impl SoilConfig {
    /// Check the profile for physically meaningful values.
    ///
    /// # Errors
    /// Returns [`SoilError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> SoilResult<()> {
        if self.layers.len() < 2 {
            return Err(SoilError::invalid_config(format!(
                "soil column needs at least 2 layers, got {}",
                self.layers.len()
            )));
        }
        for (i, layer) in self.layers.iter().enumerate() {
            if !(layer.thickness.is_finite() && layer.thickness > 0.0) {
                return Err(SoilError::invalid_config(format!(
                    "layer {i}: thickness must be positive, got {}",
                    layer.thickness
                )));
            }
            let texture = layer.texture;
            if texture.sand_percent + texture.clay_percent > 100.0 {
                return Err(SoilError::invalid_config(format!(
                    "layer {i}: sand + clay exceeds 100% ({} + {})",
                    texture.sand_percent, texture.clay_percent
                )));
            }
            let solids = layer.mineral_fraction + layer.organic_fraction;
            if layer.mineral_fraction < 0.0
                || layer.organic_fraction < 0.0
                || (solids - 1.0).abs() > 1e-6
            {
                return Err(SoilError::invalid_config(format!(
                    "layer {i}: mineral + organic fractions must sum to 1, got {solids}"
                )));
            }
            if !(0.0..=1.0).contains(&layer.initial_water_fraction) {
                return Err(SoilError::invalid_config(format!(
                    "layer {i}: initial water fraction {} outside 0-1",
                    layer.initial_water_fraction
                )));
            }
            if !(layer.initial_temperature.is_finite() && layer.initial_temperature > 0.0) {
                return Err(SoilError::invalid_config(format!(
                    "layer {i}: initial temperature {} K is not physical",
                    layer.initial_temperature
                )));
            }
            if let Some(fc) = layer.field_capacity_override {
                if !(0.0..1.0).contains(&fc) {
                    return Err(SoilError::invalid_config(format!(
                        "layer {i}: field capacity override {fc} outside 0-1"
                    )));
                }
            }
        }
        if !(0.0..=1.0).contains(&self.surface_emissivity) {
            return Err(SoilError::invalid_config(format!(
                "surface emissivity {} outside 0-1",
                self.surface_emissivity
            )));
        }
        if self.initial_dry_thickness < 0.0 || self.initial_dry_thickness >= self.layers[0].thickness
        {
            return Err(SoilError::invalid_config(format!(
                "initial dry thickness {} must lie within the surface layer",
                self.initial_dry_thickness
            )));
        }
        Ok(())
    }
}

/// Canopy geometry and interception parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VegetationConfig {
    /// Canopy height (m)
    pub canopy_height: f64,
    /// Height of the wind/temperature measurement (m)
    pub tower_height: f64,
    /// Canopy water storage capacity (mm)
    pub max_canopy_storage: f64,
    /// Fraction of precipitation falling straight through the canopy
    pub throughfall: f64,
    /// Per-layer share of root water uptake; must match the layer count
    pub root_uptake_fraction: Vec<f64>,
}

impl Default for VegetationConfig {
    fn default() -> Self {
        Self {
            canopy_height: 9.0,
            tower_height: 12.0,
            max_canopy_storage: 1.5,
            throughfall: 0.5,
            root_uptake_fraction: vec![0.3, 0.25, 0.2, 0.15, 0.1, 0.0],
        }
    }
}

impl VegetationConfig {
    /// Check canopy parameters and the rooting profile against `layer_count`.
    ///
    /// # Errors
    /// Returns [`SoilError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self, layer_count: usize) -> SoilResult<()> {
        if self.canopy_height < 0.0 || self.tower_height <= self.canopy_height * 0.67 {
            return Err(SoilError::invalid_config(format!(
                "tower height {} m must clear the canopy displacement height (canopy {} m)",
                self.tower_height, self.canopy_height
            )));
        }
        if !(self.max_canopy_storage.is_finite() && self.max_canopy_storage > 0.0) {
            return Err(SoilError::invalid_config(format!(
                "max canopy storage must be positive, got {}",
                self.max_canopy_storage
            )));
        }
        if !(0.0..=1.0).contains(&self.throughfall) {
            return Err(SoilError::invalid_config(format!(
                "throughfall fraction {} outside 0-1",
                self.throughfall
            )));
        }
        validate_uptake_profile(&self.root_uptake_fraction, layer_count)
    }
}

/// Check a per-layer uptake profile: right length, non-negative, sums to 1
/// (or is all zero for a leafless canopy).
///
/// # Errors
/// Returns [`SoilError::InvalidConfig`] on a malformed profile.
pub fn validate_uptake_profile(fractions: &[f64], layer_count: usize) -> SoilResult<()> {
    if fractions.len() != layer_count {
        return Err(SoilError::invalid_config(format!(
            "root uptake profile has {} entries for {} layers",
            fractions.len(),
            layer_count
        )));
    }
    if fractions.iter().any(|f| !f.is_finite() || *f < 0.0) {
        return Err(SoilError::invalid_config(
            "root uptake fractions must be finite and non-negative",
        ));
    }
    let total: f64 = fractions.iter().sum();
    if total > 0.0 && (total - 1.0).abs() > 1e-6 {
        return Err(SoilError::invalid_config(format!(
            "root uptake fractions sum to {total}, expected 1"
        )));
    }
    Ok(())
}

/// Site-specific switches, resolved once at setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteParameters {
    /// Water fraction replacing field capacity as the drainage threshold in every layer
    pub drainage_threshold_override: Option<f64>,
    /// Use measured (sap-flow) transpiration verbatim when a value is supplied
    pub use_measured_transpiration: bool,
    /// Degree-hour snowmelt factor (mm/K/h)
    pub snowmelt_factor: f64,
}

impl Default for SiteParameters {
    fn default() -> Self {
        Self {
            drainage_threshold_override: None,
            use_measured_transpiration: true,
            snowmelt_factor: 0.15,
        }
    }
}

/// Tolerances and caps for the numerical kernels and balance checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Absolute tolerance on surface temperature (K)
    pub root_tolerance: f64,
    /// Half-width of the surface temperature bracket around air temperature (K)
    pub root_bracket_half_width: f64,
    /// Iteration cap for the root finder
    pub root_max_iterations: usize,
    /// Relative error tolerance of the adaptive integrator
    pub ode_relative_tolerance: f64,
    /// First trial step of the adaptive integrator (pseudo-time units)
    pub ode_initial_step: f64,
    /// Smallest step allowed; 0 means underflow is detected only when `t + h == t`
    pub ode_min_step: f64,
    /// Step cap of the adaptive integrator
    pub ode_max_steps: usize,
    /// Implicit weight of the heat diffusion scheme (0.5 = Crank-Nicolson)
    pub heat_implicit_weight: f64,
    /// Summed absolute node change per sweep below which relaxation stops (K)
    pub heat_tolerance: f64,
    /// Sweep cap of the heat relaxation
    pub heat_max_iterations: usize,
    /// Mass residual tolerance relative to column water (dimensionless)
    pub mass_balance_relative_tolerance: f64,
    /// Surface energy closure tolerance (W/m²)
    pub energy_balance_tolerance: f64,
    /// Soil heat closure tolerance, as a mean flux over the step (W/m²)
    pub heat_balance_tolerance: f64,
    /// Fraction of canopy capacity above which a one-step store change is flagged
    pub canopy_change_warning_fraction: f64,
    /// Maximum number of wetting zones before the deepest two merge
    pub max_wetting_zones: usize,
    /// Integrate per-layer drainage on the rayon pool
    pub parallel_drainage: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            root_tolerance: 1e-4,
            root_bracket_half_width: 50.0,
            root_max_iterations: 100,
            ode_relative_tolerance: 1e-4,
            ode_initial_step: 1e-3,
            ode_min_step: 0.0,
            ode_max_steps: 10_000,
            heat_implicit_weight: 0.5,
            heat_tolerance: 5e-7,
            heat_max_iterations: 10_000,
            mass_balance_relative_tolerance: 1e-6,
            energy_balance_tolerance: 0.5,
            heat_balance_tolerance: 0.5,
            canopy_change_warning_fraction: 1.0,
            max_wetting_zones: 64,
            parallel_drainage: false,
        }
    }
}

impl SolverSettings {
    /// Check that tolerances are positive and caps non-zero.
    ///
    /// # Errors
    /// Returns [`SoilError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> SoilResult<()> {
        let positive = [
            ("root_tolerance", self.root_tolerance),
            ("root_bracket_half_width", self.root_bracket_half_width),
            ("ode_relative_tolerance", self.ode_relative_tolerance),
            ("ode_initial_step", self.ode_initial_step),
            ("heat_tolerance", self.heat_tolerance),
            (
                "mass_balance_relative_tolerance",
                self.mass_balance_relative_tolerance,
            ),
            ("energy_balance_tolerance", self.energy_balance_tolerance),
            ("heat_balance_tolerance", self.heat_balance_tolerance),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SoilError::invalid_config(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.ode_min_step < 0.0 {
            return Err(SoilError::invalid_config("ode_min_step must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.heat_implicit_weight) {
            return Err(SoilError::invalid_config(format!(
                "heat_implicit_weight {} outside 0-1",
                self.heat_implicit_weight
            )));
        }
        if self.root_max_iterations == 0
            || self.ode_max_steps == 0
            || self.heat_max_iterations == 0
            || self.max_wetting_zones < 2
        {
            return Err(SoilError::invalid_config(
                "iteration caps must be non-zero and max_wetting_zones at least 2",
            ));
        }
        Ok(())
    }
}

/// Full static configuration of a soil column model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Soil profile
    pub soil: SoilConfig,
    /// Canopy and rooting
    pub vegetation: VegetationConfig,
    /// Site switches
    pub site: SiteParameters,
    /// Numerical settings
    pub solver: SolverSettings,
}

impl ModelConfig {
    /// Validate every section.
    ///
    /// # Errors
    /// Returns the first [`SoilError::InvalidConfig`] found.
    pub fn validate(&self) -> SoilResult<()> {
        self.soil.validate()?;
        self.vegetation.validate(self.soil.layers.len())?;
        if let Some(threshold) = self.site.drainage_threshold_override {
            if !(0.0..1.0).contains(&threshold) {
                return Err(SoilError::invalid_config(format!(
                    "drainage threshold override {threshold} outside 0-1"
                )));
            }
        }
        if self.site.snowmelt_factor < 0.0 {
            return Err(SoilError::invalid_config("snowmelt factor must be non-negative"));
        }
        self.solver.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        ModelConfig::default().validate().unwrap();
    }

    #[test]
    fn single_layer_rejected() {
        let soil = SoilConfig {
            layers: vec![SoilLayerConfig::default()],
            ..SoilConfig::default()
        };
        assert!(matches!(soil.validate(), Err(SoilError::InvalidConfig { .. })));
    }

    #[test]
    fn root_profile_must_match_layers() {
        let mut config = ModelConfig::default();
        config.vegetation.root_uptake_fraction = vec![0.5, 0.5];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("root uptake"), "{err}");
    }

    #[test]
    fn root_profile_must_sum_to_one() {
        assert!(validate_uptake_profile(&[0.5, 0.4], 2).is_err());
        assert!(validate_uptake_profile(&[0.0, 0.0], 2).is_ok());
        assert!(validate_uptake_profile(&[0.6, 0.4], 2).is_ok());
    }

    #[test]
    fn partial_config_inherits_defaults() {
        let config: ModelConfig =
            serde_json::from_str(r#"{"solver": {"heat_tolerance": 1e-6}}"#).unwrap();
        assert_eq!(config.solver.heat_tolerance, 1e-6);
        assert_eq!(config.solver.root_tolerance, 1e-4);
        assert_eq!(config.soil.layers.len(), 6);
    }

    #[test]
    fn bad_solver_settings_rejected() {
        let settings = SolverSettings {
            heat_implicit_weight: 1.5,
            ..SolverSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
