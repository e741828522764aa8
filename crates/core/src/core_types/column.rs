//! Soil column state: the layered profile and the surface water stores.
//!
//! [`SoilColumnState`] is built once from the static soil configuration and
//! then mutated in place by every timestep. It is plain data: every field
//! needed to reproduce the next step is serialisable, so the I/O layer can
//! checkpoint and restore a run.

use serde::{Deserialize, Serialize};

use crate::config::{SoilConfig, SoilLayerConfig};
use crate::error::{SoilError, SoilResult};
use crate::physics::constants::{MIN_DRY_THICKNESS, MM_PER_M};
use crate::physics::soil_hydraulics::{field_capacity, porosity, SoilTexture};
use crate::physics::soil_thermal::volumetric_heat_capacity;

/// One horizontal soil layer.
///
/// Water amounts in the per-step accumulators are depths of liquid water (m).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilLayer {
    /// Layer thickness (m)
    pub thickness: f64,

    /// Depth of the layer top below the surface (m)
    pub depth_to_top: f64,

    /// Volumetric water content, liquid plus ice (m³/m³)
    pub water_fraction: f64,

    /// Fraction of the water content that is frozen (0-1)
    pub ice_proportion: f64,

    /// Temperature at the layer midpoint (K)
    pub temperature: f64,

    /// Mineral share of the solid phase (0-1)
    pub mineral_fraction: f64,

    /// Organic share of the solid phase (0-1)
    pub organic_fraction: f64,

    /// Texture driving the hydraulic functions
    pub texture: SoilTexture,

    /// Saturated water fraction
    pub porosity: f64,

    /// Water fraction above which gravitational drainage occurs
    pub field_capacity: f64,

    /// Unsaturated hydraulic conductivity at the current water fraction (m/s)
    pub hydraulic_conductivity: f64,

    /// Water received from other layers this step (m)
    pub water_gain: f64,

    /// Water lost to drainage, uptake and evaporation this step (m)
    pub water_loss: f64,

    /// Infiltrated precipitation received this step (m)
    pub precipitation_gain: f64,
}

impl SoilLayer {
    /// Create a layer with texture-derived porosity and field capacity.
    ///
    /// Water content starts at field capacity and temperature at freezing;
    /// callers normally overwrite both from configuration.
    #[must_use]
    pub fn new(
        thickness: f64,
        depth_to_top: f64,
        texture: SoilTexture,
        mineral_fraction: f64,
        organic_fraction: f64,
        field_capacity_override: Option<f64>,
    ) -> Self {
        let porosity = porosity(texture);
        let field_capacity = field_capacity_override
            .unwrap_or_else(|| field_capacity(texture))
            .clamp(0.0, porosity);
        let saxton = texture.saxton();
        Self {
            thickness,
            depth_to_top,
            water_fraction: field_capacity,
            ice_proportion: 0.0,
            temperature: crate::physics::constants::FREEZE,
            mineral_fraction,
            organic_fraction,
            texture,
            porosity,
            field_capacity,
            hydraulic_conductivity: saxton.conductivity(field_capacity),
            water_gain: 0.0,
            water_loss: 0.0,
            precipitation_gain: 0.0,
        }
    }

    fn from_config(config: &SoilLayerConfig, depth_to_top: f64) -> Self {
        let mut layer = Self::new(
            config.thickness,
            depth_to_top,
            config.texture,
            config.mineral_fraction,
            config.organic_fraction,
            config.field_capacity_override,
        );
        layer.water_fraction = config.initial_water_fraction.clamp(0.0, layer.porosity);
        layer.temperature = config.initial_temperature;
        layer.refresh_conductivity();
        layer
    }

    /// Depth of the layer bottom (m)
    pub fn depth_to_bottom(&self) -> f64 {
        self.depth_to_top + self.thickness
    }

    /// Depth of the layer midpoint, where its temperature node sits (m)
    pub fn midpoint_depth(&self) -> f64 {
        self.depth_to_top + 0.5 * self.thickness
    }

    /// Unfrozen water fraction (m³/m³)
    pub fn liquid_fraction(&self) -> f64 {
        self.water_fraction * (1.0 - self.ice_proportion)
    }

    /// Total water held by the layer (m)
    pub fn water_depth(&self) -> f64 {
        self.water_fraction * self.thickness
    }

    /// Additional water the layer can take before saturating (m)
    pub fn unsaturated_capacity(&self) -> f64 {
        ((self.porosity - self.water_fraction) * self.thickness).max(0.0)
    }

    /// Net water change accumulated this step (m)
    pub fn net_water_change(&self) -> f64 {
        self.water_gain + self.precipitation_gain - self.water_loss
    }

    /// Recompute hydraulic conductivity from the liquid water fraction.
    pub fn refresh_conductivity(&mut self) {
        self.hydraulic_conductivity = self.texture.saxton().conductivity(self.liquid_fraction());
    }

    /// Soil water potential of the liquid phase (MPa)
    pub fn water_potential(&self) -> f64 {
        self.texture.saxton().water_potential(self.liquid_fraction())
    }

    /// Zero the per-step flux accumulators.
    pub fn reset_accumulators(&mut self) {
        self.water_gain = 0.0;
        self.water_loss = 0.0;
        self.precipitation_gain = 0.0;
    }
}

/// A wet band inside the surface layer, bounded by depths below the surface (m).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WettingZone {
    /// Depth of the upper (drying) edge (m)
    pub top: f64,
    /// Depth of the lower (wetting) edge (m)
    pub bottom: f64,
}

impl WettingZone {
    /// Vertical extent (m)
    pub fn extent(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Ordered stack of wetting zones in the surface layer, shallowest first.
///
/// The first zone is the active front; its top is the depth of the dry
/// surface layer that controls vapour diffusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WettingZones {
    zones: Vec<WettingZone>,
}

impl WettingZones {
    /// A single zone spanning `[dry_thickness, layer_thickness]`.
    pub fn new(dry_thickness: f64, layer_thickness: f64) -> Self {
        let top = dry_thickness.clamp(0.0, layer_thickness);
        Self {
            zones: vec![WettingZone {
                top,
                bottom: layer_thickness,
            }],
        }
    }

    /// Build from explicit zones, dropping empty ones and sorting by depth.
    pub fn from_zones(mut zones: Vec<WettingZone>) -> Self {
        zones.retain(|z| z.extent() > 0.0 && z.top >= 0.0);
        zones.sort_by(|a, b| a.top.total_cmp(&b.top));
        Self { zones }
    }

    /// Zones, shallowest first
    pub fn zones(&self) -> &[WettingZone] {
        &self.zones
    }

    pub(crate) fn zones_mut(&mut self) -> &mut Vec<WettingZone> {
        &mut self.zones
    }

    /// Number of live zones
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// True when no wet zone remains
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Thickness of the dry surface layer (m), floored at 1 mm.
    pub fn dry_thickness(&self) -> f64 {
        self.zones
            .first()
            .map_or(MIN_DRY_THICKNESS, |z| z.top.max(MIN_DRY_THICKNESS))
    }
}

/// Snow water equivalent and the surface water generated within a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SnowStore {
    /// Snow water equivalent (mm)
    pub swe_mm: f64,
    /// Water reaching the ground this step from throughfall, drip and melt (mm)
    pub surface_water_mm: f64,
}

/// Water intercepted on the canopy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CanopyStore {
    /// Stored water (mm)
    pub water_mm: f64,
}

/// Complete mutable state of one soil column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilColumnState {
    /// Layers ordered top to bottom
    pub layers: Vec<SoilLayer>,
    /// Surface skin temperature (K)
    pub surface_temperature: f64,
    /// Wet bands in the surface layer
    pub wetting: WettingZones,
    /// Snowpack and per-step surface water
    pub snow: SnowStore,
    /// Canopy interception store
    pub canopy: CanopyStore,
    /// Depths of freezing-point crossings found in the last step (m)
    pub thaw_fronts: Vec<f64>,
}

impl SoilColumnState {
    /// Build the initial state from static soil configuration.
    ///
    /// # Errors
    /// Returns [`SoilError::InvalidConfig`] if the configuration fails validation.
    pub fn from_config(config: &SoilConfig) -> SoilResult<Self> {
        config.validate()?;

        let mut depth = 0.0;
        let layers: Vec<SoilLayer> = config
            .layers
            .iter()
            .map(|layer_config| {
                let layer = SoilLayer::from_config(layer_config, depth);
                depth += layer_config.thickness;
                layer
            })
            .collect();

        let first = layers
            .first()
            .ok_or_else(|| SoilError::invalid_config("soil column has no layers"))?;
        let wetting = WettingZones::new(config.initial_dry_thickness, first.thickness);
        let surface_temperature = config
            .initial_surface_temperature
            .unwrap_or(first.temperature);

        Ok(Self {
            layers,
            surface_temperature,
            wetting,
            snow: SnowStore::default(),
            canopy: CanopyStore::default(),
            thaw_fronts: Vec::new(),
        })
    }

    /// Number of layers
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Total depth of the column (m)
    pub fn column_depth(&self) -> f64 {
        self.layers.last().map_or(0.0, SoilLayer::depth_to_bottom)
    }

    /// Reset per-step accumulators and transient stores.
    pub fn begin_timestep(&mut self) {
        for layer in &mut self.layers {
            layer.reset_accumulators();
        }
        self.snow.surface_water_mm = 0.0;
    }

    /// Water held in the soil profile (mm)
    pub fn soil_water_mm(&self) -> f64 {
        self.layers.iter().map(SoilLayer::water_depth).sum::<f64>() * MM_PER_M
    }

    /// All water held by the column: soil, snowpack and canopy (mm)
    pub fn total_water_mm(&self) -> f64 {
        self.soil_water_mm() + self.snow.swe_mm + self.canopy.water_mm
    }

    /// Sensible heat content of the profile relative to freezing (J/m²)
    pub fn heat_content(&self) -> f64 {
        self.layers
            .iter()
            .map(|l| {
                volumetric_heat_capacity(l)
                    * (l.temperature - crate::physics::constants::FREEZE)
                    * l.thickness
            })
            .sum()
    }

    /// Node temperatures: surface first, then each layer midpoint.
    pub fn temperature_nodes(&self) -> Vec<f64> {
        std::iter::once(self.surface_temperature)
            .chain(self.layers.iter().map(|l| l.temperature))
            .collect()
    }

    /// Node depths matching [`Self::temperature_nodes`] (m).
    pub fn node_depths(&self) -> Vec<f64> {
        std::iter::once(0.0)
            .chain(self.layers.iter().map(SoilLayer::midpoint_depth))
            .collect()
    }
}
