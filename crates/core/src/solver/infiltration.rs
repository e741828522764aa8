//! Infiltration of surface water and saturation-excess runoff.
//!
//! Water reaching the ground fills the profile from the top down, each
//! layer taking no more than the room left once this step's pending gains
//! and losses are counted. Whatever cannot enter the soil runs off.

use crate::core_types::column::SoilLayer;
use crate::physics::constants::MM_PER_M;

/// Partition of the surface water (mm).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InfiltrationOutcome {
    /// Water that entered the soil
    pub infiltrated_mm: f64,
    /// Water that ran off the surface
    pub runoff_mm: f64,
}

/// Room left in `layer` (m of water) after this step's pending fluxes.
pub fn pending_capacity(layer: &SoilLayer) -> f64 {
    (layer.porosity * layer.thickness - layer.water_depth() - layer.net_water_change()).max(0.0)
}

/// Distribute `surface_water_mm` into the profile top-down.
///
/// Accepted water is posted to each layer's `precipitation_gain`.
pub fn infiltrate(layers: &mut [SoilLayer], surface_water_mm: f64) -> InfiltrationOutcome {
    let mut remaining = surface_water_mm.max(0.0) / MM_PER_M;
    let mut infiltrated = 0.0;
    for layer in layers.iter_mut() {
        if remaining <= 0.0 {
            break;
        }
        let accepted = remaining.min(pending_capacity(layer));
        layer.precipitation_gain += accepted;
        infiltrated += accepted;
        remaining -= accepted;
    }

    InfiltrationOutcome {
        infiltrated_mm: infiltrated * MM_PER_M,
        runoff_mm: remaining.max(0.0) * MM_PER_M,
    }
}
