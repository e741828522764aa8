//! Extraction of transpiration and soil evaporation from the profile.
//!
//! Demand is split across layers by the rooting profile and capped at the
//! liquid water each layer still holds after drainage. Unmet demand is not
//! redistributed: the canopy model sees the shortfall through the reported
//! extracted amount.

use crate::core_types::column::SoilLayer;
use crate::physics::constants::MM_PER_M;

/// Liquid water (m) a layer can still give up this step.
pub fn remaining_liquid(layer: &SoilLayer) -> f64 {
    (layer.liquid_fraction() * layer.thickness - layer.water_loss).max(0.0)
}

/// Take up to `demand_mm` from `layer`, returning the amount taken (mm).
pub fn withdraw(layer: &mut SoilLayer, demand_mm: f64) -> f64 {
    let taken = (demand_mm.max(0.0) / MM_PER_M).min(remaining_liquid(layer));
    layer.water_loss += taken;
    taken * MM_PER_M
}

/// Extract `demand_mm` of transpiration split by `fractions`.
///
/// Returns the total actually extracted (mm).
pub fn extract_transpiration(layers: &mut [SoilLayer], demand_mm: f64, fractions: &[f64]) -> f64 {
    layers
        .iter_mut()
        .zip(fractions)
        .map(|(layer, fraction)| withdraw(layer, demand_mm * fraction))
        .sum()
}
