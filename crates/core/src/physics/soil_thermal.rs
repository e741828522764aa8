//! Soil thermal properties from composition, moisture and ice content.
//!
//! Heat capacity is the volume-weighted sum of the phases. Conductivity
//! interpolates between dry and saturated values with the degree of
//! saturation (Johansen, 1975), using geometric-mean mixing for the
//! saturated and dry end members (Farouki, 1981).
//!
//! ```text
//! C   = (1-φ)(f_min C_min + f_org C_org) + θ(1-ice) C_w + θ ice C_i
//! k   = k_dry + (k_sat - k_dry) × min(1, θ/φ)
//! ```

use super::constants::{
    CONDUCTIVITY_AIR, CONDUCTIVITY_CLAY, CONDUCTIVITY_ICE, CONDUCTIVITY_ORGANIC,
    CONDUCTIVITY_SAND, CONDUCTIVITY_WATER, HEAT_CAPACITY_ICE, HEAT_CAPACITY_MINERAL,
    HEAT_CAPACITY_ORGANIC, HEAT_CAPACITY_WATER,
};
use crate::core_types::column::SoilLayer;

/// Volumetric heat capacity of a layer (J/m³/K).
pub fn volumetric_heat_capacity(layer: &SoilLayer) -> f64 {
    let solids = (1.0 - layer.porosity)
        * (layer.mineral_fraction * HEAT_CAPACITY_MINERAL
            + layer.organic_fraction * HEAT_CAPACITY_ORGANIC);
    let ice = layer.ice_proportion.clamp(0.0, 1.0);
    let water = layer.water_fraction.max(0.0);
    solids + water * (1.0 - ice) * HEAT_CAPACITY_WATER + water * ice * HEAT_CAPACITY_ICE
}

/// Thermal conductivity of a layer (W/m/K).
pub fn thermal_conductivity(layer: &SoilLayer) -> f64 {
    let porosity = layer.porosity;
    let ice = layer.ice_proportion.clamp(0.0, 1.0);

    let clay_share = layer.texture.clay_share();
    let mineral = CONDUCTIVITY_CLAY.powf(clay_share) * CONDUCTIVITY_SAND.powf(1.0 - clay_share);
    let solids = mineral.powf(layer.mineral_fraction)
        * CONDUCTIVITY_ORGANIC.powf(layer.organic_fraction);

    let k_dry = CONDUCTIVITY_AIR.powf(porosity) * solids.powf(1.0 - porosity);
    let k_sat = solids.powf(1.0 - porosity)
        * CONDUCTIVITY_WATER.powf(porosity * (1.0 - ice))
        * CONDUCTIVITY_ICE.powf(porosity * ice);

    let saturation = if porosity > 0.0 {
        (layer.water_fraction / porosity).clamp(0.0, 1.0)
    } else {
        0.0
    };
    k_dry + (k_sat - k_dry) * saturation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::soil_hydraulics::SoilTexture;

    fn loam(water_fraction: f64, ice: f64) -> SoilLayer {
        let mut layer = SoilLayer::new(0.1, 0.0, SoilTexture::default(), 0.95, 0.05, None);
        layer.water_fraction = water_fraction;
        layer.ice_proportion = ice;
        layer
    }

    #[test]
    fn wet_soil_stores_more_heat() {
        assert!(volumetric_heat_capacity(&loam(0.35, 0.0)) > volumetric_heat_capacity(&loam(0.1, 0.0)));
    }

    #[test]
    fn ice_lowers_capacity_and_raises_conductivity() {
        let thawed = loam(0.3, 0.0);
        let frozen = loam(0.3, 1.0);
        assert!(volumetric_heat_capacity(&frozen) < volumetric_heat_capacity(&thawed));
        assert!(thermal_conductivity(&frozen) > thermal_conductivity(&thawed));
    }

    #[test]
    fn conductivity_in_physical_range() {
        for theta in [0.0, 0.1, 0.2, 0.3, 0.4] {
            let k = thermal_conductivity(&loam(theta, 0.0));
            assert!(k > 0.05 && k < 3.0, "k={k} at theta={theta}");
        }
    }
}
