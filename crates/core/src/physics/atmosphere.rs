//! Near-surface atmospheric helpers for the surface energy balance.
//!
//! # Scientific References
//! - Jones, H.G. (1992). "Plants and Microclimate", 2nd ed. Cambridge University Press
//! - Monteith, J.L. & Unsworth, M.H. (2008). "Principles of Environmental Physics"

use super::constants::{AIR_DENSITY_FACTOR, FREEZE, VON_KARMAN};

/// Saturation vapour pressure over water (kPa) at temperature `t_k` (K).
///
/// Magnus-type fit:
/// ```text
/// esat = 0.1 × exp(1.80956664 + (17.2693882 T - 4717.306081) / (T - 35.86))
/// ```
#[inline]
pub fn saturation_vapour_pressure(t_k: f64) -> f64 {
    0.1 * (1.80956664 + (17.2693882 * t_k - 4717.306081) / (t_k - 35.86)).exp()
}

/// Latent heat of vaporisation (J/kg) at temperature `t_k` (K).
#[inline]
pub fn latent_heat_vaporisation(t_k: f64) -> f64 {
    1000.0 * (2501.0 - 2.364 * (t_k - FREEZE))
}

/// Dry air density (kg/m³) from the `353 / T` approximation.
#[inline]
pub fn air_density(t_k: f64) -> f64 {
    AIR_DENSITY_FACTOR / t_k
}

/// Aerodynamic conductance for heat between the measurement height and the
/// soil surface (m/s).
///
/// Neutral log profile with zero-plane displacement `d = 0.67 h` and
/// roughness length `z0 = 0.1 h` under a canopy of height `h`:
/// ```text
/// gah = (k / ln((z - d) / z0))² × u
/// ```
/// A bare surface (`h` ≈ 0) uses a 1 cm roughness length. Wind speed is
/// floored at 0.2 m/s so that free convection keeps some exchange.
pub fn aerodynamic_conductance(wind_speed: f64, tower_height: f64, canopy_height: f64) -> f64 {
    let (displacement, roughness) = if canopy_height > 0.1 {
        (0.67 * canopy_height, 0.1 * canopy_height)
    } else {
        (0.0, 0.01)
    };
    let reference = (tower_height - displacement).max(roughness * 1.5);
    let profile = VON_KARMAN / (reference / roughness).ln();
    profile * profile * wind_speed.max(0.2)
}
