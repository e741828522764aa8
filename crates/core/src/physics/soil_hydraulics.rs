//! Texture-based soil hydraulic functions.
//!
//! Implements the Saxton et al. (1986) empirical equations relating
//! volumetric water content to soil water potential and unsaturated
//! hydraulic conductivity from sand and clay percentages.
//!
//! ```text
//! Ψ(θ) = -0.001 × A × θ^B                                  (MPa)
//! K(θ) = 2.778e-6 × exp(c₂ + c₃ / θ)                       (m/s)
//! φ    = 0.332 - 7.251e-4 × sand + 0.1276 × log10(clay)
//! ```
//!
//! # Scientific References
//! - Saxton, K.E., Rawls, W.J., Romberger, J.S. & Papendick, R.I. (1986).
//!   "Estimating generalized soil-water characteristics from texture"
//!   Soil Science Society of America Journal, 50(4), 1031-1036

use serde::{Deserialize, Serialize};

/// Water potential defining field capacity (MPa), i.e. -10 kPa.
pub const FIELD_CAPACITY_POTENTIAL: f64 = -0.01;

/// Water content below which conductivity is treated as zero.
const MIN_CONDUCTING_WATER_FRACTION: f64 = 0.05;

/// Conductivity returned below [`MIN_CONDUCTING_WATER_FRACTION`] (m/s).
const RESIDUAL_CONDUCTIVITY: f64 = 1e-30;

/// Soil texture as mass percentages of the mineral fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoilTexture {
    /// Sand content (%)
    pub sand_percent: f64,
    /// Clay content (%)
    pub clay_percent: f64,
}

impl SoilTexture {
    /// Create a texture, clamping both percentages to 0-100.
    #[must_use]
    pub fn new(sand_percent: f64, clay_percent: f64) -> Self {
        Self {
            sand_percent: sand_percent.clamp(0.0, 100.0),
            clay_percent: clay_percent.clamp(0.0, 100.0),
        }
    }

    /// Clay as a fraction of sand + clay, used for mineral conductivity weighting.
    pub fn clay_share(&self) -> f64 {
        let total = self.sand_percent + self.clay_percent;
        if total > 0.0 {
            self.clay_percent / total
        } else {
            0.5
        }
    }

    /// Derive the Saxton coefficients for this texture.
    pub fn saxton(&self) -> SaxtonParameters {
        SaxtonParameters::from_texture(*self)
    }
}

impl Default for SoilTexture {
    /// Loam
    fn default() -> Self {
        Self::new(40.0, 20.0)
    }
}

/// Precomputed Saxton coefficients for one texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SaxtonParameters {
    /// Retention curve scale `A` (kPa)
    pub pot_a: f64,
    /// Retention curve exponent `B` (negative)
    pub pot_b: f64,
    /// Conductivity prefactor (m/s)
    pub cond1: f64,
    /// Conductivity exponent constant
    pub cond2: f64,
    /// Conductivity exponent slope on `1/θ`
    pub cond3: f64,
}

impl SaxtonParameters {
    /// Coefficients from sand and clay percentages.
    pub fn from_texture(texture: SoilTexture) -> Self {
        let sand = texture.sand_percent;
        let clay = texture.clay_percent;
        let sand_sq = sand * sand;

        let pot_a = (-4.396 - 0.0715 * clay - 4.880e-4 * sand_sq - 4.285e-5 * sand_sq * clay)
            .exp()
            * 100.0;
        let pot_b = -3.140 - 0.00222 * clay * clay - 3.484e-5 * sand_sq * clay;

        Self {
            pot_a,
            pot_b,
            cond1: 2.778e-6,
            cond2: 12.012 - 0.0755 * sand,
            cond3: -3.895 + 0.03671 * sand - 0.1103 * clay + 8.7546e-4 * clay * clay,
        }
    }

    /// Unsaturated hydraulic conductivity (m/s) at water fraction `theta`.
    ///
    /// Monotone increasing in `theta`.
    pub fn conductivity(&self, theta: f64) -> f64 {
        if theta < MIN_CONDUCTING_WATER_FRACTION {
            return RESIDUAL_CONDUCTIVITY;
        }
        self.cond1 * (self.cond2 + self.cond3 / theta).exp()
    }

    /// Soil water potential (MPa, negative) at water fraction `theta`.
    ///
    /// Returns `-inf` for a completely dry soil.
    pub fn water_potential(&self, theta: f64) -> f64 {
        if theta <= 0.0 {
            return f64::NEG_INFINITY;
        }
        -0.001 * self.pot_a * theta.powf(self.pot_b)
    }

    /// Water fraction at which the potential equals `potential` (MPa, negative).
    pub fn water_fraction_at(&self, potential: f64) -> f64 {
        (potential / (-0.001 * self.pot_a)).powf(1.0 / self.pot_b)
    }
}

/// Total porosity (saturated water fraction) from texture.
///
/// Clay below 1% is floored at 1% to keep the logarithm finite.
pub fn porosity(texture: SoilTexture) -> f64 {
    let clay = texture.clay_percent.max(1.0);
    (0.332 - 7.251e-4 * texture.sand_percent + 0.1276 * clay.log10()).clamp(0.05, 0.95)
}

/// Field capacity: water fraction at -10 kPa, kept strictly below porosity.
pub fn field_capacity(texture: SoilTexture) -> f64 {
    let saxton = texture.saxton();
    let fc = saxton.water_fraction_at(FIELD_CAPACITY_POTENTIAL);
    fc.min(0.99 * porosity(texture))
}
