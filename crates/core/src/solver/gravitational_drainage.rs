//! Gravitational drainage of water above the drainage threshold.
//!
//! Each layer drains independently from its state at the start of the step:
//!
//! ```text
//! dθ/dt = -K(θ) × Δt / Δz      θ > θ_fc
//! dθ/dt = 0                    otherwise
//! ```
//!
//! integrated over pseudo-time `[1, 2]`. The drained depth is capped by the
//! water the layer holds and by the room left in the layer below; the bottom
//! layer discharges out of the column without a cap.
//!
//! The per-layer integrations share nothing, so they can run on the rayon
//! pool. Posting the drained water to the receiving layer is a serial
//! reduction afterwards.

use nalgebra::Vector1;
use rayon::prelude::*;
use tracing::trace;

use super::adaptive_rk::{integrate, AdaptiveSettings};
use crate::config::SiteParameters;
use crate::core_types::column::SoilLayer;
use crate::error::NumericalError;
use crate::physics::constants::MM_PER_M;

/// Integration failure in one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerFailure {
    /// Layer index
    pub layer: usize,
    /// Kernel error
    pub error: NumericalError,
}

/// Water moved by drainage during one step.
#[derive(Debug, Clone, PartialEq)]
pub struct DrainageOutcome {
    /// Depth drained out of each layer (m)
    pub drained: Vec<f64>,
    /// Water leaving the bottom of the column (mm)
    pub discharge_mm: f64,
}

/// Drainage integrator for a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravitationalDrainage {
    /// Timestep length (s)
    pub step_seconds: f64,
    /// Threshold replacing each layer's field capacity, if set
    pub threshold_override: Option<f64>,
    /// Integrate layers on the rayon pool
    pub parallel: bool,
}

impl GravitationalDrainage {
    /// Build from site parameters.
    pub fn new(site: &SiteParameters, step_seconds: f64, parallel: bool) -> Self {
        Self {
            step_seconds,
            threshold_override: site.drainage_threshold_override,
            parallel,
        }
    }

    /// Water fraction at or below which `layer` does not drain.
    pub fn threshold(&self, layer: &SoilLayer) -> f64 {
        self.threshold_override.unwrap_or(layer.field_capacity)
    }

    /// Uncapped drained depth (m) of one layer over the step.
    ///
    /// # Errors
    /// Propagates [`NumericalError`] from the adaptive integrator.
    pub fn potential_drainage(
        &self,
        layer: &SoilLayer,
        settings: &AdaptiveSettings,
    ) -> Result<f64, NumericalError> {
        let liquid = layer.liquid_fraction();
        let threshold = self.threshold(layer);
        if liquid <= threshold {
            return Ok(0.0);
        }

        let saxton = layer.texture.saxton();
        let scale = self.step_seconds / layer.thickness;
        let result = integrate(Vector1::new(liquid), 1.0, 2.0, settings, |_, theta| {
            if theta[0] > threshold {
                Vector1::new(-saxton.conductivity(theta[0]) * scale)
            } else {
                Vector1::zeros()
            }
        })?;

        Ok(((liquid - result.y[0]) * layer.thickness).max(0.0))
    }

    /// Drain every layer and post the fluxes to the layer accumulators.
    ///
    /// # Errors
    /// Returns the first [`LayerFailure`] encountered; accumulators are left
    /// untouched in that case.
    pub fn drain(
        &self,
        layers: &mut [SoilLayer],
        settings: &AdaptiveSettings,
    ) -> Result<DrainageOutcome, LayerFailure> {
        let integrate_layer = |(i, layer): (usize, &SoilLayer)| {
            self.potential_drainage(layer, settings)
                .map_err(|error| LayerFailure { layer: i, error })
        };

        let potential: Vec<f64> = if self.parallel {
            layers
                .par_iter()
                .enumerate()
                .map(integrate_layer)
                .collect::<Result<_, _>>()?
        } else {
            layers
                .iter()
                .enumerate()
                .map(integrate_layer)
                .collect::<Result<_, _>>()?
        };

        let count = layers.len();
        let mut drained = vec![0.0; count];
        let mut discharge_mm = 0.0;
        for i in 0..count {
            let available = layers[i].liquid_fraction() * layers[i].thickness;
            let mut amount = potential[i].min(available);
            if i + 1 < count {
                amount = amount.min(layers[i + 1].unsaturated_capacity());
                layers[i + 1].water_gain += amount;
            } else {
                discharge_mm = amount * MM_PER_M;
            }
            layers[i].water_loss += amount;
            drained[i] = amount;
        }

        trace!(discharge_mm, "gravitational drainage posted");
        Ok(DrainageOutcome {
            drained,
            discharge_mm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::soil_hydraulics::SoilTexture;
    use approx::assert_abs_diff_eq;

    fn layer(water_fraction: f64) -> SoilLayer {
        let mut layer = SoilLayer::new(0.1, 0.0, SoilTexture::default(), 0.95, 0.05, None);
        layer.water_fraction = water_fraction;
        layer
    }

    fn drainage() -> GravitationalDrainage {
        GravitationalDrainage {
            step_seconds: 1800.0,
            threshold_override: None,
            parallel: false,
        }
    }

    #[test]
    fn no_drainage_at_field_capacity() {
        let l = layer(0.0);
        let at_fc = layer(l.field_capacity);
        let amount = drainage()
            .potential_drainage(&at_fc, &AdaptiveSettings::default())
            .unwrap();
        assert_eq!(amount, 0.0);
    }

    #[test]
    fn wet_layer_drains_towards_threshold() {
        let wet = layer(0.44);
        let amount = drainage()
            .potential_drainage(&wet, &AdaptiveSettings::default())
            .unwrap();
        assert!(amount > 0.0);
        // Never drains below field capacity
        assert!(amount <= (0.44 - wet.field_capacity) * wet.thickness + 1e-9);
    }

    #[test]
    fn drainage_is_monotone_in_water_content() {
        let model = drainage();
        let settings = AdaptiveSettings::default();
        let fc = layer(0.0).field_capacity;
        let mut previous = 0.0;
        for step in 0..=10 {
            let theta = fc + (0.44 - fc) * f64::from(step) / 10.0;
            let amount = model.potential_drainage(&layer(theta), &settings).unwrap();
            assert!(amount >= previous - 1e-12, "not monotone at theta={theta}");
            previous = amount;
        }
    }

    #[test]
    fn site_threshold_overrides_field_capacity() {
        let model = GravitationalDrainage {
            threshold_override: Some(0.44),
            ..drainage()
        };
        let amount = model
            .potential_drainage(&layer(0.40), &AdaptiveSettings::default())
            .unwrap();
        assert_eq!(amount, 0.0);
    }

    #[test]
    fn site_parameters_set_the_threshold() {
        let site = SiteParameters {
            drainage_threshold_override: Some(0.25),
            ..SiteParameters::default()
        };
        let l = layer(0.3);
        assert_eq!(GravitationalDrainage::new(&site, 1800.0, false).threshold(&l), 0.25);
        assert_eq!(
            GravitationalDrainage::new(&SiteParameters::default(), 1800.0, false).threshold(&l),
            l.field_capacity
        );
    }

    #[test]
    fn partly_frozen_layer_drains_only_its_liquid() {
        let model = GravitationalDrainage {
            threshold_override: Some(0.0),
            ..drainage()
        };
        let settings = AdaptiveSettings::default();
        let mut layers = vec![layer(0.44), layer(0.0)];
        layers[0].ice_proportion = 0.99;
        let liquid = layers[0].liquid_fraction() * layers[0].thickness;

        let potential = model.potential_drainage(&layers[0], &settings).unwrap();
        let outcome = model.drain(&mut layers, &settings).unwrap();

        assert!(outcome.drained[0] > 0.0);
        assert_eq!(outcome.drained[0], potential.min(liquid));
        assert!(outcome.drained[0] <= liquid);
        // Far less than the same layer would shed unfrozen
        assert!(outcome.drained[0] < 0.44 * layers[0].thickness * 0.02);
        assert_abs_diff_eq!(layers[0].water_loss, outcome.drained[0], epsilon = 1e-15);
    }

    #[test]
    fn part_full_receiver_takes_only_its_free_room() {
        let mut layers = vec![layer(0.44), layer(0.44)];
        let room = 1e-6;
        layers[1].water_fraction = layers[1].porosity - room / layers[1].thickness;
        let free = layers[1].unsaturated_capacity();
        let settings = AdaptiveSettings::default();
        let potential = drainage().potential_drainage(&layers[0], &settings).unwrap();
        assert!(potential > free, "potential {potential} within room {free}");

        let outcome = drainage().drain(&mut layers, &settings).unwrap();

        assert!(free > 0.0);
        assert_eq!(outcome.drained[0], free);
        assert_eq!(layers[1].water_gain, free);
    }

    #[test]
    fn flux_posts_to_layer_below_and_discharges_at_bottom() {
        let mut layers = vec![layer(0.44), layer(0.2), layer(0.44)];
        let outcome = drainage()
            .drain(&mut layers, &AdaptiveSettings::default())
            .unwrap();

        assert!(outcome.drained[0] > 0.0);
        assert_abs_diff_eq!(layers[1].water_gain, outcome.drained[0], epsilon = 1e-15);
        assert_eq!(outcome.drained[1], 0.0);
        assert_abs_diff_eq!(
            outcome.discharge_mm,
            outcome.drained[2] * MM_PER_M,
            epsilon = 1e-12
        );
        assert!(outcome.discharge_mm > 0.0);
    }

    #[test]
    fn receiving_layer_capacity_caps_drainage() {
        let mut layers = vec![layer(0.44), layer(0.44)];
        layers[1].water_fraction = layers[1].porosity;
        let outcome = drainage()
            .drain(&mut layers, &AdaptiveSettings::default())
            .unwrap();
        assert_eq!(outcome.drained[0], 0.0);
        assert_eq!(layers[0].water_loss, 0.0);
    }

    #[test]
    fn parallel_and_serial_agree() {
        let base = vec![layer(0.44), layer(0.38), layer(0.42), layer(0.30)];
        let mut serial = base.clone();
        let mut parallel = base;
        let settings = AdaptiveSettings::default();

        let a = drainage().drain(&mut serial, &settings).unwrap();
        let b = GravitationalDrainage {
            parallel: true,
            ..drainage()
        }
        .drain(&mut parallel, &settings)
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(serial, parallel);
    }
}
