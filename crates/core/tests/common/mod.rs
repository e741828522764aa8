//! Shared helpers for the integration tests.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spa_soil_core::{Kelvin, TimeStepContext};

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Reproducible half-hourly forcing: mild temperatures, a diurnal radiation
/// cycle and occasional showers.
pub fn forcing_sequence(seed: u64, steps: u64) -> Vec<TimeStepContext> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..steps)
        .map(|step_index| {
            let hour = (step_index % 48) as f64 * 0.5;
            let daylight = (std::f64::consts::PI * (hour - 6.0) / 12.0).sin().max(0.0);
            let raining = rng.random_bool(0.15);
            TimeStepContext {
                step_index,
                air_temperature: Kelvin::new(283.15 + 8.0 * daylight + rng.random_range(-1.0..1.0)),
                vapour_pressure_deficit: 0.2 + 1.2 * daylight * rng.random_range(0.5..1.0),
                wind_speed: rng.random_range(0.5..5.0),
                soil_radiation: 250.0 + 350.0 * daylight,
                precipitation_rate: if raining {
                    rng.random_range(1e-4..2e-3)
                } else {
                    0.0
                },
                atmospheric_pressure: 101.3,
                step_seconds: 1800.0,
            }
        })
        .collect()
}
