//! Edge cases driven through the full timestep.

mod common;

use approx::assert_abs_diff_eq;
use spa_soil_core::core_types::{WettingZone, WettingZones};
use spa_soil_core::solver::heat_diffusion::node_couplings;
use spa_soil_core::solver::{AdaptiveSettings, GravitationalDrainage, HeatDiffusionSolver};
use spa_soil_core::{
    CanopyDemand, Kelvin, ModelConfig, SiteParameters, SoilColumnModel, SoilError, StepPhase,
    TimeStepContext,
};

fn model() -> SoilColumnModel {
    SoilColumnModel::new(ModelConfig::default()).unwrap()
}

#[test]
fn frozen_surface_has_no_latent_flux() {
    let model = model();
    let mut state = model.initial_state().unwrap();
    state.surface_temperature = 262.0;
    for layer in &mut state.layers {
        layer.temperature = 265.0;
    }
    let ctx = TimeStepContext {
        air_temperature: Kelvin::new(258.15),
        soil_radiation: 50.0,
        ..TimeStepContext::default()
    };

    let diagnostics = model.step(&mut state, &ctx, &CanopyDemand::default()).unwrap();

    assert!(diagnostics.surface_temperature < 273.15);
    assert_eq!(diagnostics.fluxes.latent, 0.0);
    assert_eq!(diagnostics.soil_evaporation_mm, 0.0);
    assert_eq!(diagnostics.dew_mm, 0.0);
}

#[test]
fn dry_surface_layer_has_no_latent_flux() {
    let model = model();
    let mut state = model.initial_state().unwrap();
    state.layers[0].water_fraction = 0.0;
    state.layers[0].refresh_conductivity();

    let diagnostics = model
        .step(&mut state, &TimeStepContext::default(), &CanopyDemand::default())
        .unwrap();

    assert_eq!(diagnostics.fluxes.latent, 0.0);
    assert_eq!(diagnostics.soil_evaporation_mm, 0.0);
}

#[test]
fn overfull_canopy_drains_and_evaporates() {
    let model = model();
    let capacity = model.config().vegetation.max_canopy_storage;
    let mut state = model.initial_state().unwrap();
    state.canopy.water_mm = 1.00001 * capacity;
    let demand = CanopyDemand {
        wet_canopy_evaporation: 150.0,
        ..CanopyDemand::default()
    };

    let diagnostics = model
        .step(&mut state, &TimeStepContext::default(), &demand)
        .unwrap();

    assert!(diagnostics.canopy_evaporation_mm > 0.0);
    assert!(diagnostics.infiltration_mm + diagnostics.runoff_mm > 0.0, "no drip reached the soil");
    assert!(state.canopy.water_mm <= capacity);
    assert!(diagnostics.mass_residual_mm.abs() < 1e-6);
}

#[test]
fn desiccation_is_fatal_and_leaves_state_untouched() {
    let model = model();
    let mut state = model.initial_state().unwrap();
    let top = state.layers[0].thickness;
    state.wetting = WettingZones::from_zones(vec![WettingZone {
        top: top - 1e-7,
        bottom: top,
    }]);
    let before = state.clone();
    let ctx = TimeStepContext {
        air_temperature: Kelvin::new(303.15),
        vapour_pressure_deficit: 3.0,
        soil_radiation: 600.0,
        step_seconds: 3600.0,
        ..TimeStepContext::default()
    };

    let err = model
        .step(&mut state, &ctx, &CanopyDemand::default())
        .unwrap_err();

    match err {
        SoilError::SoilDesiccated { step, unmet_demand } => {
            assert_eq!(step, ctx.step_index);
            assert!(unmet_demand > 0.0);
        }
        other => panic!("expected desiccation, got {other}"),
    }
    assert_eq!(state, before);
}

#[test]
fn unbracketed_surface_balance_reports_its_phase() {
    let mut config = ModelConfig::default();
    config.solver.root_bracket_half_width = 1e-3;
    let model = SoilColumnModel::new(config).unwrap();
    let mut state = model.initial_state().unwrap();
    let before = state.clone();

    let err = model
        .step(&mut state, &TimeStepContext::default(), &CanopyDemand::default())
        .unwrap_err();

    assert!(matches!(
        err,
        SoilError::NonConvergence {
            phase: StepPhase::SurfaceTemperature,
            layer: None,
            ..
        }
    ));
    assert_eq!(state, before);
}

#[test]
fn capped_heat_relaxation_reports_its_phase() {
    let mut config = ModelConfig::default();
    config.solver.heat_max_iterations = 1;
    let model = SoilColumnModel::new(config).unwrap();
    let mut state = model.initial_state().unwrap();

    let err = model
        .step(&mut state, &TimeStepContext::default(), &CanopyDemand::default())
        .unwrap_err();

    match err {
        SoilError::NonConvergence {
            phase, iterations, ..
        } => {
            assert_eq!(phase, StepPhase::HeatDiffusion);
            assert_eq!(iterations, 1);
        }
        other => panic!("expected non-convergence, got {other}"),
    }
}

#[test]
fn converged_heat_profile_is_a_fixed_point() {
    let model = model();
    let mut state = model.initial_state().unwrap();
    state.surface_temperature = 275.0;
    let dt = 1800.0;
    let solver = HeatDiffusionSolver::default();

    let previous = state.temperature_nodes();
    let couplings = node_couplings(&state.layers, dt);
    let (converged, first) = solver.relax(&previous, &previous, &couplings).unwrap();
    assert!(first.iterations > 1);

    let (again, second) = solver.relax(&previous, &converged, &couplings).unwrap();
    assert!(second.iterations <= 2, "took {} sweeps", second.iterations);
    for (a, b) in again.iter().zip(&converged) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
    }
}

#[test]
fn wetter_top_layer_drains_more() {
    let model = model();
    let drainage = GravitationalDrainage::new(&SiteParameters::default(), 1800.0, false);
    let settings = AdaptiveSettings::default();

    let mut previous = -1.0;
    for water in [0.30, 0.34, 0.38, 0.42, 0.46] {
        let mut state = model.initial_state().unwrap();
        state.layers[0].water_fraction = water;
        state.layers[0].refresh_conductivity();
        let outcome = drainage.drain(&mut state.layers, &settings).unwrap();
        assert!(
            outcome.drained[0] >= previous,
            "{} < {previous} at θ = {water}",
            outcome.drained[0]
        );
        previous = outcome.drained[0];
    }
    assert!(previous > 0.0);
}
