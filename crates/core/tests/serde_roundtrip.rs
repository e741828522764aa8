//! Checkpoint and restore through JSON must not perturb the run.

mod common;

use spa_soil_core::{CanopyDemand, ModelConfig, SoilColumnModel, SoilColumnState};

#[test]
fn restored_state_steps_identically() {
    let model = SoilColumnModel::new(ModelConfig::default()).unwrap();
    let mut state = model.initial_state().unwrap();
    let forcing = common::forcing_sequence(21, 24);
    let demand = CanopyDemand {
        transpiration: 40.0,
        wet_canopy_evaporation: 20.0,
        ..CanopyDemand::default()
    };

    let (warm_up, rest) = forcing.split_at(12);
    for ctx in warm_up {
        model.step(&mut state, ctx, &demand).unwrap();
    }

    let json = serde_json::to_string(&state).unwrap();
    let mut restored: SoilColumnState = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, state);

    for ctx in rest {
        let original = model.step(&mut state, ctx, &demand).unwrap();
        let replayed = model.step(&mut restored, ctx, &demand).unwrap();
        assert_eq!(original, replayed);
    }
    assert_eq!(restored, state);
}

#[test]
fn diagnostics_serialise_with_named_fields() {
    let model = SoilColumnModel::new(ModelConfig::default()).unwrap();
    let mut state = model.initial_state().unwrap();
    let ctx = &common::forcing_sequence(5, 1)[0];
    let diagnostics = model.step(&mut state, ctx, &CanopyDemand::default()).unwrap();

    let value = serde_json::to_value(&diagnostics).unwrap();
    assert_eq!(value["step_index"], 0);
    assert!(value["surface_temperature"].as_f64().unwrap() > 200.0);
    assert!(value["fluxes"]["ground"].is_number());
    assert!(value["warnings"].is_array());
}

#[test]
fn partial_json_config_falls_back_to_defaults() {
    let config: ModelConfig = serde_json::from_str(
        r#"{ "vegetation": { "canopy_height": 4.0, "tower_height": 6.0 }, "solver": { "parallel_drainage": true } }"#,
    )
    .unwrap();
    assert_eq!(config.vegetation.canopy_height, 4.0);
    assert_eq!(config.soil.layers.len(), 6);
    let model = SoilColumnModel::new(config).unwrap();
    assert!(model.config().solver.parallel_drainage);
}
