//! Soil column physics for a soil-plant-atmosphere model.
//!
//! Advances a layered soil column one timestep at a time, coupling
//! water, heat and surface energy exchange:
//!
//! - Surface energy balance solved for the skin temperature (Brent root find)
//! - Canopy interception and gravitational drainage (adaptive Cash-Karp integration)
//! - Crank-Nicolson heat diffusion with Gauss-Seidel relaxation
//! - Freeze/thaw fronts and layer ice content
//! - Wetting fronts and the evaporating dry surface zone
//! - Snow accumulation and melt, infiltration, runoff and root uptake
//!
//! ## Usage
//!
//! ```
//! use spa_soil_core::{CanopyDemand, ModelConfig, SoilColumnModel, TimeStepContext};
//!
//! let model = SoilColumnModel::new(ModelConfig::default())?;
//! let mut state = model.initial_state()?;
//! let diagnostics = model.step(&mut state, &TimeStepContext::default(), &CanopyDemand::default())?;
//! assert!(diagnostics.mass_residual_mm.abs() < 1e-6);
//! # Ok::<(), spa_soil_core::SoilError>(())
//! ```

// Configuration, state and forcing
pub mod config;
pub mod core_types;
pub mod error;

// Property functions and solvers
pub mod physics;
pub mod solver;

// Timestep orchestration
pub mod simulation;

pub use config::{
    ModelConfig, SiteParameters, SoilConfig, SoilLayerConfig, SolverSettings, VegetationConfig,
};
pub use core_types::{CanopyDemand, Celsius, Kelvin, SoilColumnState, SoilLayer, TimeStepContext};
pub use error::{NumericalError, SoilError, SoilResult, Warning};
pub use simulation::{SoilColumnModel, StepDiagnostics, StepPhase};
