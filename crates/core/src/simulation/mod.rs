//! Timestep orchestration for the soil column.
//!
//! A step runs the [`StepPhase`] state machine over a working copy of the
//! column:
//!
//! ```text
//! SnowCheck -> Canopy -> SurfaceTemperature -> TranspirationDemand
//!           -> WaterFlux -> HeatDiffusion -> FreezeThaw -> BalanceCheck -> Done
//! ```
//!
//! The canopy phase is skipped while the surface is frozen. Any fatal error
//! aborts the step and leaves the caller's state untouched.

mod balance;
mod column_model;
mod diagnostics;
mod phase;

pub use balance::{mass_tolerance, WaterBudget};
pub use column_model::SoilColumnModel;
pub use diagnostics::StepDiagnostics;
pub use phase::StepPhase;
