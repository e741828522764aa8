//! Core state and forcing types

pub mod column;
pub mod forcing;
pub mod units;

pub use column::{CanopyStore, SnowStore, SoilColumnState, SoilLayer, WettingZone, WettingZones};
pub use forcing::{CanopyDemand, TimeStepContext};
pub use units::{Celsius, Kelvin};
