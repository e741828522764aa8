//! Phases of one timestep.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stage of the per-step state machine.
///
/// Phases run in declaration order. The canopy phase is skipped when the
/// surface was frozen at the end of the previous step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepPhase {
    /// Route precipitation to snow or melt the snowpack
    SnowCheck,
    /// Canopy interception and drainage
    Canopy,
    /// Surface energy balance root find
    SurfaceTemperature,
    /// Transpiration demand from the canopy model
    TranspirationDemand,
    /// Drainage, infiltration, uptake, evaporation and wetting fronts
    WaterFlux,
    /// Soil heat conduction
    HeatDiffusion,
    /// Freezing fronts and ice content
    FreezeThaw,
    /// Mass and energy closure checks
    BalanceCheck,
    /// Step complete
    Done,
}

impl StepPhase {
    /// Phase following `self`; `surface_frozen` routes the snow check past the canopy.
    pub fn next(self, surface_frozen: bool) -> Self {
        match self {
            Self::SnowCheck if surface_frozen => Self::SurfaceTemperature,
            Self::SnowCheck => Self::Canopy,
            Self::Canopy => Self::SurfaceTemperature,
            Self::SurfaceTemperature => Self::TranspirationDemand,
            Self::TranspirationDemand => Self::WaterFlux,
            Self::WaterFlux => Self::HeatDiffusion,
            Self::HeatDiffusion => Self::FreezeThaw,
            Self::FreezeThaw => Self::BalanceCheck,
            Self::BalanceCheck | Self::Done => Self::Done,
        }
    }
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SnowCheck => "snow check",
            Self::Canopy => "canopy interception",
            Self::SurfaceTemperature => "surface energy balance",
            Self::TranspirationDemand => "transpiration demand",
            Self::WaterFlux => "water flux",
            Self::HeatDiffusion => "heat diffusion",
            Self::FreezeThaw => "freeze/thaw",
            Self::BalanceCheck => "balance check",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}
