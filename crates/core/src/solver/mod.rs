//! Numerical kernels and per-phase solvers of the soil column.
//!
//! The generic kernels ([`root_finding`], [`adaptive_rk`]) know nothing about
//! soil; every other module applies one of them, or a closed-form update, to
//! a single phase of the timestep:
//!
//! | Module                     | Phase                                  |
//! |----------------------------|----------------------------------------|
//! | [`canopy_interception`]    | Rutter interception ODE                |
//! | [`surface_energy`]         | Skin temperature root find             |
//! | [`gravitational_drainage`] | Per-layer drainage ODE                 |
//! | [`infiltration`]           | Top-down filling and runoff            |
//! | [`root_uptake`]            | Transpiration and evaporation sinks    |
//! | [`surface_wetting`]        | Wetting fronts and dry-zone thickness  |
//! | [`heat_diffusion`]         | Crank-Nicolson Gauss-Seidel relaxation |
//! | [`freeze_thaw`]            | Thaw fronts and ice proportion         |

pub mod adaptive_rk;
pub mod canopy_interception;
pub mod freeze_thaw;
pub mod gravitational_drainage;
pub mod heat_diffusion;
pub mod infiltration;
pub mod root_finding;
pub mod root_uptake;
pub mod surface_energy;
pub mod surface_wetting;

pub use adaptive_rk::{integrate, AdaptiveSettings, Integration};
pub use canopy_interception::{CanopyInterception, CanopyOutcome};
pub use freeze_thaw::{thaw_fronts, update_ice};
pub use gravitational_drainage::{DrainageOutcome, GravitationalDrainage, LayerFailure};
pub use heat_diffusion::{
    Conduction, ConductionBudget, DiffusionFailure, HeatDiffusionSolver, NodeCoupling, Relaxation,
};
pub use infiltration::{infiltrate, InfiltrationOutcome};
pub use root_finding::{brent, Root};
pub use surface_energy::{SurfaceEnergyBalance, SurfaceFluxes, SurfaceSolution};
pub use surface_wetting::{Desiccation, SurfaceWetting};
