//! Implicit finite-volume heat conduction through the soil profile.
//!
//! # Physics Implementation
//!
//! Temperature nodes sit at the surface (node 0) and at each layer midpoint
//! (node `j` for layer `j - 1`). The surface node carries the skin
//! temperature from the energy balance and the deepest node is held at its
//! current value; both are fixed boundaries.
//!
//! Neighbouring nodes exchange heat through one conductance per interface,
//! so whatever leaves a layer enters its neighbour. The surface interface
//! spans half the top layer, matching the ground flux of the surface energy
//! balance; interior interfaces combine the two half layers in series:
//!
//! ```text
//! G_0     = k_1 / (Δz_1 / 2)
//! G_j     = 1 / (Δz_j / 2k_j + Δz_{j+1} / 2k_{j+1})
//! a±_j    = G_{j±½} Δt / (C_j Δz_j)
//! T*_j    = [T_j + β (a-_j T*_{j-1} + a+_j T*_{j+1})
//!            + (1-β) (a-_j (T_{j-1} - T_j) + a+_j (T_{j+1} - T_j))]
//!           / (1 + β (a-_j + a+_j))
//! ```
//!
//! For equal layers `a±_j` reduces to the diffusion number
//! `D_j = (k_j / C_j) Δt / Δz_j²`. The weighted implicit system (Crank-Nicolson
//! for `β = 0.5`) is solved by Gauss-Seidel relaxation until the summed
//! absolute change of one sweep drops below the tolerance.
//!
//! Because the interface fluxes telescope, the heat gained by the profile
//! equals the heat conducted in at the surface less the heat passed to the
//! fixed bottom node. [`ConductionBudget`] records both sides.
//!
//! # Scientific References
//! - Crank, J. & Nicolson, P. (1947). "A practical method for numerical
//!   evaluation of solutions of partial differential equations of the
//!   heat-conduction type". Proc. Cambridge Phil. Soc., 43(1), 50-67
//! - Patankar, S.V. (1980). "Numerical Heat Transfer and Fluid Flow", ch. 4
//! - Hillel, D. (1980). "Fundamentals of Soil Physics", ch. 12

use tracing::trace;

use crate::config::SolverSettings;
use crate::core_types::column::{SoilColumnState, SoilLayer};
use crate::error::NumericalError;
use crate::physics::soil_thermal::{thermal_conductivity, volumetric_heat_capacity};

/// Convergence record of one relaxation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Relaxation {
    /// Gauss-Seidel sweeps performed
    pub iterations: usize,
    /// Summed absolute node change of the last sweep (K)
    pub final_change: f64,
}

/// Relaxation failure with the node that moved most in the last sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffusionFailure {
    /// Layer whose midpoint node changed most in the final sweep
    pub worst_layer: Option<usize>,
    /// Kernel error
    pub error: NumericalError,
}

/// Dimensionless exchange coefficients of one node with its neighbours over a step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeCoupling {
    /// Coupling to the node above
    pub above: f64,
    /// Coupling to the node below
    pub below: f64,
}

/// Heat ledger of one conduction step (J/m²).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConductionBudget {
    /// Change in profile heat content
    pub storage_change: f64,
    /// Heat conducted in across the surface
    pub surface_input: f64,
    /// Heat conducted into the fixed bottom node
    pub bottom_loss: f64,
}

impl ConductionBudget {
    /// Storage change not explained by the boundary fluxes.
    pub fn residual(&self) -> f64 {
        self.storage_change - (self.surface_input - self.bottom_loss)
    }
}

/// Result of advancing the profile by one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conduction {
    /// Relaxation convergence record
    pub relaxation: Relaxation,
    /// Heat ledger of the step
    pub budget: ConductionBudget,
}

/// Weighted implicit heat diffusion solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatDiffusionSolver {
    /// Implicit weight β (0 = explicit, 0.5 = Crank-Nicolson, 1 = fully implicit)
    pub implicit_weight: f64,
    /// Sweep change below which relaxation stops (K)
    pub tolerance: f64,
    /// Sweep cap
    pub max_iterations: usize,
}

impl Default for HeatDiffusionSolver {
    fn default() -> Self {
        Self::from(&SolverSettings::default())
    }
}

impl From<&SolverSettings> for HeatDiffusionSolver {
    fn from(settings: &SolverSettings) -> Self {
        Self {
            implicit_weight: settings.heat_implicit_weight,
            tolerance: settings.heat_tolerance,
            max_iterations: settings.heat_max_iterations,
        }
    }
}

/// Interface conductances (W/m²/K): entry 0 joins the surface to the first
/// midpoint, entry `i` joins layers `i - 1` and `i`.
pub fn interface_conductances(layers: &[SoilLayer]) -> Vec<f64> {
    let half_resistance = |layer: &SoilLayer| 0.5 * layer.thickness / thermal_conductivity(layer);
    layers
        .iter()
        .enumerate()
        .map(|(i, layer)| match i {
            0 => 1.0 / half_resistance(layer),
            _ => 1.0 / (half_resistance(&layers[i - 1]) + half_resistance(layer)),
        })
        .collect()
}

/// Couplings of every layer node for a step of `dt` seconds; the deepest
/// layer has no neighbour below.
pub fn node_couplings(layers: &[SoilLayer], dt: f64) -> Vec<NodeCoupling> {
    let conductance = interface_conductances(layers);
    layers
        .iter()
        .enumerate()
        .map(|(i, layer)| {
            let scale = dt / (volumetric_heat_capacity(layer) * layer.thickness);
            NodeCoupling {
                above: conductance[i] * scale,
                below: conductance.get(i + 1).map_or(0.0, |g| g * scale),
            }
        })
        .collect()
}

impl HeatDiffusionSolver {
    /// Advance the layer temperatures of `state` by `dt` seconds.
    ///
    /// The surface temperature must already hold this step's solved value.
    ///
    /// # Errors
    /// Returns [`DiffusionFailure`] when relaxation hits the sweep cap or a
    /// node temperature becomes non-finite.
    pub fn solve(
        &self,
        state: &mut SoilColumnState,
        dt: f64,
    ) -> Result<Conduction, DiffusionFailure> {
        let previous = state.temperature_nodes();
        let conductance = interface_conductances(&state.layers);
        let couplings = node_couplings(&state.layers, dt);
        let (nodes, relaxation) = self.relax(&previous, &previous, &couplings)?;

        let heat_before = state.heat_content();
        for (layer, temperature) in state.layers.iter_mut().zip(nodes.iter().skip(1)) {
            layer.temperature = *temperature;
        }

        let budget = match (conductance.first(), conductance.last()) {
            (Some(&top), Some(&bottom)) if nodes.len() > 2 => {
                let beta = self.implicit_weight;
                let last = nodes.len() - 1;
                let weighted = |upper: usize, lower: usize| {
                    beta * (nodes[upper] - nodes[lower])
                        + (1.0 - beta) * (previous[upper] - previous[lower])
                };
                ConductionBudget {
                    storage_change: state.heat_content() - heat_before,
                    surface_input: dt * top * weighted(0, 1),
                    bottom_loss: dt * bottom * weighted(last - 1, last),
                }
            }
            _ => ConductionBudget::default(),
        };
        trace!(
            storage = budget.storage_change,
            surface = budget.surface_input,
            bottom = budget.bottom_loss,
            "conduction budget"
        );

        Ok(Conduction { relaxation, budget })
    }

    /// Relax the implicit system starting from `guess`.
    ///
    /// `previous` holds the node temperatures at the start of the step and
    /// `couplings[j - 1]` the exchange coefficients of node `j`. Boundary
    /// nodes are taken from `guess` unchanged. Returns the converged nodes.
    ///
    /// # Errors
    /// Returns [`DiffusionFailure`] when the sweep cap is reached or a node
    /// becomes non-finite.
    pub fn relax(
        &self,
        previous: &[f64],
        guess: &[f64],
        couplings: &[NodeCoupling],
    ) -> Result<(Vec<f64>, Relaxation), DiffusionFailure> {
        let mut nodes = guess.to_vec();
        let last = nodes.len().saturating_sub(1);
        if last < 2 {
            return Ok((
                nodes,
                Relaxation {
                    iterations: 0,
                    final_change: 0.0,
                },
            ));
        }

        let beta = self.implicit_weight;
        let mut change = f64::INFINITY;
        let mut worst = (0, 0.0);

        for iteration in 1..=self.max_iterations {
            change = 0.0;
            worst = (0, 0.0);
            for j in 1..last {
                let NodeCoupling { above, below } = couplings[j - 1];
                let explicit = above * (previous[j - 1] - previous[j])
                    + below * (previous[j + 1] - previous[j]);
                let updated = (previous[j]
                    + beta * (above * nodes[j - 1] + below * nodes[j + 1])
                    + (1.0 - beta) * explicit)
                    / (1.0 + beta * (above + below));

                if !updated.is_finite() {
                    return Err(DiffusionFailure {
                        worst_layer: Some(j - 1),
                        error: NumericalError::NonFinite { at: j as f64 },
                    });
                }
                let delta = (updated - nodes[j]).abs();
                if delta > worst.1 {
                    worst = (j - 1, delta);
                }
                change += delta;
                nodes[j] = updated;
            }

            if change < self.tolerance {
                trace!(iterations = iteration, change, "heat relaxation converged");
                return Ok((
                    nodes,
                    Relaxation {
                        iterations: iteration,
                        final_change: change,
                    },
                ));
            }
        }

        Err(DiffusionFailure {
            worst_layer: Some(worst.0),
            error: NumericalError::MaxIterations {
                iterations: self.max_iterations,
                residual: change,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SoilConfig;
    use approx::assert_abs_diff_eq;

    fn column() -> SoilColumnState {
        SoilColumnState::from_config(&SoilConfig::default()).unwrap()
    }

    fn uniform(above: f64, below: f64, count: usize) -> Vec<NodeCoupling> {
        vec![NodeCoupling { above, below }; count]
    }

    #[test]
    fn uniform_profile_stays_uniform() {
        let mut state = column();
        let before: Vec<f64> = state.layers.iter().map(|l| l.temperature).collect();
        state.surface_temperature = before[0];

        let conduction = HeatDiffusionSolver::default().solve(&mut state, 1800.0).unwrap();

        for (layer, t0) in state.layers.iter().zip(before) {
            assert_abs_diff_eq!(layer.temperature, t0, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(conduction.budget.storage_change, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn warm_surface_heats_top_layer_first() {
        let mut state = column();
        let t0 = state.layers[0].temperature;
        state.surface_temperature = t0 + 10.0;

        HeatDiffusionSolver::default().solve(&mut state, 3600.0).unwrap();

        let top = state.layers[0].temperature - t0;
        let second = state.layers[1].temperature - t0;
        assert!(top > 0.0 && top < 10.0, "top warmed by {top}");
        assert!(second >= 0.0 && second < top);
        // Bottom boundary is fixed
        assert_eq!(state.layers.last().unwrap().temperature, t0);
    }

    #[test]
    fn heat_gain_matches_boundary_fluxes() {
        let mut state = column();
        state.surface_temperature = 305.0;
        state.layers[2].water_fraction = 0.42;
        let temperatures = [290.0, 286.0, 284.0, 283.0, 282.0, 281.0];
        for (layer, t) in state.layers.iter_mut().zip(temperatures) {
            layer.temperature = t;
        }

        let budget = HeatDiffusionSolver::default()
            .solve(&mut state, 1800.0)
            .unwrap()
            .budget;

        assert!(budget.surface_input > 0.0);
        assert!(budget.bottom_loss > 0.0);
        assert!(budget.storage_change > 0.0);
        // Relaxation stops within 5e-7 K per sweep; the ledger closes far tighter than 1 J/m²
        assert!(budget.residual().abs() < 1.0, "residual {}", budget.residual());
    }

    #[test]
    fn loose_relaxation_leaves_a_heat_residual() {
        let mut state = column();
        state.surface_temperature = 305.0;
        let solver = HeatDiffusionSolver {
            tolerance: 50.0,
            ..HeatDiffusionSolver::default()
        };

        let conduction = solver.solve(&mut state, 1800.0).unwrap();

        assert_eq!(conduction.relaxation.iterations, 1);
        assert!(conduction.budget.residual().abs() > 1.0);
    }

    #[test]
    fn surface_interface_matches_ground_flux_conductance() {
        let state = column();
        let top = &state.layers[0];
        let conductance = interface_conductances(&state.layers);
        assert_abs_diff_eq!(
            conductance[0],
            thermal_conductivity(top) / (0.5 * top.thickness),
            epsilon = 1e-12
        );
        // Identical half layers in series give the plain midpoint spacing
        assert_abs_diff_eq!(
            conductance[1],
            thermal_conductivity(top) / top.thickness,
            epsilon = 1e-12
        );
    }

    #[test]
    fn relaxing_a_converged_solution_is_idempotent() {
        let solver = HeatDiffusionSolver::default();
        let previous = vec![295.0, 285.0, 284.0, 283.0, 282.0, 281.0, 280.0];
        let couplings: Vec<NodeCoupling> = [0.4, 0.3, 0.2, 0.1, 0.05, 0.02]
            .iter()
            .map(|&d| NodeCoupling { above: d, below: d })
            .collect();

        let (first, _) = solver.relax(&previous, &previous, &couplings).unwrap();
        let (second, again) = solver.relax(&previous, &first, &couplings).unwrap();

        assert!(again.iterations <= 2, "took {} sweeps", again.iterations);
        for (a, b) in first.iter().zip(&second) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn converged_nodes_satisfy_the_scheme() {
        let solver = HeatDiffusionSolver::default();
        let previous = vec![300.0, 290.0, 285.0, 280.0];
        let couplings = [
            NodeCoupling { above: 1.6, below: 0.8 },
            NodeCoupling { above: 0.5, below: 0.3 },
            NodeCoupling { above: 0.3, below: 0.0 },
        ];
        let (nodes, _) = solver.relax(&previous, &previous, &couplings).unwrap();

        for j in 1..3 {
            let c = couplings[j - 1];
            let flux = |t: &[f64]| c.above * (t[j - 1] - t[j]) + c.below * (t[j + 1] - t[j]);
            let lhs = nodes[j] - previous[j];
            let rhs = 0.5 * flux(&nodes) + 0.5 * flux(&previous);
            assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-5);
        }
    }

    #[test]
    fn sweep_cap_reports_worst_layer() {
        let solver = HeatDiffusionSolver {
            max_iterations: 1,
            tolerance: 1e-12,
            ..HeatDiffusionSolver::default()
        };
        let previous = vec![320.0, 280.0, 280.0, 280.0];
        let failure = solver
            .relax(&previous, &previous, &uniform(5.0, 5.0, 3))
            .unwrap_err();
        assert!(matches!(
            failure.error,
            NumericalError::MaxIterations { iterations: 1, .. }
        ));
        assert_eq!(failure.worst_layer, Some(0));
    }

    #[test]
    fn wetter_layers_couple_differently() {
        let mut state = column();
        state.layers[0].water_fraction = 0.05;
        state.layers[1].water_fraction = 0.4;
        let couplings = node_couplings(&state.layers, 1800.0);
        assert!(couplings
            .iter()
            .all(|c| c.above.is_finite() && c.above > 0.0 && c.below >= 0.0));
        assert_ne!(couplings[0].below, couplings[1].above);
        assert_eq!(couplings.last().unwrap().below, 0.0);
    }
}
