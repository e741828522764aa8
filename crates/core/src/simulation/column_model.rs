//! Per-timestep orchestration of the soil column solvers.
//!
//! [`SoilColumnModel`] holds only static configuration. Each call to
//! [`SoilColumnModel::step`] works on a copy of the caller's state and
//! writes it back only when every phase succeeded, so a fatal error leaves
//! the column exactly as it was before the step.

use tracing::{debug, info};

use super::balance::{
    check_energy, check_heat, check_mass, heat_residual, mass_tolerance, WaterBudget,
};
use super::diagnostics::StepDiagnostics;
use super::phase::StepPhase;
use crate::config::{validate_uptake_profile, ModelConfig};
use crate::core_types::column::SoilColumnState;
use crate::core_types::forcing::{CanopyDemand, TimeStepContext};
use crate::error::{SoilError, SoilResult, Warning, WarningLog};
use crate::physics::atmosphere::{aerodynamic_conductance, latent_heat_vaporisation};
use crate::physics::constants::{FREEZE, MM_PER_M, SURFACE_WATER_UNDERFLOW_MM};
use crate::solver::adaptive_rk::AdaptiveSettings;
use crate::solver::canopy_interception::CanopyInterception;
use crate::solver::freeze_thaw::update_ice;
use crate::solver::gravitational_drainage::GravitationalDrainage;
use crate::solver::heat_diffusion::{ConductionBudget, HeatDiffusionSolver};
use crate::solver::infiltration::infiltrate;
use crate::solver::root_uptake::{extract_transpiration, withdraw};
use crate::solver::surface_energy::{SurfaceEnergyBalance, SurfaceFluxes};
use crate::solver::surface_wetting::SurfaceWetting;

/// Soil column model: static configuration plus the step state machine.
#[derive(Debug, Clone)]
pub struct SoilColumnModel {
    config: ModelConfig,
    heat: HeatDiffusionSolver,
    ode: AdaptiveSettings,
}

/// Values carried between phases of one step.
struct StepRun<'a> {
    ctx: &'a TimeStepContext,
    demand: &'a CanopyDemand,
    warnings: WarningLog,
    budget: WaterBudget,
    diagnostics: StepDiagnostics,
    water_before_mm: f64,
    conduction: ConductionBudget,
    surface_frozen: bool,
    fluxes: SurfaceFluxes,
    transpiration_demand_mm: f64,
}

impl SoilColumnModel {
    /// Validate `config` and build the model.
    ///
    /// # Errors
    /// Returns [`SoilError::InvalidConfig`] when validation fails.
    pub fn new(config: ModelConfig) -> SoilResult<Self> {
        config.validate()?;
        info!(
            layers = config.soil.layers.len(),
            depth_m = config.soil.layers.iter().map(|l| l.thickness).sum::<f64>(),
            parallel_drainage = config.solver.parallel_drainage,
            "soil column model configured"
        );
        Ok(Self {
            heat: HeatDiffusionSolver::from(&config.solver),
            ode: AdaptiveSettings::from(&config.solver),
            config,
        })
    }

    /// Static configuration
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Fresh column state from the soil configuration.
    ///
    /// # Errors
    /// Returns [`SoilError::InvalidConfig`] if the soil configuration is invalid.
    pub fn initial_state(&self) -> SoilResult<SoilColumnState> {
        SoilColumnState::from_config(&self.config.soil)
    }

    /// Advance `state` by one timestep.
    ///
    /// # Arguments
    /// * `state` - Column state, replaced only on success
    /// * `ctx` - Atmospheric forcing for the step
    /// * `demand` - Transpiration and wet-canopy evaporation demand
    ///
    /// # Errors
    /// - [`SoilError::NonConvergence`] when a root find, integration or relaxation fails
    /// - [`SoilError::SoilDesiccated`] when drying removes every wetting zone
    /// - [`SoilError::LayerCountMismatch`] when `state` does not match the configuration
    /// - [`SoilError::InvalidConfig`] for a malformed per-step uptake profile
    pub fn step(
        &self,
        state: &mut SoilColumnState,
        ctx: &TimeStepContext,
        demand: &CanopyDemand,
    ) -> SoilResult<StepDiagnostics> {
        let expected = self.config.soil.layers.len();
        if state.layer_count() != expected {
            return Err(SoilError::LayerCountMismatch {
                expected,
                actual: state.layer_count(),
            });
        }
        if !demand.uptake_fraction.is_empty() {
            validate_uptake_profile(&demand.uptake_fraction, expected)?;
        }

        let mut work = state.clone();
        work.begin_timestep();

        let mut run = StepRun {
            ctx,
            demand,
            warnings: WarningLog::new(ctx.step_index),
            budget: WaterBudget::default(),
            diagnostics: StepDiagnostics {
                step_index: ctx.step_index,
                ..StepDiagnostics::default()
            },
            water_before_mm: work.total_water_mm(),
            conduction: ConductionBudget::default(),
            surface_frozen: work.surface_temperature < FREEZE,
            fluxes: SurfaceFluxes::default(),
            transpiration_demand_mm: 0.0,
        };

        let mut phase = StepPhase::SnowCheck;
        while phase != StepPhase::Done {
            debug!(step = ctx.step_index, %phase, "entering phase");
            match phase {
                StepPhase::SnowCheck => self.snow_check(&mut work, &mut run),
                StepPhase::Canopy => self.canopy(&mut work, &mut run)?,
                StepPhase::SurfaceTemperature => self.surface_temperature(&mut work, &mut run)?,
                StepPhase::TranspirationDemand => self.transpiration_demand(&mut run),
                StepPhase::WaterFlux => self.water_flux(&mut work, &mut run)?,
                StepPhase::HeatDiffusion => self.heat_diffusion(&mut work, &mut run)?,
                StepPhase::FreezeThaw => Self::freeze_thaw(&mut work, &mut run),
                StepPhase::BalanceCheck => self.balance_check(&work, &mut run),
                StepPhase::Done => {}
            }
            phase = phase.next(run.surface_frozen);
        }

        *state = work;
        let mut diagnostics = run.diagnostics;
        diagnostics.warnings = run.warnings.into_entries();
        Ok(diagnostics)
    }

    fn step_seconds(run: &StepRun<'_>) -> f64 {
        run.ctx.step_seconds
    }

    /// Route precipitation to the snowpack on a frozen surface, otherwise melt snow.
    fn snow_check(&self, work: &mut SoilColumnState, run: &mut StepRun<'_>) {
        let precipitation = run.ctx.precipitation_mm();
        run.budget.precipitation = precipitation;
        run.diagnostics.precipitation_mm = precipitation;

        if run.surface_frozen {
            work.snow.swe_mm += precipitation;
            run.diagnostics.snowfall_mm = precipitation;
            run.diagnostics.canopy_skipped = true;
            debug!(step = run.ctx.step_index, swe_mm = work.snow.swe_mm, "precipitation to snow");
            return;
        }

        let warming = (*run.ctx.air_temperature.to_celsius()).max(0.0);
        let melt = (self.config.site.snowmelt_factor * warming * run.ctx.step_hours())
            .min(work.snow.swe_mm);
        if melt > 0.0 {
            work.snow.swe_mm -= melt;
            work.snow.surface_water_mm += melt;
            run.diagnostics.snowmelt_mm = melt;
        }
    }

    fn canopy(&self, work: &mut SoilColumnState, run: &mut StepRun<'_>) -> SoilResult<()> {
        let ctx = run.ctx;
        let vegetation = &self.config.vegetation;
        let lambda = latent_heat_vaporisation(ctx.air_temperature.value());
        let potential_evaporation =
            run.demand.wet_canopy_evaporation.max(0.0) / lambda * Self::step_seconds(run);

        let interception = CanopyInterception::new(vegetation, ctx.step_minutes());
        let store0 = work.canopy.water_mm;
        let outcome = interception
            .step(
                store0,
                run.budget.precipitation,
                potential_evaporation,
                &self.ode,
                &mut run.warnings,
            )
            .map_err(|e| SoilError::non_convergence(StepPhase::Canopy, ctx.step_index, None, e))?;

        let limit = self.config.solver.canopy_change_warning_fraction * vegetation.max_canopy_storage;
        let change = outcome.store_mm - store0;
        if change.abs() > limit {
            run.warnings.push(Warning::PhysicalBounds {
                quantity: "canopy storage change",
                layer: None,
                value: change,
                clamped_to: change,
            });
        }

        work.canopy.water_mm = outcome.store_mm;
        work.snow.surface_water_mm += outcome.ground_water_mm;
        run.budget.canopy_evaporation = outcome.evaporation_mm;
        run.diagnostics.canopy_evaporation_mm = outcome.evaporation_mm;
        debug!(
            step = ctx.step_index,
            store_mm = outcome.store_mm,
            ground_mm = outcome.ground_water_mm,
            evaporation_mm = outcome.evaporation_mm,
            "canopy integrated"
        );
        Ok(())
    }

    fn surface_temperature(
        &self,
        work: &mut SoilColumnState,
        run: &mut StepRun<'_>,
    ) -> SoilResult<()> {
        let ctx = run.ctx;
        let vegetation = &self.config.vegetation;
        let gah = aerodynamic_conductance(
            ctx.wind_speed,
            vegetation.tower_height,
            vegetation.canopy_height,
        );
        let balance =
            SurfaceEnergyBalance::from_state(work, ctx, self.config.soil.surface_emissivity, gah);
        let solution = balance.solve(&self.config.solver).map_err(|e| {
            SoilError::non_convergence(StepPhase::SurfaceTemperature, ctx.step_index, None, e)
        })?;

        work.surface_temperature = solution.temperature;
        run.fluxes = solution.fluxes;
        run.diagnostics.surface_temperature = solution.temperature;
        run.diagnostics.fluxes = solution.fluxes;

        // Latent flux converts to water at the skin temperature.
        let water_mm = solution.fluxes.latent.abs() / latent_heat_vaporisation(solution.temperature)
            * Self::step_seconds(run);
        if solution.fluxes.latent < 0.0 {
            run.budget.soil_evaporation = water_mm;
        } else {
            run.budget.dew = water_mm;
        }

        debug!(
            step = ctx.step_index,
            ts = solution.temperature,
            iterations = solution.iterations,
            latent = solution.fluxes.latent,
            "surface temperature solved"
        );
        Ok(())
    }

    fn transpiration_demand(&self, run: &mut StepRun<'_>) {
        let lambda = latent_heat_vaporisation(run.ctx.air_temperature.value());
        let flux = run
            .demand
            .effective_transpiration(self.config.site.use_measured_transpiration);
        run.transpiration_demand_mm = flux / lambda * Self::step_seconds(run);
    }

    fn water_flux(&self, work: &mut SoilColumnState, run: &mut StepRun<'_>) -> SoilResult<()> {
        let ctx = run.ctx;
        let step = ctx.step_index;

        let drainage = GravitationalDrainage::new(
            &self.config.site,
            ctx.step_seconds,
            self.config.solver.parallel_drainage,
        );
        let drained = drainage.drain(&mut work.layers, &self.ode).map_err(|failure| {
            SoilError::non_convergence(StepPhase::WaterFlux, step, Some(failure.layer), failure.error)
        })?;
        run.budget.discharge = drained.discharge_mm;

        let mut surface_water = work.snow.surface_water_mm;
        let mut stranded_mm = 0.0;
        if surface_water > 0.0 && surface_water < SURFACE_WATER_UNDERFLOW_MM {
            run.warnings.push(Warning::NumericUnderflow {
                quantity: "surface water",
                value: surface_water,
            });
            stranded_mm = surface_water;
            surface_water = 0.0;
        }
        let infiltration = infiltrate(&mut work.layers, surface_water);
        work.snow.surface_water_mm = 0.0;
        run.budget.runoff = infiltration.runoff_mm + stranded_mm;
        run.diagnostics.infiltration_mm = infiltration.infiltrated_mm;

        let evaporation_mm = withdraw(&mut work.layers[0], run.budget.soil_evaporation);
        run.budget.soil_evaporation = evaporation_mm;
        work.layers[0].water_gain += run.budget.dew / MM_PER_M;

        let fractions = if run.demand.uptake_fraction.is_empty() {
            &self.config.vegetation.root_uptake_fraction
        } else {
            &run.demand.uptake_fraction
        };
        run.budget.transpiration =
            extract_transpiration(&mut work.layers, run.transpiration_demand_mm, fractions);

        let surface_input = work.layers[0].precipitation_gain + run.budget.dew / MM_PER_M;
        let evaporated = evaporation_mm / MM_PER_M;
        let top_porosity = work.layers[0].porosity;

        for (i, layer) in work.layers.iter_mut().enumerate() {
            let updated = layer.water_fraction + layer.net_water_change() / layer.thickness;
            layer.water_fraction = updated;
            if updated > layer.porosity {
                run.warnings.push(Warning::PhysicalBounds {
                    quantity: "water fraction",
                    layer: Some(i),
                    value: updated,
                    clamped_to: layer.porosity,
                });
                run.budget.runoff += (updated - layer.porosity) * layer.thickness * MM_PER_M;
                layer.water_fraction = layer.porosity;
            } else if updated < 0.0 {
                run.warnings.push(Warning::PhysicalBounds {
                    quantity: "water fraction",
                    layer: Some(i),
                    value: updated,
                    clamped_to: 0.0,
                });
                layer.water_fraction = 0.0;
            }
            layer.refresh_conductivity();
        }

        let wetting = SurfaceWetting {
            layer_thickness: work.layers[0].thickness,
            max_zones: self.config.solver.max_wetting_zones,
        };
        let net = SurfaceWetting::net_wetting(surface_input, evaporated, top_porosity);
        wetting
            .apply(&mut work.wetting, net)
            .map_err(|d| SoilError::SoilDesiccated {
                step,
                unmet_demand: d.unmet_demand,
            })?;

        debug!(
            step,
            discharge_mm = run.budget.discharge,
            runoff_mm = run.budget.runoff,
            evaporation_mm,
            transpiration_mm = run.budget.transpiration,
            dry_thickness = work.wetting.dry_thickness(),
            "water fluxes applied"
        );
        Ok(())
    }

    fn heat_diffusion(&self, work: &mut SoilColumnState, run: &mut StepRun<'_>) -> SoilResult<()> {
        let step = run.ctx.step_index;
        let conduction = self
            .heat
            .solve(work, Self::step_seconds(run))
            .map_err(|failure| {
                SoilError::non_convergence(
                    StepPhase::HeatDiffusion,
                    step,
                    failure.worst_layer,
                    failure.error,
                )
            })?;
        run.diagnostics.heat_iterations = conduction.relaxation.iterations;
        run.conduction = conduction.budget;
        Ok(())
    }

    fn freeze_thaw(work: &mut SoilColumnState, run: &mut StepRun<'_>) {
        update_ice(work);
        for layer in &mut work.layers {
            layer.refresh_conductivity();
        }
        run.diagnostics.thaw_fronts.clone_from(&work.thaw_fronts);
    }

    fn balance_check(&self, work: &SoilColumnState, run: &mut StepRun<'_>) {
        let settings = &self.config.solver;
        let water_after = work.total_water_mm();
        let residual = run.budget.residual(run.water_before_mm, water_after);
        let tolerance = mass_tolerance(settings.mass_balance_relative_tolerance, run.water_before_mm);
        check_mass(residual, tolerance, &mut run.warnings);

        let energy_residual = run.fluxes.residual();
        check_energy(energy_residual, settings.energy_balance_tolerance, &mut run.warnings);

        let seconds = Self::step_seconds(run);
        let heat_residual_w_m2 = heat_residual(&run.conduction, seconds);
        check_heat(heat_residual_w_m2, settings.heat_balance_tolerance, &mut run.warnings);
        let lambda_air = latent_heat_vaporisation(run.ctx.air_temperature.value());
        let budget = run.budget;
        let d = &mut run.diagnostics;
        d.soil_evaporation_mm = budget.soil_evaporation;
        d.dew_mm = budget.dew;
        d.transpiration_mm = budget.transpiration;
        d.transpiration_w_m2 = budget.transpiration * lambda_air / seconds;
        d.evapotranspiration_mm =
            budget.soil_evaporation + budget.canopy_evaporation + budget.transpiration - budget.dew;
        d.evapotranspiration_w_m2 = d.evapotranspiration_mm * lambda_air / seconds;
        d.runoff_mm = budget.runoff;
        d.discharge_mm = budget.discharge;
        d.swe_mm = work.snow.swe_mm;
        d.canopy_storage_mm = work.canopy.water_mm;
        d.heat_storage_change = run.conduction.storage_change;
        d.ground_heat_input = run.conduction.surface_input;
        d.bottom_heat_loss = run.conduction.bottom_loss;
        d.heat_residual_w_m2 = heat_residual_w_m2;
        d.mass_residual_mm = residual;
        d.energy_residual_w_m2 = energy_residual;

        debug!(
            step = run.ctx.step_index,
            mass_residual_mm = residual,
            energy_residual = energy_residual,
            heat_residual = heat_residual_w_m2,
            "balance checked"
        );
    }
}
