// Fluid timestepping struct

use serde::{Deserialize, Serialize};
use tracing::{Level, debug, enabled, error};

use crate::{
    DyeField,
    preprocessing::SimulationInput,
    sim::{
        advection::Advector,
        boundary::{self, Obstacle},
        grid::{FluidGrid, GridError},
        inject::{self, FlowSource},
        poisson::{self, PressureSolver, ProjectionSettings},
    },
};

/// Maximum allowable velocity before stopping simulation
const MAX_VELOCITY: f32 = 1000.;

/// Time stepping and projection parameters
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct SolverSettings {
    /// Seconds per tick before the multiplier
    pub base_time_step: f32,

    pub time_step_multiplier: f32,

    /// Pressure iterations per tick
    pub iterations: usize,

    pub sor_factor: f32,

    pub density: f32,

    /// Fraction of the dye removed each tick, in `[0, 1)`
    pub decay: f32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        let projection = ProjectionSettings::default();

        SolverSettings {
            base_time_step: 1. / 60.,
            time_step_multiplier: 1.,
            iterations: projection.iterations,
            sor_factor: projection.sor_factor,
            density: projection.density,
            decay: 0.,
        }
    }
}

impl SolverSettings {
    /// The effective time step, `base_time_step × time_step_multiplier`
    pub fn time_step(&self) -> f32 {
        self.base_time_step * self.time_step_multiplier
    }

    pub fn projection(&self) -> ProjectionSettings {
        ProjectionSettings {
            iterations: self.iterations,
            sor_factor: self.sor_factor,
            density: self.density,
        }
    }
}

/// High-level fluid timestepping object. Owns the grid and its
/// solver components and steps the simulation tick by tick.
///
/// Each tick applies the flow sources, advects velocity, advects dye
/// through the advected velocity, fades the dye, then projects.
pub struct FluidSim {
    grid: FluidGrid,

    advector: Advector,

    solver: PressureSolver,

    /// Obstacles marked at setup and on reset
    obstacles: Vec<Obstacle>,

    /// Sources applied at the start of every tick
    sources: Vec<FlowSource>,

    pub settings: SolverSettings,

    /// The number of ticks the iterator runs for
    pub ticks: usize,

    /// The current time instant of the simulation
    pub t: f32,

    /// Iteration-counter
    tick: usize,
}

impl FluidSim {
    /// Create a simulation over `grid`, marking `obstacles` into it.
    ///
    /// Parameters
    /// - `grid` - A freshly built grid; its shape is kept for the whole run
    /// - `obstacles` - Solid shapes, applied in order
    /// - `sources` - Constant flow sources applied every tick
    /// - `settings` - Time step and projection parameters
    /// - `ticks` - The number of ticks to iterate over
    pub fn new(
        mut grid: FluidGrid,
        obstacles: Vec<Obstacle>,
        sources: Vec<FlowSource>,
        settings: SolverSettings,
        ticks: usize,
    ) -> Self {
        boundary::apply_obstacles(&mut grid, &obstacles);

        FluidSim {
            advector: Advector::new(&grid),
            solver: PressureSolver::new(&grid),
            grid,
            obstacles,
            sources,
            settings,
            ticks,
            t: 0.,
            tick: 0,
        }
    }

    /// Build the simulation described by a validated input.
    pub fn from_input(input: &SimulationInput) -> Result<Self, GridError> {
        let grid = FluidGrid::new(
            input.grid.cell_count_x,
            input.grid.cell_count_y,
            input.grid.cell_size,
        )?;

        Ok(FluidSim::new(
            grid,
            input.obstacles.clone(),
            input.sources.clone(),
            input.solver,
            input.ticks,
        ))
    }

    pub fn grid(&self) -> &FluidGrid {
        &self.grid
    }

    /// Mutable access for injecting velocity or dye between ticks
    pub fn grid_mut(&mut self) -> &mut FluidGrid {
        &mut self.grid
    }

    /// Ticks completed since construction or the last reset
    pub fn tick(&self) -> usize {
        self.tick
    }

    /// Advance the simulation by one tick.
    ///
    /// Returns
    /// - The time step that was taken
    pub fn step(&mut self) -> f32 {
        let dt = self.settings.time_step();

        inject::apply_sources(&mut self.grid, &self.sources);

        self.advector.advect_velocity(&mut self.grid, dt);
        self.advector.advect_dye(&mut self.grid, dt);
        if self.settings.decay > 0. {
            self.grid.fade_dye(1. - self.settings.decay);
        }
        self.solver
            .project(&mut self.grid, dt, &self.settings.projection());

        self.tick += 1;
        self.t += dt;

        if enabled!(Level::DEBUG) {
            debug!(
                "tick {}: max speed {:.4}, residual divergence {:.3e}",
                self.tick,
                self.grid.max_speed(),
                poisson::residual_divergence(&self.grid)
            );
        }

        dt
    }

    /// Clear the flow and dye, rebuild the solid mask from the configured
    /// obstacles and rewind the clock.
    pub fn reset(&mut self) {
        self.grid.clear_velocities();
        self.grid.clear_dye();
        self.grid.solid.fill(false);
        boundary::apply_obstacles(&mut self.grid, &self.obstacles);

        self.tick = 0;
        self.t = 0.;
    }

    /// Whether any edge velocity is non-finite or past `MAX_VELOCITY`
    fn exploded(&self) -> bool {
        self.grid
            .velocity()
            .iter()
            .flat_map(|component| component.iter())
            .any(|v| !(v.abs() <= MAX_VELOCITY))
    }
}

impl Iterator for FluidSim {
    type Item = (DyeField, f32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.tick >= self.ticks {
            return None;
        }

        self.step();

        if self.exploded() {
            error!(
                "Velocity exceeded maximum at tick {}; simulation exploded :(",
                self.tick
            );
            return None;
        }

        Some((self.grid.dye().clone(), self.t))
    }
}
