// Pressure projection: iterative solve of the discrete poisson equation

use serde::{Deserialize, Serialize};

use crate::{
    ScalarField,
    sim::{grid::FluidGrid, numeric},
};

/// Tunables of the projection step
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct ProjectionSettings {
    /// Full SOR sweeps per tick
    pub iterations: usize,

    /// Over-relaxation factor; (1, 2) accelerates, 1 is plain Gauss-Seidel
    pub sor_factor: f32,

    /// Fluid density
    pub density: f32,
}

impl Default for ProjectionSettings {
    fn default() -> Self {
        ProjectionSettings {
            iterations: 20,
            sor_factor: 1.7,
            density: 1.,
        }
    }
}

/// Per-cell data derived once before the iterative loop.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct CellSolveData {
    /// 1 when the neighbour is fluid, else 0
    flow_left: f32,
    flow_right: f32,
    flow_top: f32,
    flow_bottom: f32,

    /// Number of fluid neighbours
    degree: u8,

    is_solid: bool,

    /// Net outflow over the time step
    velocity_term: f32,
}

/// Removes divergence from the grid's velocity field.
///
/// Runs prepare → iterate → subtract gradient, in that order. The iterative
/// part is red/black ordered SOR: each half-sweep updates one colour from a
/// frozen copy of the pressure, so every cell of a half-sweep is independent.
#[derive(Clone, Debug)]
pub struct PressureSolver {
    cache: na::DMatrix<CellSolveData>,
    scratch: ScalarField,
}

impl PressureSolver {
    pub fn new(grid: &FluidGrid) -> Self {
        let (nx, ny) = (grid.cell_count_x(), grid.cell_count_y());

        PressureSolver {
            cache: na::DMatrix::from_element(nx, ny, CellSolveData::default()),
            scratch: ScalarField::zeros(nx, ny),
        }
    }

    fn fit(&mut self, grid: &FluidGrid) {
        if self.scratch.shape() != grid.pressure().shape() {
            *self = PressureSolver::new(grid);
        }
    }

    /// Make the velocity field divergence-free around the solid mask.
    ///
    /// Parameters
    /// - `grid` - The grid whose velocity and pressure are updated
    /// - `dt` - The time step the divergence is removed over
    /// - `settings` - Iteration count, relaxation factor and density
    pub fn project(&mut self, grid: &mut FluidGrid, dt: f32, settings: &ProjectionSettings) {
        self.prepare(grid, dt);
        self.iterate(grid, settings.iterations, settings.sor_factor, settings.density);
        subtract_gradient(grid, dt, settings.density);
    }

    /// Zero every edge touching a solid, then cache neighbour permissions,
    /// degree and divergence for each cell. Solid and walled-in cells get
    /// pressure 0.
    pub fn prepare(&mut self, grid: &mut FluidGrid, dt: f32) {
        self.fit(grid);
        zero_solid_edges(grid);

        let (vel_x, vel_y) = (&grid.velocity[0], &grid.velocity[1]);

        for y in 0..grid.cell_count_y() {
            for x in 0..grid.cell_count_x() {
                let (xi, yi) = (x as i64, y as i64);

                if grid.solid[(x, y)] {
                    self.cache[(x, y)] = CellSolveData {
                        is_solid: true,
                        ..CellSolveData::default()
                    };
                    grid.pressure[(x, y)] = 0.;
                    continue;
                }

                let flow = |x, y| if grid.is_solid(x, y) { 0. } else { 1. };
                let (flow_left, flow_right) = (flow(xi - 1, yi), flow(xi + 1, yi));
                let (flow_bottom, flow_top) = (flow(xi, yi - 1), flow(xi, yi + 1));
                let degree = (flow_left + flow_right + flow_top + flow_bottom) as u8;

                let net_outflow =
                    vel_x[(x + 1, y)] - vel_x[(x, y)] + vel_y[(x, y + 1)] - vel_y[(x, y)];

                self.cache[(x, y)] = CellSolveData {
                    flow_left,
                    flow_right,
                    flow_top,
                    flow_bottom,
                    degree,
                    is_solid: false,
                    velocity_term: net_outflow / dt,
                };

                if degree == 0 {
                    grid.pressure[(x, y)] = 0.;
                }
            }
        }
    }

    /// Run `iterations` full SOR sweeps over the cached system.
    ///
    /// Neighbour lookups clamp to the grid, so a border cell without a wall
    /// sees its own pressure across the edge.
    pub fn iterate(&mut self, grid: &mut FluidGrid, iterations: usize, sor_factor: f32, density: f32) {
        self.fit(grid);

        let (nx, ny) = (grid.cell_count_x(), grid.cell_count_y());
        let cs = grid.cell_size();
        let cache = &self.cache;

        for _ in 0..iterations {
            for colour in [0, 1] {
                let read = &grid.pressure;

                numeric::fill_with_index(&mut self.scratch, |x, y| {
                    let pressure = read[(x, y)];
                    if (x + y) % 2 != colour {
                        return pressure;
                    }

                    let cell = &cache[(x, y)];
                    if cell.is_solid || cell.degree == 0 {
                        return 0.;
                    }

                    let neighbour_sum = read[((x + 1).min(nx - 1), y)] * cell.flow_right
                        + read[(x.saturating_sub(1), y)] * cell.flow_left
                        + read[(x, (y + 1).min(ny - 1))] * cell.flow_top
                        + read[(x, y.saturating_sub(1))] * cell.flow_bottom;

                    let target =
                        (neighbour_sum - density * cs * cell.velocity_term) / cell.degree as f32;

                    pressure + (target - pressure) * sor_factor
                });

                std::mem::swap(&mut grid.pressure, &mut self.scratch);
            }
        }
    }
}

/// Set every edge velocity adjacent to a solid cell to 0.
pub fn zero_solid_edges(grid: &mut FluidGrid) {
    let (nx, ny) = (grid.cell_count_x() as i64, grid.cell_count_y() as i64);

    for y in 0..ny {
        for x in 0..=nx {
            if grid.is_solid(x - 1, y) || grid.is_solid(x, y) {
                grid.velocity[0][(x as usize, y as usize)] = 0.;
            }
        }
    }
    for y in 0..=ny {
        for x in 0..nx {
            if grid.is_solid(x, y - 1) || grid.is_solid(x, y) {
                grid.velocity[1][(x as usize, y as usize)] = 0.;
            }
        }
    }
}

/// Subtract the pressure gradient from every edge velocity. Edges touching
/// a solid are set to 0 instead.
pub fn subtract_gradient(grid: &mut FluidGrid, dt: f32, density: f32) {
    let (nx, ny) = (grid.cell_count_x() as i64, grid.cell_count_y() as i64);
    let k = dt / (density * grid.cell_size());

    for y in 0..ny {
        for x in 0..=nx {
            let edge = (x as usize, y as usize);
            if grid.is_solid(x - 1, y) || grid.is_solid(x, y) {
                grid.velocity[0][edge] = 0.;
                continue;
            }

            let gradient = grid.pressure[grid.clamp_cell(x, y)] - grid.pressure[grid.clamp_cell(x - 1, y)];
            grid.velocity[0][edge] -= k * gradient;
        }
    }

    for y in 0..=ny {
        for x in 0..nx {
            let edge = (x as usize, y as usize);
            if grid.is_solid(x, y - 1) || grid.is_solid(x, y) {
                grid.velocity[1][edge] = 0.;
                continue;
            }

            let gradient = grid.pressure[grid.clamp_cell(x, y)] - grid.pressure[grid.clamp_cell(x, y - 1)];
            grid.velocity[1][edge] -= k * gradient;
        }
    }
}

/// Largest absolute divergence over the fluid cells that have at least one
/// fluid neighbour.
pub fn residual_divergence(grid: &FluidGrid) -> f32 {
    let div = numeric::divergence(grid.velocity(), grid.cell_size());

    let mut worst = 0.0f32;
    for y in 0..grid.cell_count_y() {
        for x in 0..grid.cell_count_x() {
            let (xi, yi) = (x as i64, y as i64);
            let walled_in = [(xi - 1, yi), (xi + 1, yi), (xi, yi - 1), (xi, yi + 1)]
                .iter()
                .all(|&(nx, ny)| grid.is_solid(nx, ny));

            if grid.solid[(x, y)] || walled_in {
                continue;
            }
            worst = worst.max(div[(x, y)].abs());
        }
    }
    worst
}
