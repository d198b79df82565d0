// Semi-Lagrangian transport of velocity and dye

use na::Vector2;

use crate::{
    DyeField, ScalarField, VectorField,
    sim::{grid::FluidGrid, numeric},
};

/// Moves fields along the flow by tracing each sample point backwards and
/// resampling the previous field there.
///
/// Every backtrace must read the pre-step field, so results go into
/// scratch buffers owned here which are swapped with the grid's arrays once
/// the whole field is written.
#[derive(Clone, Debug)]
pub struct Advector {
    /// Destination buffers for `[velX, velY]`
    velocity_scratch: VectorField,

    /// Destination buffers for the dye channels
    dye_scratch: DyeField,

    /// Backtraced cell-centre positions, in dye-local coordinates
    trace: [ScalarField; 2],
}

impl Advector {
    pub fn new(grid: &FluidGrid) -> Self {
        Advector {
            velocity_scratch: grid.velocity().clone(),
            dye_scratch: grid.dye().clone(),
            trace: [grid.pressure().clone(), grid.pressure().clone()],
        }
    }

    /// Reallocate scratch space if the grid was rebuilt with another shape.
    fn fit(&mut self, grid: &FluidGrid) {
        if self.velocity_scratch[0].shape() != grid.velocity_x().shape()
            || self.velocity_scratch[1].shape() != grid.velocity_y().shape()
        {
            *self = Advector::new(grid);
        }
    }

    /// Advect both velocity components through themselves.
    ///
    /// Each edge midpoint is traced back by `velocity_at(p) * dt` and the
    /// component resampled at the origin.
    pub fn advect_velocity(&mut self, grid: &mut FluidGrid, dt: f32) {
        self.fit(grid);

        let cs = grid.cell_size();
        let frozen: &FluidGrid = grid;

        // velX lives at (x, y + 0.5)
        numeric::fill_with_index(&mut self.velocity_scratch[0], |x, y| {
            let pos = Vector2::new(x as f32 * cs, (y as f32 + 0.5) * cs);
            let origin = pos - frozen.velocity_at(pos) * dt;
            frozen.velocity_x_at(origin)
        });

        // velY lives at (x + 0.5, y)
        numeric::fill_with_index(&mut self.velocity_scratch[1], |x, y| {
            let pos = Vector2::new((x as f32 + 0.5) * cs, y as f32 * cs);
            let origin = pos - frozen.velocity_at(pos) * dt;
            frozen.velocity_y_at(origin)
        });

        for (current, next) in grid.velocity.iter_mut().zip(self.velocity_scratch.iter_mut()) {
            std::mem::swap(current, next);
        }
    }

    /// Advect every dye channel through the current velocity field.
    ///
    /// Solid cells keep their dye.
    pub fn advect_dye(&mut self, grid: &mut FluidGrid, dt: f32) {
        self.fit(grid);

        let cs = grid.cell_size();
        let frozen: &FluidGrid = grid;

        // trace once, sample every channel from the same origins
        let [trace_x, trace_y] = &mut self.trace;
        numeric::fill_with_index(trace_x, |x, y| {
            let pos = frozen.cell_center(x, y);
            (pos.x - frozen.velocity_x_at(pos) * dt) / cs - 0.5
        });
        numeric::fill_with_index(trace_y, |x, y| {
            let pos = frozen.cell_center(x, y);
            (pos.y - frozen.velocity_y_at(pos) * dt) / cs - 0.5
        });

        let (trace_x, trace_y) = (&self.trace[0], &self.trace[1]);
        for (channel, next) in frozen.dye.iter().zip(self.dye_scratch.iter_mut()) {
            numeric::fill_with_index(next, |x, y| {
                if frozen.solid[(x, y)] {
                    return channel[(x, y)];
                }
                numeric::sample_bilinear(channel, trace_x[(x, y)], trace_y[(x, y)])
            });
        }

        for (current, next) in grid.dye.iter_mut().zip(self.dye_scratch.iter_mut()) {
            std::mem::swap(current, next);
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    fn random_dye(grid: &mut FluidGrid) {
        let mut rng = rand::rng();
        for x in 0..grid.cell_count_x() {
            for y in 0..grid.cell_count_y() {
                let rgba = [
                    rng.random_range(0.0..1.0),
                    rng.random_range(0.0..1.0),
                    rng.random_range(0.0..1.0),
                    rng.random_range(0.0..1.0),
                ];
                grid.set_dye(x as i64, y as i64, rgba);
            }
        }
    }

    #[test]
    fn test_zero_velocity_keeps_dye() {
        for cell_size in [1., 0.25] {
            let mut grid = FluidGrid::new(9, 7, cell_size).unwrap();
            random_dye(&mut grid);
            let before = grid.dye().clone();

            let mut advector = Advector::new(&grid);
            for _ in 0..10 {
                advector.advect_velocity(&mut grid, 0.1);
                advector.advect_dye(&mut grid, 0.1);
            }

            assert_eq!(grid.dye(), &before);
            assert_eq!(grid.max_speed(), 0.);
        }
    }

    #[test]
    fn test_zero_velocity_keeps_dye_parallel() {
        // large enough for the row fan-out
        let mut grid = FluidGrid::new(160, 120, 1.).unwrap();
        random_dye(&mut grid);
        let before = grid.dye().clone();

        let mut advector = Advector::new(&grid);
        advector.advect_dye(&mut grid, 1. / 60.);

        assert_eq!(grid.dye(), &before);
    }

    #[test]
    fn test_uniform_flow_moves_dye_one_cell() {
        let mut grid = FluidGrid::new(8, 3, 1.).unwrap();
        grid.velocity[0].fill(1.);
        grid.set_dye(3, 1, [1., 0., 0., 1.]);

        let mut advector = Advector::new(&grid);
        advector.advect_dye(&mut grid, 1.);

        assert_eq!(grid.dye_at(4, 1), [1., 0., 0., 1.]);
        assert_eq!(grid.dye_at(3, 1), [0.; 4]);
        // velocity is untouched by dye transport
        assert!(grid.velocity_x().iter().all(|v| *v == 1.));
    }

    #[test]
    fn test_uniform_velocity_is_stationary() {
        let mut grid = FluidGrid::new(6, 6, 0.5).unwrap();
        grid.velocity[0].fill(0.75);
        grid.velocity[1].fill(-0.25);

        let mut advector = Advector::new(&grid);
        advector.advect_velocity(&mut grid, 0.3);

        assert!(grid.velocity_x().iter().all(|v| (v - 0.75).abs() < 1e-6));
        assert!(grid.velocity_y().iter().all(|v| (v + 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_velocity_reads_pre_step_field() {
        // velY varies only along x and is carried right by a unit velX;
        // an in-place update would smear the first column across the row
        let mut grid = FluidGrid::new(6, 4, 1.).unwrap();
        grid.velocity[0].fill(1.);
        let profile = [0.2, 0.4, 0.6, 0.8, 1.0, 1.2];
        for x in 0..6 {
            for y in 0..5 {
                grid.velocity[1][(x, y)] = profile[x];
            }
        }

        let mut advector = Advector::new(&grid);
        advector.advect_velocity(&mut grid, 1.);

        for y in 0..5 {
            assert!((grid.velocity_y()[(0, y)] - profile[0]).abs() < 1e-6);
            for x in 1..6 {
                let v = grid.velocity_y()[(x, y)];
                assert!(
                    (v - profile[x - 1]).abs() < 1e-6,
                    "velY[{x}, {y}] = {v}, expected {}",
                    profile[x - 1]
                );
            }
        }
    }

    #[test]
    fn test_solid_cells_keep_dye() {
        let mut grid = FluidGrid::new(6, 3, 1.).unwrap();
        grid.set_dye(2, 1, [0.5; 4]);
        grid.solid[(2, 1)] = true;
        grid.velocity[0].fill(1.);

        let mut advector = Advector::new(&grid);
        advector.advect_dye(&mut grid, 1.);

        assert_eq!(grid.dye_at(2, 1), [0.5; 4]);
        assert_eq!(grid.dye_at(3, 1), [0.5; 4]);
    }

    #[test]
    fn test_refits_after_grid_rebuild() {
        let small = FluidGrid::new(3, 3, 1.).unwrap();
        let mut advector = Advector::new(&small);

        let mut grid = FluidGrid::new(5, 4, 1.).unwrap();
        grid.set_dye(1, 1, [1.; 4]);
        advector.advect_velocity(&mut grid, 0.1);
        advector.advect_dye(&mut grid, 0.1);

        assert_eq!(grid.velocity_x().shape(), (6, 4));
        assert_eq!(grid.dye()[0].shape(), (5, 4));
        assert_eq!(grid.dye_at(1, 1), [1.; 4]);
    }
}
