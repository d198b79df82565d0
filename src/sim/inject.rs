// Velocity and dye injection: constant sources and pointer brushes

use std::ops::RangeInclusive;

use na::Vector2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::sim::grid::{DYE_CHANNELS, FluidGrid};

/// A rectangle of cells held at a fixed velocity every tick, optionally
/// emitting dye.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct FlowSource {
    /// Lower-left cell `[x, y]`
    pub origin: [i64; 2],

    /// Extent in cells past the origin; the rectangle is inclusive
    pub size: [i64; 2],

    /// Target velocity `[u, v]`
    pub velocity: [f32; 2],

    /// RGBA written into each cell when `adds_dye` is set
    #[serde(default = "FlowSource::default_color")]
    pub color: [f32; DYE_CHANNELS],

    #[serde(default)]
    pub adds_dye: bool,

    /// Upper bound of the random fraction added to the target speed each
    /// tick; breaks the symmetry of flow past obstacles
    #[serde(default)]
    pub jitter: f32,
}

impl FlowSource {
    fn default_color() -> [f32; DYE_CHANNELS] {
        [1.; DYE_CHANNELS]
    }

    /// Drive the source's edge velocities to its target and emit dye.
    ///
    /// Each cell's left and bottom edges are pushed through
    /// `FluidGrid::add_velocity` by `target - current`. The column of edges
    /// right of the rectangle and the row above it are set as well so the
    /// whole staggered footprint carries the target. Off-grid parts are
    /// dropped.
    pub fn apply(&self, grid: &mut FluidGrid) {
        let noise: f32 = if self.jitter > 0. {
            rand::rng().random_range(0.0..self.jitter)
        } else {
            0.
        };
        let [u, v] = self.velocity.map(|c| c * (1. + noise));
        let (x_start, y_start) = (self.origin[0], self.origin[1]);
        let (x_end, y_end) = (
            x_start.saturating_add(self.size[0]),
            y_start.saturating_add(self.size[1]),
        );
        if x_end < x_start || y_end < y_start {
            return;
        }

        let (nx, ny) = (grid.cell_count_x() as i64, grid.cell_count_y() as i64);
        let (x_start, x_end) = (x_start.max(0), x_end.min(nx - 1));
        let (y_start, y_end) = (y_start.max(0), y_end.min(ny - 1));
        if x_start > x_end || y_start > y_end {
            return;
        }

        for y in y_start..=y_end {
            for x in x_start..=x_end {
                let (cx, cy) = (x as usize, y as usize);
                let du = u - grid.velocity[0][(cx, cy)];
                let dv = v - grid.velocity[1][(cx, cy)];
                grid.add_velocity(x, y, du, dv);

                if self.adds_dye {
                    grid.set_dye(x, y, self.color);
                }
            }
        }

        // far edges of the footprint; velX has nx + 1 columns, velY ny + 1 rows
        let (right, top) = (x_end as usize + 1, y_end as usize + 1);
        for y in y_start..=y_end {
            grid.velocity[0][(right, y as usize)] = u;
        }
        for x in x_start..=x_end {
            grid.velocity[1][(x as usize, top)] = v;
        }
    }
}

/// Apply every source in order.
pub fn apply_sources(grid: &mut FluidGrid, sources: &[FlowSource]) {
    for source in sources {
        source.apply(grid);
    }
}

/// Span in cells covered by a brush of world radius `radius`. Saturates
/// at `i64::MAX` for huge or infinite radii.
fn brush_reach(grid: &FluidGrid, radius: f32) -> i64 {
    (radius / grid.cell_size()).ceil() as i64
}

/// Cells within `reach` of `center`, clipped to `0..count`
fn clipped_span(center: i64, reach: i64, count: usize) -> RangeInclusive<i64> {
    center.saturating_sub(reach).max(0)..=center.saturating_add(reach).min(count as i64 - 1)
}

/// Pushes fluid along a drag, strongest at the brush centre.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VelocityBrush {
    /// World-space radius
    pub radius: f32,
    pub strength: f32,
}

impl VelocityBrush {
    /// Add `delta × strength × weight` to every cell near `position`, where
    /// the weight falls from 1 at the brush position to 0 at `radius`.
    ///
    /// Returns
    /// - The number of cells that received velocity
    pub fn apply(&self, grid: &mut FluidGrid, position: Vector2<f32>, delta: Vector2<f32>) -> usize {
        if !(self.radius > 0.) {
            return 0;
        }

        let reach = brush_reach(grid, self.radius);
        let (cx, cy) = grid.cell_coord(position);
        let radius_sq = self.radius * self.radius;
        let mut touched = 0;

        let x_span = clipped_span(cx, reach, grid.cell_count_x());
        let y_span = clipped_span(cy, reach, grid.cell_count_y());

        for y in y_span {
            for x in x_span.clone() {
                let (x, y) = (x as usize, y as usize);
                let dist_sq = (grid.cell_center(x, y) - position).norm_squared();
                let weight = 1. - (dist_sq / radius_sq).clamp(0., 1.);
                if weight <= 0. {
                    continue;
                }

                let push = delta * (self.strength * weight);
                if grid.add_velocity(x as i64, y as i64, push.x, push.y) {
                    touched += 1;
                }
            }
        }

        touched
    }
}

/// Paints a disc of dye.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DyeBrush {
    /// World-space radius
    pub radius: f32,
    pub color: [f32; DYE_CHANNELS],
}

impl DyeBrush {
    /// Overwrite the dye of cells whose offset from the centre cell lies
    /// strictly inside the brush's cell radius. Solid cells are skipped.
    ///
    /// Returns
    /// - The number of cells painted
    pub fn apply(&self, grid: &mut FluidGrid, position: Vector2<f32>) -> usize {
        if !(self.radius > 0.) {
            return 0;
        }

        let reach = brush_reach(grid, self.radius);
        let (cx, cy) = grid.cell_coord(position);
        let mut painted = 0;

        let reach_sq = reach.saturating_mul(reach);
        let x_span = clipped_span(cx, reach, grid.cell_count_x());
        let y_span = clipped_span(cy, reach, grid.cell_count_y());

        for y in y_span {
            for x in x_span.clone() {
                let (ox, oy) = (x.saturating_sub(cx), y.saturating_sub(cy));
                let dist_sq = ox.saturating_mul(ox).saturating_add(oy.saturating_mul(oy));
                if dist_sq >= reach_sq {
                    continue;
                }
                if grid.set_dye(x, y, self.color) {
                    painted += 1;
                }
            }
        }

        painted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inflow() -> FlowSource {
        FlowSource {
            origin: [1, 2],
            size: [1, 2],
            velocity: [3., -1.],
            color: [1., 0., 0., 1.],
            adds_dye: true,
            jitter: 0.,
        }
    }

    #[test]
    fn test_source_sets_footprint() {
        let mut grid = FluidGrid::new(8, 8, 1.).unwrap();
        grid.velocity[0].fill(0.5);
        inflow().apply(&mut grid);

        for y in 2..=4 {
            for x in 1..=3 {
                assert_eq!(grid.velocity_x()[(x, y)], 3., "velX[{x}, {y}]");
            }
            assert_eq!(grid.velocity_x()[(0, y)], 0.5);
            assert_eq!(grid.velocity_x()[(4, y)], 0.5);
        }
        for x in 1..=2 {
            for y in 2..=5 {
                assert_eq!(grid.velocity_y()[(x, y)], -1., "velY[{x}, {y}]");
            }
            assert_eq!(grid.velocity_y()[(x, 6)], 0.);
        }

        assert_eq!(grid.dye_at(2, 4), [1., 0., 0., 1.]);
        assert_eq!(grid.dye_at(3, 4), [0.; 4]);
    }

    #[test]
    fn test_source_is_idempotent() {
        let mut once = FluidGrid::new(8, 8, 1.).unwrap();
        inflow().apply(&mut once);

        let mut twice = FluidGrid::new(8, 8, 1.).unwrap();
        apply_sources(&mut twice, &[inflow(), inflow()]);

        assert_eq!(once.velocity(), twice.velocity());
        assert_eq!(once.dye(), twice.dye());
    }

    #[test]
    fn test_source_clips_and_skips_solid() {
        let mut grid = FluidGrid::new(4, 4, 1.).unwrap();
        grid.set_edge_boundaries();

        let source = FlowSource {
            origin: [-3, -3],
            size: [10, 10],
            velocity: [1., 1.],
            color: [0., 0., 1., 1.],
            adds_dye: true,
            jitter: 0.,
        };
        source.apply(&mut grid);

        // the clipped rectangle covers the whole grid
        assert!(grid.velocity_x().iter().all(|v| *v == 1.));
        assert!(grid.velocity_y().iter().all(|v| *v == 1.));

        assert_eq!(grid.dye_at(0, 0), [0.; 4]);
        assert_eq!(grid.dye_at(1, 1), [0., 0., 1., 1.]);

        let inverted = FlowSource { size: [-2, 0], ..source };
        let mut untouched = FluidGrid::new(4, 4, 1.).unwrap();
        inverted.apply(&mut untouched);
        assert_eq!(untouched.max_speed(), 0.);
    }

    #[test]
    fn test_source_jitter() {
        let source = FlowSource {
            jitter: 0.1,
            ..inflow()
        };

        for _ in 0..20 {
            let mut grid = FluidGrid::new(8, 8, 1.).unwrap();
            source.apply(&mut grid);

            let u = grid.velocity_x()[(1, 2)];
            let v = grid.velocity_y()[(1, 2)];
            assert!((3.0..3.3 + 1e-5).contains(&u), "u = {u}");
            assert!((u / 3. + v).abs() < 1e-5, "direction changed: ({u}, {v})");
        }
    }

    #[test]
    fn test_source_serde_defaults() {
        let source: FlowSource =
            serde_json::from_str(r#"{"origin":[0,1],"size":[0,3],"velocity":[2.0,0.0]}"#).unwrap();

        assert!(!source.adds_dye);
        assert_eq!(source.jitter, 0.);
        assert_eq!(source.color, [1.; 4]);
        assert_eq!(source.size, [0, 3]);
    }

    #[test]
    fn test_velocity_brush_falloff() {
        let mut grid = FluidGrid::new(10, 10, 1.).unwrap();
        let brush = VelocityBrush {
            radius: 2.,
            strength: 1.,
        };

        let center = grid.cell_center(5, 5);
        let touched = brush.apply(&mut grid, center, Vector2::new(1., 0.));

        assert!((grid.velocity_x()[(5, 5)] - 1.).abs() < 1e-6);
        assert!((grid.velocity_x()[(6, 5)] - 0.75).abs() < 1e-6);
        assert!((grid.velocity_x()[(6, 6)] - 0.5).abs() < 1e-6);
        assert_eq!(grid.velocity_x()[(7, 5)], 0.);
        assert_eq!(grid.max_speed(), grid.velocity_x()[(5, 5)]);
        // centre, 4 at d = 1, 4 at d = sqrt 2
        assert_eq!(touched, 9);
    }

    #[test]
    fn test_velocity_brush_scales_and_clips() {
        let mut grid = FluidGrid::new(4, 4, 0.5).unwrap();
        let brush = VelocityBrush {
            radius: 1.,
            strength: 2.,
        };

        let corner = grid.cell_center(0, 0);
        brush.apply(&mut grid, corner, Vector2::new(0., -1.));
        assert!((grid.velocity_y()[(0, 0)] + 2.).abs() < 1e-6);

        let nothing = VelocityBrush {
            radius: 0.,
            strength: 5.,
        };
        let mut still = FluidGrid::new(4, 4, 1.).unwrap();
        assert_eq!(nothing.apply(&mut still, Vector2::new(2., 2.), Vector2::new(1., 1.)), 0);
        assert_eq!(still.max_speed(), 0.);
    }

    #[test]
    fn test_dye_brush_disc() {
        let mut grid = FluidGrid::new(9, 9, 1.).unwrap();
        grid.solid[(5, 4)] = true;
        let brush = DyeBrush {
            radius: 2.,
            color: [0., 1., 0., 1.],
        };

        let center = grid.cell_center(4, 4);
        let painted = brush.apply(&mut grid, center);

        // offsets with ox² + oy² < 4 form a 3x3 block; one of them is solid
        assert_eq!(painted, 8);
        assert_eq!(grid.dye_at(3, 3), [0., 1., 0., 1.]);
        assert_eq!(grid.dye_at(5, 4), [0.; 4]);
        assert_eq!(grid.dye_at(6, 4), [0.; 4]);
    }

    #[test]
    fn test_dye_brush_off_grid() {
        let mut grid = FluidGrid::new(3, 3, 1.).unwrap();
        let brush = DyeBrush {
            radius: 1.,
            color: [1.; 4],
        };

        assert_eq!(brush.apply(&mut grid, Vector2::new(-0.5, 1.5)), 0);
        assert_eq!(brush.apply(&mut grid, Vector2::new(0.5, 1.5)), 1);
        assert_eq!(grid.dye_at(0, 1), [1.; 4]);
    }

    #[test]
    fn test_huge_brushes_cover_grid() {
        let mut grid = FluidGrid::new(4, 4, 1.).unwrap();

        let dye = DyeBrush {
            radius: f32::INFINITY,
            color: [1.; 4],
        };
        assert_eq!(dye.apply(&mut grid, Vector2::new(2., 2.)), 16);
        assert_eq!(grid.dye_at(3, 0), [1.; 4]);

        let push = VelocityBrush {
            radius: 1e30,
            strength: 1.,
        };
        assert_eq!(push.apply(&mut grid, Vector2::new(2., 2.), Vector2::new(1., 0.)), 16);

        let far = VelocityBrush {
            radius: f32::INFINITY,
            strength: 1.,
        };
        assert_eq!(far.apply(&mut grid, Vector2::new(1e9, -1e9), Vector2::new(0., 1.)), 16);
        assert!(grid.max_speed().is_finite());
    }
}
