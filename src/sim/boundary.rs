// Solid-mask construction from shape primitives

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sim::grid::FluidGrid;

/// A solid shape marked into the grid once at setup.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Obstacle {
    /// The outer ring of cells; a closed tank
    Edges,

    /// Cells whose index lies within Euclidean distance `radius` of `(x, y)`
    Circle { x: i64, y: i64, radius: i64 },

    /// Cells whose index lies within Manhattan distance `radius` of `(x, y)`
    Diamond { x: i64, y: i64, radius: i64 },
}

impl Obstacle {
    /// Mark this shape's cells solid
    pub fn apply(&self, grid: &mut FluidGrid) {
        match *self {
            Obstacle::Edges => grid.set_edge_boundaries(),
            Obstacle::Circle { x, y, radius } => grid.set_circular_obstacle(x, y, radius),
            Obstacle::Diamond { x, y, radius } => grid.set_diamond_obstacle(x, y, radius),
        }
    }
}

/// Apply every obstacle in order.
pub fn apply_obstacles(grid: &mut FluidGrid, obstacles: &[Obstacle]) {
    for obstacle in obstacles {
        obstacle.apply(grid);
    }

    debug!(
        "Marked {} solid cells from {} obstacles",
        grid.solid_mask().iter().filter(|s| **s).count(),
        obstacles.len()
    );
}

impl FluidGrid {
    /// Mark the full outer ring of cells solid.
    pub fn set_edge_boundaries(&mut self) {
        let (nx, ny) = (self.cell_count_x(), self.cell_count_y());

        for x in 0..nx {
            self.solid[(x, 0)] = true;
            self.solid[(x, ny - 1)] = true;
        }
        for y in 0..ny {
            self.solid[(0, y)] = true;
            self.solid[(nx - 1, y)] = true;
        }
    }

    /// Mark every cell within `radius` (squared distance, no sqrt) of
    /// `(cx, cy)` solid. Parts of the disc off the grid are dropped.
    pub fn set_circular_obstacle(&mut self, cx: i64, cy: i64, radius: i64) {
        let radius_sq = radius.saturating_mul(radius);
        self.mark_within(cx, cy, radius, |dx, dy| dx * dx + dy * dy <= radius_sq);
    }

    /// Mark every cell within Manhattan distance `radius` of `(cx, cy)`
    /// solid. Parts of the diamond off the grid are dropped.
    pub fn set_diamond_obstacle(&mut self, cx: i64, cy: i64, radius: i64) {
        self.mark_within(cx, cy, radius, |dx, dy| dx.abs() + dy.abs() <= radius);
    }

    /// Scan the on-grid part of the shape's bounding box.
    fn mark_within(&mut self, cx: i64, cy: i64, radius: i64, inside: impl Fn(i64, i64) -> bool) {
        if radius < 0 {
            return;
        }

        let x_range = cx.saturating_sub(radius).max(0)
            ..=cx.saturating_add(radius).min(self.cell_count_x() as i64 - 1);
        let y_range = cy.saturating_sub(radius).max(0)
            ..=cy.saturating_add(radius).min(self.cell_count_y() as i64 - 1);

        for x in x_range {
            for y in y_range.clone() {
                if inside(x - cx, y - cy) {
                    self.solid[(x as usize, y as usize)] = true;
                }
            }
        }
    }
}
