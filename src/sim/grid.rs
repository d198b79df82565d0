// Staggered (MAC) grid storage

use na::Vector2;
use thiserror::Error;

use crate::{DyeField, ScalarField, SolidMask, VectorField, sim::numeric};

/// Number of dye channels (RGBA)
pub const DYE_CHANNELS: usize = 4;

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("grid must have at least one cell on each axis, got {x}x{y}")]
    InvalidCellCount { x: usize, y: usize },

    #[error("cell size must be a positive, finite number, got {0}")]
    InvalidCellSize(f32),
}

/// Owns every per-cell and per-edge array of the simulation.
///
/// Horizontal velocity `velX` is `(cellCountX + 1) x cellCountY` and lives on
/// vertical cell edges: `velX[x, y]` is the flow between cells `(x-1, y)` and
/// `(x, y)`. Vertical velocity `velY` is `cellCountX x (cellCountY + 1)` and
/// lives on horizontal edges. Pressure, dye and the solid mask are one value
/// per cell.
#[derive(Clone, Debug)]
pub struct FluidGrid {
    /// Number of cells along x
    cell_count_x: usize,

    /// Number of cells along y
    cell_count_y: usize,

    /// World units per cell
    cell_size: f32,

    /// The staggered velocity field `[velX, velY]`
    pub(crate) velocity: VectorField,

    /// Pressure, seeded from the previous projection
    pub(crate) pressure: ScalarField,

    /// Passive RGBA tracer
    pub(crate) dye: DyeField,

    /// Cells excluded from the fluid domain
    pub(crate) solid: SolidMask,
}

impl FluidGrid {
    /// Create a zero-initialised grid with an empty solid mask.
    ///
    /// Parameters
    /// - `cell_count_x` - Number of cells along x, must be > 0
    /// - `cell_count_y` - Number of cells along y, must be > 0
    /// - `cell_size` - World units per cell, must be > 0
    pub fn new(cell_count_x: usize, cell_count_y: usize, cell_size: f32) -> Result<Self, GridError> {
        if cell_count_x == 0 || cell_count_y == 0 {
            return Err(GridError::InvalidCellCount {
                x: cell_count_x,
                y: cell_count_y,
            });
        }
        if !(cell_size.is_finite() && cell_size > 0.) {
            return Err(GridError::InvalidCellSize(cell_size));
        }

        let vel_x = ScalarField::zeros(cell_count_x + 1, cell_count_y);
        let vel_y = ScalarField::zeros(cell_count_x, cell_count_y + 1);
        let cells = ScalarField::zeros(cell_count_x, cell_count_y);

        Ok(FluidGrid {
            cell_count_x,
            cell_count_y,
            cell_size,
            velocity: [vel_x, vel_y],
            pressure: cells.clone(),
            dye: [cells.clone(), cells.clone(), cells.clone(), cells],
            solid: SolidMask::from_element(cell_count_x, cell_count_y, false),
        })
    }

    pub fn cell_count_x(&self) -> usize {
        self.cell_count_x
    }

    pub fn cell_count_y(&self) -> usize {
        self.cell_count_y
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// World position of the centre of cell `(x, y)`
    pub fn cell_center(&self, x: usize, y: usize) -> Vector2<f32> {
        Vector2::new(
            (x as f32 + 0.5) * self.cell_size,
            (y as f32 + 0.5) * self.cell_size,
        )
    }

    /// Cell containing a world position; may be off-grid.
    pub fn cell_coord(&self, world_pos: Vector2<f32>) -> (i64, i64) {
        (
            (world_pos.x / self.cell_size).floor() as i64,
            (world_pos.y / self.cell_size).floor() as i64,
        )
    }

    /// Bilinearly sample `values` at a world position.
    ///
    /// The position is converted to field-local coordinates by dividing by
    /// the cell size; callers account for the field's own origin.
    pub fn sample_bilinear(&self, values: &ScalarField, world_pos: Vector2<f32>) -> f32 {
        numeric::sample_bilinear(
            values,
            world_pos.x / self.cell_size,
            world_pos.y / self.cell_size,
        )
    }

    /// Velocity vector at a world position.
    ///
    /// `velX` is sampled half a cell down and `velY` half a cell left, which
    /// lines both staggered components up on the same point.
    pub fn velocity_at(&self, world_pos: Vector2<f32>) -> Vector2<f32> {
        Vector2::new(
            self.velocity_x_at(world_pos),
            self.velocity_y_at(world_pos),
        )
    }

    /// Horizontal velocity component at a world position
    pub fn velocity_x_at(&self, world_pos: Vector2<f32>) -> f32 {
        let half = 0.5 * self.cell_size;
        self.sample_bilinear(
            &self.velocity[0],
            Vector2::new(world_pos.x, world_pos.y - half),
        )
    }

    /// Vertical velocity component at a world position
    pub fn velocity_y_at(&self, world_pos: Vector2<f32>) -> f32 {
        let half = 0.5 * self.cell_size;
        self.sample_bilinear(
            &self.velocity[1],
            Vector2::new(world_pos.x - half, world_pos.y),
        )
    }

    /// Clamp a possibly off-grid cell coordinate onto the grid.
    pub fn clamp_cell(&self, x: i64, y: i64) -> (usize, usize) {
        (
            x.clamp(0, self.cell_count_x as i64 - 1) as usize,
            y.clamp(0, self.cell_count_y as i64 - 1) as usize,
        )
    }

    /// Whether a cell is solid. Off-grid queries clamp onto the nearest
    /// border cell.
    pub fn is_solid(&self, x: i64, y: i64) -> bool {
        self.solid[self.clamp_cell(x, y)]
    }

    /// `Some((x, y))` when the coordinate names a cell on the grid.
    pub fn in_bounds(&self, x: i64, y: i64) -> Option<(usize, usize)> {
        let inside = (0..self.cell_count_x as i64).contains(&x)
            && (0..self.cell_count_y as i64).contains(&y);

        inside.then_some((x as usize, y as usize))
    }

    /// Add `(du, dv)` to the left and bottom edge velocities of cell
    /// `(x, y)`. Off-grid coordinates are ignored.
    ///
    /// Returns
    /// - Whether the velocity was applied
    pub fn add_velocity(&mut self, x: i64, y: i64, du: f32, dv: f32) -> bool {
        let Some((x, y)) = self.in_bounds(x, y) else {
            return false;
        };

        self.velocity[0][(x, y)] += du;
        self.velocity[1][(x, y)] += dv;
        true
    }

    /// Overwrite the dye at cell `(x, y)`. Solid and off-grid cells are
    /// left untouched.
    ///
    /// Returns
    /// - Whether the dye was written
    pub fn set_dye(&mut self, x: i64, y: i64, rgba: [f32; DYE_CHANNELS]) -> bool {
        let Some((x, y)) = self.in_bounds(x, y) else {
            return false;
        };
        if self.solid[(x, y)] {
            return false;
        }

        for (channel, value) in self.dye.iter_mut().zip(rgba) {
            channel[(x, y)] = value;
        }
        true
    }

    /// RGBA dye at an on-grid cell
    pub fn dye_at(&self, x: usize, y: usize) -> [f32; DYE_CHANNELS] {
        [
            self.dye[0][(x, y)],
            self.dye[1][(x, y)],
            self.dye[2][(x, y)],
            self.dye[3][(x, y)],
        ]
    }

    /// Zero both velocity components and the pressure.
    pub fn clear_velocities(&mut self) {
        self.velocity[0].fill(0.);
        self.velocity[1].fill(0.);
        self.pressure.fill(0.);
    }

    /// Zero every dye channel.
    pub fn clear_dye(&mut self) {
        for channel in self.dye.iter_mut() {
            channel.fill(0.);
        }
    }

    /// Scale every dye channel of every cell by `factor`.
    pub fn fade_dye(&mut self, factor: f32) {
        for channel in self.dye.iter_mut() {
            *channel *= factor;
        }
    }

    pub fn velocity(&self) -> &VectorField {
        &self.velocity
    }

    pub fn velocity_x(&self) -> &ScalarField {
        &self.velocity[0]
    }

    pub fn velocity_y(&self) -> &ScalarField {
        &self.velocity[1]
    }

    pub fn pressure(&self) -> &ScalarField {
        &self.pressure
    }

    pub fn dye(&self) -> &DyeField {
        &self.dye
    }

    pub fn solid_mask(&self) -> &SolidMask {
        &self.solid
    }

    /// Largest absolute edge velocity
    pub fn max_speed(&self) -> f32 {
        self.velocity
            .iter()
            .flat_map(|component| component.iter())
            .fold(0.0f32, |m, &v| m.max(v.abs()))
    }
}
