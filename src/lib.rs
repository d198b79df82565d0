extern crate nalgebra as na;

pub mod observers;
pub mod postprocessing;
pub mod preprocessing;
pub mod sim;

use na::DMatrix;

/// Values stored on a regular 2D layout, indexed `(x, y)`.
pub type ScalarField = DMatrix<f32>;

/// Staggered velocity: `[velX, velY]`.
pub type VectorField = [ScalarField; 2];

/// RGBA tracer, one matrix per channel.
pub type DyeField = [ScalarField; 4];

/// Per-cell solid flags.
pub type SolidMask = DMatrix<bool>;
