// Numerical core of the staggered-grid fluid solver

pub mod advection;
pub mod boundary;
pub mod grid;
pub mod inject;
pub mod navier;
pub mod numeric;
pub mod poisson;
pub mod task;
