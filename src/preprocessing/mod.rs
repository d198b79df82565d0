use std::{
    fs::File,
    io::{self, BufReader, BufWriter},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::sim::{
    boundary::Obstacle,
    grid::{FluidGrid, GridError},
    inject::FlowSource,
    navier::SolverSettings,
};

pub mod cli;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("could not access input file: {0}")]
    Io(#[from] io::Error),

    #[error("malformed input file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid grid: {0}")]
    Grid(#[from] GridError),

    #[error("invalid input: {0}")]
    Invalid(String),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ImageStreamSettings {
    pub frames_dir: PathBuf,
    pub retain_frames: bool,
    pub display_video: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum InterfaceMode {
    ImageStream(ImageStreamSettings),
    Headless,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct GridSettings {
    pub cell_count_x: usize,
    pub cell_count_y: usize,
    pub cell_size: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SimulationInput {
    pub mode: InterfaceMode,
    pub grid: GridSettings,

    #[serde(default)]
    pub obstacles: Vec<Obstacle>,

    #[serde(default)]
    pub sources: Vec<FlowSource>,

    #[serde(default)]
    pub solver: SolverSettings,

    pub ticks: usize,
}

impl SimulationInput {
    /// Read an input from a JSON file and validate it.
    pub fn load(path: &Path) -> Result<Self, InputError> {
        if path.is_dir() {
            return Err(InputError::Invalid(format!("{path:?} is a directory")));
        }

        let reader = BufReader::new(File::open(path)?);
        let input: SimulationInput = serde_json::from_reader(reader)?;
        input.validate()?;

        Ok(input)
    }

    /// Write this input out as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), InputError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Reject settings the solver cannot run with.
    pub fn validate(&self) -> Result<(), InputError> {
        // the grid constructor owns the shape rules
        FluidGrid::new(
            self.grid.cell_count_x,
            self.grid.cell_count_y,
            self.grid.cell_size,
        )?;

        let solver = &self.solver;
        if !(solver.sor_factor > 0. && solver.sor_factor < 2.) {
            return Err(InputError::Invalid(format!(
                "SOR factor must lie in (0, 2), got {}",
                solver.sor_factor
            )));
        }
        if !(solver.base_time_step > 0. && solver.base_time_step.is_finite()) {
            return Err(InputError::Invalid(format!(
                "base time step must be positive, got {}",
                solver.base_time_step
            )));
        }
        if !(solver.time_step_multiplier > 0. && solver.time_step_multiplier.is_finite()) {
            return Err(InputError::Invalid(format!(
                "time step multiplier must be positive, got {}",
                solver.time_step_multiplier
            )));
        }
        if !(solver.density > 0. && solver.density.is_finite()) {
            return Err(InputError::Invalid(format!(
                "density must be positive, got {}",
                solver.density
            )));
        }
        if !(solver.decay >= 0. && solver.decay < 1.) {
            return Err(InputError::Invalid(format!(
                "dye decay must lie in [0, 1), got {}",
                solver.decay
            )));
        }
        if self.ticks == 0 {
            return Err(InputError::Invalid("tick count must be at least 1".into()));
        }
        for (i, source) in self.sources.iter().enumerate() {
            if !(source.jitter >= 0. && source.jitter.is_finite()) {
                return Err(InputError::Invalid(format!(
                    "source {i} jitter must be finite and non-negative, got {}",
                    source.jitter
                )));
            }
        }

        if solver.sor_factor <= 1. {
            warn!(
                "SOR factor {} is not over-relaxed; the pressure solve will converge slowly",
                solver.sor_factor
            );
        }

        Ok(())
    }

    pub fn log(&self) {
        let mode = match &self.mode {
            InterfaceMode::ImageStream(_) => "image stream",
            InterfaceMode::Headless => "headless",
        };

        info!(
            "Simulation is shown below:\n\n\
        \t mode:        {}\n\
        \t grid:        {} x {} cells\n\
        \t cell size:   {}\n\
        \t obstacles:   {}\n\
        \t sources:     {}\n\
        \t ticks:       {}\n\
        \t time step:   {} s (x{})\n\
        \t iterations:  {} per tick\n\
        \t SOR factor:  {}\n\
        \t density:     {}\n\
        \t dye decay:   {}\n\n\
        ",
            mode,
            self.grid.cell_count_x,
            self.grid.cell_count_y,
            self.grid.cell_size,
            self.obstacles.len(),
            self.sources.len(),
            self.ticks,
            self.solver.base_time_step,
            self.solver.time_step_multiplier,
            self.solver.iterations,
            self.solver.sor_factor,
            self.solver.density,
            self.solver.decay,
        );

        if let Ok(mode_str) = serde_json::to_string_pretty(&self.mode) {
            info!("Mode parameters are:\n\n{}", mode_str);
        }
    }
}
