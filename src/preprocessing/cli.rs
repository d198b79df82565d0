use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use clap::{Parser, ValueEnum};
use tracing::info;

use crate::{
    preprocessing::{GridSettings, ImageStreamSettings, InputError, InterfaceMode, SimulationInput},
    sim::{boundary::Obstacle, inject::FlowSource, navier::SolverSettings},
};

static DEFAULT_FRAMES_PATH: LazyLock<&Path> = LazyLock::new(|| Path::new("sim-frames"));

/// Speed of the default inflow, in cells per second
const DEFAULT_INFLOW_CELLS: f32 = 20.;

/// Random speed-up fraction applied to the default inflow
const DEFAULT_INFLOW_JITTER: f32 = 0.05;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum CliMode {
    /// Write frames to disk, optionally playing them back afterwards
    Video,

    /// Run the solver only
    Headless,
}

// Raw, CLI input
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    #[arg(long, help = "An input file with pre-loaded parameters.")]
    input_json: Option<PathBuf>,

    #[arg(long, help = "Optional path to save the assembled input file to.")]
    input_json_savepath: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "video", help = "The mode to run the simulation in.")]
    mode: CliMode,

    #[arg(
        long,
        help = "An optional directory pointing to where frames should be saved."
    )]
    frames_dir: Option<PathBuf>,

    #[arg(
        short,
        long,
        help = "Whether or not frames should be retained after saving.",
        default_value = "false"
    )]
    retain_frames: bool,

    #[arg(
        short,
        long,
        help = "Whether the frame animation should play after solving."
    )]
    display_video: bool,

    #[arg(long, default_value = "128", help = "Number of cells along x.")]
    cells_x: usize,

    #[arg(long, default_value = "72", help = "Number of cells along y.")]
    cells_y: usize,

    #[arg(long, default_value = "1.0", help = "World units per cell.")]
    cell_size: f32,

    #[arg(short, long, default_value = "600", help = "Number of ticks to simulate.")]
    ticks: usize,

    #[arg(long, default_value = "20", help = "Pressure iterations per tick.")]
    iterations: usize,

    #[arg(long, default_value = "1.7", help = "Over-relaxation factor, in (0, 2).")]
    sor: f32,

    #[arg(long, default_value = "1.0", help = "Fluid density.")]
    density: f32,

    #[arg(long, default_value = "1.0", help = "Multiplier on the 1/60 s base time step.")]
    time_step_mul: f32,

    #[arg(long, default_value = "0.0", help = "Fraction of dye removed each tick, in [0, 1).")]
    decay: f32,

    #[arg(long, help = "Leave the outer ring of cells open.")]
    no_edges: bool,
}

impl CliArgs {
    /// Path the assembled input should be written to, if any
    pub fn input_json_savepath(&self) -> Option<&Path> {
        self.input_json_savepath.as_deref()
    }

    /// Resolve the arguments into a validated simulation input.
    pub fn build_input(&self) -> Result<SimulationInput, InputError> {
        // if the input file is supplied, just use that
        if let Some(input_filepath) = &self.input_json {
            info!("Using input file {}", input_filepath.display());
            return SimulationInput::load(input_filepath);
        }

        // otherwise, build the input from the other arguments
        let mode = match self.mode {
            CliMode::Video => {
                let frames_dir = self
                    .frames_dir
                    .clone()
                    .unwrap_or_else(|| (*DEFAULT_FRAMES_PATH).into());

                InterfaceMode::ImageStream(ImageStreamSettings {
                    frames_dir,
                    retain_frames: self.retain_frames,
                    display_video: self.display_video,
                })
            }
            CliMode::Headless => InterfaceMode::Headless,
        };

        let grid = GridSettings {
            cell_count_x: self.cells_x,
            cell_count_y: self.cells_y,
            cell_size: self.cell_size,
        };

        let input = SimulationInput {
            mode,
            grid,
            obstacles: self.default_obstacles(),
            sources: vec![self.default_source()],
            solver: SolverSettings {
                time_step_multiplier: self.time_step_mul,
                iterations: self.iterations,
                sor_factor: self.sor,
                density: self.density,
                decay: self.decay,
                ..SolverSettings::default()
            },
            ticks: self.ticks,
        };
        input.validate()?;

        Ok(input)
    }

    /// A circle a third of the way along the channel
    fn default_obstacles(&self) -> Vec<Obstacle> {
        let (nx, ny) = (self.cells_x as i64, self.cells_y as i64);
        let circle = Obstacle::Circle {
            x: nx / 3,
            y: ny / 2,
            radius: (ny / 8).max(1),
        };

        if self.no_edges {
            vec![circle]
        } else {
            vec![Obstacle::Edges, circle]
        }
    }

    /// A dyed inflow band against the left wall
    fn default_source(&self) -> FlowSource {
        let ny = self.cells_y as i64;
        let band = (ny / 5).max(1);

        FlowSource {
            origin: [1, ny / 2 - band / 2],
            size: [1, band],
            velocity: [DEFAULT_INFLOW_CELLS * self.cell_size, 0.],
            color: [0.2, 0.6, 1., 1.],
            adds_dye: true,
            jitter: DEFAULT_INFLOW_JITTER,
        }
    }
}
