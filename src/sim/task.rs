// Task runner for the solver thread

use std::{
    sync::mpsc,
    thread::{self, JoinHandle},
};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use crate::{
    observers::imgstream::{self, DisplayPacket},
    preprocessing::{ImageStreamSettings, InputError, InterfaceMode, SimulationInput},
    sim::navier::FluidSim,
};

pub struct SimulationOutput {
    pub temporal_map: Vec<f32>, // maps idx->timestamp
}

fn progress_bar(ticks: usize) -> ProgressBar {
    let bar = ProgressBar::new(ticks as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "[Elapsed: {elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ticks (Remaining: {eta_precise})",
    ) {
        bar.set_style(style.progress_chars("##-"));
    }
    bar
}

/// The solver thread task to run in ImageStream mode
pub fn imgstream_task(settings: &ImageStreamSettings, sim: FluidSim) -> SimulationOutput {
    let bar = progress_bar(sim.ticks);

    let (sender, receiver) = mpsc::channel();

    // spawn image io thread
    let frames_dir = settings.frames_dir.clone();
    let mask = sim.grid().solid_mask().clone();
    let io_thread = thread::spawn(move || {
        if let Err(err) = imgstream::image_io_loop(receiver, mask, &frames_dir) {
            error!("Image stream failed: {}", err);
        }
    });

    let mut temporal_map: Vec<f32> = Vec::new();
    for (i, (dye, t)) in sim.enumerate() {
        if sender.send(DisplayPacket { dye, i }).is_err() {
            error!("Image stream hung up; stopping at tick {}", i);
            break;
        }

        bar.inc(1);
        temporal_map.push(t);
    }
    bar.finish();

    // let the writer drain the remaining frames
    drop(sender);
    if io_thread.join().is_err() {
        error!("Image stream thread panicked");
    }

    SimulationOutput { temporal_map }
}

/// The solver thread task to run without an observer
pub fn headless_task(sim: FluidSim) -> SimulationOutput {
    let bar = progress_bar(sim.ticks);

    let temporal_map: Vec<f32> = sim.map(|(_, t)| t).inspect(|_| bar.inc(1)).collect();
    bar.finish();

    info!("Solved {} ticks", temporal_map.len());
    SimulationOutput { temporal_map }
}

/// Spawns the simulation thread and starts the corresponding task
pub fn spawn_sim_thread(
    simulation_input: SimulationInput,
) -> Result<JoinHandle<SimulationOutput>, InputError> {
    let sim = FluidSim::from_input(&simulation_input)?;

    Ok(thread::spawn(move || match &simulation_input.mode {
        InterfaceMode::ImageStream(settings) => imgstream_task(settings, sim),
        InterfaceMode::Headless => headless_task(sim),
    }))
}

#[cfg(test)]
mod tests {
    use std::{env, fs};

    use super::*;
    use crate::{
        preprocessing::GridSettings,
        sim::{boundary::Obstacle, inject::FlowSource, navier::SolverSettings},
    };

    fn input(mode: InterfaceMode) -> SimulationInput {
        SimulationInput {
            mode,
            grid: GridSettings {
                cell_count_x: 16,
                cell_count_y: 8,
                cell_size: 1.,
            },
            obstacles: vec![Obstacle::Edges],
            sources: vec![FlowSource {
                origin: [1, 3],
                size: [0, 1],
                velocity: [4., 0.],
                color: [1., 1., 0., 1.],
                adds_dye: true,
                jitter: 0.,
            }],
            solver: SolverSettings::default(),
            ticks: 12,
        }
    }

    #[test]
    fn test_headless_task() {
        let output = spawn_sim_thread(input(InterfaceMode::Headless))
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(output.temporal_map.len(), 12);
        assert!(output.temporal_map.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_imgstream_task_writes_every_tick() {
        let frames_dir = env::temp_dir().join(format!("fluid-2d-task-{}", std::process::id()));
        let mode = InterfaceMode::ImageStream(ImageStreamSettings {
            frames_dir: frames_dir.clone(),
            retain_frames: false,
            display_video: false,
        });

        let output = spawn_sim_thread(input(mode)).unwrap().join().unwrap();

        assert_eq!(output.temporal_map.len(), 12);
        for i in 0..12 {
            assert!(frames_dir.join(format!("{i}.png")).exists());
        }
        _ = fs::remove_dir_all(&frames_dir);
    }

    #[test]
    fn test_spawn_rejects_bad_grid() {
        let mut bad = input(InterfaceMode::Headless);
        bad.grid.cell_size = 0.;

        assert!(matches!(spawn_sim_thread(bad), Err(InputError::Grid(_))));
    }
}
