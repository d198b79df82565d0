// Contains post-processers for simulation results

pub mod display;

use std::fs;

use tracing::{error, warn};

use crate::{
    preprocessing::{InterfaceMode, SimulationInput},
    sim::task::SimulationOutput,
};

/// Video frames per second used for playback
const PLAYBACK_FPS: usize = 60;

pub fn postprocess(sim_input: SimulationInput, sim_output: SimulationOutput) {
    if let InterfaceMode::ImageStream(settings) = sim_input.mode {
        if settings.display_video {
            _ = display::play_video(PLAYBACK_FPS, &sim_output.temporal_map, &settings.frames_dir)
                .inspect_err(|err| error!("Video playback failed: {}", err));
        }

        if !settings.retain_frames {
            _ = fs::remove_dir_all(settings.frames_dir)
                .inspect_err(|err| warn!("Unable to cleanup frames output: {:?}", err));
        }
    };
}
