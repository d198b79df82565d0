use std::process::exit;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fluid_2d::{postprocessing, preprocessing::cli::CliArgs, sim::task};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = CliArgs::parse();

    let input = args.build_input().unwrap_or_else(|err| {
        error!("{}", err);
        exit(1);
    });
    input.log();

    if let Some(savepath) = args.input_json_savepath() {
        match input.save(savepath) {
            Ok(()) => info!("Saved input file to {}", savepath.display()),
            Err(err) => error!("Failed to save input file: {}", err),
        }
    }

    let handle = task::spawn_sim_thread(input.clone()).unwrap_or_else(|err| {
        error!("{}", err);
        exit(1);
    });

    let output = handle.join().unwrap_or_else(|_| {
        error!("Solver thread panicked");
        exit(1);
    });
    info!("Simulation finished after {} ticks", output.temporal_map.len());

    postprocessing::postprocess(input, output);
}
