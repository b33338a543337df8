use crate::defaults::CONFIG_FILE_NAME;
use crate::io::{create_dynamics_data, read_input, write_footer, write_header, Input};
use crate::models::{build_model, ModelSurface};
use crate::utils::Timer;
use anyhow::{Context, Result};
use clap::{crate_name, crate_version, Arg, Command};
use env_logger::Builder;
use log::{error, LevelFilter};
use std::io::Write;
use std::path::Path;
use std::process;
use surfhop_dynamics::initialization::{Simulation, SystemData};

mod defaults;
mod io;
mod models;
mod utils;

fn main() {
    // Input.
    let matches = Command::new(crate_name!())
        .version(crate_version!())
        .about("trajectory surface hopping dynamics on analytic model surfaces")
        .arg(
            Arg::new("input-File")
                .help("Sets the input file to use, it is created with the defaults if missing")
                .default_value(CONFIG_FILE_NAME)
                .index(1),
        )
        .get_matches();
    let input_file: &str = matches.value_of("input-File").unwrap_or(CONFIG_FILE_NAME);
    let input: Input = match read_input(Path::new(input_file)) {
        Ok(input) => input,
        Err(err) => {
            eprintln!("Error: {:?}", err);
            process::exit(1);
        }
    };

    // Logging.
    // The log level is set.
    let log_level: LevelFilter = match input.verbose {
        2 => LevelFilter::Trace,
        1 => LevelFilter::Debug,
        0 => LevelFilter::Info,
        -1 => LevelFilter::Warn,
        -2 => LevelFilter::Error,
        _ => LevelFilter::Info,
    };
    // and the logger is build.
    Builder::new()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .filter(None, log_level)
        .init();

    // The program header is written to the command line.
    write_header();
    // and the total wall-time timer is started.
    let timer: Timer = Timer::start();

    if let Err(err) = run(&input) {
        error!("Error: {:?}", err);
        process::exit(1);
    }

    // Finished.
    write_footer(timer);
}

fn run(input: &Input) -> Result<()> {
    // Multithreading.
    if input.number_of_cores > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(input.number_of_cores)
            .build_global()
            .context("Unable to set up the thread pool")?;
    }
    let mut surface: ModelSurface = ModelSurface::new(build_model(input.model));
    let dynamics_data: SystemData = create_dynamics_data(input, surface.nstates())?;
    let mut dynamics: Simulation =
        Simulation::new(&dynamics_data).context("Invalid dynamics configuration")?;
    dynamics
        .run(&mut surface)
        .context("The surface hopping dynamics failed")?;
    Ok(())
}
