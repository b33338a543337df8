use crate::io::Input;
use anyhow::{bail, Context, Result};
use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::Path;
use surfhop_dynamics::initialization::velocities::{initialize_momenta, sample_wavepacket};
use surfhop_dynamics::initialization::SystemData;

/// The input file is read, if it does not exist in the directory the program
/// initializes the default settings and writes them to the given path, so that
/// the user can see all the used options.
pub fn read_input(path: &Path) -> Result<Input> {
    let mut input_string: String = if path.exists() {
        fs::read_to_string(path)
            .with_context(|| format!("Unable to read the input file {}", path.display()))?
    } else {
        String::new()
    };
    let input: Input = toml::from_str(&input_string)
        .with_context(|| format!("Unable to parse the input file {}", path.display()))?;
    if !path.exists() {
        input_string = toml::to_string(&input).context("Unable to serialize the input")?;
        fs::write(path, input_string)
            .with_context(|| format!("Unable to write the input file {}", path.display()))?;
    }
    Ok(input)
}

/// Sample the initial conditions of the ensemble and collect everything that is
/// needed to start the dynamics.
pub fn create_dynamics_data(input: &Input, nstates: usize) -> Result<SystemData> {
    let ndof: usize = input.coordinates.len();
    if input.momenta.len() != ndof || input.masses.len() != ndof || input.width.len() != ndof {
        bail!(
            "coordinates, momenta, masses and width need the same length, got {}, {}, {} and {}",
            ndof,
            input.momenta.len(),
            input.masses.len(),
            input.width.len()
        );
    }
    if input.ntraj == 0 {
        bail!("the ensemble needs at least one trajectory");
    }
    let masses: Array1<f64> = Array1::from(input.masses.clone());
    let mut rng: StdRng = StdRng::seed_from_u64(input.dynamics.seed);
    let (coordinates, mut momenta): (Array2<f64>, Array2<f64>) = sample_wavepacket(
        ArrayView1::from(&input.coordinates),
        ArrayView1::from(&input.momenta),
        ArrayView1::from(&input.width),
        input.ntraj,
        &mut rng,
    )?;
    if let Some(temperature) = input.temperature {
        momenta = initialize_momenta(masses.view(), input.ntraj, temperature, &mut rng)?;
    }
    Ok(SystemData::new(
        input.dynamics.clone(),
        coordinates,
        momenta,
        masses,
        nstates,
        input.initial_state,
    ))
}
