use crate::constants;
use crate::defaults::{OBSERVABLES_FILE_NAME, POPULATIONS_FILE_NAME};
use crate::dynamics::StepReport;
use crate::initialization::PrintConfiguration;
use ndarray::prelude::*;
use ndarray_npy::write_npy;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Ensemble averaged observables of one step.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StepObservables {
    pub step: usize,
    /// time in fs
    pub time: f64,
    pub kinetic_energy: f64,
    pub potential_energy: f64,
    pub total_energy: f64,
    /// fraction of the trajectories in every state
    pub active_populations: Vec<f64>,
    /// average |c_i|^2 in the dynamically consistent basis
    pub amplitude_populations: Vec<f64>,
    pub attempted_hops: usize,
    pub accepted_hops: usize,
    pub frustrated_hops: usize,
    pub decoherence_events: usize,
}

impl StepObservables {
    /// `populations` are the |c_i|^2 of all trajectories, [nstates, ntraj]
    pub fn new(
        time: f64,
        kinetic_energies: ArrayView1<f64>,
        potential_energies: ArrayView1<f64>,
        states: &[usize],
        populations: ArrayView2<f64>,
        report: &StepReport,
    ) -> StepObservables {
        let ntraj: f64 = states.len().max(1) as f64;
        let nstates: usize = populations.nrows();
        let mut active_populations: Vec<f64> = vec![0.0; nstates];
        states
            .iter()
            .for_each(|state| active_populations[*state] += 1.0 / ntraj);
        let amplitude_populations: Vec<f64> = populations
            .mean_axis(Axis(1))
            .map(|pops| pops.to_vec())
            .unwrap_or_else(|| vec![0.0; nstates]);
        let kinetic_energy: f64 = kinetic_energies.sum() / ntraj;
        let potential_energy: f64 = potential_energies.sum() / ntraj;

        StepObservables {
            step: report.step,
            time: time / constants::FS_TO_AU,
            kinetic_energy,
            potential_energy,
            total_energy: kinetic_energy + potential_energy,
            active_populations,
            amplitude_populations,
            attempted_hops: report.attempted_hops,
            accepted_hops: report.accepted_hops,
            frustrated_hops: report.frustrated_hops,
            decoherence_events: report.decoherence_events,
        }
    }
}

/// Writes the observables of every step as one JSON object per line and collects
/// the population history, which is stored as .npy array at the end of the run.
pub struct DataWriter {
    config: PrintConfiguration,
    directory: PathBuf,
    population_history: Vec<Vec<f64>>,
}

impl DataWriter {
    /// Create the writer; an existing observables file is truncated.
    pub fn new(config: &PrintConfiguration, directory: &Path) -> std::io::Result<DataWriter> {
        if config.print_observables {
            File::create(directory.join(OBSERVABLES_FILE_NAME))?;
        }
        Ok(DataWriter {
            config: config.clone(),
            directory: directory.to_path_buf(),
            population_history: Vec::new(),
        })
    }

    pub fn record(&mut self, observables: &StepObservables) -> std::io::Result<()> {
        if self.config.print_observables {
            let line: String = serde_json::to_string(observables)?;
            let file = OpenOptions::new()
                .append(true)
                .open(self.directory.join(OBSERVABLES_FILE_NAME))?;
            let mut stream = BufWriter::new(file);
            writeln!(stream, "{}", line)?;
            stream.flush()?;
        }
        if self.config.print_populations {
            let mut row: Vec<f64> = vec![observables.time];
            row.extend(observables.amplitude_populations.iter());
            row.extend(observables.active_populations.iter());
            self.population_history.push(row);
        }
        Ok(())
    }

    /// Rows of the history: time, the amplitude populations and the active
    /// state populations.
    pub fn population_history(&self) -> Array2<f64> {
        let nrows: usize = self.population_history.len();
        let ncols: usize = self.population_history.first().map_or(0, |row| row.len());
        Array2::from_shape_fn((nrows, ncols), |(i, j)| self.population_history[i][j])
    }

    pub fn finish(&self) -> Result<(), String> {
        if self.config.print_populations && !self.population_history.is_empty() {
            write_npy(
                self.directory.join(POPULATIONS_FILE_NAME),
                &self.population_history(),
            )
            .map_err(|err| err.to_string())?;
        }
        Ok(())
    }
}
