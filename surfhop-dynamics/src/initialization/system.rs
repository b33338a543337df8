use crate::initialization::{DynamicConfiguration, SystemDimensions};
use ndarray::prelude::*;

/// Struct that holds the data of the ensemble before the dynamics starts:
/// the coordinates and momenta of all trajectories, the masses of the dofs and the
/// initially occupied electronic states
pub struct SystemData {
    // Type that holds all the input settings from the user.
    pub config: DynamicConfiguration,
    /// [ndof, ntraj]
    pub coordinates: Array2<f64>,
    /// [ndof, ntraj]
    pub momenta: Array2<f64>,
    /// [ndof]
    pub masses: Array1<f64>,
    pub nstates: usize,
    /// active state of every trajectory in the adiabatic basis
    pub initial_states: Vec<usize>,
}

impl SystemData {
    /// Creates the struct [SystemData] for an ensemble whose trajectories all start in
    /// the same adiabatic state.
    pub fn new(
        config: DynamicConfiguration,
        coordinates: Array2<f64>,
        momenta: Array2<f64>,
        masses: Array1<f64>,
        nstates: usize,
        initial_state: usize,
    ) -> Self {
        let ntraj: usize = coordinates.ncols();
        Self {
            config,
            coordinates,
            momenta,
            masses,
            nstates,
            initial_states: vec![initial_state; ntraj],
        }
    }

    pub fn dimensions(&self) -> SystemDimensions {
        SystemDimensions {
            ndof: self.coordinates.nrows(),
            ntraj: self.coordinates.ncols(),
            nstates: self.nstates,
        }
    }
}
