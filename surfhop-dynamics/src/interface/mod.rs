use crate::c64;
pub use ndarray::prelude::*;
use std::fmt;

/// Tells the [SurfaceProvider] which optional quantities the integrator needs
/// at the current geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceRequest {
    /// The diabatic Hamiltonian is required (propagation in the diabatic basis).
    pub diabatic: bool,
    /// The provider should supply the time overlap with the previous call.
    pub time_overlap: bool,
    /// The provider should supply the time-derivative couplings.
    pub time_derivative_coupling: bool,
}

/// Electronic structure of one trajectory at one geometry.
///
/// All adiabatic quantities are given in the raw order and with the raw phases in
/// which the provider computed them. The integrator corrects for sign flips and
/// reordering itself.
#[derive(Debug, Clone)]
pub struct SurfaceData {
    /// adiabatic energies, [nstates]
    pub energies: Array1<f64>,
    /// gradients of the adiabatic energies, [nstates, ndof]
    pub gradients: Array2<f64>,
    /// derivative couplings d_ij = <i|d/dq|j>, [ndof, nstates, nstates]
    pub derivative_couplings: Array3<f64>,
    /// columns are the adiabatic states expanded in the diabatic basis, [ndia, nstates]
    pub basis_transform: Array2<c64>,
    /// diabatic Hamiltonian, [ndia, ndia]
    pub diabatic_hamiltonian: Option<Array2<c64>>,
    /// <raw adiabatic(t - dt)|raw adiabatic(t)>, [nstates, nstates]
    pub time_overlap: Option<Array2<c64>>,
    /// time-derivative couplings <i|d/dt|j>, [nstates, nstates]
    pub time_derivative_coupling: Option<Array2<f64>>,
}

impl SurfaceData {
    pub fn nstates(&self) -> usize {
        self.energies.len()
    }
}

/// Failure of the external electronic structure calculation. The integrator never
/// retries, the error ends the run.
#[derive(Debug, Clone)]
pub struct SurfaceError {
    pub message: String,
    pub trajectory: Option<usize>,
}

impl SurfaceError {
    pub fn new(message: &str, trajectory: Option<usize>) -> Self {
        Self {
            message: String::from(message),
            trajectory,
        }
    }
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self.trajectory {
            Some(traj) => write!(
                f,
                "Surface evaluation failed for trajectory {}: {}",
                traj, self.message
            ),
            None => write!(f, "Surface evaluation failed: {}", self.message),
        }
    }
}

impl std::error::Error for SurfaceError {}

/// Trait that provides an interface for an electronic structure program or model.
/// The trait implements the function compute data, which returns the energies,
/// gradients, nonadiabatic couplings and basis transformation of every trajectory.
pub trait SurfaceProvider {
    /// `coordinates` has the shape [ndof, ntraj]; the returned vector holds one
    /// entry per trajectory in the same order.
    fn compute_data(
        &mut self,
        coordinates: ArrayView2<f64>,
        request: &SurfaceRequest,
    ) -> Result<Vec<SurfaceData>, SurfaceError>;
}
