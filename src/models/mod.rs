mod tully;

use crate::io::ModelKind;
use log::debug;
use nalgebra::DMatrix;
use ndarray::prelude::*;
use rayon::prelude::*;
use surfhop_dynamics::c64;
use surfhop_dynamics::dynamics::utils::{adjoint, to_complex};
use surfhop_dynamics::interface::{SurfaceData, SurfaceError, SurfaceProvider, SurfaceRequest};
pub use tully::*;

// couplings of states closer than this value (hartree) are set to zero
const COUPLING_GAP_THRESHOLD: f64 = 1.0e-12;

/// Real symmetric diabatic Hamiltonian that depends on the first nuclear dof only.
pub trait DiabaticModel: Sync {
    fn nstates(&self) -> usize;
    fn hamiltonian(&self, x: f64) -> Array2<f64>;
    /// dH/dx
    fn hamiltonian_derivative(&self, x: f64) -> Array2<f64>;
}

pub fn build_model(kind: ModelKind) -> Box<dyn DiabaticModel> {
    match kind {
        ModelKind::SimpleAvoidedCrossing { a, b, c, d } => {
            Box::new(SimpleAvoidedCrossing { a, b, c, d })
        }
        ModelKind::DualAvoidedCrossing { a, b, c, d, e0 } => {
            Box::new(DualAvoidedCrossing { a, b, c, d, e0 })
        }
        ModelKind::ExtendedCouplingReflection { a, b, c } => {
            Box::new(ExtendedCouplingReflection { a, b, c })
        }
        ModelKind::ConstantGap { gap } => Box::new(ConstantGap { gap }),
    }
}

/// Eigenvalues in ascending order and the eigenvectors as columns. The largest
/// component of every eigenvector is positive.
pub fn diagonalize(hamiltonian: ArrayView2<f64>) -> (Array1<f64>, Array2<f64>) {
    let dim: usize = hamiltonian.nrows();
    let eigen = DMatrix::from_fn(dim, dim, |i, j| hamiltonian[[i, j]]).symmetric_eigen();
    let mut order: Vec<usize> = (0..dim).collect();
    order.sort_by(|a, b| eigen.eigenvalues[*a].total_cmp(&eigen.eigenvalues[*b]));

    let energies: Array1<f64> = order.iter().map(|k| eigen.eigenvalues[*k]).collect();
    let mut vectors: Array2<f64> = Array2::zeros((dim, dim));
    for (col, k) in order.iter().enumerate() {
        let column = eigen.eigenvectors.column(*k);
        let largest: f64 = column
            .iter()
            .fold(0.0, |acc: f64, val| if val.abs() > acc.abs() { *val } else { acc });
        let sign: f64 = if largest < 0.0 { -1.0 } else { 1.0 };
        for row in 0..dim {
            vectors[[row, col]] = sign * column[row];
        }
    }
    (energies, vectors)
}

/// Adiabatic energies, gradients and derivative couplings of one trajectory.
/// d_ij = <i|dH/dx|j> / (E_j - E_i)
pub fn adiabatic_surface(
    model: &dyn DiabaticModel,
    coordinates: ArrayView1<f64>,
    diabatic: bool,
) -> SurfaceData {
    let ndof: usize = coordinates.len();
    let x: f64 = coordinates[0];
    let hamiltonian: Array2<f64> = model.hamiltonian(x);
    let (energies, vectors): (Array1<f64>, Array2<f64>) = diagonalize(hamiltonian.view());
    let nstates: usize = energies.len();
    let projected: Array2<f64> = vectors
        .t()
        .dot(&model.hamiltonian_derivative(x))
        .dot(&vectors);

    let mut gradients: Array2<f64> = Array2::zeros((nstates, ndof));
    let mut derivative_couplings: Array3<f64> = Array3::zeros((ndof, nstates, nstates));
    for i in 0..nstates {
        gradients[[i, 0]] = projected[[i, i]];
        for j in 0..nstates {
            let gap: f64 = energies[j] - energies[i];
            if i != j && gap.abs() > COUPLING_GAP_THRESHOLD {
                derivative_couplings[[0, i, j]] = projected[[i, j]] / gap;
            }
        }
    }

    SurfaceData {
        energies,
        gradients,
        derivative_couplings,
        basis_transform: to_complex(vectors.view()),
        diabatic_hamiltonian: if diabatic {
            Some(to_complex(hamiltonian.view()))
        } else {
            None
        },
        time_overlap: None,
        time_derivative_coupling: None,
    }
}

/// Surface provider for the analytic models. The adiabatic states of the last call
/// are stored to compute the time overlaps on request.
pub struct ModelSurface {
    model: Box<dyn DiabaticModel>,
    previous_basis: Option<Vec<Array2<c64>>>,
}

impl ModelSurface {
    pub fn new(model: Box<dyn DiabaticModel>) -> Self {
        ModelSurface {
            model,
            previous_basis: None,
        }
    }

    pub fn nstates(&self) -> usize {
        self.model.nstates()
    }
}

impl SurfaceProvider for ModelSurface {
    fn compute_data(
        &mut self,
        coordinates: ArrayView2<f64>,
        request: &SurfaceRequest,
    ) -> Result<Vec<SurfaceData>, SurfaceError> {
        if coordinates.nrows() == 0 {
            return Err(SurfaceError::new(
                "the model surfaces need at least one dof",
                None,
            ));
        }
        let ntraj: usize = coordinates.ncols();
        let model: &dyn DiabaticModel = self.model.as_ref();
        let mut surfaces: Vec<SurfaceData> = (0..ntraj)
            .into_par_iter()
            .map(|traj| adiabatic_surface(model, coordinates.column(traj), request.diabatic))
            .collect();

        if request.time_overlap {
            let nstates: usize = self.model.nstates();
            for (traj, surface) in surfaces.iter_mut().enumerate() {
                let overlap: Array2<c64> = match &self.previous_basis {
                    Some(previous) => adjoint(previous[traj].view()).dot(&surface.basis_transform),
                    None => Array2::eye(nstates),
                };
                surface.time_overlap = Some(overlap);
            }
        }
        self.previous_basis = Some(
            surfaces
                .iter()
                .map(|surface| surface.basis_transform.clone())
                .collect(),
        );
        debug!("model surfaces evaluated for {} trajectories", ntraj);
        Ok(surfaces)
    }
}
