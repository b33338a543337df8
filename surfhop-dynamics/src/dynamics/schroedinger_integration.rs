use crate::c64;
use crate::dynamics::utils::{adjoint, propagator};
use crate::initialization::{NacUpdate, Representation};
use crate::interface::{SurfaceData, SurfaceError};
use ndarray::prelude::*;
use rayon::prelude::*;

/// Time-derivative couplings in the raw adiabatic basis contracted from the
/// derivative couplings and the velocities of the quantum dofs,
/// NACT_ij = sum_dof d_ij(dof) p_dof / M_dof
pub fn nact_from_momenta(
    surface: &SurfaceData,
    momentum: ArrayView1<f64>,
    inverse_masses: ArrayView1<f64>,
    quantum_dofs: &[usize],
) -> Array2<f64> {
    let nstates: usize = surface.nstates();
    let mut nact: Array2<f64> = Array2::zeros((nstates, nstates));
    for dof in quantum_dofs.iter() {
        let velocity: f64 = momentum[*dof] * inverse_masses[*dof];
        nact.scaled_add(velocity, &surface.derivative_couplings.index_axis(Axis(0), *dof));
    }
    nact
}

/// Time-derivative couplings of one trajectory from the configured source.
pub fn time_derivative_couplings(
    nac_update: NacUpdate,
    surface: &SurfaceData,
    momentum: ArrayView1<f64>,
    inverse_masses: ArrayView1<f64>,
    quantum_dofs: &[usize],
    trajectory: usize,
) -> Result<Array2<f64>, SurfaceError> {
    match nac_update {
        NacUpdate::Momenta => Ok(nact_from_momenta(
            surface,
            momentum,
            inverse_masses,
            quantum_dofs,
        )),
        NacUpdate::Provider => surface.time_derivative_coupling.clone().ok_or_else(|| {
            SurfaceError::new(
                "time-derivative couplings were requested but not supplied",
                Some(trajectory),
            )
        }),
    }
}

/// Vibronic Hamiltonian in the dynamically consistent basis,
/// P^H (diag(E) - i NACT) P
pub fn vibronic_hamiltonian(
    energies: ArrayView1<f64>,
    nact: ArrayView2<f64>,
    projector: ArrayView2<c64>,
) -> Array2<c64> {
    let nstates: usize = energies.len();
    let raw: Array2<c64> = Array2::from_shape_fn((nstates, nstates), |(i, j)| {
        let diagonal: f64 = if i == j { energies[i] } else { 0.0 };
        c64::new(diagonal, -nact[[i, j]])
    });
    adjoint(projector).dot(&raw).dot(&projector)
}

/// Vibronic Hamiltonians of all trajectories in the dynamically consistent adiabatic basis.
pub fn vibronic_hamiltonians(
    nac_update: NacUpdate,
    surfaces: &[SurfaceData],
    projectors: &[Array2<c64>],
    momenta: ArrayView2<f64>,
    inverse_masses: ArrayView1<f64>,
    quantum_dofs: &[usize],
) -> Result<Vec<Array2<c64>>, SurfaceError> {
    surfaces
        .iter()
        .enumerate()
        .map(|(traj, surface)| {
            let nact: Array2<f64> = time_derivative_couplings(
                nac_update,
                surface,
                momenta.column(traj),
                inverse_masses,
                quantum_dofs,
                traj,
            )?;
            Ok(vibronic_hamiltonian(
                surface.energies.view(),
                nact.view(),
                projectors[traj].view(),
            ))
        })
        .collect()
}

/// Hamiltonians that propagate the amplitudes in the chosen representation.
pub fn propagation_hamiltonians(
    representation: Representation,
    nac_update: NacUpdate,
    surfaces: &[SurfaceData],
    projectors: &[Array2<c64>],
    momenta: ArrayView2<f64>,
    inverse_masses: ArrayView1<f64>,
    quantum_dofs: &[usize],
) -> Result<Vec<Array2<c64>>, SurfaceError> {
    match representation {
        Representation::Adiabatic => vibronic_hamiltonians(
            nac_update,
            surfaces,
            projectors,
            momenta,
            inverse_masses,
            quantum_dofs,
        ),
        Representation::Diabatic => surfaces
            .iter()
            .enumerate()
            .map(|(traj, surface)| {
                surface.diabatic_hamiltonian.clone().ok_or_else(|| {
                    SurfaceError::new(
                        "the diabatic Hamiltonian was requested but not supplied",
                        Some(traj),
                    )
                })
            })
            .collect(),
    }
}

/// c <- exp(-i H dt) c for every trajectory. The trajectories are independent
/// and are propagated in parallel.
pub fn propagate_coefficients(
    coefficients: &mut Array2<c64>,
    hamiltonians: &[Array2<c64>],
    dt: f64,
) {
    let propagated: Vec<Array1<c64>> = hamiltonians
        .par_iter()
        .enumerate()
        .map(|(traj, hamiltonian)| {
            propagator(hamiltonian.view(), dt).dot(&coefficients.column(traj))
        })
        .collect();
    for (mut column, new) in coefficients.axis_iter_mut(Axis(1)).zip(propagated.iter()) {
        column.assign(new);
    }
}
