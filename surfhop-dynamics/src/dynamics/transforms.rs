use crate::c64;
use crate::dynamics::utils::adjoint;
use crate::initialization::Representation;
use crate::interface::SurfaceData;
use ndarray::prelude::*;

/// c_adi = U^H c_dia, with the columns of U being the raw adiabatic states
pub fn dia_to_adi(coefficients: ArrayView1<c64>, basis_transform: ArrayView2<c64>) -> Array1<c64> {
    adjoint(basis_transform).dot(&coefficients)
}

/// c_dia = U c_adi
pub fn adi_to_dia(coefficients: ArrayView1<c64>, basis_transform: ArrayView2<c64>) -> Array1<c64> {
    basis_transform.dot(&coefficients)
}

/// raw adiabatic amplitudes into the dynamically consistent basis, c_dc = P^H c_raw
pub fn raw_to_dynconsyst(coefficients: ArrayView1<c64>, projector: ArrayView2<c64>) -> Array1<c64> {
    adjoint(projector).dot(&coefficients)
}

/// c_raw = P c_dc
pub fn dynconsyst_to_raw(coefficients: ArrayView1<c64>, projector: ArrayView2<c64>) -> Array1<c64> {
    projector.dot(&coefficients)
}

/// Amplitudes of all trajectories, [nstates, ntraj], from the propagation
/// representation into the dynamically consistent adiabatic basis in which the
/// hops are decided.
pub fn to_hopping_basis(
    representation: Representation,
    coefficients: ArrayView2<c64>,
    surfaces: &[SurfaceData],
    projectors: &[Array2<c64>],
) -> Array2<c64> {
    match representation {
        Representation::Adiabatic => coefficients.to_owned(),
        Representation::Diabatic => {
            let mut transformed: Array2<c64> = Array2::zeros(coefficients.raw_dim());
            for (traj, mut column) in transformed.axis_iter_mut(Axis(1)).enumerate() {
                let raw: Array1<c64> =
                    dia_to_adi(coefficients.column(traj), surfaces[traj].basis_transform.view());
                column.assign(&raw_to_dynconsyst(raw.view(), projectors[traj].view()));
            }
            transformed
        }
    }
}

/// Inverse of [to_hopping_basis].
pub fn from_hopping_basis(
    representation: Representation,
    coefficients: ArrayView2<c64>,
    surfaces: &[SurfaceData],
    projectors: &[Array2<c64>],
) -> Array2<c64> {
    match representation {
        Representation::Adiabatic => coefficients.to_owned(),
        Representation::Diabatic => {
            let mut transformed: Array2<c64> = Array2::zeros(coefficients.raw_dim());
            for (traj, mut column) in transformed.axis_iter_mut(Axis(1)).enumerate() {
                let raw: Array1<c64> =
                    dynconsyst_to_raw(coefficients.column(traj), projectors[traj].view());
                column.assign(&adi_to_dia(raw.view(), surfaces[traj].basis_transform.view()));
            }
            transformed
        }
    }
}
