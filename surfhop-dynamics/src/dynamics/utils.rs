use crate::c64;
use crate::interface::SurfaceData;
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::prelude::*;

/// Hermitian conjugate of a complex matrix
pub fn adjoint(matrix: ArrayView2<c64>) -> Array2<c64> {
    matrix.t().mapv(|val| val.conj())
}

pub fn to_complex(matrix: ArrayView2<f64>) -> Array2<c64> {
    matrix.mapv(|val| c64::new(val, 0.0))
}

/// |c_i|^2 of every state
pub fn populations(coefficients: ArrayView1<c64>) -> Array1<f64> {
    coefficients.mapv(|val| val.norm_sqr())
}

/// Populations of all trajectories, [nstates, ntraj]
pub fn ensemble_populations(coefficients: ArrayView2<c64>) -> Array2<f64> {
    coefficients.mapv(|val| val.norm_sqr())
}

pub fn norm_sqr(coefficients: ArrayView1<c64>) -> f64 {
    coefficients.iter().map(|val| val.norm_sqr()).sum()
}

/// Eigen decomposition of a Hermitian matrix. The eigenvalues are returned in the order
/// of the underlying solver, the columns of the second array are the eigenvectors.
pub fn hermitian_eigh(matrix: ArrayView2<c64>) -> (Array1<f64>, Array2<c64>) {
    let dim: usize = matrix.nrows();
    let mat: DMatrix<c64> = DMatrix::from_fn(dim, dim, |i, j| matrix[[i, j]]);
    let eigen = SymmetricEigen::new(mat);
    let values: Array1<f64> = Array1::from_shape_fn(dim, |i| eigen.eigenvalues[i]);
    let vectors: Array2<c64> = Array2::from_shape_fn((dim, dim), |(i, j)| eigen.eigenvectors[(i, j)]);
    (values, vectors)
}

/// exp(-i H dt) for a Hermitian matrix H, built from its eigen decomposition so that the
/// propagator is unitary up to round-off.
pub fn propagator(hamiltonian: ArrayView2<c64>, dt: f64) -> Array2<c64> {
    let (values, vectors): (Array1<f64>, Array2<c64>) = hermitian_eigh(hamiltonian);
    let mut scaled: Array2<c64> = vectors.clone();
    for (mut column, val) in scaled.axis_iter_mut(Axis(1)).zip(values.iter()) {
        let phase: c64 = (c64::new(0.0, -1.0) * *val * dt).exp();
        column.mapv_inplace(|c| c * phase);
    }
    scaled.dot(&adjoint(vectors.view()))
}

/// Weight |P_ka|^2 of the raw state k in the tracked state a.
fn projector_weights(projector: ArrayView2<c64>) -> Array2<f64> {
    projector.mapv(|val| val.norm_sqr())
}

/// Adiabatic energies in the dynamically consistent basis, diag(P^H E P)
pub fn consistent_energies(surface: &SurfaceData, projector: ArrayView2<c64>) -> Array1<f64> {
    projector_weights(projector).t().dot(&surface.energies)
}

/// Gradients in the dynamically consistent basis, [nstates, ndof]
pub fn consistent_gradients(surface: &SurfaceData, projector: ArrayView2<c64>) -> Array2<f64> {
    projector_weights(projector).t().dot(&surface.gradients)
}

/// Derivative coupling between the tracked states i and j along every dof,
/// (P^H d P)_ij, [ndof]
pub fn consistent_coupling(
    surface: &SurfaceData,
    projector: ArrayView2<c64>,
    i: usize,
    j: usize,
) -> Array1<c64> {
    let left: Array1<c64> = projector.column(i).mapv(|val| val.conj());
    let right: ArrayView1<c64> = projector.column(j);
    surface
        .derivative_couplings
        .outer_iter()
        .map(|d_dof| {
            let d: Array2<c64> = to_complex(d_dof);
            left.dot(&d.dot(&right))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::AbsDiffEq;

    pub const EPSILON: f64 = 1e-12;

    fn random_hermitian() -> Array2<c64> {
        array![
            [c64::new(0.3, 0.0), c64::new(0.1, 0.05), c64::new(-0.02, 0.0)],
            [c64::new(0.1, -0.05), c64::new(-0.2, 0.0), c64::new(0.0, 0.07)],
            [c64::new(-0.02, 0.0), c64::new(0.0, -0.07), c64::new(0.5, 0.0)]
        ]
    }

    #[test]
    fn propagator_is_unitary() {
        let u: Array2<c64> = propagator(random_hermitian().view(), 2.5);
        let product: Array2<c64> = adjoint(u.view()).dot(&u);
        let identity: Array2<c64> = Array2::eye(3);
        assert!(product.abs_diff_eq(&identity, EPSILON));
    }

    #[test]
    fn propagator_of_diagonal_matrix_gives_phases() {
        let h: Array2<c64> = to_complex(array![[0.0, 0.0], [0.0, 1.0]].view());
        let u: Array2<c64> = propagator(h.view(), 0.5);
        assert!(u[[0, 0]].abs_diff_eq(&c64::new(1.0, 0.0), EPSILON));
        assert!(u[[1, 1]].abs_diff_eq(&c64::new(0.5_f64.cos(), -0.5_f64.sin()), EPSILON));
        assert!(u[[0, 1]].norm() < EPSILON);
    }

    #[test]
    fn eigen_decomposition_reconstructs_matrix() {
        let h: Array2<c64> = random_hermitian();
        let (values, vectors) = hermitian_eigh(h.view());
        let diag: Array2<c64> = Array2::from_diag(&values.mapv(|val| c64::new(val, 0.0)));
        let rebuilt: Array2<c64> = vectors.dot(&diag).dot(&adjoint(vectors.view()));
        assert!(rebuilt.abs_diff_eq(&h, 1e-10));
    }
}
