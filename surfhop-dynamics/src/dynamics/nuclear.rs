use crate::c64;
use crate::dynamics::thermostat::Thermostat;
use crate::dynamics::utils::consistent_gradients;
use crate::initialization::Entanglement;
use crate::interface::SurfaceData;
use ndarray::prelude::*;

/// Forces of the active states of all trajectories, [ndof, ntraj]. The force of a
/// dynamically consistent state a is -sum_k |P_ka|^2 dE_k/dq.
pub fn active_state_forces(
    surfaces: &[SurfaceData],
    projectors: &[Array2<c64>],
    states: &[usize],
) -> Array2<f64> {
    let ndof: usize = surfaces.first().map_or(0, |s| s.gradients.ncols());
    let mut forces: Array2<f64> = Array2::zeros((ndof, surfaces.len()));
    for (traj, mut force) in forces.axis_iter_mut(Axis(1)).enumerate() {
        let gradients: Array2<f64> =
            consistent_gradients(&surfaces[traj], projectors[traj].view());
        force.assign(&gradients.row(states[traj]).mapv(|val| -val));
    }
    forces
}

/// Ensemble average of every dof, [ndof]
fn ensemble_mean(values: ArrayView2<f64>) -> Array1<f64> {
    values
        .mean_axis(Axis(1))
        .unwrap_or_else(|| Array1::zeros(values.nrows()))
}

/// Gaussian exponents of the ETHD density, 1 / (2 sigma^2) of every dof, taken from
/// the ensemble variance. Dofs without spread get a zero exponent.
fn ensemble_widths(coordinates: ArrayView2<f64>) -> Array1<f64> {
    let variance: Array1<f64> = coordinates.var_axis(Axis(1), 0.0);
    variance.mapv(|var| if var > 0.0 { 0.5 / var } else { 0.0 })
}

/// Quantum forces of the entangled trajectories, [ndof, ntraj], or None if the
/// trajectories are independent.
pub fn entanglement_forces(
    coordinates: ArrayView2<f64>,
    inverse_masses: ArrayView1<f64>,
    entanglement: Entanglement,
) -> Option<Array2<f64>> {
    let alpha: Array1<f64> = match entanglement {
        Entanglement::None => return None,
        Entanglement::Ethd => ensemble_widths(coordinates),
        Entanglement::Ethd3 { alpha } | Entanglement::Ethd3Friction { alpha, .. } => {
            Array1::from_elem(coordinates.nrows(), alpha)
        }
    };
    let mean: Array1<f64> = ensemble_mean(coordinates);
    let prefactor: Array1<f64> = &alpha * &alpha * &inverse_masses;
    let mut forces: Array2<f64> = coordinates.to_owned();
    for (dof, mut row) in forces.axis_iter_mut(Axis(0)).enumerate() {
        let (q_mean, k) = (mean[dof], prefactor[dof]);
        row.mapv_inplace(|q| -k * (q - q_mean));
    }
    Some(forces)
}

/// Momentum-space friction of ETHD3, -0.5 alpha beta (p - <p>), [ndof, ntraj]
pub fn ethd3_friction(momenta: ArrayView2<f64>, alpha: f64, beta: f64) -> Array2<f64> {
    let mean: Array1<f64> = ensemble_mean(momenta);
    let mut friction: Array2<f64> = momenta.to_owned();
    for (dof, mut row) in friction.axis_iter_mut(Axis(0)).enumerate() {
        let p_mean: f64 = mean[dof];
        row.mapv_inplace(|p| -0.5 * alpha * beta * (p - p_mean));
    }
    friction
}

/// p <- p + F dt
pub fn momentum_kick(momenta: &mut Array2<f64>, forces: ArrayView2<f64>, dt: f64) {
    momenta.scaled_add(dt, &forces);
}

/// Momenta of constrained dofs are zero in every trajectory.
pub fn apply_constraints(momenta: &mut Array2<f64>, constrained_dofs: &[usize]) {
    for dof in constrained_dofs.iter() {
        momenta.row_mut(*dof).fill(0.0);
    }
}

/// q <- q + M^-1 (p + gamma) dt, gamma being the optional friction term
pub fn position_drift(
    coordinates: &mut Array2<f64>,
    momenta: ArrayView2<f64>,
    inverse_masses: ArrayView1<f64>,
    friction: Option<ArrayView2<f64>>,
    dt: f64,
) {
    let mut effective: Array2<f64> = momenta.to_owned();
    if let Some(gamma) = friction {
        effective += &gamma;
    }
    let inv_m: ArrayView2<f64> = inverse_masses.insert_axis(Axis(1));
    let velocities: Array2<f64> = &effective * &inv_m;
    coordinates.scaled_add(dt, &velocities);
}

/// Kinetic energy of every trajectory, [ntraj]
pub fn kinetic_energies(momenta: ArrayView2<f64>, inverse_masses: ArrayView1<f64>) -> Array1<f64> {
    momenta
        .axis_iter(Axis(1))
        .map(|p| 0.5 * (&p * &p * &inverse_masses).sum())
        .collect()
}

/// Kinetic energy of a subset of dofs of one trajectory
pub fn kinetic_energy_of_dofs(
    momentum: ArrayView1<f64>,
    inverse_masses: ArrayView1<f64>,
    dofs: &[usize],
) -> f64 {
    dofs.iter()
        .map(|dof| 0.5 * momentum[*dof].powi(2) * inverse_masses[*dof])
        .sum()
}

/// Scale the momenta of the thermostatted dofs by the factor of each trajectory's
/// thermostat for the interval dt.
pub fn scale_thermostat_dofs(
    momenta: &mut Array2<f64>,
    thermostats: &[Box<dyn Thermostat>],
    dofs: &[usize],
    dt: f64,
) {
    for (mut momentum, thermostat) in momenta.axis_iter_mut(Axis(1)).zip(thermostats.iter()) {
        let scale: f64 = thermostat.vel_scale(dt);
        for dof in dofs.iter() {
            momentum[*dof] *= scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, AbsDiffEq};

    fn surface(gradients: Array2<f64>) -> SurfaceData {
        let nstates: usize = gradients.nrows();
        let ndof: usize = gradients.ncols();
        SurfaceData {
            energies: Array1::zeros(nstates),
            gradients,
            derivative_couplings: Array3::zeros((ndof, nstates, nstates)),
            basis_transform: Array2::eye(nstates),
            diabatic_hamiltonian: None,
            time_overlap: None,
            time_derivative_coupling: None,
        }
    }

    #[test]
    fn forces_follow_the_projector() {
        let surfaces = vec![surface(array![[1.0, 0.0], [0.0, 2.0]])];
        let swap: Array2<c64> = array![
            [c64::new(0.0, 0.0), c64::new(0.0, 1.0)],
            [c64::new(1.0, 0.0), c64::new(0.0, 0.0)]
        ];
        let forces: Array2<f64> = active_state_forces(&surfaces, &[swap], &[0]);
        // tracked state 0 is the raw state 1
        assert_eq!(forces, array![[0.0], [-2.0]]);
    }

    #[test]
    fn constrained_momenta_stay_zero_after_kick() {
        let mut momenta: Array2<f64> = array![[1.0, 2.0], [0.0, 0.0], [3.0, 4.0]];
        let forces: Array2<f64> = Array2::ones((3, 2));
        momentum_kick(&mut momenta, forces.view(), 0.5);
        apply_constraints(&mut momenta, &[1]);
        assert_eq!(momenta.row(1), array![0.0, 0.0]);
        assert_eq!(momenta.row(0), array![1.5, 2.5]);
    }

    #[test]
    fn drift_uses_the_inverse_masses() {
        let mut q: Array2<f64> = Array2::zeros((2, 1));
        let p: Array2<f64> = array![[2.0], [2.0]];
        position_drift(&mut q, p.view(), array![0.5, 0.25].view(), None, 2.0);
        assert!(q.abs_diff_eq(&array![[2.0], [1.0]], 1e-14));
    }

    #[test]
    fn entanglement_pulls_towards_the_mean() {
        let q: Array2<f64> = array![[-1.0, 1.0]];
        let inv_m: Array1<f64> = array![1.0];
        let forces: Array2<f64> =
            entanglement_forces(q.view(), inv_m.view(), Entanglement::Ethd3 { alpha: 2.0 }).unwrap();
        assert_abs_diff_eq!(forces[[0, 0]], 4.0, epsilon = 1e-14);
        assert_abs_diff_eq!(forces[[0, 1]], -4.0, epsilon = 1e-14);
        assert!(entanglement_forces(q.view(), inv_m.view(), Entanglement::None).is_none());
        // variance 1 gives the exponent 1/2
        let ethd: Array2<f64> =
            entanglement_forces(q.view(), inv_m.view(), Entanglement::Ethd).unwrap();
        assert_abs_diff_eq!(ethd[[0, 0]], 0.25, epsilon = 1e-14);
    }

    #[test]
    fn friction_vanishes_for_identical_momenta() {
        let p: Array2<f64> = array![[1.0, 1.0], [0.0, 2.0]];
        let gamma: Array2<f64> = ethd3_friction(p.view(), 1.0, 2.0);
        assert_eq!(gamma.row(0), array![0.0, 0.0]);
        assert_eq!(gamma.row(1), array![1.0, -1.0]);
    }

    #[test]
    fn kinetic_energy_per_trajectory() {
        let p: Array2<f64> = array![[1.0, 2.0], [2.0, 0.0]];
        let ekin: Array1<f64> = kinetic_energies(p.view(), array![1.0, 0.5].view());
        assert_eq!(ekin, array![1.5, 2.0]);
        assert_abs_diff_eq!(
            kinetic_energy_of_dofs(p.column(0), array![1.0, 0.5].view(), &[1]),
            1.0,
            epsilon = 1e-14
        );
    }
}
