//! State tracking and phase correction of the adiabatic states.
//!
//! The projector P of a trajectory maps the raw adiabatic states of the
//! provider onto the dynamically consistent states that are followed during
//! the dynamics. After every nuclear step the new projector is the phased
//! permutation that fits P_prev^H S best, where S is the time overlap of the
//! raw states of two consecutive steps.
use crate::c64;
use crate::defaults::LOEWDIN_THRESHOLD;
use crate::dynamics::utils::{adjoint, hermitian_eigh};
use crate::initialization::{StateTracking, TrackingConfiguration};
use ndarray::prelude::*;
use rayon::prelude::*;

/// Updates the projector of one trajectory from the time overlap.
pub trait ProjectorUpdate: Sync {
    fn update(
        &self,
        projector: ArrayView2<c64>,
        time_overlap: ArrayView2<c64>,
        energies: ArrayView1<f64>,
    ) -> Array2<c64>;
}

/// Overlap based tracking with optional phase correction and Loewdin
/// orthogonalization inside clusters of degenerate states.
pub struct OverlapTracker {
    pub algorithm: StateTracking,
    pub phase_correction: bool,
    pub phase_correction_tol: f64,
    pub degeneracy_threshold: f64,
}

impl From<&TrackingConfiguration> for OverlapTracker {
    fn from(config: &TrackingConfiguration) -> Self {
        OverlapTracker {
            algorithm: config.algorithm,
            phase_correction: config.phase_correction,
            phase_correction_tol: config.phase_correction_tol,
            degeneracy_threshold: config.degeneracy_threshold,
        }
    }
}

impl ProjectorUpdate for OverlapTracker {
    fn update(
        &self,
        projector: ArrayView2<c64>,
        time_overlap: ArrayView2<c64>,
        energies: ArrayView1<f64>,
    ) -> Array2<c64> {
        let nstates: usize = projector.ncols();
        let x: Array2<c64> = adjoint(projector).dot(&time_overlap);
        let weights: Array2<f64> = x.mapv(|val| val.norm_sqr());

        // assignment[i] is the raw state followed by the tracked state i
        let assignment: Vec<usize> = match self.algorithm {
            StateTracking::None => (0..nstates).collect(),
            StateTracking::Pairwise => pairwise_assignment(weights.view()),
            StateTracking::Assignment => hungarian_assignment(weights.view()),
        };
        let mut new_projector: Array2<c64> = Array2::zeros((nstates, nstates));
        for (tracked, raw) in assignment.iter().enumerate() {
            new_projector[[*raw, tracked]] = c64::new(1.0, 0.0);
        }

        let mut fixed: Vec<bool> = vec![false; nstates];
        if self.algorithm != StateTracking::None {
            for cluster in degenerate_clusters(energies, self.degeneracy_threshold) {
                let tracked: Vec<usize> = (0..nstates)
                    .filter(|i| cluster.contains(&assignment[*i]))
                    .collect();
                if let Some(block) = loewdin_block(x.view(), &tracked, &cluster) {
                    for (r, raw) in cluster.iter().enumerate() {
                        for (c, state) in tracked.iter().enumerate() {
                            new_projector[[*raw, *state]] = block[[r, c]];
                        }
                    }
                    tracked.iter().for_each(|state| fixed[*state] = true);
                }
            }
        }

        if self.phase_correction {
            for (tracked, raw) in assignment.iter().enumerate() {
                if fixed[tracked] {
                    continue;
                }
                let overlap: c64 = x[[tracked, *raw]];
                let magnitude: f64 = overlap.norm();
                if magnitude > self.phase_correction_tol {
                    new_projector[[*raw, tracked]] *= overlap.conj() / magnitude;
                }
            }
        }
        new_projector
    }
}

/// Time overlap of the raw adiabatic states of two steps, U_prev^H U_curr
pub fn time_overlap(previous: ArrayView2<c64>, current: ArrayView2<c64>) -> Array2<c64> {
    adjoint(previous).dot(&current)
}

/// Update the projectors of all trajectories in parallel.
pub fn update_projectors(
    tracker: &dyn ProjectorUpdate,
    projectors: &mut [Array2<c64>],
    overlaps: &[Array2<c64>],
    energies: &[Array1<f64>],
) {
    projectors
        .par_iter_mut()
        .zip(overlaps.par_iter())
        .zip(energies.par_iter())
        .for_each(|((projector, overlap), energy)| {
            *projector = tracker.update(projector.view(), overlap.view(), energy.view());
        });
}

/// Greedy assignment: the largest remaining weight fixes one pair at a time.
pub fn pairwise_assignment(weights: ArrayView2<f64>) -> Vec<usize> {
    let n: usize = weights.nrows();
    let mut pairs: Vec<(f64, usize, usize)> = weights
        .indexed_iter()
        .map(|((i, j), w)| (*w, i, j))
        .collect();
    pairs.sort_by(|a, b| b.0.total_cmp(&a.0));
    let mut assignment: Vec<Option<usize>> = vec![None; n];
    let mut taken: Vec<bool> = vec![false; n];
    for (_, i, j) in pairs {
        if assignment[i].is_none() && !taken[j] {
            assignment[i] = Some(j);
            taken[j] = true;
        }
    }
    assignment
        .into_iter()
        .enumerate()
        .map(|(i, raw)| raw.unwrap_or(i))
        .collect()
}

/// Assignment that maximizes the summed weights (Kuhn-Munkres with
/// potentials). Returns for every row the assigned column.
pub fn hungarian_assignment(weights: ArrayView2<f64>) -> Vec<usize> {
    let n: usize = weights.nrows();
    if n == 0 {
        return Vec::new();
    }
    let max_weight: f64 = weights.iter().cloned().fold(0.0, f64::max);
    let cost = |i: usize, j: usize| max_weight - weights[[i, j]];

    // one based, index 0 is the virtual start column
    let mut u: Vec<f64> = vec![0.0; n + 1];
    let mut v: Vec<f64> = vec![0.0; n + 1];
    let mut matched_row: Vec<usize> = vec![0; n + 1];
    let mut way: Vec<usize> = vec![0; n + 1];

    for row in 1..=n {
        matched_row[0] = row;
        let mut j0: usize = 0;
        let mut min_values: Vec<f64> = vec![f64::INFINITY; n + 1];
        let mut used: Vec<bool> = vec![false; n + 1];
        loop {
            used[j0] = true;
            let i0: usize = matched_row[j0];
            let mut delta: f64 = f64::INFINITY;
            let mut j1: usize = 0;
            for j in 1..=n {
                if !used[j] {
                    let current: f64 = cost(i0 - 1, j - 1) - u[i0] - v[j];
                    if current < min_values[j] {
                        min_values[j] = current;
                        way[j] = j0;
                    }
                    if min_values[j] < delta {
                        delta = min_values[j];
                        j1 = j;
                    }
                }
            }
            for j in 0..=n {
                if used[j] {
                    u[matched_row[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_values[j] -= delta;
                }
            }
            j0 = j1;
            if matched_row[j0] == 0 {
                break;
            }
        }
        loop {
            let j1: usize = way[j0];
            matched_row[j0] = matched_row[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut assignment: Vec<usize> = vec![0; n];
    for j in 1..=n {
        if matched_row[j] > 0 {
            assignment[matched_row[j] - 1] = j - 1;
        }
    }
    assignment
}

/// Groups of raw states whose neighbouring energies differ by less than the threshold.
pub fn degenerate_clusters(energies: ArrayView1<f64>, threshold: f64) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..energies.len()).collect();
    order.sort_by(|a, b| energies[*a].total_cmp(&energies[*b]));

    let mut clusters: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    for idx in order {
        match current.last() {
            Some(last) if (energies[idx] - energies[*last]).abs() < threshold => current.push(idx),
            _ => {
                if current.len() > 1 {
                    clusters.push(current.clone());
                }
                current = vec![idx];
            }
        }
    }
    if current.len() > 1 {
        clusters.push(current);
    }
    clusters.iter_mut().for_each(|cluster| cluster.sort_unstable());
    clusters
}

/// Nearest unitary B^H (B B^H)^{-1/2} of the overlap block between the tracked
/// states and the raw states of one cluster. Rows of the result belong to the raw
/// states, columns to the tracked states. None if the block is (near) singular.
fn loewdin_block(x: ArrayView2<c64>, tracked: &[usize], raw: &[usize]) -> Option<Array2<c64>> {
    let dim: usize = raw.len();
    if tracked.len() != dim {
        return None;
    }
    let block: Array2<c64> = Array2::from_shape_fn((dim, dim), |(r, c)| x[[tracked[r], raw[c]]]);
    let metric: Array2<c64> = block.dot(&adjoint(block.view()));
    let (values, vectors): (Array1<f64>, Array2<c64>) = hermitian_eigh(metric.view());
    if values.iter().any(|val| *val < LOEWDIN_THRESHOLD) {
        return None;
    }
    let mut scaled: Array2<c64> = vectors.clone();
    for (mut column, val) in scaled.axis_iter_mut(Axis(1)).zip(values.iter()) {
        column.mapv_inplace(|c| c / val.sqrt());
    }
    let inverse_sqrt: Array2<c64> = scaled.dot(&adjoint(vectors.view()));
    Some(adjoint(block.view()).dot(&inverse_sqrt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::AbsDiffEq;

    fn tracker(algorithm: StateTracking, phase_correction: bool) -> OverlapTracker {
        OverlapTracker {
            algorithm,
            phase_correction,
            phase_correction_tol: 1.0e-3,
            degeneracy_threshold: 1.0e-8,
        }
    }

    fn complex(matrix: Array2<f64>) -> Array2<c64> {
        matrix.mapv(|val| c64::new(val, 0.0))
    }

    #[test]
    fn hungarian_beats_greedy_assignment() {
        let weights: Array2<f64> = array![[0.6, 0.5, 0.0], [0.5, 0.0, 0.0], [0.0, 0.0, 1.0]];
        assert_eq!(pairwise_assignment(weights.view()), vec![0, 1, 2]);
        assert_eq!(hungarian_assignment(weights.view()), vec![1, 0, 2]);
    }

    #[test]
    fn hungarian_handles_identity_and_swap() {
        let identity: Array2<f64> = Array2::eye(4);
        assert_eq!(hungarian_assignment(identity.view()), vec![0, 1, 2, 3]);
        let swap: Array2<f64> = array![[0.1, 0.9], [0.9, 0.1]];
        assert_eq!(hungarian_assignment(swap.view()), vec![1, 0]);
    }

    #[test]
    fn swapped_states_are_followed_with_phase() {
        let s: Array2<c64> = complex(array![[0.0, -1.0], [1.0, 0.0]]);
        let p: Array2<c64> = Array2::eye(2);
        let energies: Array1<f64> = array![0.0, 0.5];
        let new_p: Array2<c64> =
            tracker(StateTracking::Assignment, true).update(p.view(), s.view(), energies.view());
        let expected: Array2<c64> = complex(array![[0.0, 1.0], [-1.0, 0.0]]);
        assert!(new_p.abs_diff_eq(&expected, 1e-14));
        // the tracked states overlap with themselves
        let x: Array2<c64> = adjoint(p.view()).dot(&s).dot(&new_p);
        assert!(x.abs_diff_eq(&Array2::eye(2), 1e-14));
    }

    #[test]
    fn phase_only_correction_keeps_order() {
        let s: Array2<c64> = complex(array![[-1.0, 0.0], [0.0, 1.0]]);
        let p: Array2<c64> = Array2::eye(2);
        let energies: Array1<f64> = array![0.0, 0.5];
        let new_p: Array2<c64> =
            tracker(StateTracking::None, true).update(p.view(), s.view(), energies.view());
        assert!(new_p.abs_diff_eq(&complex(array![[-1.0, 0.0], [0.0, 1.0]]), 1e-14));
    }

    #[test]
    fn small_overlaps_leave_the_phase_alone() {
        let s: Array2<c64> = complex(array![[1.0e-4, 0.0], [0.0, 1.0]]);
        let p: Array2<c64> = Array2::eye(2);
        let energies: Array1<f64> = array![0.0, 0.5];
        let new_p: Array2<c64> =
            tracker(StateTracking::None, true).update(p.view(), s.view(), energies.view());
        assert!(new_p.abs_diff_eq(&Array2::eye(2), 1e-14));
    }

    #[test]
    fn degenerate_states_are_rotated_back() {
        let theta: f64 = 0.4;
        let s: Array2<c64> = complex(array![
            [theta.cos(), -theta.sin()],
            [theta.sin(), theta.cos()]
        ]);
        let p: Array2<c64> = Array2::eye(2);
        let energies: Array1<f64> = array![0.3, 0.3];
        let new_p: Array2<c64> =
            tracker(StateTracking::Assignment, true).update(p.view(), s.view(), energies.view());
        let x: Array2<c64> = s.dot(&new_p);
        assert!(x.abs_diff_eq(&Array2::eye(2), 1e-10));
        let unitarity: Array2<c64> = adjoint(new_p.view()).dot(&new_p);
        assert!(unitarity.abs_diff_eq(&Array2::eye(2), 1e-10));
    }

    #[test]
    fn clusters_are_found_in_energy_order() {
        let energies: Array1<f64> = array![0.5, 0.1, 0.5 + 1.0e-10, 0.9];
        assert_eq!(degenerate_clusters(energies.view(), 1.0e-8), vec![vec![0, 2]]);
    }
}
