use crate::c64;
use crate::defaults::MAX_HOPPING_PROBABILITY;
use crate::dynamics::rescaling::{
    apply_rescaling, rescaling_direction, solve_rescaling, Rescaling,
};
use crate::dynamics::utils::{consistent_energies, consistent_gradients, populations};
use crate::initialization::{
    FrustratedHopPolicy, HopAcceptance, HoppingMethod, ResolvedConfiguration,
};
use crate::interface::SurfaceData;
use ndarray::prelude::*;
use rand::distributions::Standard;
use rand::prelude::*;

/// Result of the hopping procedure of one trajectory in one step.
#[derive(Debug, Clone, PartialEq)]
pub enum HopOutcome {
    /// no hop was proposed
    Stay { state: usize },
    Accepted {
        from: usize,
        to: usize,
        rescaling: Rescaling,
    },
    /// the hop was proposed but rejected, the trajectory stays in `from`
    Frustrated {
        from: usize,
        to: usize,
        rescaling: Rescaling,
    },
}

impl HopOutcome {
    /// active state after the hopping procedure
    pub fn final_state(&self) -> usize {
        match self {
            HopOutcome::Stay { state } => *state,
            HopOutcome::Accepted { to, .. } => *to,
            HopOutcome::Frustrated { from, .. } => *from,
        }
    }
}

/// Clip the probabilities of the hops away from the active state, cap their sum
/// at one and put the probability to stay on the diagonal.
fn finalize_probabilities(mut probabilities: Array1<f64>, active: usize) -> Array1<f64> {
    probabilities[active] = 0.0;
    probabilities.mapv_inplace(|val| val.max(0.0).min(MAX_HOPPING_PROBABILITY));
    let total: f64 = probabilities.sum();
    if total > 1.0 {
        probabilities /= total;
    }
    probabilities[active] = 1.0 - probabilities.sum();
    probabilities
}

/// Fewest switches probabilities from the flux between the active state a and
/// every state j, g_aj = 2 dt Im(c_j^* H_ja c_a) / |c_a|^2
pub fn fssh_probabilities(
    coefficients: ArrayView1<c64>,
    hamiltonian: ArrayView2<c64>,
    active: usize,
    dt: f64,
) -> Array1<f64> {
    let nstates: usize = coefficients.len();
    let active_population: f64 = coefficients[active].norm_sqr();
    let mut probabilities: Array1<f64> = Array1::zeros(nstates);
    if active_population > 0.0 {
        for state in 0..nstates {
            let flux: f64 =
                2.0 * (coefficients[state].conj() * hamiltonian[[state, active]] * coefficients[active]).im;
            probabilities[state] = dt * flux / active_population;
        }
    }
    finalize_probabilities(probabilities, active)
}

/// Global flux probabilities from the population changes over the step. A hop is
/// only possible if the population of the active state decreased; the loss is
/// distributed over the states that gained population.
pub fn gfssh_probabilities(
    coefficients: ArrayView1<c64>,
    populations_before: ArrayView1<f64>,
    active: usize,
) -> Array1<f64> {
    let nstates: usize = coefficients.len();
    let occupations: Array1<f64> = populations(coefficients);
    let changes: Array1<f64> = &occupations - &populations_before;
    let mut probabilities: Array1<f64> = Array1::zeros(nstates);

    if changes[active] < 0.0 && populations_before[active] > 0.0 {
        let gain: f64 = changes.iter().filter(|val| **val > 0.0).sum();
        if gain > 0.0 {
            for state in 0..nstates {
                if changes[state] > 0.0 {
                    probabilities[state] =
                        -1.0 * (changes[active] / populations_before[active]) * changes[state] / gain;
                }
            }
        }
    }
    finalize_probabilities(probabilities, active)
}

/// Markov state probabilities, g_aj = |c_j|^2
pub fn mssh_probabilities(coefficients: ArrayView1<c64>, active: usize) -> Array1<f64> {
    finalize_probabilities(populations(coefficients), active)
}

/// Hop probabilities of all trajectories in the dynamically consistent basis.
/// `hamiltonians` are the vibronic Hamiltonians (FSSH) and `populations_before`
/// are the populations at the start of the step (GFSH).
pub fn hop_proposal_probabilities(
    method: HoppingMethod,
    coefficients: ArrayView2<c64>,
    hamiltonians: &[Array2<c64>],
    populations_before: ArrayView2<f64>,
    states: &[usize],
    dt: f64,
) -> Vec<Array1<f64>> {
    states
        .iter()
        .enumerate()
        .map(|(traj, active)| {
            let c: ArrayView1<c64> = coefficients.column(traj);
            match method {
                HoppingMethod::Gfssh => {
                    gfssh_probabilities(c, populations_before.column(traj), *active)
                }
                HoppingMethod::Mssh => mssh_probabilities(c, *active),
                _ => fssh_probabilities(c, hamiltonians[traj].view(), *active, dt),
            }
        })
        .collect()
}

/// The first state whose cumulative probability exceeds the random number.
pub fn propose_hop(probabilities: ArrayView1<f64>, active: usize, random_number: f64) -> usize {
    let mut sum: f64 = 0.0;
    for (state, prob) in probabilities.iter().enumerate() {
        if *prob > 0.0 {
            sum += prob;
            if random_number < sum {
                return state;
            }
        }
    }
    active
}

/// Propose the new states. One random number is drawn for every trajectory, in
/// trajectory order, whether or not a hop is possible.
pub fn propose_hops<R: Rng + ?Sized>(
    probabilities: &[Array1<f64>],
    states: &[usize],
    rng: &mut R,
) -> Vec<usize> {
    probabilities
        .iter()
        .zip(states.iter())
        .map(|(prob, active)| {
            let random_number: f64 = rng.sample(Standard);
            propose_hop(prob.view(), *active, random_number)
        })
        .collect()
}

/// Decide on the proposed hop of one trajectory.
pub fn accept_hop(
    config: &ResolvedConfiguration,
    surface: &SurfaceData,
    projector: ArrayView2<c64>,
    momentum: ArrayView1<f64>,
    inverse_masses: ArrayView1<f64>,
    from: usize,
    to: usize,
) -> HopOutcome {
    if from == to {
        return HopOutcome::Stay { state: from };
    }
    match config.acceptance {
        HopAcceptance::Always => HopOutcome::Accepted {
            from,
            to,
            rescaling: Rescaling::NotRequired,
        },
        HopAcceptance::EnergyConserving => {
            let energies: Array1<f64> = consistent_energies(surface, projector);
            let gradients: Array2<f64> = consistent_gradients(surface, projector);
            let target_force: Array1<f64> = gradients.row(to).mapv(|val| -val);
            let direction: Array1<f64> = rescaling_direction(
                config.rescaling,
                surface,
                projector,
                momentum,
                from,
                to,
                &config.quantum_dofs,
                &config.constrained_dofs,
            );
            let rescaling: Rescaling = solve_rescaling(
                momentum,
                inverse_masses,
                direction,
                energies[to] - energies[from],
                target_force.view(),
            );
            if rescaling.is_frustrated() {
                HopOutcome::Frustrated {
                    from,
                    to,
                    rescaling,
                }
            } else {
                HopOutcome::Accepted {
                    from,
                    to,
                    rescaling,
                }
            }
        }
    }
}

/// Decide on the proposed hops of all trajectories.
pub fn accept_hops(
    config: &ResolvedConfiguration,
    surfaces: &[SurfaceData],
    projectors: &[Array2<c64>],
    momenta: ArrayView2<f64>,
    inverse_masses: ArrayView1<f64>,
    proposed: &[usize],
    states: &[usize],
) -> Vec<HopOutcome> {
    states
        .iter()
        .zip(proposed.iter())
        .enumerate()
        .map(|(traj, (from, to))| {
            accept_hop(
                config,
                &surfaces[traj],
                projectors[traj].view(),
                momenta.column(traj),
                inverse_masses,
                *from,
                *to,
            )
        })
        .collect()
}

/// Momentum changes after the hops: accepted hops are rescaled, frustrated hops
/// are handled according to the policy.
pub fn handle_hops_nuclear(
    momenta: &mut Array2<f64>,
    outcomes: &[HopOutcome],
    policy: FrustratedHopPolicy,
) {
    for (momentum, outcome) in momenta.axis_iter_mut(Axis(1)).zip(outcomes.iter()) {
        match outcome {
            HopOutcome::Stay { .. } => {}
            HopOutcome::Accepted { rescaling, .. } | HopOutcome::Frustrated { rescaling, .. } => {
                apply_rescaling(momentum, rescaling, policy)
            }
        }
    }
}
