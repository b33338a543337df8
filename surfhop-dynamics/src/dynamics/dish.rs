//! Decoherence induced surface hopping.
//!
//! Every state of a trajectory carries a coherence timer. The first state whose
//! timer runs out decoheres: the amplitudes either collapse onto it or it is
//! projected out of the superposition, which may move the active state.
use crate::c64;
use crate::dynamics::decoherence::{collapse, project_out};
use crate::dynamics::hopping_routines::{accept_hop, propose_hop, HopOutcome};
use crate::dynamics::utils::populations;
use crate::initialization::ResolvedConfiguration;
use crate::interface::SurfaceData;
use ndarray::prelude::*;
use rand::distributions::Standard;
use rand::prelude::*;
use rand_distr::Exp;

/// Remaining coherence intervals of the states of one trajectory. None means the
/// interval has not been sampled yet, infinity that the state never decoheres.
#[derive(Debug, Clone, PartialEq)]
pub struct CoherenceTimers {
    pub remaining: Vec<Option<f64>>,
}

impl CoherenceTimers {
    pub fn new(nstates: usize) -> Self {
        CoherenceTimers {
            remaining: vec![None; nstates],
        }
    }

    /// Sample the missing intervals from the exponential distribution of the rates.
    fn sample_missing<R: Rng + ?Sized>(&mut self, inverse_times: ArrayView1<f64>, rng: &mut R) {
        for (timer, rate) in self.remaining.iter_mut().zip(inverse_times.iter()) {
            if timer.is_none() {
                *timer = Some(sample_interval(*rate, rng));
            }
        }
    }

    fn advance(&mut self, dt: f64) {
        self.remaining
            .iter_mut()
            .flatten()
            .for_each(|time| *time -= dt);
    }

    /// first state (in state order) whose interval has run out
    fn first_expired(&self) -> Option<usize> {
        self.remaining
            .iter()
            .position(|timer| matches!(timer, Some(time) if *time <= 0.0))
    }

    fn reset(&mut self) {
        self.remaining.iter_mut().for_each(|timer| *timer = None);
    }
}

fn sample_interval<R: Rng + ?Sized>(rate: f64, rng: &mut R) -> f64 {
    if rate > 0.0 {
        match Exp::new(rate) {
            Ok(distribution) => distribution.sample(rng),
            Err(_) => f64::INFINITY,
        }
    } else {
        f64::INFINITY
    }
}

/// index of the largest population
fn most_populated(occupations: ArrayView1<f64>) -> usize {
    occupations
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (state, pop)| {
            if *pop > best.1 {
                (state, *pop)
            } else {
                best
            }
        })
        .0
}

/// Inverse coherence times 1/tau_i = sum_{j != i} |c_j|^2 rate_ij
pub fn decoherence_inverse_times(coefficients: ArrayView1<c64>, rates: ArrayView2<f64>) -> Array1<f64> {
    let occupations: Array1<f64> = populations(coefficients);
    Array1::from_shape_fn(occupations.len(), |i| {
        occupations
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(j, pop)| pop * rates[[i, j]])
            .sum()
    })
}

/// One DISH step for all trajectories, in trajectory order. Returns the hop
/// outcomes, whose momentum changes are applied afterwards, and the number of
/// decoherence events.
pub fn dish<R: Rng + ?Sized>(
    config: &ResolvedConfiguration,
    surfaces: &[SurfaceData],
    projectors: &[Array2<c64>],
    momenta: ArrayView2<f64>,
    inverse_masses: ArrayView1<f64>,
    coefficients: &mut Array2<c64>,
    states: &[usize],
    timers: &mut [CoherenceTimers],
    rates: &[Array2<f64>],
    dt: f64,
    rng: &mut R,
) -> (Vec<HopOutcome>, usize) {
    let mut outcomes: Vec<HopOutcome> = Vec::with_capacity(states.len());
    let mut events: usize = 0;

    for (traj, active) in states.iter().enumerate() {
        let active: usize = *active;
        let inverse_times: Array1<f64> =
            decoherence_inverse_times(coefficients.column(traj), rates[traj].view());
        timers[traj].sample_missing(inverse_times.view(), rng);
        timers[traj].advance(dt);

        let decohered: usize = match timers[traj].first_expired() {
            Some(state) => state,
            None => {
                outcomes.push(HopOutcome::Stay { state: active });
                continue;
            }
        };
        events += 1;

        let mut candidate: Array1<c64> = coefficients.column(traj).to_owned();
        let occupations: Array1<f64> = populations(candidate.view());
        let random_number: f64 = rng.sample(Standard);
        let proposed: usize = if random_number < occupations[decohered] {
            collapse(candidate.view_mut(), decohered, config.dish_collapse);
            decohered
        } else {
            project_out(candidate.view_mut(), decohered);
            if decohered == active {
                let second: f64 = rng.sample(Standard);
                let remaining: Array1<f64> = populations(candidate.view());
                // round-off may leave the cumulative sum below the draw
                let fallback: usize = most_populated(remaining.view());
                propose_hop(remaining.view(), fallback, second)
            } else {
                active
            }
        };

        let outcome: HopOutcome = accept_hop(
            config,
            &surfaces[traj],
            projectors[traj].view(),
            momenta.column(traj),
            inverse_masses,
            active,
            proposed,
        );
        // a frustrated hop leaves the amplitudes untouched
        if !matches!(outcome, HopOutcome::Frustrated { .. }) {
            coefficients.column_mut(traj).assign(&candidate);
        }
        outcomes.push(outcome);

        timers[traj].reset();
        let inverse_times: Array1<f64> =
            decoherence_inverse_times(coefficients.column(traj), rates[traj].view());
        timers[traj].sample_missing(inverse_times.view(), rng);
    }
    (outcomes, events)
}
