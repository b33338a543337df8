use crate::c64;
use crate::dynamics::hopping_routines::HopOutcome;
use crate::dynamics::utils::norm_sqr;
use crate::initialization::{AverageGaps, CollapseOption, IdVariant, RateModel};
use ndarray::prelude::*;

/// Energy based decoherence rates, see eqn. (17) in JCP 126, 134114 (2007):
/// rate_ij = |E_i - E_j| / (C + eps / E_kin). No decoherence without kinetic energy.
pub fn edc_rates(energies: ArrayView1<f64>, kinetic_energy: f64, c_param: f64, eps_param: f64) -> Array2<f64> {
    let nstates: usize = energies.len();
    if kinetic_energy <= 0.0 {
        return Array2::zeros((nstates, nstates));
    }
    let denominator: f64 = c_param + eps_param / kinetic_energy;
    Array2::from_shape_fn((nstates, nstates), |(i, j)| {
        (energies[i] - energies[j]).abs() / denominator
    })
}

/// Decoherence rates of every trajectory from the energies of the dynamically
/// consistent states and the kinetic energy of the quantum dofs.
pub fn decoherence_rates(
    model: &RateModel,
    energies: &[Array1<f64>],
    kinetic_energies: ArrayView1<f64>,
) -> Vec<Array2<f64>> {
    energies
        .iter()
        .zip(kinetic_energies.iter())
        .map(|(energy, ekin)| match model {
            RateModel::Fixed(rates) => rates.clone(),
            RateModel::EnergyBased { c_param, eps_param } => {
                edc_rates(energy.view(), *ekin, *c_param, *eps_param)
            }
        })
        .collect()
}

/// <|E_i - E_j|> over the ensemble
pub fn ensemble_average_gaps(energies: &[Array1<f64>]) -> Array2<f64> {
    let nstates: usize = energies.first().map_or(0, |e| e.len());
    let mut gaps: Array2<f64> = Array2::zeros((nstates, nstates));
    for energy in energies.iter() {
        gaps += &Array2::from_shape_fn((nstates, nstates), |(i, j)| {
            (energy[i] - energy[j]).abs()
        });
    }
    if !energies.is_empty() {
        gaps /= energies.len() as f64;
    }
    gaps
}

/// Dephasing-informed correction of the rates, rate_ij *= |dE_ij| / <dE_ij>.
/// Pairs with a vanishing average gap are left unchanged.
pub fn dephasing_informed_correction(
    rates: &mut [Array2<f64>],
    energies: &[Array1<f64>],
    average_gaps: &AverageGaps,
) {
    let averages: Array2<f64> = match average_gaps {
        AverageGaps::None => return,
        AverageGaps::Fixed(gaps) => gaps.clone(),
        AverageGaps::Ensemble => ensemble_average_gaps(energies),
    };
    for (rate, energy) in rates.iter_mut().zip(energies.iter()) {
        for ((i, j), value) in rate.indexed_iter_mut() {
            let average: f64 = averages[[i, j]];
            if average > 0.0 {
                *value *= (energy[i] - energy[j]).abs() / average;
            }
        }
    }
}

/// Simplified decay of mixing: the amplitudes of the inactive states decay with
/// exp(-dt * rate_aj), the active amplitude absorbs the lost norm. Nothing is done
/// if the active population is not above the tolerance.
pub fn sdm(
    mut coefficients: ArrayViewMut1<c64>,
    dt: f64,
    active: usize,
    rates: ArrayView2<f64>,
    tolerance: f64,
) {
    let active_population: f64 = coefficients[active].norm_sqr();
    if active_population <= tolerance {
        return;
    }
    let total: f64 = norm_sqr(coefficients.view());
    let mut inactive_population: f64 = 0.0;
    for (state, c) in coefficients.iter_mut().enumerate() {
        if state != active {
            *c *= (-dt * rates[[active, state]]).exp();
            inactive_population += c.norm_sqr();
        }
    }
    let factor: f64 = ((total - inactive_population).max(0.0) / active_population).sqrt();
    coefficients[active] *= factor;
}

/// Collapse the amplitudes onto one state.
pub fn collapse(mut coefficients: ArrayViewMut1<c64>, state: usize, option: CollapseOption) {
    let amplitude: c64 = coefficients[state];
    coefficients.fill(c64::new(0.0, 0.0));
    coefficients[state] = match option {
        CollapseOption::Reset => c64::new(1.0, 0.0),
        CollapseOption::KeepPhase => {
            let magnitude: f64 = amplitude.norm();
            if magnitude > 0.0 {
                amplitude / magnitude
            } else {
                c64::new(1.0, 0.0)
            }
        }
    };
}

/// Remove one state from the superposition and renormalize the rest. Nothing is
/// changed if no other state is populated.
pub fn project_out(mut coefficients: ArrayViewMut1<c64>, state: usize) {
    let total: f64 = norm_sqr(coefficients.view());
    let rest: f64 = total - coefficients[state].norm_sqr();
    if rest <= 0.0 {
        return;
    }
    coefficients[state] = c64::new(0.0, 0.0);
    let factor: f64 = (total / rest).sqrt();
    coefficients.mapv_inplace(|c| c * factor);
}

/// Instantaneous decoherence after the hops of one step. Returns the number of
/// collapsed trajectories.
pub fn instantaneous_decoherence(
    coefficients: &mut Array2<c64>,
    outcomes: &[HopOutcome],
    variant: IdVariant,
    option: CollapseOption,
) -> usize {
    let mut events: usize = 0;
    for (mut column, outcome) in coefficients.axis_iter_mut(Axis(1)).zip(outcomes.iter()) {
        let target: Option<usize> = match (variant, outcome) {
            (IdVariant::SuccessfulHops, HopOutcome::Accepted { to, .. }) => Some(*to),
            (IdVariant::SuccessfulHops, _) => None,
            (IdVariant::AttemptedHops, HopOutcome::Accepted { to, .. }) => Some(*to),
            (IdVariant::AttemptedHops, HopOutcome::Frustrated { from, .. }) => Some(*from),
            (IdVariant::AttemptedHops, HopOutcome::Stay { .. }) => None,
            (IdVariant::EveryStep, outcome) => Some(outcome.final_state()),
        };
        if let Some(state) = target {
            collapse(column.view_mut(), state, option);
            events += 1;
        }
    }
    events
}
