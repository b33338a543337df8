use crate::c64;
use crate::dynamics::utils::{consistent_coupling, consistent_gradients};
use crate::initialization::{FrustratedHopPolicy, RescalingDirection};
use crate::interface::SurfaceData;
use ndarray::prelude::*;

/// Outcome of the energy balance of a proposed hop.
#[derive(Debug, Clone, PartialEq)]
pub enum Rescaling {
    /// hops are accepted without touching the momenta
    NotRequired,
    /// p <- p + gamma * d conserves the total energy
    Feasible { direction: Array1<f64>, gamma: f64 },
    /// the kinetic energy along d is not sufficient; `reversal` is b/a of the
    /// energy balance and `opposed` tells if the force of the target state points
    /// against the momentum along d
    Frustrated {
        direction: Array1<f64>,
        reversal: f64,
        opposed: bool,
    },
}

impl Rescaling {
    pub fn is_frustrated(&self) -> bool {
        matches!(self, Rescaling::Frustrated { .. })
    }
}

/// Direction along which the momenta are adjusted after a hop from `from` to `to`.
/// Components outside of the quantum dofs and of constrained dofs are zero.
pub fn rescaling_direction(
    kind: RescalingDirection,
    surface: &SurfaceData,
    projector: ArrayView2<c64>,
    momentum: ArrayView1<f64>,
    from: usize,
    to: usize,
    quantum_dofs: &[usize],
    constrained_dofs: &[usize],
) -> Array1<f64> {
    let ndof: usize = momentum.len();
    let full: Array1<f64> = match kind {
        RescalingDirection::None => Array1::zeros(ndof),
        RescalingDirection::Nac => {
            consistent_coupling(surface, projector, from, to).mapv(|val| val.re)
        }
        RescalingDirection::ForceDifference => {
            let gradients: Array2<f64> = consistent_gradients(surface, projector);
            &gradients.row(to) - &gradients.row(from)
        }
        RescalingDirection::Uniform => momentum.to_owned(),
    };
    let mut direction: Array1<f64> = Array1::zeros(ndof);
    for dof in quantum_dofs.iter() {
        direction[*dof] = full[*dof];
    }
    for dof in constrained_dofs.iter() {
        direction[*dof] = 0.0;
    }
    direction
}

/// Solve a gamma^2 + b gamma + c = 0 with a = sum d^2/2M, b = sum p d/M and
/// c = E_new - E_old. The root of smaller magnitude is taken.
pub fn solve_rescaling(
    momentum: ArrayView1<f64>,
    inverse_masses: ArrayView1<f64>,
    direction: Array1<f64>,
    delta_energy: f64,
    target_force: ArrayView1<f64>,
) -> Rescaling {
    let a: f64 = 0.5 * (&direction * &direction * &inverse_masses).sum();
    let b: f64 = (&momentum * &direction * &inverse_masses).sum();
    let c: f64 = delta_energy;

    if a <= 0.0 {
        // no direction to exchange energy along
        return if c == 0.0 {
            Rescaling::Feasible {
                direction,
                gamma: 0.0,
            }
        } else {
            Rescaling::Frustrated {
                direction,
                reversal: 0.0,
                opposed: false,
            }
        };
    }

    let discriminant: f64 = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        let force_along: f64 = target_force.dot(&direction);
        return Rescaling::Frustrated {
            reversal: b / a,
            opposed: b * force_along < 0.0,
            direction,
        };
    }
    let gamma: f64 = if b >= 0.0 {
        (-b + discriminant.sqrt()) / (2.0 * a)
    } else {
        (-b - discriminant.sqrt()) / (2.0 * a)
    };
    Rescaling::Feasible { direction, gamma }
}

/// Apply the momentum change of an accepted or frustrated hop.
pub fn apply_rescaling(
    mut momentum: ArrayViewMut1<f64>,
    rescaling: &Rescaling,
    policy: FrustratedHopPolicy,
) {
    match rescaling {
        Rescaling::NotRequired => {}
        Rescaling::Feasible { direction, gamma } => {
            momentum.scaled_add(*gamma, direction);
        }
        Rescaling::Frustrated {
            direction,
            reversal,
            opposed,
        } => {
            let reverse: bool = match policy {
                FrustratedHopPolicy::Keep => false,
                FrustratedHopPolicy::Reverse => true,
                FrustratedHopPolicy::ReverseWhenOpposed => *opposed,
            };
            if reverse {
                momentum.scaled_add(-*reversal, direction);
            }
        }
    }
}
