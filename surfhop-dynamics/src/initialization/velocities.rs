use crate::constants;
use crate::initialization::ConfigurationError;
use ndarray::prelude::*;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Struct that holds a Boltzmann distribution
pub struct BoltzmannMomenta {
    dist: Normal<f64>,
}

impl BoltzmannMomenta {
    /// Initialize the distribution from a given temperature. The samples are
    /// scaled by sqrt(M) for every dof.
    pub fn new(temperature: f64) -> Result<BoltzmannMomenta, ConfigurationError> {
        let dist = Normal::new(0.0, f64::sqrt(constants::K_BOLTZMANN * temperature)).map_err(
            |_| ConfigurationError::new("temperature", temperature, "Invalid temperature for the Boltzmann distribution."),
        )?;
        Ok(BoltzmannMomenta { dist })
    }
}

/// Initialize the momenta of all trajectories, [ndof, ntraj], by sampling the
/// Boltzmann distribution
pub fn initialize_momenta<R: Rng + ?Sized>(
    masses: ArrayView1<f64>,
    ntraj: usize,
    temperature: f64,
    rng: &mut R,
) -> Result<Array2<f64>, ConfigurationError> {
    let boltzmann: BoltzmannMomenta = BoltzmannMomenta::new(temperature)?;
    let mut momenta: Array2<f64> = Array2::zeros((masses.len(), ntraj));
    for traj in 0..ntraj {
        for (dof, mass) in masses.iter().enumerate() {
            momenta[[dof, traj]] = mass.sqrt() * boltzmann.dist.sample(rng);
        }
    }
    Ok(momenta)
}

/// Sample coordinates and momenta from the Wigner distribution of a minimum
/// uncertainty Gaussian wavepacket with position widths `widths`. Dofs with zero
/// width are not sampled.
pub fn sample_wavepacket<R: Rng + ?Sized>(
    coordinates: ArrayView1<f64>,
    momenta: ArrayView1<f64>,
    widths: ArrayView1<f64>,
    ntraj: usize,
    rng: &mut R,
) -> Result<(Array2<f64>, Array2<f64>), ConfigurationError> {
    let ndof: usize = coordinates.len();
    if momenta.len() != ndof || widths.len() != ndof {
        return Err(ConfigurationError::new(
            "width",
            (coordinates.len(), momenta.len(), widths.len()),
            "Coordinates, momenta and widths need the same number of dofs.",
        ));
    }
    let mut distributions: Vec<Option<(Normal<f64>, Normal<f64>)>> = Vec::with_capacity(ndof);
    for dof in 0..ndof {
        let width: f64 = widths[dof];
        if width < 0.0 || !width.is_finite() {
            return Err(ConfigurationError::new(
                "width",
                width,
                "Widths of the wavepacket have to be non-negative.",
            ));
        }
        if width == 0.0 {
            distributions.push(None);
            continue;
        }
        let q_dist = Normal::new(coordinates[dof], width);
        let p_dist = Normal::new(momenta[dof], 0.5 / width);
        match (q_dist, p_dist) {
            (Ok(q), Ok(p)) => distributions.push(Some((q, p))),
            _ => {
                return Err(ConfigurationError::new(
                    "width",
                    width,
                    "The wavepacket cannot be sampled with this width.",
                ))
            }
        }
    }

    let mut q: Array2<f64> = Array2::zeros((ndof, ntraj));
    let mut p: Array2<f64> = Array2::zeros((ndof, ntraj));
    for traj in 0..ntraj {
        for (dof, dist) in distributions.iter().enumerate() {
            match dist {
                Some((q_dist, p_dist)) => {
                    q[[dof, traj]] = q_dist.sample(rng);
                    p[[dof, traj]] = p_dist.sample(rng);
                }
                None => {
                    q[[dof, traj]] = coordinates[dof];
                    p[[dof, traj]] = momenta[dof];
                }
            }
        }
    }
    Ok((q, p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn zero_width_gives_the_center() {
        let mut rng = StdRng::seed_from_u64(7);
        let (q, p) = sample_wavepacket(
            array![-5.0].view(),
            array![20.0].view(),
            array![0.0].view(),
            3,
            &mut rng,
        )
        .unwrap();
        assert_eq!(q, array![[-5.0, -5.0, -5.0]]);
        assert_eq!(p, array![[20.0, 20.0, 20.0]]);
    }

    #[test]
    fn sampling_is_reproducible() {
        let sample = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            sample_wavepacket(
                array![-5.0, 0.0].view(),
                array![20.0, 0.0].view(),
                array![1.0, 0.5].view(),
                10,
                &mut rng,
            )
            .unwrap()
        };
        assert_eq!(sample(3), sample(3));
        assert_ne!(sample(3).0, sample(4).0);
    }

    #[test]
    fn negative_width_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let result = sample_wavepacket(
            array![0.0].view(),
            array![0.0].view(),
            array![-1.0].view(),
            1,
            &mut rng,
        );
        assert!(result.is_err());
    }

    #[test]
    fn boltzmann_momenta_have_the_ensemble_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let p: Array2<f64> = initialize_momenta(array![1.0, 2000.0].view(), 5, 300.0, &mut rng).unwrap();
        assert_eq!(p.dim(), (2, 5));
        assert!(p.iter().all(|val| val.is_finite()));
    }
}
