use crate::c64;
use crate::dynamics::dish::CoherenceTimers;
use crate::dynamics::thermostat::{build_thermostat, Thermostat};
use crate::dynamics::tracking::{OverlapTracker, ProjectorUpdate};
use crate::initialization::system::SystemData;
use crate::initialization::{ConfigurationError, ResolvedConfiguration, SystemDimensions};
use crate::interface::SurfaceData;
use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Struct that holds the [ResolvedConfiguration] and the complete state of the
/// ensemble, which is required for the surface hopping dynamics
pub struct Simulation {
    pub config: ResolvedConfiguration,
    pub stepsize: f64,
    pub actual_time: f64,
    pub step: usize,
    pub dims: SystemDimensions,
    /// [ndof, ntraj]
    pub coordinates: Array2<f64>,
    /// [ndof, ntraj]
    pub momenta: Array2<f64>,
    pub inverse_masses: Array1<f64>,
    /// amplitudes in the propagation representation, [nstates, ntraj]
    pub coefficients: Array2<c64>,
    /// active state of every trajectory in the dynamically consistent basis
    pub states: Vec<usize>,
    pub projectors: Vec<Array2<c64>>,
    /// electronic structure at the current geometry, empty before the first evaluation
    pub surfaces: Vec<SurfaceData>,
    pub coherence_timers: Vec<CoherenceTimers>,
    pub thermostats: Vec<Box<dyn Thermostat>>,
    pub tracker: Box<dyn ProjectorUpdate>,
    pub rng: StdRng,
    pub(crate) initialized: bool,
}

impl Simulation {
    /// Initialize the struct [Simulation] from the [SystemData].
    /// The configuration is validated against the size of the ensemble and all
    /// per trajectory state is created. The amplitudes start in the initial
    /// adiabatic states.
    pub fn new(system: &SystemData) -> Result<Simulation, ConfigurationError> {
        let dims: SystemDimensions = system.dimensions();
        let config: ResolvedConfiguration = system.config.resolve(&dims)?;

        if system.momenta.dim() != system.coordinates.dim() {
            return Err(ConfigurationError::new(
                "momenta",
                system.momenta.dim(),
                &format!(
                    "The momenta need the shape of the coordinates {:?}.",
                    system.coordinates.dim()
                ),
            ));
        }
        if system.masses.len() != dims.ndof || system.masses.iter().any(|m| !(*m > 0.0)) {
            return Err(ConfigurationError::new(
                "masses",
                &system.masses,
                &format!("{} positive masses are required.", dims.ndof),
            ));
        }
        if system.initial_states.len() != dims.ntraj
            || system.initial_states.iter().any(|s| *s >= dims.nstates)
        {
            return Err(ConfigurationError::new(
                "initial_state",
                &system.initial_states,
                &format!(
                    "One initial state in [0, {}) per trajectory is required.",
                    dims.nstates
                ),
            ));
        }

        let mut coefficients: Array2<c64> = Array2::zeros((dims.nstates, dims.ntraj));
        for (traj, state) in system.initial_states.iter().enumerate() {
            coefficients[[*state, traj]] = c64::new(1.0, 0.0);
        }
        let thermostats: Vec<Box<dyn Thermostat>> = (0..dims.ntraj)
            .map(|_| build_thermostat(&config.thermostat))
            .collect();
        let tracker: Box<dyn ProjectorUpdate> = Box::new(OverlapTracker::from(&config.tracking));

        Ok(Simulation {
            stepsize: config.stepsize,
            actual_time: 0.0,
            step: 0,
            dims,
            coordinates: system.coordinates.clone(),
            momenta: system.momenta.clone(),
            inverse_masses: system.masses.mapv(|m| 1.0 / m),
            coefficients,
            states: system.initial_states.clone(),
            projectors: vec![Array2::eye(dims.nstates); dims.ntraj],
            surfaces: Vec::new(),
            coherence_timers: vec![CoherenceTimers::new(dims.nstates); dims.ntraj],
            thermostats,
            tracker,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            initialized: false,
        })
    }

    /// Replace the projector update strategy.
    pub fn with_tracker(mut self, tracker: Box<dyn ProjectorUpdate>) -> Self {
        self.tracker = tracker;
        self
    }
}
