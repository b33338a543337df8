use crate::c64;
use crate::dynamics::decoherence::{
    decoherence_rates, dephasing_informed_correction, instantaneous_decoherence, sdm,
};
use crate::dynamics::dish::dish;
use crate::dynamics::hopping_routines::{
    accept_hops, handle_hops_nuclear, hop_proposal_probabilities, propose_hops, HopOutcome,
};
use crate::dynamics::nuclear::*;
use crate::dynamics::schroedinger_integration::{
    propagate_coefficients, propagation_hamiltonians, vibronic_hamiltonians,
};
use crate::dynamics::tracking::{time_overlap, update_projectors};
use crate::dynamics::transforms::{from_hopping_basis, to_hopping_basis};
use crate::dynamics::utils::{consistent_energies, ensemble_populations};
use crate::dynamics::{DynamicsError, StepReport};
use crate::initialization::*;
use crate::interface::{SurfaceData, SurfaceError, SurfaceProvider, SurfaceRequest};
use crate::output::*;
use itertools::izip;
use log::{info, warn};
use ndarray::prelude::*;
use std::path::Path;
use std::time::Instant;

impl Simulation {
    /// Surface hopping dynamics of the whole ensemble. The observables of every
    /// step are written to the current directory.
    pub fn run(&mut self, provider: &mut dyn SurfaceProvider) -> Result<(), DynamicsError> {
        let timer: Instant = Instant::now();
        print_header_dynamics(self.config.nstep, self.dims.ntraj, self.dims.nstates);
        self.initialize(provider)?;

        let mut writer: DataWriter = DataWriter::new(&self.config.print_config, Path::new("."))?;
        writer.record(&self.observables(&StepReport::default())?)?;

        for _step in 0..self.config.nstep {
            let step_timer: Instant = Instant::now();
            print_header_dynamics_step(self.step + 1);
            let report: StepReport = self.step(provider)?;
            let observables: StepObservables = self.observables(&report)?;
            print_step_summary(
                observables.time,
                observables.total_energy,
                &observables.amplitude_populations,
                report.accepted_hops,
                report.frustrated_hops,
            );
            writer.record(&observables)?;
            print_footer_dynamics_step(step_timer.elapsed().as_secs_f64());
        }
        writer.finish().map_err(DynamicsError::Output)?;
        print_footer_dynamics(timer.elapsed().as_secs_f64());
        Ok(())
    }

    /// First evaluation of the surfaces. The amplitudes are brought into the
    /// propagation representation and the constraints are applied to the momenta.
    pub fn initialize(&mut self, provider: &mut dyn SurfaceProvider) -> Result<(), DynamicsError> {
        if self.initialized {
            return Ok(());
        }
        apply_constraints(&mut self.momenta, &self.config.constrained_dofs);
        self.update_surfaces(provider)?;
        self.coefficients = from_hopping_basis(
            self.config.representation,
            self.coefficients.view(),
            &self.surfaces,
            &self.projectors,
        );
        self.initialized = true;
        Ok(())
    }

    pub fn surface_request(&self) -> SurfaceRequest {
        let tracking: &TrackingConfiguration = &self.config.tracking;
        SurfaceRequest {
            diabatic: self.config.representation == Representation::Diabatic,
            time_overlap: tracking.is_enabled()
                && tracking.time_overlap == TimeOverlapSource::Provider,
            time_derivative_coupling: self.config.nac_update == NacUpdate::Provider,
        }
    }

    /// Evaluate the provider at the current coordinates and check the shapes of
    /// the returned data.
    pub fn update_surfaces(&mut self, provider: &mut dyn SurfaceProvider) -> Result<(), SurfaceError> {
        let request: SurfaceRequest = self.surface_request();
        let surfaces: Vec<SurfaceData> = provider.compute_data(self.coordinates.view(), &request)?;
        if surfaces.len() != self.dims.ntraj {
            return Err(SurfaceError::new(
                &format!(
                    "{} surfaces were returned for {} trajectories",
                    surfaces.len(),
                    self.dims.ntraj
                ),
                None,
            ));
        }
        let (ndof, nstates) = (self.dims.ndof, self.dims.nstates);
        for (traj, surface) in surfaces.iter().enumerate() {
            let consistent: bool = surface.energies.len() == nstates
                && surface.gradients.dim() == (nstates, ndof)
                && surface.derivative_couplings.dim() == (ndof, nstates, nstates)
                && surface.basis_transform.ncols() == nstates
                && (!request.diabatic
                    || surface
                        .diabatic_hamiltonian
                        .as_ref()
                        .map_or(false, |h| h.dim() == (nstates, nstates)));
            if !consistent {
                return Err(SurfaceError::new(
                    "the shapes of the surface data do not match the ensemble",
                    Some(traj),
                ));
            }
        }
        self.surfaces = surfaces;
        Ok(())
    }

    /// c <- exp(-i H dt) c with the current surfaces, projectors and momenta
    fn propagate_electronic(&mut self, dt: f64) -> Result<(), SurfaceError> {
        let hamiltonians: Vec<Array2<c64>> = propagation_hamiltonians(
            self.config.representation,
            self.config.nac_update,
            &self.surfaces,
            &self.projectors,
            self.momenta.view(),
            self.inverse_masses.view(),
            &self.config.quantum_dofs,
        )?;
        propagate_coefficients(&mut self.coefficients, &hamiltonians, dt);
        Ok(())
    }

    /// Forces of the active surfaces plus the quantum forces of entangled trajectories
    pub fn total_forces(&self) -> Array2<f64> {
        let mut forces: Array2<f64> =
            active_state_forces(&self.surfaces, &self.projectors, &self.states);
        if let Some(quantum) = entanglement_forces(
            self.coordinates.view(),
            self.inverse_masses.view(),
            self.config.entanglement,
        ) {
            forces += &quantum;
        }
        forces
    }

    fn half_kick(&mut self, dt: f64) {
        let forces: Array2<f64> = self.total_forces();
        momentum_kick(&mut self.momenta, forces.view(), 0.5 * dt);
        apply_constraints(&mut self.momenta, &self.config.constrained_dofs);
    }

    fn scale_thermostatted_momenta(&mut self, dt: f64) {
        scale_thermostat_dofs(
            &mut self.momenta,
            &self.thermostats,
            &self.config.thermostat_dofs,
            dt,
        );
    }

    fn propagate_thermostats(&mut self, dt: f64) {
        for (thermostat, momentum) in izip!(
            self.thermostats.iter_mut(),
            self.momenta.axis_iter(Axis(1))
        ) {
            let kinetic_energy: f64 = kinetic_energy_of_dofs(
                momentum,
                self.inverse_masses.view(),
                &self.config.thermostat_dofs,
            );
            thermostat.propagate(dt, kinetic_energy);
        }
    }

    fn time_overlaps(
        &self,
        previous_basis: Option<Vec<Array2<c64>>>,
    ) -> Result<Vec<Array2<c64>>, SurfaceError> {
        match previous_basis {
            Some(previous) => Ok(previous
                .iter()
                .zip(self.surfaces.iter())
                .map(|(prev, surface)| time_overlap(prev.view(), surface.basis_transform.view()))
                .collect()),
            None => self
                .surfaces
                .iter()
                .enumerate()
                .map(|(traj, surface)| {
                    surface.time_overlap.clone().ok_or_else(|| {
                        SurfaceError::new(
                            "the time overlap was requested but not supplied",
                            Some(traj),
                        )
                    })
                })
                .collect(),
        }
    }

    /// Energies of the dynamically consistent states of all trajectories
    pub fn consistent_energies(&self) -> Vec<Array1<f64>> {
        self.surfaces
            .iter()
            .zip(self.projectors.iter())
            .map(|(surface, projector)| consistent_energies(surface, projector.view()))
            .collect()
    }

    /// Kinetic energy of the quantum dofs of every trajectory
    fn quantum_kinetic_energies(&self) -> Array1<f64> {
        self.momenta
            .axis_iter(Axis(1))
            .map(|p| kinetic_energy_of_dofs(p, self.inverse_masses.view(), &self.config.quantum_dofs))
            .collect()
    }

    /// One step of the surface hopping dynamics for the whole ensemble.
    pub fn step(&mut self, provider: &mut dyn SurfaceProvider) -> Result<StepReport, DynamicsError> {
        self.initialize(provider)?;
        let dt: f64 = self.stepsize;

        let populations_before: Array2<f64> = ensemble_populations(
            to_hopping_basis(
                self.config.representation,
                self.coefficients.view(),
                &self.surfaces,
                &self.projectors,
            )
            .view(),
        );
        let tracking_enabled: bool = self.config.tracking.is_enabled();
        let previous_basis: Option<Vec<Array2<c64>>> = if tracking_enabled
            && self.config.tracking.time_overlap == TimeOverlapSource::BasisTransform
        {
            Some(self.surfaces.iter().map(|s| s.basis_transform.clone()).collect())
        } else {
            None
        };

        // first half of the electronic and nuclear propagation
        self.propagate_electronic(0.5 * dt)?;
        self.scale_thermostatted_momenta(0.5 * dt);
        self.half_kick(dt);
        let friction: Option<Array2<f64>> = match self.config.entanglement {
            Entanglement::Ethd3Friction { alpha, beta } => {
                Some(ethd3_friction(self.momenta.view(), alpha, beta))
            }
            _ => None,
        };
        position_drift(
            &mut self.coordinates,
            self.momenta.view(),
            self.inverse_masses.view(),
            friction.as_ref().map(|f| f.view()),
            dt,
        );

        // new electronic structure
        self.update_surfaces(provider)?;
        if tracking_enabled {
            let overlaps: Vec<Array2<c64>> = self.time_overlaps(previous_basis)?;
            let energies: Vec<Array1<f64>> =
                self.surfaces.iter().map(|s| s.energies.clone()).collect();
            update_projectors(self.tracker.as_ref(), &mut self.projectors, &overlaps, &energies);
        }

        // second half
        self.propagate_thermostats(dt);
        self.half_kick(dt);
        self.scale_thermostatted_momenta(0.5 * dt);
        self.propagate_electronic(0.5 * dt)?;

        let mut coefficients: Array2<c64> = to_hopping_basis(
            self.config.representation,
            self.coefficients.view(),
            &self.surfaces,
            &self.projectors,
        );

        let rates: Vec<Array2<f64>> = if self.config.needs_rates() {
            let energies: Vec<Array1<f64>> = self.consistent_energies();
            let mut rates: Vec<Array2<f64>> = decoherence_rates(
                &self.config.rates,
                &energies,
                self.quantum_kinetic_energies().view(),
            );
            dephasing_informed_correction(&mut rates, &energies, &self.config.average_gaps);
            rates
        } else {
            Vec::new()
        };
        if let DecoherenceAlgorithm::Sdm { tolerance } = self.config.decoherence {
            for (traj, column) in coefficients.axis_iter_mut(Axis(1)).enumerate() {
                sdm(column, dt, self.states[traj], rates[traj].view(), tolerance);
            }
        }

        let mut report = StepReport {
            step: self.step + 1,
            ..StepReport::default()
        };
        let outcomes: Vec<HopOutcome> = match self.config.hopping {
            HoppingMethod::Dish => {
                let (outcomes, events) = dish(
                    &self.config,
                    &self.surfaces,
                    &self.projectors,
                    self.momenta.view(),
                    self.inverse_masses.view(),
                    &mut coefficients,
                    &self.states,
                    &mut self.coherence_timers,
                    &rates,
                    dt,
                    &mut self.rng,
                );
                report.decoherence_events = events;
                handle_hops_nuclear(&mut self.momenta, &outcomes, self.config.frustrated);
                outcomes
            }
            method => {
                let hamiltonians: Vec<Array2<c64>> = if method == HoppingMethod::Fssh {
                    vibronic_hamiltonians(
                        self.config.nac_update,
                        &self.surfaces,
                        &self.projectors,
                        self.momenta.view(),
                        self.inverse_masses.view(),
                        &self.config.quantum_dofs,
                    )?
                } else {
                    Vec::new()
                };
                let probabilities: Vec<Array1<f64>> = hop_proposal_probabilities(
                    method,
                    coefficients.view(),
                    &hamiltonians,
                    populations_before.view(),
                    &self.states,
                    dt,
                );
                let proposed: Vec<usize> = propose_hops(&probabilities, &self.states, &mut self.rng);
                let outcomes: Vec<HopOutcome> = accept_hops(
                    &self.config,
                    &self.surfaces,
                    &self.projectors,
                    self.momenta.view(),
                    self.inverse_masses.view(),
                    &proposed,
                    &self.states,
                );
                handle_hops_nuclear(&mut self.momenta, &outcomes, self.config.frustrated);
                if let DecoherenceAlgorithm::Instantaneous { variant, collapse } =
                    self.config.decoherence
                {
                    report.decoherence_events =
                        instantaneous_decoherence(&mut coefficients, &outcomes, variant, collapse);
                }
                outcomes
            }
        };
        apply_constraints(&mut self.momenta, &self.config.constrained_dofs);

        for (traj, outcome) in outcomes.iter().enumerate() {
            match outcome {
                HopOutcome::Stay { .. } => {}
                HopOutcome::Accepted { from, to, .. } => {
                    report.attempted_hops += 1;
                    report.accepted_hops += 1;
                    info!("trajectory {}: hop {} -> {}", traj, from, to);
                }
                HopOutcome::Frustrated { from, to, .. } => {
                    report.attempted_hops += 1;
                    report.frustrated_hops += 1;
                    warn!("trajectory {}: frustrated hop {} -> {}", traj, from, to);
                }
            }
        }
        self.states = outcomes.iter().map(|outcome| outcome.final_state()).collect();

        self.coefficients = from_hopping_basis(
            self.config.representation,
            coefficients.view(),
            &self.surfaces,
            &self.projectors,
        );
        self.actual_time += dt;
        self.step += 1;
        Ok(report)
    }

    /// Ensemble averaged observables of the current state.
    pub fn observables(&self, report: &StepReport) -> Result<StepObservables, DynamicsError> {
        if !self.initialized {
            return Err(DynamicsError::NotInitialized);
        }
        let coefficients: Array2<c64> = to_hopping_basis(
            self.config.representation,
            self.coefficients.view(),
            &self.surfaces,
            &self.projectors,
        );
        let potential: Array1<f64> = self
            .consistent_energies()
            .iter()
            .zip(self.states.iter())
            .map(|(energies, state)| energies[*state])
            .collect();
        let kinetic: Array1<f64> = kinetic_energies(self.momenta.view(), self.inverse_masses.view());
        Ok(StepObservables::new(
            self.actual_time,
            kinetic.view(),
            potential.view(),
            &self.states,
            ensemble_populations(coefficients.view()).view(),
            report,
        ))
    }

    /// Kinetic plus active potential energy of every trajectory
    pub fn total_energies(&self) -> Result<Array1<f64>, DynamicsError> {
        if !self.initialized {
            return Err(DynamicsError::NotInitialized);
        }
        let kinetic: Array1<f64> = kinetic_energies(self.momenta.view(), self.inverse_masses.view());
        let energies: Vec<Array1<f64>> = self.consistent_energies();
        Ok(Array1::from_shape_fn(self.dims.ntraj, |traj| {
            kinetic[traj] + energies[traj][self.states[traj]]
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants;
    use crate::dynamics::tracking::ProjectorUpdate;
    use crate::dynamics::utils::norm_sqr;
    use crate::initialization::DynamicConfiguration;
    use approx::assert_abs_diff_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Two adiabatic states with a constant gap and a constant derivative coupling
    /// along the first dof. With `swap` the raw order of the states is flipped in
    /// every second call. With `provider_data` the time overlaps and the
    /// time-derivative couplings for a velocity of `provider_velocity` are returned
    /// on request.
    struct TwoLevelModel {
        gap: f64,
        coupling: f64,
        swap: bool,
        provider_data: bool,
        provider_velocity: f64,
        calls: usize,
    }

    impl TwoLevelModel {
        fn new(gap: f64, coupling: f64) -> Self {
            TwoLevelModel {
                gap,
                coupling,
                swap: false,
                provider_data: false,
                provider_velocity: 0.0,
                calls: 0,
            }
        }
    }

    impl SurfaceProvider for TwoLevelModel {
        fn compute_data(
            &mut self,
            coordinates: ArrayView2<f64>,
            request: &SurfaceRequest,
        ) -> Result<Vec<SurfaceData>, SurfaceError> {
            let swapped: bool = self.swap && self.calls % 2 == 1;
            self.calls += 1;
            let ndof: usize = coordinates.nrows();
            let one = c64::new(1.0, 0.0);
            let zero = c64::new(0.0, 0.0);
            let (energies, basis_transform, coupling) = if swapped {
                (
                    array![self.gap, 0.0],
                    array![[zero, one], [one, zero]],
                    -self.coupling,
                )
            } else {
                (array![0.0, self.gap], Array2::eye(2), self.coupling)
            };
            let mut derivative_couplings: Array3<f64> = Array3::zeros((ndof, 2, 2));
            derivative_couplings[[0, 0, 1]] = coupling;
            derivative_couplings[[0, 1, 0]] = -coupling;
            let diabatic: Array2<c64> = array![[zero, zero], [zero, c64::new(self.gap, 0.0)]];
            Ok((0..coordinates.ncols())
                .map(|_| SurfaceData {
                    energies: energies.clone(),
                    gradients: Array2::zeros((2, ndof)),
                    derivative_couplings: derivative_couplings.clone(),
                    basis_transform: basis_transform.clone(),
                    diabatic_hamiltonian: if request.diabatic {
                        Some(diabatic.clone())
                    } else {
                        None
                    },
                    time_overlap: if self.provider_data && request.time_overlap {
                        Some(Array2::eye(2))
                    } else {
                        None
                    },
                    time_derivative_coupling: if self.provider_data
                        && request.time_derivative_coupling
                    {
                        Some(
                            derivative_couplings.index_axis(Axis(0), 0).to_owned()
                                * self.provider_velocity,
                        )
                    } else {
                        None
                    },
                })
                .collect())
        }
    }

    /// Returns one trajectory too few.
    struct BrokenModel;

    impl SurfaceProvider for BrokenModel {
        fn compute_data(
            &mut self,
            coordinates: ArrayView2<f64>,
            _request: &SurfaceRequest,
        ) -> Result<Vec<SurfaceData>, SurfaceError> {
            let mut model = TwoLevelModel::new(0.01, 0.0);
            let mut surfaces = model.compute_data(coordinates, &SurfaceRequest::default())?;
            surfaces.pop();
            Ok(surfaces)
        }
    }

    fn simulation(input: &str, ndof: usize, ntraj: usize, momentum: f64, state: usize) -> Simulation {
        let config: DynamicConfiguration = toml::from_str(input).unwrap();
        let coordinates: Array2<f64> = Array2::zeros((ndof, ntraj));
        let momenta: Array2<f64> = Array2::from_elem((ndof, ntraj), momentum);
        let masses: Array1<f64> = Array1::from_elem(ndof, 2000.0);
        let system = SystemData::new(config, coordinates, momenta, masses, 2, state);
        Simulation::new(&system).unwrap()
    }

    fn assert_normalized(simulation: &Simulation) {
        for column in simulation.coefficients.axis_iter(Axis(1)) {
            assert_abs_diff_eq!(norm_sqr(column), 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn uncoupled_states_keep_their_populations() {
        let mut sim: Simulation = simulation("nstep = 1000", 1, 3, 20.0, 0);
        let mut model = TwoLevelModel::new(0.01, 0.0);
        sim.initialize(&mut model).unwrap();
        let energies: Array1<f64> = sim.total_energies().unwrap();
        for _ in 0..1000 {
            let report: StepReport = sim.step(&mut model).unwrap();
            assert_eq!(report.attempted_hops, 0);
        }
        assert_eq!(sim.step, 1000);
        assert_eq!(sim.states, vec![0, 0, 0]);
        for column in sim.coefficients.axis_iter(Axis(1)) {
            assert_abs_diff_eq!(column[0].norm_sqr(), 1.0, epsilon = 1e-10);
        }
        assert_abs_diff_eq!(sim.total_energies().unwrap(), energies, epsilon = 1e-12);
        // free flight
        assert_abs_diff_eq!(
            sim.coordinates[[0, 0]],
            20.0 / 2000.0 * 1000.0 * sim.stepsize,
            epsilon = 1e-8
        );
    }

    #[test]
    fn coupled_dynamics_conserve_norm_and_energy() {
        let mut sim: Simulation =
            simulation("[hopping_config]\nmethod = \"mssh\"\n", 1, 8, 20.0, 0);
        let mut model = TwoLevelModel::new(0.01, 5.0);
        sim.initialize(&mut model).unwrap();
        let energies: Array1<f64> = sim.total_energies().unwrap();
        let mut accepted: usize = 0;
        for _ in 0..200 {
            let report: StepReport = sim.step(&mut model).unwrap();
            accepted += report.accepted_hops;
            assert_normalized(&sim);
            assert_abs_diff_eq!(sim.total_energies().unwrap(), energies, epsilon = 1e-9);
        }
        assert!(accepted > 0);
    }

    #[test]
    fn hops_without_enough_energy_are_frustrated() {
        let mut sim: Simulation =
            simulation("[hopping_config]\nmethod = \"mssh\"\n", 1, 4, 0.5, 0);
        let mut model = TwoLevelModel::new(0.01, 200.0);
        let mut frustrated: usize = 0;
        for _ in 0..100 {
            let report: StepReport = sim.step(&mut model).unwrap();
            assert_eq!(report.accepted_hops, 0);
            frustrated += report.frustrated_hops;
        }
        assert!(frustrated > 0);
        assert_eq!(sim.states, vec![0; 4]);
        assert_abs_diff_eq!(sim.momenta, Array2::from_elem((1, 4), 0.5), epsilon = 1e-14);
    }

    #[test]
    fn equal_seeds_give_equal_trajectories() {
        let input: &str = "seed = 42\n[hopping_config]\nmethod = \"fssh\"\n";
        let mut first: Simulation = simulation(input, 1, 5, 20.0, 1);
        let mut second: Simulation = simulation(input, 1, 5, 20.0, 1);
        let mut first_model = TwoLevelModel::new(0.01, 5.0);
        let mut second_model = TwoLevelModel::new(0.01, 5.0);
        for _ in 0..100 {
            let a: StepReport = first.step(&mut first_model).unwrap();
            let b: StepReport = second.step(&mut second_model).unwrap();
            assert_eq!(a, b);
        }
        assert_eq!(first.states, second.states);
        assert_eq!(first.coefficients, second.coefficients);
        assert_eq!(first.momenta, second.momenta);
    }

    #[test]
    fn constrained_momenta_stay_zero() {
        let input: &str = r#"
            [hopping_config]
            method = "mssh"
            [nuclear_config]
            constrained_dofs = [1]
        "#;
        let mut sim: Simulation = simulation(input, 2, 4, 20.0, 0);
        let mut model = TwoLevelModel::new(0.01, 5.0);
        for _ in 0..50 {
            sim.step(&mut model).unwrap();
            assert!(sim.momenta.row(1).iter().all(|p| *p == 0.0));
            assert!(sim.coordinates.row(1).iter().all(|q| *q == 0.0));
        }
    }

    #[test]
    fn reordered_states_are_followed() {
        let input: &str = r#"
            [tracking_config]
            algorithm = "assignment"
            phase_correction = true
        "#;
        let mut sim: Simulation = simulation(input, 1, 2, 20.0, 0);
        let mut model = TwoLevelModel::new(0.01, 0.0);
        model.swap = true;
        sim.initialize(&mut model).unwrap();
        let energies: Array1<f64> = sim.total_energies().unwrap();
        for _ in 0..20 {
            sim.step(&mut model).unwrap();
            assert_abs_diff_eq!(sim.total_energies().unwrap(), energies, epsilon = 1e-12);
            assert_eq!(sim.states, vec![0, 0]);
            for column in sim.coefficients.axis_iter(Axis(1)) {
                assert_abs_diff_eq!(column[0].norm_sqr(), 1.0, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn sdm_damps_the_inactive_amplitudes() {
        let input: &str = r#"
            [decoherence_config]
            algorithm = { type = "sdm" }
            rates = { type = "fixed", rates = [[0.0, 0.01], [0.01, 0.0]] }
        "#;
        let mut sim: Simulation = simulation(input, 1, 2, 20.0, 0);
        let amplitude: c64 = c64::new(0.5f64.sqrt(), 0.0);
        sim.coefficients.fill(amplitude);
        let mut model = TwoLevelModel::new(0.01, 0.0);
        for _ in 0..100 {
            sim.step(&mut model).unwrap();
            assert_normalized(&sim);
        }
        let decay: f64 = (-2.0 * 0.01 * 100.0 * sim.stepsize).exp();
        for column in sim.coefficients.axis_iter(Axis(1)) {
            assert_abs_diff_eq!(column[1].norm_sqr(), 0.5 * decay, epsilon = 1e-8);
        }
    }

    #[test]
    fn dish_keeps_the_ensemble_consistent() {
        let input: &str = r#"
            seed = 3
            [hopping_config]
            method = "dish"
            [decoherence_config]
            rates = { type = "fixed", rates = [[0.0, 0.05], [0.05, 0.0]] }
        "#;
        let mut sim: Simulation = simulation(input, 1, 6, 20.0, 0);
        let mut model = TwoLevelModel::new(0.01, 5.0);
        sim.initialize(&mut model).unwrap();
        let energies: Array1<f64> = sim.total_energies().unwrap();
        let mut events: usize = 0;
        for _ in 0..200 {
            let report: StepReport = sim.step(&mut model).unwrap();
            events += report.decoherence_events;
            assert_normalized(&sim);
            assert!(sim.states.iter().all(|state| *state < 2));
            assert_abs_diff_eq!(sim.total_energies().unwrap(), energies, epsilon = 1e-9);
        }
        assert!(events > 0);
    }

    #[test]
    fn diabatic_propagation_requests_the_hamiltonian() {
        let mut sim: Simulation = simulation("representation = \"diabatic\"", 1, 2, 20.0, 1);
        assert!(sim.surface_request().diabatic);
        assert!(!sim.surface_request().time_overlap);
        let mut model = TwoLevelModel::new(0.01, 0.0);
        for _ in 0..10 {
            sim.step(&mut model).unwrap();
        }
        for column in sim.coefficients.axis_iter(Axis(1)) {
            assert_abs_diff_eq!(column[1].norm_sqr(), 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn inconsistent_surfaces_end_the_run() {
        let mut sim: Simulation = simulation("", 1, 2, 20.0, 0);
        let result = sim.step(&mut BrokenModel);
        assert!(matches!(result, Err(DynamicsError::Surface(_))));
    }

    /// Keeps the projectors and counts its calls.
    struct CountingTracker {
        calls: Arc<AtomicUsize>,
    }

    impl ProjectorUpdate for CountingTracker {
        fn update(
            &self,
            projector: ArrayView2<c64>,
            _time_overlap: ArrayView2<c64>,
            _energies: ArrayView1<f64>,
        ) -> Array2<c64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            projector.to_owned()
        }
    }

    fn temperatures(sim: &Simulation) -> Vec<f64> {
        sim.momenta
            .row(0)
            .iter()
            .map(|p| p * p / 2000.0 / constants::K_BOLTZMANN)
            .collect()
    }

    #[test]
    fn two_states_one_hartree_apart_stay_uncoupled() {
        let mut sim: Simulation = simulation("nstep = 1000", 1, 1, 20.0, 0);
        let mut model = TwoLevelModel::new(1.0, 0.0);
        sim.initialize(&mut model).unwrap();
        let energies: Array1<f64> = sim.total_energies().unwrap();
        for _ in 0..1000 {
            let report: StepReport = sim.step(&mut model).unwrap();
            assert_eq!(report.attempted_hops, 0);
        }
        assert_eq!(sim.states, vec![0]);
        let observables: StepObservables = sim.observables(&StepReport::default()).unwrap();
        assert_abs_diff_eq!(observables.amplitude_populations[0], 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(observables.amplitude_populations[1], 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(sim.total_energies().unwrap(), energies, epsilon = 1e-12);
    }

    #[test]
    fn nose_hoover_chain_drives_the_ensemble_to_the_target_temperature() {
        let input: &str = r#"
            [thermostat_config]
            thermostat = { type = "nose_hoover_chain", temperature = 300.0 }
            thermostat_dofs = [0]
            degrees_of_freedom = 1
        "#;
        let mut sim: Simulation = simulation(input, 1, 2, 20.0, 0);
        // one hot and one cold trajectory
        sim.momenta[[0, 1]] = 0.5;
        let mut model = TwoLevelModel::new(0.01, 0.0);
        sim.initialize(&mut model).unwrap();
        let mut previous: Vec<f64> = temperatures(&sim);
        assert!(previous[0] > 300.0 && previous[1] < 300.0);
        for _ in 0..30 {
            sim.step(&mut model).unwrap();
            let current: Vec<f64> = temperatures(&sim);
            assert!(current.iter().all(|t| t.is_finite()));
            assert!(current[0] < previous[0] && current[0] > 300.0);
            assert!(current[1] > previous[1] && current[1] < 300.0);
            previous = current;
        }
    }

    #[test]
    fn ethd3_friction_slows_the_drift_and_keeps_the_ensemble_mean() {
        let input: &str = r#"
            [nuclear_config]
            entanglement = { type = "ethd3_friction", alpha = 1.0, beta = 1.0 }
        "#;
        let mut sim: Simulation = simulation(input, 1, 2, 0.0, 0);
        sim.momenta = array![[10.0, -10.0]];
        let mut model = TwoLevelModel::new(0.01, 0.0);
        sim.step(&mut model).unwrap();
        // the friction halves the velocity of the first drift
        let drift: f64 = 0.5 * 10.0 / 2000.0 * sim.stepsize;
        assert_abs_diff_eq!(sim.coordinates, array![[drift, -drift]], epsilon = 1e-12);
        for _ in 0..100 {
            sim.step(&mut model).unwrap();
            assert_abs_diff_eq!(sim.coordinates.sum(), 0.0, epsilon = 1e-10);
            assert_abs_diff_eq!(sim.momenta.sum(), 0.0, epsilon = 1e-10);
            assert_normalized(&sim);
        }
        // the quantum force pulls the trajectories back towards each other
        assert!(sim.momenta[[0, 0]] < 10.0);
    }

    #[test]
    fn missing_provider_overlaps_end_the_run() {
        let input: &str = r#"
            [tracking_config]
            algorithm = "assignment"
            time_overlap = "provider"
        "#;
        let mut sim: Simulation = simulation(input, 1, 2, 20.0, 0);
        assert!(sim.surface_request().time_overlap);
        let mut model = TwoLevelModel::new(0.01, 0.0);
        let result = sim.step(&mut model);
        match result {
            Err(DynamicsError::Surface(err)) => assert_eq!(err.trajectory, Some(0)),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn missing_provider_couplings_end_the_run() {
        let mut sim: Simulation = simulation("nac_update = \"provider\"", 1, 2, 20.0, 0);
        assert!(sim.surface_request().time_derivative_coupling);
        let mut model = TwoLevelModel::new(0.01, 5.0);
        let result = sim.step(&mut model);
        assert!(matches!(result, Err(DynamicsError::Surface(_))));
    }

    #[test]
    fn provider_data_replaces_the_momentum_couplings() {
        // hops do not change the momenta, so the velocity stays 20 / 2000
        let common: &str = r#"
            seed = 7
            [hopping_config]
            acceptance = "always"
            rescaling = "none"
            [tracking_config]
            algorithm = "assignment"
        "#;
        let provider_input: String = format!(
            "nac_update = \"provider\"\n{}\ntime_overlap = \"provider\"\n",
            common
        );
        let mut from_momenta: Simulation = simulation(common, 1, 4, 20.0, 0);
        let mut from_provider: Simulation = simulation(&provider_input, 1, 4, 20.0, 0);
        let mut first_model = TwoLevelModel::new(0.01, 5.0);
        let mut second_model = TwoLevelModel::new(0.01, 5.0);
        second_model.provider_data = true;
        second_model.provider_velocity = 20.0 / 2000.0;
        for _ in 0..100 {
            from_momenta.step(&mut first_model).unwrap();
            from_provider.step(&mut second_model).unwrap();
            assert_abs_diff_eq!(
                from_momenta.coefficients.mapv(|c| c.norm_sqr()),
                from_provider.coefficients.mapv(|c| c.norm_sqr()),
                epsilon = 1e-10
            );
        }
        assert_eq!(from_momenta.states, from_provider.states);
    }

    #[test]
    fn installed_tracker_is_used_for_every_trajectory() {
        let calls: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
        let mut sim: Simulation = simulation("[tracking_config]\nphase_correction = true\n", 1, 3, 20.0, 0)
            .with_tracker(Box::new(CountingTracker {
                calls: Arc::clone(&calls),
            }));
        let mut model = TwoLevelModel::new(0.01, 0.0);
        for _ in 0..5 {
            sim.step(&mut model).unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 15);
    }

    #[test]
    fn observables_need_the_initial_surfaces() {
        let mut sim: Simulation = simulation("", 1, 2, 20.0, 0);
        assert!(matches!(sim.total_energies(), Err(DynamicsError::NotInitialized)));
        assert!(matches!(
            sim.observables(&StepReport::default()),
            Err(DynamicsError::NotInitialized)
        ));
        sim.initialize(&mut TwoLevelModel::new(0.01, 0.0)).unwrap();
        assert!(sim.total_energies().is_ok());
    }
}
