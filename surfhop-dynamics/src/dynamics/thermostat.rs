use crate::constants;
use crate::initialization::ThermostatSettings;

/// Thermostat that acts on a subset of the nuclear dofs of one trajectory.
/// The integrator calls [Thermostat::vel_scale] for every half step and
/// [Thermostat::propagate] once per step with the kinetic energy of the
/// thermostatted dofs.
pub trait Thermostat {
    /// factor for the momenta of the thermostatted dofs over the time interval dt
    fn vel_scale(&self, dt: f64) -> f64;
    /// advance the internal variables of the thermostat by dt
    fn propagate(&mut self, dt: f64, kinetic_energy: f64);
    fn get_temperature(&self, kinetic_energy: f64) -> f64;
}

/// Create the thermostat of one trajectory from the resolved settings.
pub fn build_thermostat(settings: &ThermostatSettings) -> Box<dyn Thermostat> {
    match *settings {
        ThermostatSettings::None => Box::new(NullThermostat::new()),
        ThermostatSettings::Berendsen {
            temperature,
            time_coupling,
            degrees_of_freedom,
        } => Box::new(BerendsenThermostat::new(
            time_coupling,
            temperature,
            degrees_of_freedom,
        )),
        ThermostatSettings::NoseHooverChain {
            temperature,
            time_coupling,
            chain_length,
            degrees_of_freedom,
        } => Box::new(NoseHooverChain::new(
            temperature,
            time_coupling,
            chain_length,
            degrees_of_freedom,
        )),
    }
}

fn temperature_of(kinetic_energy: f64, ndof: usize) -> f64 {
    if ndof == 0 {
        0.0
    } else {
        2.0 * kinetic_energy / (ndof as f64 * constants::K_BOLTZMANN)
    }
}

pub struct NullThermostat {
    pub scaling: f64,
}

impl NullThermostat {
    pub fn new() -> Self {
        NullThermostat { scaling: 1.0 }
    }
}

impl Default for NullThermostat {
    fn default() -> Self {
        Self::new()
    }
}

impl Thermostat for NullThermostat {
    fn vel_scale(&self, _dt: f64) -> f64 {
        self.scaling
    }
    fn propagate(&mut self, _dt: f64, _kinetic_energy: f64) {}
    fn get_temperature(&self, _kinetic_energy: f64) -> f64 {
        0.0
    }
}

/// Weak coupling to a heat bath. The scaling factor of one full step is
/// sqrt(1 + dt/tau (T0/T - 1)); it is spread over the two half steps as a rate.
pub struct BerendsenThermostat {
    pub tau: f64,
    pub ndof: usize,
    pub target_temperature: f64,
    rate: f64,
}

impl BerendsenThermostat {
    pub fn new(tau: f64, temperature: f64, ndof: usize) -> Self {
        BerendsenThermostat {
            tau,
            ndof,
            target_temperature: temperature,
            rate: 0.0,
        }
    }
}

impl Thermostat for BerendsenThermostat {
    fn vel_scale(&self, dt: f64) -> f64 {
        (self.rate * dt).exp()
    }

    fn propagate(&mut self, dt: f64, kinetic_energy: f64) {
        let current_temperature: f64 = self.get_temperature(kinetic_energy);
        if current_temperature <= 0.0 {
            self.rate = 0.0;
            return;
        }
        let scaling_factor: f64 =
            1.0 + (dt / self.tau) * (self.target_temperature / current_temperature - 1.0);
        // sqrt(scaling) per step as exp(rate * dt)
        self.rate = if scaling_factor > 0.0 {
            0.5 * scaling_factor.ln() / dt
        } else {
            0.0
        };
    }

    fn get_temperature(&self, kinetic_energy: f64) -> f64 {
        temperature_of(kinetic_energy, self.ndof)
    }
}

/// Nose-Hoover chain thermostat. The first chain element couples to the
/// kinetic energy of the thermostatted dofs, every further element to the
/// kinetic energy of its predecessor.
pub struct NoseHooverChain {
    pub target_temperature: f64,
    pub ndof: usize,
    pub q_masses: Vec<f64>,
    pub positions: Vec<f64>,
    pub velocities: Vec<f64>,
}

impl NoseHooverChain {
    pub fn new(temperature: f64, time_coupling: f64, chain_length: usize, ndof: usize) -> Self {
        let kt: f64 = constants::K_BOLTZMANN * temperature;
        let q_masses: Vec<f64> = (0..chain_length)
            .map(|k| {
                if k == 0 {
                    ndof as f64 * kt * time_coupling.powi(2)
                } else {
                    kt * time_coupling.powi(2)
                }
            })
            .collect();
        NoseHooverChain {
            target_temperature: temperature,
            ndof,
            q_masses,
            positions: vec![0.0; chain_length],
            velocities: vec![0.0; chain_length],
        }
    }

    fn chain_force(&self, k: usize, kinetic_energy: f64) -> f64 {
        let kt: f64 = constants::K_BOLTZMANN * self.target_temperature;
        if k == 0 {
            (2.0 * kinetic_energy - self.ndof as f64 * kt) / self.q_masses[0]
        } else {
            (self.q_masses[k - 1] * self.velocities[k - 1].powi(2) - kt) / self.q_masses[k]
        }
    }

    /// update of the chain velocities from the end of the chain to the first element
    fn update_velocities(&mut self, dt: f64, kinetic_energy: f64) {
        let length: usize = self.velocities.len();
        for k in (0..length).rev() {
            let force: f64 = self.chain_force(k, kinetic_energy);
            if k + 1 < length {
                let damping: f64 = (-0.25 * dt * self.velocities[k + 1]).exp();
                self.velocities[k] = damping * (damping * self.velocities[k] + force * dt);
            } else {
                self.velocities[k] += force * dt;
            }
        }
    }
}

impl Thermostat for NoseHooverChain {
    fn vel_scale(&self, dt: f64) -> f64 {
        (-self.velocities[0] * dt).exp()
    }

    fn propagate(&mut self, dt: f64, kinetic_energy: f64) {
        self.update_velocities(0.5 * dt, kinetic_energy);
        for (position, velocity) in self.positions.iter_mut().zip(self.velocities.iter()) {
            *position += velocity * dt;
        }
        self.update_velocities(0.5 * dt, kinetic_energy);
    }

    fn get_temperature(&self, kinetic_energy: f64) -> f64 {
        temperature_of(kinetic_energy, self.ndof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn hot_system_is_slowed_down_by_the_chain() {
        let mut nhc = NoseHooverChain::new(300.0, 100.0, 3, 2);
        let kt: f64 = constants::K_BOLTZMANN * 300.0;
        // twice the target kinetic energy
        nhc.propagate(10.0, 2.0 * kt);
        assert!(nhc.velocities[0] > 0.0);
        assert!(nhc.vel_scale(5.0) < 1.0);
    }

    #[test]
    fn cold_system_is_heated_by_the_chain() {
        let mut nhc = NoseHooverChain::new(300.0, 100.0, 1, 2);
        nhc.propagate(10.0, 0.0);
        assert!(nhc.vel_scale(5.0) > 1.0);
    }

    #[test]
    fn chain_at_equilibrium_does_not_scale() {
        let mut nhc = NoseHooverChain::new(300.0, 100.0, 1, 2);
        let kt: f64 = constants::K_BOLTZMANN * 300.0;
        nhc.propagate(10.0, kt);
        assert_abs_diff_eq!(nhc.vel_scale(5.0), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn berendsen_half_steps_compose_to_full_factor() {
        let mut thermostat = BerendsenThermostat::new(50.0, 300.0, 3);
        let kinetic_energy: f64 = 1.5 * constants::K_BOLTZMANN * 600.0;
        thermostat.propagate(2.0, kinetic_energy);
        let expected: f64 = (1.0_f64 + (2.0 / 50.0) * (0.5 - 1.0)).sqrt();
        let half: f64 = thermostat.vel_scale(1.0);
        assert_abs_diff_eq!(half * half, expected, epsilon = 1e-12);
    }
}
