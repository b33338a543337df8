use crate::constants;
use crate::defaults::*;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

fn default_nstep() -> usize {
    NSTEP
}
fn default_stepsize() -> f64 {
    STEPSIZE
}
fn default_seed() -> u64 {
    SEED
}
fn default_representation() -> Representation {
    Representation::Adiabatic
}
fn default_nac_update() -> NacUpdate {
    NacUpdate::Momenta
}
fn default_hopping_method() -> HoppingMethod {
    HoppingMethod::Fssh
}
fn default_hop_acceptance() -> HopAcceptance {
    HopAcceptance::EnergyConserving
}
fn default_rescaling_direction() -> RescalingDirection {
    RescalingDirection::Nac
}
fn default_frustrated_policy() -> FrustratedHopPolicy {
    FrustratedHopPolicy::Keep
}
fn default_dish_collapse() -> CollapseOption {
    CollapseOption::KeepPhase
}
fn default_decoherence_algorithm() -> DecoherenceAlgorithm {
    DecoherenceAlgorithm::None
}
fn default_decoherence_rates() -> DecoherenceRates {
    DecoherenceRates::EnergyBased {
        c_param: DECOHERENCE_C_PARAM,
        eps_param: DECOHERENCE_EPS_PARAM,
    }
}
fn default_dephasing_correction() -> DephasingCorrection {
    DephasingCorrection::None
}
fn default_sdm_tolerance() -> f64 {
    SDM_NORM_TOLERANCE
}
fn default_c_param() -> f64 {
    DECOHERENCE_C_PARAM
}
fn default_eps_param() -> f64 {
    DECOHERENCE_EPS_PARAM
}
fn default_phase_correction() -> bool {
    false
}
fn default_state_tracking() -> StateTracking {
    StateTracking::None
}
fn default_time_overlap() -> TimeOverlapSource {
    TimeOverlapSource::BasisTransform
}
fn default_phase_correction_tol() -> f64 {
    PHASE_CORRECTION_TOL
}
fn default_degeneracy_threshold() -> f64 {
    DEGENERACY_THRESHOLD
}
fn default_entanglement() -> Entanglement {
    Entanglement::None
}
fn default_ethd3_alpha() -> f64 {
    ETHD3_ALPHA
}
fn default_ethd3_beta() -> f64 {
    ETHD3_BETA
}
fn default_thermostat() -> ThermostatKind {
    ThermostatKind::None
}
fn default_temperature() -> f64 {
    TEMPERATURE
}
fn default_time_coupling() -> f64 {
    TIME_COUPLING
}
fn default_chain_length() -> usize {
    NHC_LENGTH
}
fn default_print_observables() -> bool {
    PRINT_OBSERVABLES
}
fn default_print_populations() -> bool {
    PRINT_POPULATIONS
}
fn default_hopping_config() -> HoppingConfiguration {
    let hopping_config: HoppingConfiguration = toml::from_str("").unwrap();
    hopping_config
}
fn default_decoherence_config() -> DecoherenceConfiguration {
    let config: DecoherenceConfiguration = toml::from_str("").unwrap();
    config
}
fn default_tracking_config() -> TrackingConfiguration {
    let config: TrackingConfiguration = toml::from_str("").unwrap();
    config
}
fn default_nuclear_config() -> NuclearConfiguration {
    let config: NuclearConfiguration = toml::from_str("").unwrap();
    config
}
fn default_thermostat_config() -> ThermostatConfiguration {
    let config: ThermostatConfiguration = toml::from_str("").unwrap();
    config
}
fn default_print_configuration() -> PrintConfiguration {
    let config: PrintConfiguration = toml::from_str("").unwrap();
    config
}

/// Basis in which the electronic amplitudes are propagated.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Representation {
    Diabatic,
    Adiabatic,
}

/// Source of the time-derivative couplings entering the vibronic Hamiltonian.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NacUpdate {
    /// taken from [SurfaceData::time_derivative_coupling](crate::SurfaceData)
    Provider,
    /// contracted from the derivative couplings and the momenta of the quantum dofs
    Momenta,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HoppingMethod {
    /// fewest switches surface hopping
    Fssh,
    /// global flux surface hopping
    Gfssh,
    /// Markov state surface hopping
    Mssh,
    /// decoherence induced surface hopping
    Dish,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HopAcceptance {
    Always,
    EnergyConserving,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RescalingDirection {
    None,
    Nac,
    ForceDifference,
    Uniform,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FrustratedHopPolicy {
    Keep,
    Reverse,
    ReverseWhenOpposed,
}

/// Variants of the instantaneous decoherence.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdVariant {
    /// collapse only after an accepted hop
    SuccessfulHops,
    /// collapse after every proposed hop, onto the new or the old state
    AttemptedHops,
    /// collapse onto the active state in every step
    EveryStep,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CollapseOption {
    /// the surviving amplitude keeps its phase
    KeepPhase,
    /// the surviving amplitude is set to one
    Reset,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecoherenceAlgorithm {
    None,
    Sdm {
        #[serde(default = "default_sdm_tolerance")]
        tolerance: f64,
    },
    Instantaneous {
        variant: IdVariant,
        collapse: CollapseOption,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecoherenceRates {
    Fixed {
        rates: Vec<Vec<f64>>,
    },
    EnergyBased {
        #[serde(default = "default_c_param")]
        c_param: f64,
        #[serde(default = "default_eps_param")]
        eps_param: f64,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DephasingCorrection {
    None,
    Fixed { gaps: Vec<Vec<f64>> },
    Ensemble,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StateTracking {
    None,
    Pairwise,
    Assignment,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeOverlapSource {
    /// computed from the basis transforms of two consecutive steps
    BasisTransform,
    /// supplied directly by the surface provider
    Provider,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entanglement {
    None,
    /// ETHD with Gaussian widths taken from the ensemble variance
    Ethd,
    /// ETHD3 with a fixed position width
    Ethd3 {
        #[serde(default = "default_ethd3_alpha")]
        alpha: f64,
    },
    /// ETHD3 including the momentum-space friction term
    Ethd3Friction {
        #[serde(default = "default_ethd3_alpha")]
        alpha: f64,
        #[serde(default = "default_ethd3_beta")]
        beta: f64,
    },
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThermostatKind {
    None,
    Berendsen {
        #[serde(default = "default_temperature")]
        temperature: f64,
        #[serde(default = "default_time_coupling")]
        time_coupling: f64,
    },
    NoseHooverChain {
        #[serde(default = "default_temperature")]
        temperature: f64,
        #[serde(default = "default_time_coupling")]
        time_coupling: f64,
        #[serde(default = "default_chain_length")]
        chain_length: usize,
    },
}

/// Struct that loads the configuration of the dynamics.
/// It holds the structs [HoppingConfiguration], [DecoherenceConfiguration],
/// [TrackingConfiguration], [NuclearConfiguration], [ThermostatConfiguration] and
/// [PrintConfiguration]. Before the dynamics starts it is turned into a
/// [ResolvedConfiguration] by [DynamicConfiguration::resolve].
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DynamicConfiguration {
    #[serde(default = "default_nstep")]
    pub nstep: usize,
    #[serde(default = "default_stepsize")]
    pub stepsize: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_representation")]
    pub representation: Representation,
    #[serde(default = "default_nac_update")]
    pub nac_update: NacUpdate,
    #[serde(default = "default_hopping_config")]
    pub hopping_config: HoppingConfiguration,
    #[serde(default = "default_decoherence_config")]
    pub decoherence_config: DecoherenceConfiguration,
    #[serde(default = "default_tracking_config")]
    pub tracking_config: TrackingConfiguration,
    #[serde(default = "default_nuclear_config")]
    pub nuclear_config: NuclearConfiguration,
    #[serde(default = "default_thermostat_config")]
    pub thermostat_config: ThermostatConfiguration,
    #[serde(default = "default_print_configuration")]
    pub print_config: PrintConfiguration,
}

/// Structs that holds the parameters for the surface hopping routines
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HoppingConfiguration {
    #[serde(default = "default_hopping_method")]
    pub method: HoppingMethod,
    #[serde(default = "default_hop_acceptance")]
    pub acceptance: HopAcceptance,
    #[serde(default = "default_rescaling_direction")]
    pub rescaling: RescalingDirection,
    #[serde(default = "default_frustrated_policy")]
    pub frustrated: FrustratedHopPolicy,
    /// collapse of the amplitudes onto a decohered state, used by DISH
    #[serde(default = "default_dish_collapse")]
    pub collapse: CollapseOption,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DecoherenceConfiguration {
    #[serde(default = "default_decoherence_algorithm")]
    pub algorithm: DecoherenceAlgorithm,
    #[serde(default = "default_decoherence_rates")]
    pub rates: DecoherenceRates,
    #[serde(default = "default_dephasing_correction")]
    pub dephasing: DephasingCorrection,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TrackingConfiguration {
    #[serde(default = "default_phase_correction")]
    pub phase_correction: bool,
    #[serde(default = "default_state_tracking")]
    pub algorithm: StateTracking,
    #[serde(default = "default_time_overlap")]
    pub time_overlap: TimeOverlapSource,
    #[serde(default = "default_phase_correction_tol")]
    pub phase_correction_tol: f64,
    #[serde(default = "default_degeneracy_threshold")]
    pub degeneracy_threshold: f64,
}

impl TrackingConfiguration {
    /// Projectors are only updated if one of the two passes is switched on.
    pub fn is_enabled(&self) -> bool {
        self.phase_correction || self.algorithm != StateTracking::None
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NuclearConfiguration {
    /// momenta of these dofs are kept at zero
    #[serde(default)]
    pub constrained_dofs: Vec<usize>,
    /// dofs that enter the couplings and the momentum rescaling, empty means all
    #[serde(default)]
    pub quantum_dofs: Vec<usize>,
    #[serde(default = "default_entanglement")]
    pub entanglement: Entanglement,
}

/// Struct that holds the parameters for the Thermostat
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ThermostatConfiguration {
    #[serde(default = "default_thermostat")]
    pub thermostat: ThermostatKind,
    #[serde(default)]
    pub thermostat_dofs: Vec<usize>,
    /// number of degrees of freedom the thermostat acts on
    #[serde(default)]
    pub degrees_of_freedom: usize,
}

/// Struct that controls the output of the simulation
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PrintConfiguration {
    #[serde(default = "default_print_observables")]
    pub print_observables: bool,
    #[serde(default = "default_print_populations")]
    pub print_populations: bool,
}

/// Sizes of the ensemble the configuration is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemDimensions {
    pub ndof: usize,
    pub ntraj: usize,
    pub nstates: usize,
}

/// An invalid or unsupported configuration. The run is not started.
#[derive(Debug, Clone)]
pub struct ConfigurationError {
    pub parameter: String,
    pub value: String,
    pub message: String,
}

impl ConfigurationError {
    pub fn new(parameter: &str, value: impl fmt::Debug, message: &str) -> Self {
        Self {
            parameter: String::from(parameter),
            value: format!("{:?}", value),
            message: String::from(message),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(
            f,
            "Invalid configuration: {} = {}. {}",
            self.parameter, self.value, self.message
        )
    }
}

impl std::error::Error for ConfigurationError {}

/// Decoherence rates after validation.
#[derive(Debug, Clone, PartialEq)]
pub enum RateModel {
    Fixed(Array2<f64>),
    EnergyBased { c_param: f64, eps_param: f64 },
}

/// Average gaps of the dephasing-informed correction after validation.
#[derive(Debug, Clone, PartialEq)]
pub enum AverageGaps {
    None,
    Fixed(Array2<f64>),
    Ensemble,
}

/// Thermostat settings in atomic units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThermostatSettings {
    None,
    Berendsen {
        temperature: f64,
        time_coupling: f64,
        degrees_of_freedom: usize,
    },
    NoseHooverChain {
        temperature: f64,
        time_coupling: f64,
        chain_length: usize,
        degrees_of_freedom: usize,
    },
}

/// The validated configuration. Constructed once before the first step, all
/// algorithm choices are fixed afterwards.
#[derive(Debug, Clone)]
pub struct ResolvedConfiguration {
    pub nstep: usize,
    /// stepsize in atomic units
    pub stepsize: f64,
    pub seed: u64,
    pub representation: Representation,
    pub nac_update: NacUpdate,
    pub hopping: HoppingMethod,
    pub acceptance: HopAcceptance,
    pub rescaling: RescalingDirection,
    pub frustrated: FrustratedHopPolicy,
    pub dish_collapse: CollapseOption,
    pub decoherence: DecoherenceAlgorithm,
    pub rates: RateModel,
    pub average_gaps: AverageGaps,
    pub tracking: TrackingConfiguration,
    pub constrained_dofs: Vec<usize>,
    pub quantum_dofs: Vec<usize>,
    pub entanglement: Entanglement,
    pub thermostat: ThermostatSettings,
    pub thermostat_dofs: Vec<usize>,
    pub print_config: PrintConfiguration,
}

impl ResolvedConfiguration {
    /// The decoherence rates are needed by SDM and by DISH only.
    pub fn needs_rates(&self) -> bool {
        self.hopping == HoppingMethod::Dish
            || matches!(self.decoherence, DecoherenceAlgorithm::Sdm { .. })
    }
}

fn square_matrix(
    parameter: &str,
    rows: &[Vec<f64>],
    nstates: usize,
) -> Result<Array2<f64>, ConfigurationError> {
    if rows.len() != nstates || rows.iter().any(|row| row.len() != nstates) {
        return Err(ConfigurationError::new(
            parameter,
            rows,
            &format!("A {} x {} matrix is required.", nstates, nstates),
        ));
    }
    let matrix: Array2<f64> = Array2::from_shape_fn((nstates, nstates), |(i, j)| rows[i][j]);
    let symmetric: bool = matrix
        .indexed_iter()
        .all(|((i, j), val)| (val - matrix[[j, i]]).abs() < 1.0e-12);
    if !symmetric || matrix.iter().any(|val| *val < 0.0) {
        return Err(ConfigurationError::new(
            parameter,
            rows,
            "The matrix has to be symmetric and non-negative.",
        ));
    }
    Ok(matrix)
}

fn check_dofs(parameter: &str, dofs: &[usize], ndof: usize) -> Result<(), ConfigurationError> {
    match dofs.iter().find(|dof| **dof >= ndof) {
        Some(dof) => Err(ConfigurationError::new(
            parameter,
            dofs,
            &format!("dof index {} is out of range, the system has {} dofs.", dof, ndof),
        )),
        None => Ok(()),
    }
}

impl DynamicConfiguration {
    /// Validate all options against each other and against the size of the ensemble.
    pub fn resolve(
        &self,
        dims: &SystemDimensions,
    ) -> Result<ResolvedConfiguration, ConfigurationError> {
        if !(self.stepsize > 0.0) {
            return Err(ConfigurationError::new(
                "stepsize",
                self.stepsize,
                "The stepsize has to be positive.",
            ));
        }
        let hopping = &self.hopping_config;
        match (hopping.acceptance, hopping.rescaling) {
            (HopAcceptance::Always, RescalingDirection::None) => {}
            (HopAcceptance::Always, direction) => {
                return Err(ConfigurationError::new(
                    "hopping_config.rescaling",
                    direction,
                    "Hops that are always accepted cannot conserve the energy, use rescaling = \"none\".",
                ))
            }
            (HopAcceptance::EnergyConserving, RescalingDirection::None) => {
                return Err(ConfigurationError::new(
                    "hopping_config.acceptance",
                    hopping.acceptance,
                    "Energy conserving hops need a rescaling direction.",
                ))
            }
            (HopAcceptance::EnergyConserving, _) => {}
        }

        let decoherence = &self.decoherence_config;
        if hopping.method == HoppingMethod::Dish
            && decoherence.algorithm != DecoherenceAlgorithm::None
        {
            return Err(ConfigurationError::new(
                "decoherence_config.algorithm",
                decoherence.algorithm,
                "DISH collapses the amplitudes itself and cannot be combined with another decoherence correction.",
            ));
        }
        if let DecoherenceAlgorithm::Sdm { tolerance } = decoherence.algorithm {
            if !(0.0..1.0).contains(&tolerance) {
                return Err(ConfigurationError::new(
                    "decoherence_config.algorithm.tolerance",
                    tolerance,
                    "The SDM tolerance has to lie in [0, 1).",
                ));
            }
        }
        let rates: RateModel = match &decoherence.rates {
            DecoherenceRates::Fixed { rates } => RateModel::Fixed(square_matrix(
                "decoherence_config.rates.rates",
                rates,
                dims.nstates,
            )?),
            DecoherenceRates::EnergyBased { c_param, eps_param } => {
                if *c_param < 0.0 || *eps_param < 0.0 {
                    return Err(ConfigurationError::new(
                        "decoherence_config.rates",
                        &decoherence.rates,
                        "The parameters of the energy based rates have to be non-negative.",
                    ));
                }
                RateModel::EnergyBased {
                    c_param: *c_param,
                    eps_param: *eps_param,
                }
            }
        };
        let average_gaps: AverageGaps = match &decoherence.dephasing {
            DephasingCorrection::None => AverageGaps::None,
            DephasingCorrection::Fixed { gaps } => AverageGaps::Fixed(square_matrix(
                "decoherence_config.dephasing.gaps",
                gaps,
                dims.nstates,
            )?),
            DephasingCorrection::Ensemble => AverageGaps::Ensemble,
        };

        let tracking = &self.tracking_config;
        if tracking.phase_correction_tol < 0.0 || tracking.degeneracy_threshold < 0.0 {
            return Err(ConfigurationError::new(
                "tracking_config",
                (tracking.phase_correction_tol, tracking.degeneracy_threshold),
                "Tolerances of the state tracking have to be non-negative.",
            ));
        }

        let nuclear = &self.nuclear_config;
        check_dofs("nuclear_config.constrained_dofs", &nuclear.constrained_dofs, dims.ndof)?;
        check_dofs("nuclear_config.quantum_dofs", &nuclear.quantum_dofs, dims.ndof)?;
        let quantum_dofs: Vec<usize> = if nuclear.quantum_dofs.is_empty() {
            (0..dims.ndof).collect()
        } else {
            let mut dofs: Vec<usize> = nuclear.quantum_dofs.clone();
            dofs.sort_unstable();
            dofs.dedup();
            dofs
        };
        let mut constrained_dofs: Vec<usize> = nuclear.constrained_dofs.clone();
        constrained_dofs.sort_unstable();
        constrained_dofs.dedup();

        match nuclear.entanglement {
            Entanglement::None => {}
            Entanglement::Ethd => {
                if dims.ntraj < 2 {
                    return Err(ConfigurationError::new(
                        "nuclear_config.entanglement",
                        nuclear.entanglement,
                        "ETHD needs an ensemble of at least two trajectories.",
                    ));
                }
            }
            Entanglement::Ethd3 { alpha } => {
                if !(alpha > 0.0) {
                    return Err(ConfigurationError::new(
                        "nuclear_config.entanglement.alpha",
                        alpha,
                        "The ETHD3 width has to be positive.",
                    ));
                }
            }
            Entanglement::Ethd3Friction { alpha, beta } => {
                if !(alpha > 0.0) || !(beta > 0.0) || dims.ntraj < 2 {
                    return Err(ConfigurationError::new(
                        "nuclear_config.entanglement",
                        nuclear.entanglement,
                        "ETHD3 friction needs positive widths and at least two trajectories.",
                    ));
                }
            }
        }

        let thermo = &self.thermostat_config;
        check_dofs(
            "thermostat_config.thermostat_dofs",
            &thermo.thermostat_dofs,
            dims.ndof,
        )?;
        match thermo.thermostat {
            ThermostatKind::None => {}
            ThermostatKind::Berendsen {
                temperature,
                time_coupling,
            }
            | ThermostatKind::NoseHooverChain {
                temperature,
                time_coupling,
                ..
            } => {
                if thermo.thermostat_dofs.is_empty() || thermo.degrees_of_freedom == 0 {
                    return Err(ConfigurationError::new(
                        "thermostat_config.thermostat_dofs",
                        &thermo.thermostat_dofs,
                        "A thermostat needs at least one thermostatted dof.",
                    ));
                }
                if !(temperature > 0.0) {
                    return Err(ConfigurationError::new(
                        "thermostat_config.thermostat.temperature",
                        temperature,
                        "The target temperature of the thermostat has to be positive.",
                    ));
                }
                if !(time_coupling > 0.0) {
                    return Err(ConfigurationError::new(
                        "thermostat_config.thermostat.time_coupling",
                        time_coupling,
                        "The coupling time of the thermostat has to be positive.",
                    ));
                }
            }
        }
        let thermostat: ThermostatSettings = match thermo.thermostat {
            ThermostatKind::None => ThermostatSettings::None,
            ThermostatKind::Berendsen {
                temperature,
                time_coupling,
            } => ThermostatSettings::Berendsen {
                temperature,
                time_coupling: time_coupling * constants::FS_TO_AU,
                degrees_of_freedom: thermo.degrees_of_freedom,
            },
            ThermostatKind::NoseHooverChain {
                temperature,
                time_coupling,
                chain_length,
            } => {
                if chain_length == 0 {
                    return Err(ConfigurationError::new(
                        "thermostat_config.thermostat.chain_length",
                        chain_length,
                        "The Nose-Hoover chain needs at least one thermostat.",
                    ));
                }
                ThermostatSettings::NoseHooverChain {
                    temperature,
                    time_coupling: time_coupling * constants::FS_TO_AU,
                    chain_length,
                    degrees_of_freedom: thermo.degrees_of_freedom,
                }
            }
        };
        if thermostat != ThermostatSettings::None
            && thermo.degrees_of_freedom != thermo.thermostat_dofs.len()
        {
            return Err(ConfigurationError::new(
                "thermostat_config.degrees_of_freedom",
                (thermo.degrees_of_freedom, thermo.thermostat_dofs.len()),
                "The number of thermostat degrees of freedom must be equal to the number of thermostat_dofs.",
            ));
        }

        Ok(ResolvedConfiguration {
            nstep: self.nstep,
            stepsize: self.stepsize * constants::FS_TO_AU,
            seed: self.seed,
            representation: self.representation,
            nac_update: self.nac_update,
            hopping: hopping.method,
            acceptance: hopping.acceptance,
            rescaling: hopping.rescaling,
            frustrated: hopping.frustrated,
            dish_collapse: hopping.collapse,
            decoherence: decoherence.algorithm,
            rates,
            average_gaps,
            tracking: tracking.clone(),
            constrained_dofs,
            quantum_dofs,
            entanglement: nuclear.entanglement,
            thermostat,
            thermostat_dofs: thermo.thermostat_dofs.clone(),
            print_config: self.print_config.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> SystemDimensions {
        SystemDimensions {
            ndof: 2,
            ntraj: 4,
            nstates: 2,
        }
    }

    fn config_from(input: &str) -> DynamicConfiguration {
        toml::from_str(input).unwrap()
    }

    #[test]
    fn empty_input_gives_valid_defaults() {
        let config: DynamicConfiguration = config_from("");
        let resolved: ResolvedConfiguration = config.resolve(&dims()).unwrap();
        assert_eq!(resolved.hopping, HoppingMethod::Fssh);
        assert_eq!(resolved.quantum_dofs, vec![0, 1]);
        assert!((resolved.stepsize - STEPSIZE * constants::FS_TO_AU).abs() < 1.0e-12);
    }

    #[test]
    fn tagged_variants_are_parsed() {
        let config: DynamicConfiguration = config_from(
            r#"
            representation = "diabatic"
            [hopping_config]
            method = "gfssh"
            rescaling = "force_difference"
            frustrated = "reverse_when_opposed"
            [decoherence_config]
            algorithm = { type = "instantaneous", variant = "attempted_hops", collapse = "reset" }
            rates = { type = "fixed", rates = [[0.0, 0.1], [0.1, 0.0]] }
            dephasing = { type = "ensemble" }
            "#,
        );
        let resolved: ResolvedConfiguration = config.resolve(&dims()).unwrap();
        assert_eq!(resolved.representation, Representation::Diabatic);
        assert_eq!(resolved.rescaling, RescalingDirection::ForceDifference);
        assert_eq!(
            resolved.decoherence,
            DecoherenceAlgorithm::Instantaneous {
                variant: IdVariant::AttemptedHops,
                collapse: CollapseOption::Reset
            }
        );
        assert_eq!(resolved.rates, RateModel::Fixed(array![[0.0, 0.1], [0.1, 0.0]]));
        assert_eq!(resolved.average_gaps, AverageGaps::Ensemble);
    }

    #[test]
    fn unknown_algorithm_is_rejected_by_the_parser() {
        let result: Result<DynamicConfiguration, _> =
            toml::from_str("[hopping_config]\nmethod = \"afssh\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn dish_with_sdm_is_rejected() {
        let config: DynamicConfiguration = config_from(
            r#"
            [hopping_config]
            method = "dish"
            [decoherence_config]
            algorithm = { type = "sdm" }
            "#,
        );
        let err: ConfigurationError = config.resolve(&dims()).unwrap_err();
        assert_eq!(err.parameter, "decoherence_config.algorithm");
    }

    #[test]
    fn acceptance_and_rescaling_must_match() {
        let config: DynamicConfiguration =
            config_from("[hopping_config]\nacceptance = \"always\"\nrescaling = \"nac\"\n");
        assert!(config.resolve(&dims()).is_err());
        let config: DynamicConfiguration = config_from("[hopping_config]\nrescaling = \"none\"\n");
        assert!(config.resolve(&dims()).is_err());
        let config: DynamicConfiguration =
            config_from("[hopping_config]\nacceptance = \"always\"\nrescaling = \"none\"\n");
        assert!(config.resolve(&dims()).is_ok());
    }

    #[test]
    fn thermostat_dof_mismatch_is_reported() {
        let config: DynamicConfiguration = config_from(
            r#"
            [thermostat_config]
            thermostat = { type = "nose_hoover_chain" }
            thermostat_dofs = [0, 1]
            degrees_of_freedom = 3
            "#,
        );
        let err: ConfigurationError = config.resolve(&dims()).unwrap_err();
        assert_eq!(err.parameter, "thermostat_config.degrees_of_freedom");
        assert!(err.to_string().contains("(3, 2)"));
    }

    #[test]
    fn thermostat_parameters_have_to_be_positive() {
        let cases: [(&str, &str); 4] = [
            (
                "thermostat = { type = \"nose_hoover_chain\", temperature = 0.0 }\nthermostat_dofs = [0]\ndegrees_of_freedom = 1\n",
                "thermostat_config.thermostat.temperature",
            ),
            (
                "thermostat = { type = \"nose_hoover_chain\", time_coupling = 0.0 }\nthermostat_dofs = [0]\ndegrees_of_freedom = 1\n",
                "thermostat_config.thermostat.time_coupling",
            ),
            (
                "thermostat = { type = \"berendsen\", time_coupling = -5.0 }\nthermostat_dofs = [0]\ndegrees_of_freedom = 1\n",
                "thermostat_config.thermostat.time_coupling",
            ),
            (
                "thermostat = { type = \"nose_hoover_chain\" }\n",
                "thermostat_config.thermostat_dofs",
            ),
        ];
        for (section, parameter) in cases.iter() {
            let config: DynamicConfiguration =
                config_from(&format!("[thermostat_config]\n{}", section));
            let err: ConfigurationError = config.resolve(&dims()).unwrap_err();
            assert_eq!(err.parameter, *parameter);
        }
        let config: DynamicConfiguration = config_from(
            "[thermostat_config]\nthermostat = { type = \"berendsen\" }\nthermostat_dofs = [0]\ndegrees_of_freedom = 1\n",
        );
        assert!(config.resolve(&dims()).is_ok());
    }

    #[test]
    fn wrong_rate_matrix_and_dof_indices_are_rejected() {
        let config: DynamicConfiguration = config_from(
            "[decoherence_config]\nrates = { type = \"fixed\", rates = [[0.0, 0.1, 0.2]] }\n",
        );
        assert!(config.resolve(&dims()).is_err());
        let config: DynamicConfiguration =
            config_from("[nuclear_config]\nconstrained_dofs = [5]\n");
        assert!(config.resolve(&dims()).is_err());
    }

    #[test]
    fn ethd_needs_an_ensemble() {
        let config: DynamicConfiguration =
            config_from("[nuclear_config]\nentanglement = { type = \"ethd\" }\n");
        let single = SystemDimensions {
            ntraj: 1,
            ..dims()
        };
        assert!(config.resolve(&single).is_err());
        assert!(config.resolve(&dims()).is_ok());
    }
}
