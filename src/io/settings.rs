use crate::defaults::*;
use serde::{Deserialize, Serialize};
use surfhop_dynamics::initialization::DynamicConfiguration;

fn default_model() -> ModelKind {
    ModelKind::SimpleAvoidedCrossing {
        a: SAC_A,
        b: SAC_B,
        c: SAC_C,
        d: SAC_D,
    }
}
fn default_ntraj() -> usize {
    NTRAJ
}
fn default_coordinates() -> Vec<f64> {
    vec![INITIAL_COORDINATE]
}
fn default_momenta() -> Vec<f64> {
    vec![INITIAL_MOMENTUM]
}
fn default_masses() -> Vec<f64> {
    vec![MASS]
}
fn default_width() -> Vec<f64> {
    vec![WAVEPACKET_WIDTH]
}
fn default_initial_state() -> usize {
    INITIAL_STATE
}
fn default_verbose() -> i8 {
    VERBOSE
}
fn default_number_of_cores() -> usize {
    NUMBER_OF_CORES
}
fn default_sac_a() -> f64 {
    SAC_A
}
fn default_sac_b() -> f64 {
    SAC_B
}
fn default_sac_c() -> f64 {
    SAC_C
}
fn default_sac_d() -> f64 {
    SAC_D
}
fn default_dac_a() -> f64 {
    DAC_A
}
fn default_dac_b() -> f64 {
    DAC_B
}
fn default_dac_c() -> f64 {
    DAC_C
}
fn default_dac_d() -> f64 {
    DAC_D
}
fn default_dac_e0() -> f64 {
    DAC_E0
}
fn default_ecr_a() -> f64 {
    ECR_A
}
fn default_ecr_b() -> f64 {
    ECR_B
}
fn default_ecr_c() -> f64 {
    ECR_C
}
fn default_gap() -> f64 {
    CONSTANT_GAP
}
// The analytic models deliver their adiabatic states with arbitrary signs, so the
// tracking with phase correction is switched on in the driver.
fn default_dynamics() -> DynamicConfiguration {
    let config: DynamicConfiguration = toml::from_str(
        "[tracking_config]\nalgorithm = \"assignment\"\nphase_correction = true\n",
    )
    .unwrap();
    config
}

/// Analytic model surfaces in one nuclear dimension. Further dofs of the input
/// move freely.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelKind {
    SimpleAvoidedCrossing {
        #[serde(default = "default_sac_a")]
        a: f64,
        #[serde(default = "default_sac_b")]
        b: f64,
        #[serde(default = "default_sac_c")]
        c: f64,
        #[serde(default = "default_sac_d")]
        d: f64,
    },
    DualAvoidedCrossing {
        #[serde(default = "default_dac_a")]
        a: f64,
        #[serde(default = "default_dac_b")]
        b: f64,
        #[serde(default = "default_dac_c")]
        c: f64,
        #[serde(default = "default_dac_d")]
        d: f64,
        #[serde(default = "default_dac_e0")]
        e0: f64,
    },
    ExtendedCouplingReflection {
        #[serde(default = "default_ecr_a")]
        a: f64,
        #[serde(default = "default_ecr_b")]
        b: f64,
        #[serde(default = "default_ecr_c")]
        c: f64,
    },
    ConstantGap {
        #[serde(default = "default_gap")]
        gap: f64,
    },
}

/// Input of the driver. The initial conditions of the ensemble are given for one
/// trajectory and are sampled from a Gaussian wavepacket of the given widths.
/// If a temperature is set, the momenta are drawn from the Boltzmann distribution
/// instead.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Input {
    #[serde(default = "default_verbose")]
    pub verbose: i8,
    #[serde(default = "default_number_of_cores")]
    pub number_of_cores: usize,
    #[serde(default = "default_ntraj")]
    pub ntraj: usize,
    #[serde(default = "default_initial_state")]
    pub initial_state: usize,
    #[serde(default = "default_coordinates")]
    pub coordinates: Vec<f64>,
    #[serde(default = "default_momenta")]
    pub momenta: Vec<f64>,
    #[serde(default = "default_masses")]
    pub masses: Vec<f64>,
    #[serde(default = "default_width")]
    pub width: Vec<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default = "default_model")]
    pub model: ModelKind,
    #[serde(default = "default_dynamics")]
    pub dynamics: DynamicConfiguration,
}
