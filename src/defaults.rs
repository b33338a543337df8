// INPUT
// input file of the driver, written with all defaults if it does not exist
pub const CONFIG_FILE_NAME: &str = "surfhop.toml";
// number of trajectories of the ensemble
pub const NTRAJ: usize = 100;
// initial electronic state
pub const INITIAL_STATE: usize = 0;
// verbosity of the log, 0 = info
pub const VERBOSE: i8 = 0;
// number of threads of the rayon pool, 0 lets rayon decide
pub const NUMBER_OF_CORES: usize = 0;

// INITIAL CONDITIONS (one dof, atomic units)
pub const INITIAL_COORDINATE: f64 = -10.0;
pub const INITIAL_MOMENTUM: f64 = 20.0;
pub const MASS: f64 = 2000.0;
// width of the position distribution of the wavepacket, zero disables sampling
pub const WAVEPACKET_WIDTH: f64 = 0.0;

// TULLY MODEL I: simple avoided crossing
pub const SAC_A: f64 = 0.01;
pub const SAC_B: f64 = 1.6;
pub const SAC_C: f64 = 0.005;
pub const SAC_D: f64 = 1.0;

// TULLY MODEL II: dual avoided crossing
pub const DAC_A: f64 = 0.1;
pub const DAC_B: f64 = 0.28;
pub const DAC_C: f64 = 0.015;
pub const DAC_D: f64 = 0.06;
pub const DAC_E0: f64 = 0.05;

// TULLY MODEL III: extended coupling with reflection
pub const ECR_A: f64 = 6.0e-4;
pub const ECR_B: f64 = 0.1;
pub const ECR_C: f64 = 0.9;

// two states with a constant gap in hartree
pub const CONSTANT_GAP: f64 = 0.01;
