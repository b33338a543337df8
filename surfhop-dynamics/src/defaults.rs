// number of nuclear steps
pub const NSTEP: usize = 1000;
// nuclear stepsize in fs
pub const STEPSIZE: f64 = 0.1;
// seed of the random number stream that drives all hopping decisions
pub const SEED: u64 = 0;

// SURFACE HOPPING
// Probabilities are clipped to this value before the cumulative comparison
pub const MAX_HOPPING_PROBABILITY: f64 = 1.0;

// DECOHERENCE
// If set, the decoherence correction according to
// eqn. (17) in JCP 126, 134114 (2007) is used for the rates.
// use the recommended value for C in eqn. (17) of JCP 126, 134114 (2007)
pub const DECOHERENCE_C_PARAM: f64 = 1.0;
// constant in hartree
pub const DECOHERENCE_EPS_PARAM: f64 = 0.1;
// the SDM correction is skipped below this population of the active state
pub const SDM_NORM_TOLERANCE: f64 = 0.0;

// STATE TRACKING
// overlaps smaller than this value do not define a phase
pub const PHASE_CORRECTION_TOL: f64 = 1.0e-3;
// adiabatic energies closer than this value (hartree) are treated as degenerate
pub const DEGENERACY_THRESHOLD: f64 = 1.0e-8;
// smallest eigenvalue of X X^H for which the Loewdin factor of a cluster is trusted
pub const LOEWDIN_THRESHOLD: f64 = 1.0e-8;

// THERMOSTAT
// target temperature (K)
pub const TEMPERATURE: f64 = 300.0;
// time coupling of the thermostat (fs)
pub const TIME_COUPLING: f64 = 50.0;
// length of the Nose-Hoover chain
pub const NHC_LENGTH: usize = 3;

// ENTANGLED TRAJECTORIES
pub const ETHD3_ALPHA: f64 = 1.0;
pub const ETHD3_BETA: f64 = 1.0;

// OUTPUT
pub const PRINT_OBSERVABLES: bool = true;
pub const PRINT_POPULATIONS: bool = true;
pub const OBSERVABLES_FILE_NAME: &str = "observables.json";
pub const POPULATIONS_FILE_NAME: &str = "populations.npy";
