use crate::initialization::ConfigurationError;
use crate::interface::SurfaceError;
use std::fmt;

pub mod decoherence;
pub mod dish;
pub mod hopping_routines;
pub mod nuclear;
pub mod rescaling;
pub mod schroedinger_integration;
pub mod simulation;
pub mod thermostat;
pub mod tracking;
pub mod transforms;
pub mod utils;

/// Counters of one step of the ensemble.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub step: usize,
    pub attempted_hops: usize,
    pub accepted_hops: usize,
    pub frustrated_hops: usize,
    pub decoherence_events: usize,
}

#[derive(Debug)]
pub enum DynamicsError {
    Configuration(ConfigurationError),
    Surface(SurfaceError),
    Output(String),
    /// the surfaces were not evaluated yet, see [Simulation::initialize](crate::Simulation::initialize)
    NotInitialized,
}

impl fmt::Display for DynamicsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            DynamicsError::Configuration(err) => write!(f, "{}", err),
            DynamicsError::Surface(err) => write!(f, "{}", err),
            DynamicsError::Output(msg) => write!(f, "Writing the output failed: {}", msg),
            DynamicsError::NotInitialized => {
                write!(f, "The surfaces have not been evaluated at the initial geometry")
            }
        }
    }
}

impl std::error::Error for DynamicsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DynamicsError::Configuration(err) => Some(err),
            DynamicsError::Surface(err) => Some(err),
            DynamicsError::Output(_) | DynamicsError::NotInitialized => None,
        }
    }
}

impl From<ConfigurationError> for DynamicsError {
    fn from(err: ConfigurationError) -> Self {
        DynamicsError::Configuration(err)
    }
}

impl From<SurfaceError> for DynamicsError {
    fn from(err: SurfaceError) -> Self {
        DynamicsError::Surface(err)
    }
}

impl From<std::io::Error> for DynamicsError {
    fn from(err: std::io::Error) -> Self {
        DynamicsError::Output(err.to_string())
    }
}
