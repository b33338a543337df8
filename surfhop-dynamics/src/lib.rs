//! Trajectory surface hopping for ensembles of classical trajectories on coupled
//! potential energy surfaces.
//!
//! The electronic structure is supplied from outside through the [SurfaceProvider]
//! trait; this crate integrates the coupled electron-nuclear equations of motion,
//! tracks the adiabatic states, performs the stochastic hops and applies the
//! decoherence corrections.
pub mod constants;
pub mod defaults;
pub mod dynamics;
pub mod initialization;
pub mod interface;
pub mod output;

pub use dynamics::{DynamicsError, StepReport};
pub use initialization::{
    ConfigurationError, DynamicConfiguration, ResolvedConfiguration, Simulation, SystemData,
};
pub use interface::{SurfaceData, SurfaceError, SurfaceProvider, SurfaceRequest};

/// Complex amplitudes are double precision throughout.
#[allow(non_camel_case_types)]
pub type c64 = num_complex::Complex64;
