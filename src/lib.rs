//! Volcanic ejecta dispersal
//!
//! Monte Carlo sampling of eruption conditions combined with a discrete-time
//! ballistic integrator that tracks ash, pyroclast particles and rocks from
//! the vent until they come to rest on the ground.

pub mod config;
pub mod extrema;
pub mod fragmentation;
pub mod integrator;
pub mod monte_carlo;
pub mod output;
pub mod params;
pub mod population;
pub mod sampler;
pub mod sim;
pub mod state;
pub mod wind;

use thiserror::Error;

// Re-export main types
pub use config::SimConfig;
pub use extrema::{Extrema, ExtremaTracker};
pub use fragmentation::{ConicalBurst, FragmentationRule};
pub use integrator::{step, StepConfig, StepReport};
pub use monte_carlo::{run_trials, summarize_trials, TrialRecord, TrialSummary};
pub use params::{LaunchSpeed, SpeciesParams, SpeedRange};
pub use population::{terminal_velocity, ConeAxis, Population};
pub use sampler::{EruptionParameterSample, ParameterName, ParameterSampler};
pub use sim::{RunSummary, Simulation, TickSnapshot};
pub use state::{Color, Entity, EntityId, EntityState, Species, SplitStage};
pub use wind::{WindMode, WindModel};

/// Standard gravitational acceleration used by the reference eruption [m/s^2].
pub const G: f64 = 9.81;

#[derive(Debug, Error)]
pub enum EjectaError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("distribution error: {0}")]
    Distribution(String),
    #[error("non-finite {species} state at tick {tick}")]
    NonFiniteState { species: Species, tick: u64 },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EjectaError>;

pub(crate) fn invalid(message: impl Into<String>) -> EjectaError {
    EjectaError::InvalidConfiguration(message.into())
}
