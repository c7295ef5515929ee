//! Error types for configuration, stepping, and replay persistence.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use crate::config::ConfigError;

/// Errors surfaced by the simulation engine.
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid or inconsistent construction parameters.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `step` was called after the episode reached a terminal state.
    #[error("episode finished after {steps} steps, call reset() before stepping again")]
    EpisodeFinished { steps: usize },

    /// The flat action vector does not match the total port count.
    #[error("action vector has {got} entries, expected {expected} (one per port)")]
    ActionLengthMismatch { expected: usize, got: usize },

    /// An action entry is not a finite number.
    #[error("action at index {index} is not finite: {value}")]
    InvalidAction { index: usize, value: f64 },

    /// An EV was routed to a station without a free port.
    #[error(transparent)]
    Capacity(#[from] CapacityError),

    /// Grid power-flow stepping was requested but is not implemented.
    #[error("grid simulation is not implemented")]
    GridSimulationUnimplemented,

    /// The replay artifact could not be read or written.
    #[error(transparent)]
    Replay(#[from] ReplayError),

    /// Step telemetry could not be written.
    #[error("cannot write telemetry \"{path}\": {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Spawning into a station whose ports are all occupied.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("charging station {station} has no free port ({n_ports} ports occupied)")]
pub struct CapacityError {
    pub station: usize,
    pub n_ports: usize,
}

/// Replay persistence failures.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("cannot access replay \"{path}\": {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed replay \"{path}\": {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("inconsistent replay: {0}")]
    Invalid(String),
}
