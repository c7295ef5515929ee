//! City-scale EV charging simulation for reinforcement-learning research.

pub mod config;
pub mod devices;
pub mod error;
/// Replay persistence and telemetry export.
pub mod io;
/// Simulation engine, transformers, spawning and pricing.
pub mod sim;
