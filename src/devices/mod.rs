//! Charging stations and the vehicles plugged into them.

/// Multi-port charging station.
pub mod charging_station;
/// Electric vehicle battery and dwell window.
pub mod ev;
pub mod types;

// Re-export the main types for convenience
pub use charging_station::{ChargingStation, StationSpec};
pub use ev::{Ev, EvSpec};
pub use types::StepContext;
