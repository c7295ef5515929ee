/// Simulation clock for timestep and date management.
pub mod clock;
pub mod engine;
pub mod observation;
/// Per-station price series.
pub mod prices;
pub mod reward;
/// EV arrival sources.
pub mod spawn;
pub mod summary;
/// Transformer model for per-group power aggregation.
pub mod transformer;
pub mod types;
