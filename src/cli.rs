use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use rand::Rng;

/// Runs one episode of the EV charging city simulation.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Load the scenario from a TOML file.
    #[clap(long, conflicts_with = "preset")]
    pub scenario: Option<PathBuf>,

    /// Use a built-in preset (default, unconstrained, small).
    #[clap(long)]
    pub preset: Option<String>,

    /// Override the random seed.
    #[clap(long)]
    pub seed: Option<u64>,

    /// Rebuild the city from a replay file.
    #[clap(long)]
    pub replay: Option<PathBuf>,

    /// Reuse the replay's prices.
    #[clap(long, requires = "replay")]
    pub load_prices: bool,

    /// Spawn the replay's EVs instead of random arrivals.
    #[clap(long, requires = "replay")]
    pub load_evs: bool,

    /// Do not write a replay when the episode ends.
    #[clap(long)]
    pub no_save_replay: bool,

    /// Action applied to every port each step.
    #[clap(long, value_enum, default_value_t = Policy::Charge)]
    pub policy: Policy,

    /// Export per-step reports to CSV.
    #[clap(long)]
    pub telemetry_out: Option<PathBuf>,
}

/// Fixed port policies for exercising the simulation from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Policy {
    /// Leave every EV alone.
    Idle,
    /// Charge at full power.
    Charge,
    /// Discharge at full power.
    Discharge,
    /// Uniform random action in `[-1, 1]` per port.
    Random,
}

impl Policy {
    /// Actions for `n_ports` ports.
    pub fn actions<R: Rng>(self, n_ports: usize, rng: &mut R) -> Vec<f64> {
        match self {
            Self::Idle => vec![0.0; n_ports],
            Self::Charge => vec![1.0; n_ports],
            Self::Discharge => vec![-1.0; n_ports],
            Self::Random => (0..n_ports).map(|_| rng.random_range(-1.0..=1.0)).collect(),
        }
    }
}
