//! Core simulation types: runtime configuration and per-step records.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;

use super::prices::PriceParams;
use super::spawn::SpawnParams;

/// Resolved runtime configuration of an [`EvCity`](super::engine::EvCity).
///
/// Built from a TOML scenario with
/// [`ScenarioConfig::to_sim_config`](crate::config::ScenarioConfig::to_sim_config).
/// When a replay is loaded the city layout fields are taken from the replay
/// instead.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Number of charging stations. Required for randomly generated cities.
    pub n_stations: Option<usize>,
    /// Ports per station.
    pub ports_per_station: usize,
    /// Number of transformers.
    pub n_transformers: usize,
    /// A departure scoring below this ends the episode.
    pub score_threshold: f64,
    /// Minutes per step.
    pub timescale_minutes: u32,
    /// Simulated date of step 0.
    pub start: NaiveDateTime,
    /// Episode length in steps.
    pub length: usize,
    /// Master random seed for reproducibility.
    pub seed: u64,
    /// Emit per-station detail every step.
    pub verbose: bool,
    /// Never end the episode on transformer overload.
    pub generate_rnd_game: bool,
    /// Stop spawning EVs that could not leave before the episode ends.
    pub empty_ports_at_end: bool,
    /// Step through a grid power-flow model (not implemented).
    pub simulate_grid: bool,
    /// Write a replay when the episode ends.
    pub save_replay: bool,
    /// Directory replays are written to.
    pub replay_dir: PathBuf,
    /// Per-port charging limit (kW).
    pub station_max_charge_kw: f64,
    /// Per-port discharging limit (kW).
    pub station_max_discharge_kw: f64,
    /// Rated capacity of every transformer (kW).
    pub transformer_max_power_kw: f64,
    /// Stochastic arrival process.
    pub spawn: SpawnParams,
    /// Price generation parameters.
    pub prices: PriceParams,
}

impl SimConfig {
    /// Total port count, when the station count is known.
    pub fn total_ports(&self) -> Option<usize> {
        self.n_stations.map(|n| n * self.ports_per_station)
    }

    /// Duration of one step in hours.
    pub fn dt_hours(&self) -> f64 {
        f64::from(self.timescale_minutes) / 60.0
    }
}

/// Record of one simulation step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// Step index the actions were applied at.
    pub step: usize,
    /// Simulated date after the step.
    pub date: NaiveDateTime,
    /// Signed monetary flow summed over all stations.
    pub total_costs: f64,
    /// Satisfaction of every EV that departed this step, in station order.
    pub user_satisfaction: Vec<f64>,
    /// EVs spawned for the next step.
    pub arrived: usize,
    /// EVs that left this step.
    pub departed: usize,
    /// EVs parked after this step.
    pub parked: usize,
    /// Aggregated power per transformer (kW), in transformer order.
    pub transformer_power_kw: Vec<f64>,
    /// Whether any transformer exceeded its rated capacity.
    pub overloaded: bool,
    /// Reward returned to the agent.
    pub reward: f64,
}

impl StepReport {
    /// Lowest departure satisfaction this step, if any EV left.
    pub fn min_satisfaction(&self) -> Option<f64> {
        self.user_satisfaction.iter().copied().reduce(f64::min)
    }
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let peak = self
            .transformer_power_kw
            .iter()
            .copied()
            .fold(0.0_f64, f64::max);
        write!(
            f,
            "t={:>4} ({}) | costs={:>8.3}  reward={:>8.3} | +{} -{} parked={} | \
             peak transformer={:>7.2} kW overload={}",
            self.step,
            self.date.format("%Y-%m-%d %H:%M"),
            self.total_costs,
            self.reward,
            self.arrived,
            self.departed,
            self.parked,
            peak,
            self.overloaded,
        )
    }
}

/// What [`EvCity::step`](super::engine::EvCity::step) hands back to the agent.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Flat observation after the step.
    pub observation: Vec<f64>,
    pub reward: f64,
    /// `true` once the episode is over; further steps fail until `reset`.
    pub done: bool,
    pub report: StepReport,
}
