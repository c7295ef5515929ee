//! TOML-based scenario configuration and preset definitions.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use thiserror::Error;

use crate::devices::ev::EvSpec;
use crate::sim::prices::PriceParams;
use crate::sim::spawn::SpawnParams;
use crate::sim::types::SimConfig;

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the reference city scenario except the
/// station count, which must be given unless a replay is loaded. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::from_preset`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Episode shape and global switches.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Per-port power limits shared by all stations.
    #[serde(default)]
    pub station: StationConfig,
    /// Vehicle limits and the stochastic arrival process.
    #[serde(default)]
    pub ev: EvConfig,
    /// Transformer ratings.
    #[serde(default)]
    pub transformer: TransformerConfig,
    /// Price generation parameters.
    #[serde(default)]
    pub prices: PricesConfig,
    /// Replay saving and loading.
    #[serde(default)]
    pub replay: ReplayConfig,
}

/// Episode shape and global switches.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of charging stations. Required unless a replay is loaded.
    pub stations: Option<usize>,
    /// Ports per charging station.
    pub ports_per_station: usize,
    /// Number of transformers stations are randomly assigned to.
    pub transformers: usize,
    /// Episode ends when a departing EV scores below this satisfaction.
    pub score_threshold: f64,
    /// Minutes per step.
    pub timescale_minutes: u32,
    /// Simulated date of step 0 (`"YYYY-MM-DD"`).
    pub start_date: NaiveDate,
    /// Simulated time of step 0 (`"HH:MM:SS"`).
    pub start_time: NaiveTime,
    /// Episode length in steps.
    pub length: usize,
    /// Master random seed.
    pub seed: u64,
    /// Emit per-station detail every step.
    pub verbose: bool,
    /// Never end the episode on transformer overload.
    pub generate_rnd_game: bool,
    /// Stop spawning EVs that could not leave before the episode ends.
    pub empty_ports_at_end: bool,
    /// Step through a grid power-flow model (not implemented).
    pub simulate_grid: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            stations: None,
            ports_per_station: 2,
            transformers: 1,
            score_threshold: 1.0,
            timescale_minutes: 5,
            start_date: NaiveDate::from_ymd_opt(2023, 7, 21).unwrap_or_default(),
            start_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            length: 1000,
            seed: 42,
            verbose: false,
            generate_rnd_game: false,
            empty_ports_at_end: true,
            simulate_grid: false,
        }
    }
}

/// Per-port power limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StationConfig {
    /// Maximum charging power per port (kW).
    pub max_charge_kw: f64,
    /// Maximum discharging power per port (kW).
    pub max_discharge_kw: f64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            max_charge_kw: 22.0,
            max_discharge_kw: 22.0,
        }
    }
}

/// Vehicle limits and the stochastic arrival process.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvConfig {
    /// Battery capacity (kWh).
    pub capacity_kwh: f64,
    /// Energy a driver expects at departure (kWh).
    pub desired_kwh: f64,
    /// Vehicle charging power limit (kW).
    pub max_charge_kw: f64,
    /// Vehicle discharging power limit (kW).
    pub max_discharge_kw: f64,
    /// Per-step arrival probability at a station with a free port.
    pub spawn_probability: f64,
    /// Arrival energy lower bound (kWh, inclusive).
    pub arrival_kwh_min: f64,
    /// Arrival energy upper bound (kWh, exclusive).
    pub arrival_kwh_max: f64,
    /// Minimum stay (steps, inclusive).
    pub min_stay_steps: usize,
    /// Maximum stay (steps, exclusive).
    pub max_stay_steps: usize,
}

impl Default for EvConfig {
    fn default() -> Self {
        let spec = EvSpec::default();
        let spawn = SpawnParams::default();
        Self {
            capacity_kwh: spec.capacity_kwh,
            desired_kwh: spec.desired_kwh,
            max_charge_kw: spec.max_charge_kw,
            max_discharge_kw: spec.max_discharge_kw,
            spawn_probability: spawn.probability,
            arrival_kwh_min: spawn.arrival_kwh_min,
            arrival_kwh_max: spawn.arrival_kwh_max,
            min_stay_steps: spawn.min_stay_steps,
            max_stay_steps: spawn.max_stay_steps,
        }
    }
}

/// Transformer ratings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformerConfig {
    /// Rated capacity of every transformer (kW).
    pub max_power_kw: f64,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            max_power_kw: 100.0,
        }
    }
}

/// Normal distribution parameters for generated prices.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PricesConfig {
    pub charge_mean: f64,
    pub charge_std: f64,
    pub discharge_mean: f64,
    pub discharge_std: f64,
}

impl Default for PricesConfig {
    fn default() -> Self {
        let p = PriceParams::default();
        Self {
            charge_mean: p.charge_mean,
            charge_std: p.charge_std,
            discharge_mean: p.discharge_mean,
            discharge_std: p.discharge_std,
        }
    }
}

/// Replay saving and loading.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplayConfig {
    /// Write a replay when the episode ends.
    pub save: bool,
    /// Directory replays are written to.
    pub dir: PathBuf,
    /// Rebuild the city from this replay instead of randomizing it.
    pub load_path: Option<PathBuf>,
    /// Use the replay's prices instead of drawing new ones.
    pub load_prices: bool,
    /// Spawn the replay's EVs instead of random arrivals.
    pub load_evs: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            save: true,
            dir: PathBuf::from("replay"),
            load_path: None,
            load_prices: false,
            load_evs: false,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.length"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl ScenarioConfig {
    /// Returns the reference scenario with `stations` charging stations.
    pub fn city(stations: usize) -> Self {
        let mut cfg = Self::default();
        cfg.simulation.stations = Some(stations);
        cfg
    }

    /// Returns the unconstrained preset: overloads and unhappy drivers never
    /// end the episode, so it always runs for the full length.
    pub fn unconstrained() -> Self {
        Self {
            simulation: SimulationConfig {
                stations: Some(10),
                score_threshold: 0.0,
                generate_rnd_game: true,
                ..SimulationConfig::default()
            },
            ..Self::default()
        }
    }

    /// Returns the small preset: three stations over one simulated day at
    /// 15-minute resolution.
    pub fn small() -> Self {
        Self {
            simulation: SimulationConfig {
                stations: Some(3),
                timescale_minutes: 15,
                length: 96,
                ..SimulationConfig::default()
            },
            transformer: TransformerConfig { max_power_kw: 60.0 },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["default", "unconstrained", "small"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "default" => Ok(Self::city(10)),
            "unconstrained" => Ok(Self::unconstrained()),
            "small" => Ok(Self::small()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Returns `true` when EVs come from random spawning rather than a replay profile.
    pub fn spawns_randomly(&self) -> bool {
        !(self.replay.load_path.is_some() && self.replay.load_evs)
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: &str| {
            if !ok {
                errors.push(ConfigError::new(field, message));
            }
        };

        let s = &self.simulation;
        match s.stations {
            Some(n) => check(n > 0, "simulation.stations", "must be > 0"),
            None => check(
                self.replay.load_path.is_some(),
                "simulation.stations",
                "required unless replay.load_path is set",
            ),
        }
        check(s.ports_per_station > 0, "simulation.ports_per_station", "must be > 0");
        check(s.transformers > 0, "simulation.transformers", "must be > 0");
        check(s.timescale_minutes > 0, "simulation.timescale_minutes", "must be > 0");
        check(s.length > 0, "simulation.length", "must be > 0");
        check(s.score_threshold.is_finite(), "simulation.score_threshold", "must be finite");

        let st = &self.station;
        check(st.max_charge_kw >= 0.0, "station.max_charge_kw", "must be >= 0");
        check(st.max_discharge_kw >= 0.0, "station.max_discharge_kw", "must be >= 0");

        let ev = &self.ev;
        check(
            ev.capacity_kwh > 0.0 && ev.capacity_kwh.is_finite(),
            "ev.capacity_kwh",
            "must be finite and > 0",
        );
        check(
            ev.desired_kwh > 0.0 && ev.desired_kwh <= ev.capacity_kwh,
            "ev.desired_kwh",
            "must be in (0, ev.capacity_kwh]",
        );
        check(ev.max_charge_kw >= 0.0, "ev.max_charge_kw", "must be >= 0");
        check(ev.max_discharge_kw >= 0.0, "ev.max_discharge_kw", "must be >= 0");
        check(
            (0.0..=1.0).contains(&ev.spawn_probability),
            "ev.spawn_probability",
            "must be in [0.0, 1.0]",
        );
        check(
            ev.arrival_kwh_min >= 0.0
                && ev.arrival_kwh_min < ev.arrival_kwh_max
                && ev.arrival_kwh_max.is_finite(),
            "ev.arrival_kwh_min",
            "must be >= 0 and < a finite ev.arrival_kwh_max",
        );
        check(
            ev.arrival_kwh_max <= ev.capacity_kwh,
            "ev.arrival_kwh_max",
            "must be <= ev.capacity_kwh",
        );
        check(
            ev.min_stay_steps < ev.max_stay_steps,
            "ev.min_stay_steps",
            "must be < ev.max_stay_steps",
        );
        if self.spawns_randomly() && s.empty_ports_at_end {
            check(
                ev.max_stay_steps <= s.length,
                "ev.max_stay_steps",
                "exceeds simulation.length; increase the length or disable \
                 simulation.empty_ports_at_end",
            );
        }

        check(
            self.transformer.max_power_kw >= 0.0,
            "transformer.max_power_kw",
            "must be >= 0",
        );

        let p = &self.prices;
        check(p.charge_std >= 0.0, "prices.charge_std", "must be >= 0");
        check(p.discharge_std >= 0.0, "prices.discharge_std", "must be >= 0");

        errors
    }

    /// Resolves this scenario into the engine's runtime configuration.
    pub fn to_sim_config(&self) -> SimConfig {
        let s = &self.simulation;
        let ev = &self.ev;
        let p = &self.prices;

        SimConfig {
            n_stations: s.stations,
            ports_per_station: s.ports_per_station,
            n_transformers: s.transformers,
            score_threshold: s.score_threshold,
            timescale_minutes: s.timescale_minutes,
            start: s.start_date.and_time(s.start_time),
            length: s.length,
            seed: s.seed,
            verbose: s.verbose,
            generate_rnd_game: s.generate_rnd_game,
            empty_ports_at_end: s.empty_ports_at_end,
            simulate_grid: s.simulate_grid,
            save_replay: self.replay.save,
            replay_dir: self.replay.dir.clone(),
            station_max_charge_kw: self.station.max_charge_kw,
            station_max_discharge_kw: self.station.max_discharge_kw,
            transformer_max_power_kw: self.transformer.max_power_kw,
            spawn: SpawnParams {
                probability: ev.spawn_probability,
                arrival_kwh_min: ev.arrival_kwh_min,
                arrival_kwh_max: ev.arrival_kwh_max,
                min_stay_steps: ev.min_stay_steps,
                max_stay_steps: ev.max_stay_steps,
                ev: EvSpec {
                    capacity_kwh: ev.capacity_kwh,
                    desired_kwh: ev.desired_kwh,
                    max_charge_kw: ev.max_charge_kw,
                    max_discharge_kw: ev.max_discharge_kw,
                },
            },
            prices: PriceParams {
                charge_mean: p.charge_mean,
                charge_std: p.charge_std,
                discharge_mean: p.discharge_mean,
                discharge_std: p.discharge_std,
            },
        }
    }
}
