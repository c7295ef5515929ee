//! City simulation engine that steps stations, spawns EVs and aggregates
//! transformer load.

use std::path::PathBuf;

use chrono::Local;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, info, warn};

use crate::config::ConfigError;
use crate::devices::charging_station::{ChargingStation, StationSpec};
use crate::devices::ev::Ev;
use crate::devices::types::StepContext;
use crate::error::{ReplayError, SimError};
use crate::io::replay::{Replay, ReplayOptions};

use super::clock::SimClock;
use super::observation::ObservationLayout;
use super::prices::PriceSeries;
use super::reward::{ProfitReward, RewardFunction};
use super::spawn::{ProfileCursor, RandomSpawner, SpawnSource};
use super::summary::EpisodeSummary;
use super::transformer::{Transformer, TransformerSpec};
use super::types::{SimConfig, StepOutcome, StepReport};

/// Offset added to the master seed for the EV arrival stream, so layout and
/// prices do not share draws with spawning.
const SPAWN_SEED_OFFSET: u64 = 57;

/// A city of charging stations grouped under transformers.
///
/// The engine owns every station and transformer and addresses them by
/// index. Stations own the EVs plugged into them; the engine only reads
/// EV data through station accessors.
///
/// An episode runs until the configured length is reached, a departing EV
/// scores below the satisfaction threshold, or a transformer is overloaded
/// (unless `generate_rnd_game` is set). After that [`step`](Self::step)
/// fails until [`reset`](Self::reset) is called.
///
/// Generic over `R: RewardFunction` for static dispatch.
#[derive(Debug)]
pub struct EvCity<R: RewardFunction = ProfitReward> {
    config: SimConfig,
    sim_name: String,
    clock: SimClock,
    stations: Vec<ChargingStation>,
    transformers: Vec<Transformer>,
    prices: PriceSeries,
    spawner: SpawnSource,
    reward_fn: R,
    layout: ObservationLayout,
    /// Arrival-state copies of every EV spawned this episode, in spawn order.
    arrivals: Vec<Ev>,
    total_evs_spawned: usize,
    current_evs_parked: usize,
    done: bool,
    replay_path: Option<PathBuf>,
}

impl EvCity<ProfitReward> {
    /// Builds a randomly generated city.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` if the station count is missing or the
    /// configuration is inconsistent.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        Self::with_reward(config, ProfitReward)
    }

    /// Rebuilds a city from a replay.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Replay` if the replay is inconsistent and
    /// `SimError::Config` if it cannot cover the requested episode.
    pub fn from_replay(
        config: SimConfig,
        replay: Replay,
        options: ReplayOptions,
    ) -> Result<Self, SimError> {
        Self::from_replay_with_reward(config, replay, options, ProfitReward)
    }
}

impl<R: RewardFunction> EvCity<R> {
    /// Builds a randomly generated city with a custom reward function.
    ///
    /// Stations are assigned to transformers uniformly at random and prices
    /// are drawn for every station and step, both from `config.seed`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` if the station count is missing or the
    /// configuration is inconsistent.
    pub fn with_reward(config: SimConfig, reward_fn: R) -> Result<Self, SimError> {
        let n_stations = config.n_stations.ok_or_else(|| {
            ConfigError::new("simulation.stations", "missing required station count")
        })?;
        if n_stations == 0 {
            return Err(ConfigError::new("simulation.stations", "must be > 0").into());
        }
        check_config(&config)?;
        check_random_spawn(&config)?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let station_specs: Vec<StationSpec> = (0..n_stations)
            .map(|id| StationSpec {
                id,
                n_ports: config.ports_per_station,
                transformer: rng.random_range(0..config.n_transformers),
                bus: None,
                max_charge_kw: config.station_max_charge_kw,
                max_discharge_kw: config.station_max_discharge_kw,
            })
            .collect();
        let transformer_specs = group_by_transformer(
            &station_specs,
            config.n_transformers,
            config.transformer_max_power_kw,
        );
        let prices = PriceSeries::generate(n_stations, config.length, &config.prices, &mut rng)?;
        let spawner = random_spawner(&config);

        Ok(Self::assemble(
            config,
            station_specs,
            transformer_specs,
            prices,
            spawner,
            reward_fn,
        ))
    }

    /// Rebuilds a city from a replay with a custom reward function.
    ///
    /// The layout, start date, grid flag, timescale and score threshold come
    /// from the replay; the episode length, seed and replay saving come from
    /// `config`. Prices and EV arrivals are replayed or regenerated
    /// according to `options`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Replay` if the replay is inconsistent and
    /// `SimError::Config` if it cannot cover the requested episode.
    pub fn from_replay_with_reward(
        mut config: SimConfig,
        replay: Replay,
        options: ReplayOptions,
        reward_fn: R,
    ) -> Result<Self, SimError> {
        replay.validate()?;

        config.start = replay.sim_date;
        config.simulate_grid = replay.simulate_grid;
        config.timescale_minutes = replay.timescale_minutes;
        config.n_stations = Some(replay.n_stations);
        config.n_transformers = replay.n_transformers;
        config.score_threshold = replay.score_threshold;
        config.ports_per_station = replay.max_n_ports;
        check_config(&config)?;

        let prices = if options.load_prices {
            if replay.prices.length() < config.length {
                return Err(ConfigError::new(
                    "replay.load_prices",
                    format!(
                        "replay prices cover {} steps, episode needs {}",
                        replay.prices.length(),
                        config.length
                    ),
                )
                .into());
            }
            replay.prices
        } else {
            let mut rng = StdRng::seed_from_u64(config.seed);
            PriceSeries::generate(replay.n_stations, config.length, &config.prices, &mut rng)?
        };

        let spawner = if options.load_evs {
            SpawnSource::Profile(ProfileCursor::new(replay.evs))
        } else {
            check_random_spawn(&config)?;
            random_spawner(&config)
        };

        info!(
            sim_name = %replay.sim_name,
            load_prices = options.load_prices,
            load_evs = options.load_evs,
            "rebuilding city from replay"
        );

        Ok(Self::assemble(
            config,
            replay.stations,
            replay.transformers,
            prices,
            spawner,
            reward_fn,
        ))
    }

    fn assemble(
        config: SimConfig,
        station_specs: Vec<StationSpec>,
        transformer_specs: Vec<TransformerSpec>,
        prices: PriceSeries,
        spawner: SpawnSource,
        reward_fn: R,
    ) -> Self {
        let stations: Vec<ChargingStation> = station_specs
            .into_iter()
            .map(|spec| ChargingStation::new(spec, config.timescale_minutes, config.verbose))
            .collect();
        let transformers: Vec<Transformer> =
            transformer_specs.into_iter().map(Transformer::new).collect();
        let layout = ObservationLayout::new(
            transformers.len(),
            stations.iter().map(ChargingStation::n_ports).collect(),
        );
        let sim_name = format!(
            "ev_city_{}_{}",
            config.length,
            Local::now().format("%Y-%m-%d_%H-%M")
        );

        info!(
            sim_name = %sim_name,
            stations = stations.len(),
            ports = layout.total_ports(),
            transformers = transformers.len(),
            length = config.length,
            timescale_minutes = config.timescale_minutes,
            profile = spawner.is_profile(),
            "city created"
        );

        Self {
            clock: SimClock::new(config.start, config.timescale_minutes, config.length),
            config,
            sim_name,
            stations,
            transformers,
            prices,
            spawner,
            reward_fn,
            layout,
            arrivals: Vec::new(),
            total_evs_spawned: 0,
            current_evs_parked: 0,
            done: false,
            replay_path: None,
        }
    }

    /// Starts a new episode and returns the initial observation.
    ///
    /// Empties every port, zeros all counters and rewinds the clock and any
    /// EV profile. Prices and the city layout are kept.
    pub fn reset(&mut self) -> Vec<f64> {
        self.clock.reset();
        self.stations.iter_mut().for_each(ChargingStation::reset);
        self.transformers.iter_mut().for_each(Transformer::reset);
        self.spawner.reset();
        self.arrivals.clear();
        self.total_evs_spawned = 0;
        self.current_evs_parked = 0;
        self.done = false;
        self.replay_path = None;

        info!(sim_name = %self.sim_name, "episode reset");
        self.observation()
    }

    /// Applies one action per port and advances the city by one step.
    ///
    /// The action vector is the concatenation of every station's port
    /// actions in station order, each in `[-1, 1]` (negative discharges,
    /// positive charges).
    ///
    /// # Errors
    ///
    /// Fails without touching any state if the episode is over, the grid is
    /// simulated, or the actions are malformed.
    ///
    /// Returns `SimError::Capacity` if a replayed EV is routed to a full
    /// station. The episode ends there with the station phase applied and
    /// the clock not advanced. Arrivals plugged in before the failing EV
    /// stay parked and are counted in
    /// [`total_evs_spawned`](Self::total_evs_spawned).
    ///
    /// A replay that cannot be written at the end of an episode is logged
    /// and leaves [`replay_path`](Self::replay_path) empty; the final
    /// outcome is still returned.
    pub fn step(&mut self, actions: &[f64]) -> Result<StepOutcome, SimError> {
        if self.done {
            return Err(SimError::EpisodeFinished {
                steps: self.clock.current(),
            });
        }
        if self.config.simulate_grid {
            return Err(SimError::GridSimulationUnimplemented);
        }
        let expected = self.layout.total_ports();
        if actions.len() != expected {
            return Err(SimError::ActionLengthMismatch {
                expected,
                got: actions.len(),
            });
        }
        if let Some((index, &value)) = actions.iter().enumerate().find(|(_, a)| !a.is_finite()) {
            return Err(SimError::InvalidAction { index, value });
        }

        let t = self.clock.current();

        // 1. Transformers aggregate fresh every step
        self.transformers.iter_mut().for_each(Transformer::reset);

        // 2. Stations in id order, each with its slice of the action vector
        let mut total_costs = 0.0;
        let mut user_satisfaction = Vec::new();
        let mut offset = 0;
        for station in &mut self.stations {
            let id = station.id();
            let n_ports = station.n_ports();
            let context =
                StepContext::new(t, self.prices.charge(id, t), self.prices.discharge(id, t));
            let report = station.step(&actions[offset..offset + n_ports], &context);
            offset += n_ports;

            total_costs += report.costs;
            user_satisfaction.extend(report.user_satisfaction);
            self.transformers[station.transformer()].step(station.current_power_output());
        }
        let departed = user_satisfaction.len();
        self.current_evs_parked = self.current_evs_parked.saturating_sub(departed);

        // 3. Arrivals for the next step, counted as each one is plugged in
        let mut arrived = 0;
        for ev in self.spawner.spawn(t + 1, &self.stations) {
            let station = ev.station;
            if let Err(e) = self.stations[station].spawn_ev(ev.clone()) {
                self.done = true;
                return Err(e.into());
            }
            self.arrivals.push(ev);
            self.total_evs_spawned += 1;
            self.current_evs_parked += 1;
            arrived += 1;
        }

        // 4. Time
        let step = self.clock.tick().unwrap_or(t);

        let overloaded = self.transformers.iter().any(Transformer::is_overloaded);
        let mut report = StepReport {
            step: t,
            date: self.clock.date(),
            total_costs,
            user_satisfaction,
            arrived,
            departed,
            parked: self.current_evs_parked,
            transformer_power_kw: self
                .transformers
                .iter()
                .map(Transformer::current_power)
                .collect(),
            overloaded,
            reward: 0.0,
        };
        report.reward = self.reward_fn.reward(&report);

        debug!(
            step,
            costs = report.total_costs,
            reward = report.reward,
            arrived,
            departed,
            parked = self.current_evs_parked,
            overloaded,
            "step"
        );

        // 5. Termination
        let reason = if self.clock.is_exhausted() {
            Some("length reached")
        } else if report
            .min_satisfaction()
            .is_some_and(|s| s < self.config.score_threshold)
        {
            Some("user satisfaction below threshold")
        } else if overloaded && !self.config.generate_rnd_game {
            Some("transformer overloaded")
        } else {
            None
        };

        if let Some(reason) = reason {
            self.done = true;
            info!(
                sim_name = %self.sim_name,
                steps = step,
                reason,
                evs_spawned = self.total_evs_spawned,
                "episode finished"
            );
            if self.config.save_replay {
                match self.save_replay() {
                    Ok(path) => {
                        info!(path = %path.display(), "replay saved");
                        self.replay_path = Some(path);
                    }
                    Err(e) => warn!(error = %e, "replay not saved"),
                }
            }
        }

        Ok(StepOutcome {
            observation: self.observation(),
            reward: report.reward,
            done: self.done,
            report,
        })
    }

    /// Builds the flat observation:
    /// `[step, timescale, n_stations]`, then `[current_power, max_power]` per
    /// transformer, then each station's state in station order.
    pub fn observation(&self) -> Vec<f64> {
        let mut obs = Vec::with_capacity(self.layout.len());
        obs.push(self.clock.current() as f64);
        obs.push(f64::from(self.config.timescale_minutes));
        obs.push(self.stations.len() as f64);
        for tr in &self.transformers {
            obs.extend_from_slice(&tr.get_state());
        }
        debug_assert_eq!(obs.len(), self.layout.stations_offset());
        for cs in &self.stations {
            cs.write_state(&mut obs);
        }
        debug_assert_eq!(obs.len(), self.layout.len());
        obs
    }

    /// Snapshot of the city layout, prices and arrivals so far.
    pub fn to_replay(&self) -> Replay {
        Replay {
            sim_name: self.sim_name.clone(),
            sim_date: self.clock.start(),
            simulate_grid: self.config.simulate_grid,
            timescale_minutes: self.config.timescale_minutes,
            sim_length: self.config.length,
            n_stations: self.stations.len(),
            n_transformers: self.transformers.len(),
            score_threshold: self.config.score_threshold,
            max_n_ports: self.config.ports_per_station,
            transformers: self.transformers.iter().map(|tr| tr.spec().clone()).collect(),
            stations: self.stations.iter().map(|cs| *cs.spec()).collect(),
            prices: self.prices.clone(),
            evs: self.arrivals.clone(),
        }
    }

    /// Writes the current replay into the configured replay directory.
    ///
    /// # Errors
    ///
    /// Returns a `ReplayError` if the file cannot be written.
    pub fn save_replay(&self) -> Result<PathBuf, ReplayError> {
        self.to_replay().save(&self.config.replay_dir)
    }

    /// Statistics of the episode so far.
    pub fn summary(&self) -> EpisodeSummary {
        EpisodeSummary::from_stations(&self.stations, self.clock.current(), self.total_evs_spawned)
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Current step counter.
    pub fn current_step(&self) -> usize {
        self.clock.current()
    }

    /// Current simulated date.
    pub fn sim_date(&self) -> chrono::NaiveDateTime {
        self.clock.date()
    }

    pub fn sim_name(&self) -> &str {
        &self.sim_name
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn stations(&self) -> &[ChargingStation] {
        &self.stations
    }

    pub fn transformers(&self) -> &[Transformer] {
        &self.transformers
    }

    pub fn prices(&self) -> &PriceSeries {
        &self.prices
    }

    pub fn layout(&self) -> &ObservationLayout {
        &self.layout
    }

    /// Length of the action vector [`step`](Self::step) expects.
    pub fn action_len(&self) -> usize {
        self.layout.total_ports()
    }

    pub fn total_evs_spawned(&self) -> usize {
        self.total_evs_spawned
    }

    /// EVs parked right now.
    pub fn current_evs_parked(&self) -> usize {
        self.current_evs_parked
    }

    /// Path of the replay written when the last episode ended, if any.
    pub fn replay_path(&self) -> Option<&PathBuf> {
        self.replay_path.as_ref()
    }
}

fn check_config(config: &SimConfig) -> Result<(), ConfigError> {
    if config.ports_per_station == 0 {
        return Err(ConfigError::new("simulation.ports_per_station", "must be > 0"));
    }
    if config.n_transformers == 0 {
        return Err(ConfigError::new("simulation.transformers", "must be > 0"));
    }
    if config.timescale_minutes == 0 {
        return Err(ConfigError::new("simulation.timescale_minutes", "must be > 0"));
    }
    if config.length == 0 {
        return Err(ConfigError::new("simulation.length", "must be > 0"));
    }
    if config.transformer_max_power_kw < 0.0 {
        return Err(ConfigError::new("transformer.max_power_kw", "must be >= 0"));
    }
    Ok(())
}

fn check_random_spawn(config: &SimConfig) -> Result<(), ConfigError> {
    let p = &config.spawn;
    if !(0.0..=1.0).contains(&p.probability) {
        return Err(ConfigError::new("ev.spawn_probability", "must be in [0.0, 1.0]"));
    }
    if !(p.arrival_kwh_min >= 0.0
        && p.arrival_kwh_min < p.arrival_kwh_max
        && p.arrival_kwh_max.is_finite())
    {
        return Err(ConfigError::new(
            "ev.arrival_kwh_min",
            "must be >= 0 and < a finite ev.arrival_kwh_max",
        ));
    }
    if p.min_stay_steps >= p.max_stay_steps {
        return Err(ConfigError::new("ev.min_stay_steps", "must be < ev.max_stay_steps"));
    }
    if !(p.ev.capacity_kwh > 0.0 && p.ev.capacity_kwh.is_finite()) {
        return Err(ConfigError::new("ev.capacity_kwh", "must be finite and > 0"));
    }
    if config.empty_ports_at_end && p.max_stay_steps > config.length {
        return Err(ConfigError::new(
            "ev.max_stay_steps",
            format!(
                "max stay of {} steps exceeds the episode length of {}; increase the \
                 length or disable simulation.empty_ports_at_end",
                p.max_stay_steps, config.length
            ),
        ));
    }
    Ok(())
}

fn random_spawner(config: &SimConfig) -> SpawnSource {
    SpawnSource::Random(RandomSpawner::new(
        config.spawn,
        config.length,
        config.empty_ports_at_end,
        config.seed.wrapping_add(SPAWN_SEED_OFFSET),
    ))
}

fn group_by_transformer(
    stations: &[StationSpec],
    n_transformers: usize,
    max_power_kw: f64,
) -> Vec<TransformerSpec> {
    (0..n_transformers)
        .map(|id| TransformerSpec {
            id,
            station_ids: stations
                .iter()
                .filter(|cs| cs.transformer == id)
                .map(|cs| cs.id)
                .collect(),
            max_power_kw,
        })
        .collect()
}
