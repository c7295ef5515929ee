//! Shared test fixtures for integration tests.

use ev_city_sim::config::ScenarioConfig;
use ev_city_sim::devices::{Ev, StationSpec};
use ev_city_sim::io::replay::{Replay, ReplayOptions};
use ev_city_sim::sim::engine::EvCity;
use ev_city_sim::sim::prices::PriceSeries;
use ev_city_sim::sim::transformer::TransformerSpec;
use ev_city_sim::sim::types::{SimConfig, StepReport};

/// Random city that never stops early and never writes replays.
pub fn unconstrained_config(stations: usize, length: usize) -> SimConfig {
    let mut scenario = ScenarioConfig::unconstrained();
    scenario.simulation.stations = Some(stations);
    scenario.simulation.length = length;
    scenario.replay.save = false;
    scenario.to_sim_config()
}

/// One station with `n_ports` ports on a single transformer, hourly steps,
/// flat prices (-0.1 charge, 0.2 discharge) and a fixed EV profile.
pub fn profile_city(
    n_ports: usize,
    length: usize,
    max_power_kw: f64,
    evs: Vec<Ev>,
    generate_rnd_game: bool,
) -> EvCity {
    let mut config = unconstrained_config(1, length);
    config.generate_rnd_game = generate_rnd_game;

    let replay = Replay {
        sim_name: "fixture".into(),
        sim_date: config.start,
        simulate_grid: false,
        timescale_minutes: 60,
        sim_length: length,
        n_stations: 1,
        n_transformers: 1,
        score_threshold: 0.0,
        max_n_ports: n_ports,
        transformers: vec![TransformerSpec {
            id: 0,
            station_ids: vec![0],
            max_power_kw,
        }],
        stations: vec![StationSpec {
            id: 0,
            n_ports,
            transformer: 0,
            bus: None,
            max_charge_kw: 10.0,
            max_discharge_kw: 10.0,
        }],
        prices: PriceSeries::from_matrices(vec![vec![-0.1; length]], vec![vec![0.2; length]])
            .expect("fixture prices are rectangular"),
        evs,
    };

    EvCity::from_replay(
        config,
        replay,
        ReplayOptions {
            load_prices: true,
            load_evs: true,
        },
    )
    .expect("fixture replay is valid")
}

/// Runs until done with a constant action on every port.
pub fn run_constant(city: &mut EvCity, action: f64) -> Vec<StepReport> {
    let actions = vec![action; city.action_len()];
    let mut reports = Vec::new();
    loop {
        let outcome = city.step(&actions).expect("step should succeed");
        reports.push(outcome.report);
        if outcome.done {
            return reports;
        }
    }
}
