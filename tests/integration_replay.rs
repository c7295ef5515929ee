//! Replay save/load round trips and replay-driven episodes.

mod common;

use ev_city_sim::error::{ReplayError, SimError};
use ev_city_sim::io::replay::{Replay, ReplayOptions};
use ev_city_sim::sim::engine::EvCity;

fn recorded_city(dir: &std::path::Path) -> EvCity {
    let mut config = common::unconstrained_config(3, 60);
    config.n_transformers = 2;
    config.save_replay = true;
    config.replay_dir = dir.to_path_buf();
    EvCity::new(config).unwrap()
}

#[test]
fn replay_is_written_when_episode_ends() {
    let dir = tempfile::tempdir().unwrap();
    let mut city = recorded_city(dir.path());
    common::run_constant(&mut city, 0.5);

    let path = city.replay_path().cloned().expect("replay should be saved");
    assert!(path.starts_with(dir.path()));
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    assert!(name.starts_with("replay_ev_city_60_"));
    assert!(name.ends_with(".json"));
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let mut city = recorded_city(dir.path());
    common::run_constant(&mut city, 0.5);

    let original = city.to_replay();
    let loaded = Replay::load(city.replay_path().unwrap()).unwrap();

    assert_eq!(loaded, original);
    assert_eq!(loaded.evs.len(), city.total_evs_spawned());
    assert_eq!(loaded.transformers, original.transformers);
    assert_eq!(loaded.prices, original.prices);
}

#[test]
fn replayed_episode_reproduces_rewards() {
    let dir = tempfile::tempdir().unwrap();
    let mut city = recorded_city(dir.path());
    let first = common::run_constant(&mut city, 0.5);
    let replay = Replay::load(city.replay_path().unwrap()).unwrap();

    let mut config = common::unconstrained_config(1, 60);
    config.n_stations = None;
    let mut replayed = EvCity::from_replay(
        config,
        replay,
        ReplayOptions {
            load_prices: true,
            load_evs: true,
        },
    )
    .unwrap();
    let second = common::run_constant(&mut replayed, 0.5);

    assert_eq!(replayed.stations().len(), 3);
    assert_eq!(replayed.transformers().len(), 2);
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.reward, b.reward);
        assert_eq!(a.arrived, b.arrived);
        assert_eq!(a.departed, b.departed);
        assert_eq!(a.transformer_power_kw, b.transformer_power_kw);
    }
    assert_eq!(city.summary(), replayed.summary());
}

#[test]
fn layout_only_replay_regenerates_prices_and_arrivals() {
    let dir = tempfile::tempdir().unwrap();
    let mut city = recorded_city(dir.path());
    common::run_constant(&mut city, 0.5);
    let replay = Replay::load(city.replay_path().unwrap()).unwrap();
    let specs = replay.stations.clone();

    let mut config = common::unconstrained_config(1, 30);
    config.seed = 7;
    let replayed = EvCity::from_replay(config, replay, ReplayOptions::default()).unwrap();

    let rebuilt: Vec<_> = replayed.stations().iter().map(|cs| *cs.spec()).collect();
    assert_eq!(rebuilt, specs);
    assert_eq!(replayed.prices().length(), 30);
}

#[test]
fn replay_prices_must_cover_episode() {
    let dir = tempfile::tempdir().unwrap();
    let mut city = recorded_city(dir.path());
    common::run_constant(&mut city, 0.5);
    let replay = city.to_replay();

    let config = common::unconstrained_config(1, 500);
    let err = EvCity::from_replay(
        config,
        replay,
        ReplayOptions {
            load_prices: true,
            load_evs: false,
        },
    );
    assert!(matches!(err, Err(SimError::Config(e)) if e.field == "replay.load_prices"));
}

#[test]
fn malformed_replay_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(Replay::load(&path), Err(ReplayError::Json { .. })));
}

#[test]
fn ragged_replay_prices_are_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let mut city = recorded_city(dir.path());
    common::run_constant(&mut city, 0.5);
    let path = city.replay_path().cloned().unwrap();

    let mut json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let row = json["prices"]["discharge"][1].as_array_mut().unwrap();
    row.truncate(3);
    std::fs::write(&path, json.to_string()).unwrap();

    assert!(matches!(Replay::load(&path), Err(ReplayError::Json { .. })));
}

#[test]
fn unsorted_profile_is_replayed_in_arrival_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut city = recorded_city(dir.path());
    let first = common::run_constant(&mut city, 0.0);
    let mut replay = city.to_replay();
    replay.evs.reverse();

    let mut config = common::unconstrained_config(1, 60);
    config.n_stations = None;
    let mut replayed = EvCity::from_replay(
        config,
        replay,
        ReplayOptions {
            load_prices: true,
            load_evs: true,
        },
    )
    .unwrap();
    let second = common::run_constant(&mut replayed, 0.0);
    let arrivals = |r: &[ev_city_sim::sim::types::StepReport]| {
        r.iter().map(|s| s.arrived).collect::<Vec<_>>()
    };
    assert_eq!(arrivals(&first), arrivals(&second));
}
