//! EV city simulator entry point: CLI wiring and config-driven city construction.

mod cli;

use std::process;

use clap::Parser;
use rand::{SeedableRng, rngs::StdRng};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ev_city_sim::config::ScenarioConfig;
use ev_city_sim::error::SimError;
use ev_city_sim::io::export::export_csv;
use ev_city_sim::io::replay::{Replay, ReplayOptions};
use ev_city_sim::sim::engine::EvCity;

use cli::Args;

/// Seed offset for the policy RNG to avoid correlation with the city.
const POLICY_SEED_OFFSET: u64 = 101;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_scenario(args: &Args) -> Result<ScenarioConfig, SimError> {
    // --scenario takes priority, then --preset, then the default preset
    let mut scenario = if let Some(path) = &args.scenario {
        ScenarioConfig::from_toml_file(path)?
    } else {
        ScenarioConfig::from_preset(args.preset.as_deref().unwrap_or("default"))?
    };

    if let Some(seed) = args.seed {
        scenario.simulation.seed = seed;
    }
    if let Some(path) = &args.replay {
        scenario.replay.load_path = Some(path.clone());
    }
    scenario.replay.load_prices |= args.load_prices;
    scenario.replay.load_evs |= args.load_evs;
    if args.no_save_replay {
        scenario.replay.save = false;
    }
    Ok(scenario)
}

fn build_city(scenario: &ScenarioConfig) -> Result<EvCity, SimError> {
    let sim_config = scenario.to_sim_config();
    match &scenario.replay.load_path {
        Some(path) => {
            let replay = Replay::load(path)?;
            let options = ReplayOptions {
                load_prices: scenario.replay.load_prices,
                load_evs: scenario.replay.load_evs,
            };
            EvCity::from_replay(sim_config, replay, options)
        }
        None => EvCity::new(sim_config),
    }
}

fn run(args: &Args, scenario: &ScenarioConfig) -> Result<(), SimError> {
    let mut city = build_city(scenario)?;
    let mut rng = StdRng::seed_from_u64(scenario.simulation.seed.wrapping_add(POLICY_SEED_OFFSET));

    city.reset();
    let mut reports = Vec::with_capacity(city.config().length);
    loop {
        let actions = args.policy.actions(city.action_len(), &mut rng);
        let outcome = city.step(&actions)?;
        println!("{}", outcome.report);
        reports.push(outcome.report);
        if outcome.done {
            break;
        }
    }

    println!("\n{}", city.summary());
    if let Some(path) = city.replay_path() {
        eprintln!("Replay written to {}", path.display());
    }

    if let Some(path) = &args.telemetry_out {
        export_csv(&reports, path).map_err(|source| SimError::Export {
            path: path.clone(),
            source,
        })?;
        eprintln!("Telemetry written to {}", path.display());
    }
    Ok(())
}

fn main() {
    init_tracing();
    let args = Args::parse();

    let scenario = match load_scenario(&args) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    if let Err(e) = run(&args, &scenario) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
