//! Episode replays: a JSON snapshot of a city layout, its prices and the
//! EVs that arrived, enough to re-run the episode without re-randomizing.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::devices::charging_station::StationSpec;
use crate::devices::ev::Ev;
use crate::error::ReplayError;
use crate::sim::prices::PriceSeries;
use crate::sim::transformer::TransformerSpec;

/// Selects which recorded parts of a replay drive the new episode.
///
/// The city layout is always restored. Parts not loaded are generated
/// from the caller's configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Reuse the recorded price matrices.
    pub load_prices: bool,
    /// Spawn the recorded EVs instead of random arrivals.
    pub load_evs: bool,
}

/// Persisted episode snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replay {
    /// Episode name, also used in the file name.
    pub sim_name: String,
    /// Simulated date of step 0.
    pub sim_date: NaiveDateTime,
    pub simulate_grid: bool,
    pub timescale_minutes: u32,
    /// Length of the recorded episode in steps.
    pub sim_length: usize,
    pub n_stations: usize,
    pub n_transformers: usize,
    pub score_threshold: f64,
    /// Ports per station.
    pub max_n_ports: usize,
    pub transformers: Vec<TransformerSpec>,
    pub stations: Vec<StationSpec>,
    pub prices: PriceSeries,
    /// EVs in spawn order, as they were on arrival.
    pub evs: Vec<Ev>,
}

impl Replay {
    /// File name of this replay inside a replay directory.
    pub fn file_name(&self) -> String {
        format!("replay_{}.json", self.sim_name)
    }

    /// Writes the replay to `<dir>/replay_<sim_name>.json`, creating `dir`
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns a `ReplayError` if the directory or file cannot be written.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, ReplayError> {
        fs::create_dir_all(dir).map_err(|source| ReplayError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(self.file_name());
        let io_err = |source| ReplayError::Io {
            path: path.clone(),
            source,
        };
        let file = File::create(&path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|source| ReplayError::Json {
            path: path.clone(),
            source,
        })?;
        writer.flush().map_err(io_err)?;
        Ok(path)
    }

    /// Reads and validates a replay file.
    ///
    /// # Errors
    ///
    /// Returns a `ReplayError` if the file cannot be read, is not valid JSON,
    /// or describes an inconsistent city.
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let file = File::open(path).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let replay: Self =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| ReplayError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        replay.validate()?;
        Ok(replay)
    }

    /// Checks that the snapshot describes a consistent city.
    ///
    /// # Errors
    ///
    /// Returns `ReplayError::Invalid` naming the first inconsistency found.
    pub fn validate(&self) -> Result<(), ReplayError> {
        let invalid = |msg: String| Err(ReplayError::Invalid(msg));

        if self.timescale_minutes == 0 {
            return invalid("timescale_minutes must be > 0".into());
        }
        if self.n_stations == 0 || self.stations.len() != self.n_stations {
            return invalid(format!(
                "n_stations is {} but {} stations are listed",
                self.n_stations,
                self.stations.len()
            ));
        }
        if self.n_transformers == 0 || self.transformers.len() != self.n_transformers {
            return invalid(format!(
                "n_transformers is {} but {} transformers are listed",
                self.n_transformers,
                self.transformers.len()
            ));
        }
        for (i, cs) in self.stations.iter().enumerate() {
            if cs.id != i {
                return invalid(format!("station at index {i} has id {}", cs.id));
            }
            if cs.n_ports == 0 {
                return invalid(format!("station {i} has no ports"));
            }
            if cs.transformer >= self.n_transformers {
                return invalid(format!(
                    "station {i} references missing transformer {}",
                    cs.transformer
                ));
            }
        }
        for (i, tr) in self.transformers.iter().enumerate() {
            if tr.id != i {
                return invalid(format!("transformer at index {i} has id {}", tr.id));
            }
            if !(tr.max_power_kw >= 0.0) {
                return invalid(format!("transformer {i} has negative capacity"));
            }
            if let Some(&s) = tr
                .station_ids
                .iter()
                .find(|&&s| self.stations.get(s).is_none_or(|cs| cs.transformer != i))
            {
                return invalid(format!(
                    "transformer {i} lists station {s} which does not feed it"
                ));
            }
        }
        if self.prices.n_stations() != self.n_stations {
            return invalid(format!(
                "prices cover {} stations, expected {}",
                self.prices.n_stations(),
                self.n_stations
            ));
        }
        if let Some(ev) = self.evs.iter().find(|ev| ev.station >= self.n_stations) {
            return invalid(format!(
                "EV arriving at step {} references missing station {}",
                ev.arrival_step, ev.station
            ));
        }
        if let Some(ev) = self.evs.iter().find(|ev| ev.arrival_step > ev.departure_step) {
            return invalid(format!(
                "EV at station {} arrives at step {} after its departure step {}",
                ev.station, ev.arrival_step, ev.departure_step
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::ev::EvSpec;

    fn replay() -> Replay {
        let station = |id: usize, transformer: usize| StationSpec {
            id,
            n_ports: 2,
            transformer,
            bus: None,
            max_charge_kw: 22.0,
            max_discharge_kw: 22.0,
        };
        Replay {
            sim_name: "ev_city_4_test".into(),
            sim_date: NaiveDateTime::default(),
            simulate_grid: false,
            timescale_minutes: 5,
            sim_length: 4,
            n_stations: 2,
            n_transformers: 1,
            score_threshold: 1.0,
            max_n_ports: 2,
            transformers: vec![TransformerSpec {
                id: 0,
                station_ids: vec![0, 1],
                max_power_kw: 100.0,
            }],
            stations: vec![station(0, 0), station(1, 0)],
            prices: PriceSeries::from_matrices(vec![vec![-0.1; 4]; 2], vec![vec![0.1; 4]; 2])
                .unwrap(),
            evs: vec![Ev::new(1, 12.0, 1, 3, EvSpec::default())],
        }
    }

    #[test]
    fn valid_replay_passes() {
        assert!(replay().validate().is_ok());
    }

    #[test]
    fn file_name_uses_sim_name() {
        assert_eq!(replay().file_name(), "replay_ev_city_4_test.json");
    }

    #[test]
    fn ev_at_missing_station_is_invalid() {
        let mut r = replay();
        r.evs.push(Ev::new(7, 10.0, 2, 3, EvSpec::default()));
        assert!(
            matches!(r.validate(), Err(ReplayError::Invalid(msg)) if msg.contains("station 7"))
        );
    }

    #[test]
    fn station_with_missing_transformer_is_invalid() {
        let mut r = replay();
        r.stations[1].transformer = 3;
        assert!(r.validate().is_err());
    }

    #[test]
    fn transformer_listing_foreign_station_is_invalid() {
        let mut r = replay();
        r.transformers[0].station_ids.push(5);
        assert!(r.validate().is_err());
    }

    #[test]
    fn price_shape_must_match_stations() {
        let mut r = replay();
        r.prices = PriceSeries::from_matrices(vec![vec![-0.1; 4]], vec![vec![0.1; 4]]).unwrap();
        assert!(r.validate().is_err());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = Replay::load(Path::new("/nonexistent/replay.json"));
        assert!(matches!(err, Err(ReplayError::Io { .. })));
    }
}
