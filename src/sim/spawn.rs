//! EV arrival sources: stochastic generation or a fixed arrival profile.

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::devices::charging_station::ChargingStation;
use crate::devices::ev::{Ev, EvSpec};

/// Parameters of the stochastic arrival process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnParams {
    /// Probability that a station with a free port receives an EV each step.
    pub probability: f64,
    /// Lower bound of the arrival energy draw (kWh, inclusive).
    pub arrival_kwh_min: f64,
    /// Upper bound of the arrival energy draw (kWh, exclusive).
    pub arrival_kwh_max: f64,
    /// Minimum stay in steps (inclusive).
    pub min_stay_steps: usize,
    /// Maximum stay in steps (exclusive).
    pub max_stay_steps: usize,
    /// Limits applied to every spawned vehicle.
    pub ev: EvSpec,
}

impl Default for SpawnParams {
    fn default() -> Self {
        Self {
            probability: 0.8,
            arrival_kwh_min: 1.0,
            arrival_kwh_max: 49.0,
            min_stay_steps: 7,
            max_stay_steps: 15,
            ev: EvSpec::default(),
        }
    }
}

/// Draws new EVs for stations with free ports.
#[derive(Debug, Clone)]
pub struct RandomSpawner {
    params: SpawnParams,
    length: usize,
    empty_ports_at_end: bool,
    rng: StdRng,
}

impl RandomSpawner {
    /// Creates a spawner for an episode of `length` steps.
    ///
    /// When `empty_ports_at_end` is set, no EV is spawned that could still
    /// be parked when the episode ends.
    pub fn new(params: SpawnParams, length: usize, empty_ports_at_end: bool, seed: u64) -> Self {
        Self {
            params,
            length,
            empty_ports_at_end,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn spawn(&mut self, next_step: usize, stations: &[ChargingStation]) -> Vec<Ev> {
        let p = &self.params;
        if self.empty_ports_at_end && next_step + p.max_stay_steps >= self.length {
            return Vec::new();
        }

        let mut arrivals = Vec::new();
        for station in stations.iter().filter(|s| s.has_free_port()) {
            if self.rng.random::<f64>() >= p.probability {
                continue;
            }
            let arrival_kwh = self.rng.random_range(p.arrival_kwh_min..p.arrival_kwh_max);
            let stay = self.rng.random_range(p.min_stay_steps..p.max_stay_steps);
            arrivals.push(Ev::new(
                station.id(),
                arrival_kwh,
                next_step,
                next_step + stay,
                p.ev,
            ));
        }
        arrivals
    }
}

/// Replays a fixed list of EVs ordered by arrival step.
#[derive(Debug, Clone)]
pub struct ProfileCursor {
    evs: Vec<Ev>,
    next: usize,
}

impl ProfileCursor {
    /// Creates a cursor over `evs`, sorting them by arrival step if needed.
    ///
    /// The sort is stable so EVs arriving on the same step keep their order.
    pub fn new(mut evs: Vec<Ev>) -> Self {
        let sorted = evs
            .windows(2)
            .all(|w| w[0].arrival_step <= w[1].arrival_step);
        if !sorted {
            warn!(evs = evs.len(), "EV profile not ordered by arrival, sorting");
            evs.sort_by_key(|ev| ev.arrival_step);
        }
        Self { evs, next: 0 }
    }

    fn spawn(&mut self, next_step: usize) -> Vec<Ev> {
        let mut arrivals = Vec::new();
        while let Some(ev) = self.evs.get(self.next) {
            if ev.arrival_step > next_step {
                break;
            }
            if ev.arrival_step < next_step {
                warn!(
                    station = ev.station,
                    arrival_step = ev.arrival_step,
                    next_step,
                    "skipping EV whose arrival step has passed"
                );
            } else {
                let mut ev = ev.clone();
                ev.reset();
                arrivals.push(ev);
            }
            self.next += 1;
        }
        arrivals
    }

    /// The full profile in arrival order.
    pub fn evs(&self) -> &[Ev] {
        &self.evs
    }

    /// Number of profile entries consumed so far.
    pub fn consumed(&self) -> usize {
        self.next
    }
}

/// Where new EVs come from; selected once at construction.
#[derive(Debug, Clone)]
pub enum SpawnSource {
    Random(RandomSpawner),
    Profile(ProfileCursor),
}

impl SpawnSource {
    /// Returns the EVs arriving at `next_step`, each routed to its station.
    ///
    /// Random arrivals only target stations with a free port. Profile
    /// arrivals are returned as recorded; routing them to a full station is
    /// reported by the station itself.
    pub fn spawn(&mut self, next_step: usize, stations: &[ChargingStation]) -> Vec<Ev> {
        match self {
            Self::Random(spawner) => spawner.spawn(next_step, stations),
            Self::Profile(cursor) => cursor.spawn(next_step),
        }
    }

    /// Rewinds a profile to its first entry. Random sources keep their
    /// generator state so consecutive episodes differ.
    pub fn reset(&mut self) {
        if let Self::Profile(cursor) = self {
            cursor.next = 0;
        }
    }

    pub fn is_profile(&self) -> bool {
        matches!(self, Self::Profile(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::charging_station::StationSpec;

    fn stations(n: usize, n_ports: usize) -> Vec<ChargingStation> {
        (0..n)
            .map(|id| {
                ChargingStation::new(
                    StationSpec {
                        id,
                        n_ports,
                        transformer: 0,
                        bus: None,
                        max_charge_kw: 22.0,
                        max_discharge_kw: 22.0,
                    },
                    5,
                    false,
                )
            })
            .collect()
    }

    fn profile_ev(station: usize, arrival_step: usize) -> Ev {
        Ev::new(station, 10.0, arrival_step, arrival_step + 3, EvSpec::default())
    }

    #[test]
    fn random_spawns_within_bounds() {
        let css = stations(4, 2);
        let mut source =
            SpawnSource::Random(RandomSpawner::new(SpawnParams::default(), 500, true, 3));
        let mut spawned = 0;
        for step in 1..100 {
            for ev in source.spawn(step, &css) {
                assert_eq!(ev.arrival_step, step);
                let stay = ev.departure_step - ev.arrival_step;
                assert!((7..15).contains(&stay));
                assert!((1.0..49.0).contains(&ev.arrival_kwh));
                assert!(ev.station < 4);
                spawned += 1;
            }
        }
        assert!(spawned > 0);
    }

    #[test]
    fn random_skips_full_stations() {
        let mut css = stations(1, 1);
        css[0]
            .spawn_ev(Ev::new(0, 10.0, 0, 50, EvSpec::default()))
            .ok();
        let params = SpawnParams {
            probability: 1.0,
            ..SpawnParams::default()
        };
        let mut source = SpawnSource::Random(RandomSpawner::new(params, 500, true, 3));
        assert!(source.spawn(1, &css).is_empty());
    }

    #[test]
    fn random_suppressed_near_episode_end() {
        let css = stations(2, 2);
        let params = SpawnParams {
            probability: 1.0,
            ..SpawnParams::default()
        };
        let mut source = SpawnSource::Random(RandomSpawner::new(params, 30, true, 3));
        assert_eq!(source.spawn(14, &css).len(), 2);
        assert!(source.spawn(15, &css).is_empty());

        let mut unbounded = SpawnSource::Random(RandomSpawner::new(params, 30, false, 3));
        assert_eq!(unbounded.spawn(29, &css).len(), 2);
    }

    #[test]
    fn random_is_deterministic_for_seed() {
        let css = stations(3, 2);
        let mut a = SpawnSource::Random(RandomSpawner::new(SpawnParams::default(), 100, true, 9));
        let mut b = SpawnSource::Random(RandomSpawner::new(SpawnParams::default(), 100, true, 9));
        for step in 1..20 {
            assert_eq!(a.spawn(step, &css), b.spawn(step, &css));
        }
    }

    #[test]
    fn profile_spawns_exact_arrivals_in_order() {
        let css = stations(2, 2);
        let evs = vec![profile_ev(0, 1), profile_ev(1, 1), profile_ev(0, 3)];
        let mut source = SpawnSource::Profile(ProfileCursor::new(evs));

        let first = source.spawn(1, &css);
        assert_eq!(first.iter().map(|e| e.station).collect::<Vec<_>>(), [0, 1]);
        assert!(source.spawn(2, &css).is_empty());
        assert_eq!(source.spawn(3, &css).len(), 1);
        assert!(source.spawn(4, &css).is_empty());
    }

    #[test]
    fn profile_is_sorted_at_construction() {
        let cursor = ProfileCursor::new(vec![profile_ev(0, 5), profile_ev(1, 2), profile_ev(0, 2)]);
        let order: Vec<_> = cursor.evs().iter().map(|e| (e.arrival_step, e.station)).collect();
        assert_eq!(order, [(2, 1), (2, 0), (5, 0)]);
    }

    #[test]
    fn profile_skips_stale_entries() {
        let mut cursor = ProfileCursor::new(vec![profile_ev(0, 0), profile_ev(0, 1)]);
        let spawned = cursor.spawn(1);
        assert_eq!(spawned.len(), 1);
        assert_eq!(cursor.consumed(), 2);
    }

    #[test]
    fn profile_reset_rewinds() {
        let css = stations(1, 2);
        let mut source = SpawnSource::Profile(ProfileCursor::new(vec![profile_ev(0, 1)]));
        assert_eq!(source.spawn(1, &css).len(), 1);
        source.reset();
        assert_eq!(source.spawn(1, &css).len(), 1);
        assert!(source.is_profile());
    }
}
