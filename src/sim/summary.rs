//! End-of-episode statistics.

use std::fmt;

use crate::devices::charging_station::ChargingStation;

/// Aggregate statistics of an episode, computed from the stations' totals.
///
/// Only EVs that have departed contribute to the served, energy and
/// profit figures; vehicles still parked are counted in `total_evs_spawned`
/// alone.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    /// Steps taken in the episode.
    pub steps: usize,
    /// EVs that arrived at any station.
    pub total_evs_spawned: usize,
    /// EVs that completed their dwell.
    pub total_evs_served: usize,
    /// Net monetary flow accrued by departed EVs.
    pub total_profits: f64,
    /// Mean departure satisfaction (percent).
    pub avg_user_satisfaction_pct: f64,
    /// Energy charged into departed EVs (kWh).
    pub total_energy_charged_kwh: f64,
    /// Energy discharged from departed EVs (kWh).
    pub total_energy_discharged_kwh: f64,
}

impl EpisodeSummary {
    /// Computes the summary from the final state of every station.
    ///
    /// # Arguments
    ///
    /// * `stations` - All stations of the city
    /// * `steps` - Steps taken so far
    /// * `total_evs_spawned` - Arrivals counted by the engine
    pub fn from_stations(
        stations: &[ChargingStation],
        steps: usize,
        total_evs_spawned: usize,
    ) -> Self {
        let served: usize = stations.iter().map(|cs| cs.total_evs_served).sum();
        let satisfaction: f64 = stations.iter().map(|cs| cs.total_user_satisfaction).sum();

        Self {
            steps,
            total_evs_spawned,
            total_evs_served: served,
            total_profits: stations.iter().map(|cs| cs.total_profits).sum(),
            avg_user_satisfaction_pct: if served > 0 {
                100.0 * satisfaction / served as f64
            } else {
                0.0
            },
            total_energy_charged_kwh: stations.iter().map(|cs| cs.total_energy_charged).sum(),
            total_energy_discharged_kwh: stations
                .iter()
                .map(|cs| cs.total_energy_discharged)
                .sum(),
        }
    }
}

impl fmt::Display for EpisodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Episode Summary ---")?;
        writeln!(f, "Steps:                  {}", self.steps)?;
        writeln!(f, "EVs spawned:            {}", self.total_evs_spawned)?;
        writeln!(f, "EVs served:             {}", self.total_evs_served)?;
        writeln!(f, "Total profits:          {:.3}", self.total_profits)?;
        writeln!(
            f,
            "Avg user satisfaction:  {:.1}%",
            self.avg_user_satisfaction_pct
        )?;
        writeln!(
            f,
            "Energy charged:         {:.2} kWh",
            self.total_energy_charged_kwh
        )?;
        write!(
            f,
            "Energy discharged:      {:.2} kWh",
            self.total_energy_discharged_kwh
        )
    }
}
