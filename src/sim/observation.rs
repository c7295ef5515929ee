//! Declared shape of the flat observation vector.

use crate::devices::charging_station::{PORT_FEATURES, STATION_FEATURES};

/// Number of global entries at the head of the observation:
/// `[step, timescale, n_stations]`.
pub const GLOBAL_FEATURES: usize = 3;

/// Entries per transformer: `[current_power, max_power]`.
pub const TRANSFORMER_FEATURES: usize = 2;

/// Fixed layout of the observation for one city configuration.
///
/// The engine asserts every observation it builds against this layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationLayout {
    pub n_transformers: usize,
    /// Port count of each station, in station order.
    pub ports_per_station: Vec<usize>,
}

impl ObservationLayout {
    pub fn new(n_transformers: usize, ports_per_station: Vec<usize>) -> Self {
        Self {
            n_transformers,
            ports_per_station,
        }
    }

    /// Total port count, which is also the action vector length.
    pub fn total_ports(&self) -> usize {
        self.ports_per_station.iter().sum()
    }

    /// Offset of the first station entry.
    pub fn stations_offset(&self) -> usize {
        GLOBAL_FEATURES + self.n_transformers * TRANSFORMER_FEATURES
    }

    /// Total observation length.
    pub fn len(&self) -> usize {
        self.stations_offset()
            + self.ports_per_station.len() * STATION_FEATURES
            + self.total_ports() * PORT_FEATURES
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_length() {
        let layout = ObservationLayout::new(2, vec![2, 3]);
        assert_eq!(layout.total_ports(), 5);
        assert_eq!(layout.stations_offset(), 3 + 4);
        assert_eq!(layout.len(), 3 + 4 + 2 * 3 + 5 * 5);
    }

    #[test]
    fn empty_city_has_only_global_features() {
        let layout = ObservationLayout::new(0, vec![]);
        assert_eq!(layout.len(), GLOBAL_FEATURES);
        assert!(!layout.is_empty());
    }
}
