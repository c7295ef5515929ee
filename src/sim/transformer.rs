use serde::{Deserialize, Serialize};

/// Static description of a transformer, persisted in replays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerSpec {
    /// Transformer id, equal to its index in the engine's list.
    pub id: usize,
    /// Ids of the stations feeding this transformer.
    pub station_ids: Vec<usize>,
    /// Rated capacity in kW.
    pub max_power_kw: f64,
}

/// A transformer that aggregates the power of its stations for one step.
///
/// Net power convention:
/// - Positive values are load (EVs charging)
/// - Negative values are generation (EVs discharging)
#[derive(Debug, Clone)]
pub struct Transformer {
    spec: TransformerSpec,
    current_power: f64,
}

impl Transformer {
    /// Creates a transformer with no accumulated power.
    ///
    /// # Panics
    ///
    /// Panics if `max_power_kw` is negative.
    pub fn new(spec: TransformerSpec) -> Self {
        assert!(spec.max_power_kw >= 0.0);

        Self {
            spec,
            current_power: 0.0,
        }
    }

    /// Resets accumulated power to zero.
    pub fn reset(&mut self) {
        self.current_power = 0.0;
    }

    /// Adds one station's reported power output.
    pub fn step(&mut self, station_power_kw: f64) {
        self.current_power += station_power_kw;
    }

    /// Returns the power accumulated this step in kW.
    pub fn current_power(&self) -> f64 {
        self.current_power
    }

    /// Returns the rated capacity in kW.
    pub fn max_power_kw(&self) -> f64 {
        self.spec.max_power_kw
    }

    /// Returns `true` when accumulated power exceeds the rated capacity.
    pub fn is_overloaded(&self) -> bool {
        self.current_power > self.spec.max_power_kw
    }

    /// Returns `[current_power, max_power]` for the observation.
    pub fn get_state(&self) -> [f64; 2] {
        [self.current_power, self.spec.max_power_kw]
    }

    pub fn id(&self) -> usize {
        self.spec.id
    }

    /// Ids of the stations assigned to this transformer.
    pub fn station_ids(&self) -> &[usize] {
        &self.spec.station_ids
    }

    pub fn spec(&self) -> &TransformerSpec {
        &self.spec
    }
}
