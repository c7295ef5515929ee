use serde::{Deserialize, Serialize};

/// Physical limits shared by every EV spawned in a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvSpec {
    /// Usable battery capacity in kilowatt-hours.
    pub capacity_kwh: f64,
    /// Energy the driver expects at departure (kWh).
    pub desired_kwh: f64,
    /// Maximum charging power accepted by the vehicle (kW).
    pub max_charge_kw: f64,
    /// Maximum discharging power the vehicle can supply (kW).
    pub max_discharge_kw: f64,
}

impl Default for EvSpec {
    fn default() -> Self {
        Self {
            capacity_kwh: 50.0,
            desired_kwh: 50.0,
            max_charge_kw: 22.0,
            max_discharge_kw: 22.0,
        }
    }
}

/// A single vehicle parked at a charging station.
///
/// Tracks the dwell window, the energy stored in the battery, and the
/// cumulative energy moved in each direction while plugged in.
///
/// # Energy Convention
/// - Positive energy: charging (grid to vehicle)
/// - Negative energy: discharging (vehicle to grid)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ev {
    /// Port index at the hosting station, assigned on spawn.
    pub port: Option<usize>,
    /// Id of the station this vehicle is routed to.
    pub station: usize,
    /// Battery energy when the vehicle plugged in (kWh).
    pub arrival_kwh: f64,
    /// Current battery energy (kWh).
    pub energy_kwh: f64,
    /// Step index at which the vehicle arrives.
    pub arrival_step: usize,
    /// Earliest step index at which the vehicle leaves.
    pub departure_step: usize,
    /// Battery and power limits.
    pub spec: EvSpec,
    /// Energy charged during this dwell (kWh, non-negative).
    pub charged_kwh: f64,
    /// Energy discharged during this dwell (kWh, non-negative).
    pub discharged_kwh: f64,
    /// Signed energy moved in the most recent step (kWh).
    pub last_energy_kwh: f64,
}

impl Ev {
    /// Creates a vehicle with the given dwell window and arrival energy.
    ///
    /// # Arguments
    ///
    /// * `station` - Id of the station the vehicle is routed to
    /// * `arrival_kwh` - Battery energy at arrival (clamped to capacity)
    /// * `arrival_step` - Step at which the vehicle plugs in
    /// * `departure_step` - Earliest step at which it leaves
    /// * `spec` - Battery and power limits
    ///
    /// # Panics
    ///
    /// Panics if `arrival_step > departure_step`, the capacity is not
    /// positive, or `arrival_kwh` is negative.
    pub fn new(
        station: usize,
        arrival_kwh: f64,
        arrival_step: usize,
        departure_step: usize,
        spec: EvSpec,
    ) -> Self {
        assert!(arrival_step <= departure_step, "arrival must not follow departure");
        assert!(spec.capacity_kwh > 0.0);
        assert!(arrival_kwh >= 0.0);

        let arrival_kwh = arrival_kwh.min(spec.capacity_kwh);
        Self {
            port: None,
            station,
            arrival_kwh,
            energy_kwh: arrival_kwh,
            arrival_step,
            departure_step,
            spec,
            charged_kwh: 0.0,
            discharged_kwh: 0.0,
            last_energy_kwh: 0.0,
        }
    }

    /// Applies a power request for one step and returns the energy actually moved.
    ///
    /// The request is limited by the vehicle's power ratings and then by the
    /// battery: charging stops at capacity, discharging stops at empty.
    ///
    /// # Arguments
    ///
    /// * `power_kw` - Requested power (positive = charge, negative = discharge)
    /// * `dt_hours` - Step duration in hours
    ///
    /// # Returns
    ///
    /// Signed energy in kWh (positive = charged, negative = discharged).
    pub fn step(&mut self, power_kw: f64, dt_hours: f64) -> f64 {
        let energy = if power_kw > 0.0 {
            let requested = power_kw.min(self.spec.max_charge_kw) * dt_hours;
            let headroom = (self.spec.capacity_kwh - self.energy_kwh).max(0.0);
            let accepted = requested.min(headroom);
            self.charged_kwh += accepted;
            accepted
        } else if power_kw < 0.0 {
            let requested = (-power_kw).min(self.spec.max_discharge_kw) * dt_hours;
            let delivered = requested.min(self.energy_kwh.max(0.0));
            self.discharged_kwh += delivered;
            -delivered
        } else {
            0.0
        };

        self.energy_kwh = (self.energy_kwh + energy).clamp(0.0, self.spec.capacity_kwh);
        self.last_energy_kwh = energy;
        energy
    }

    /// Returns `true` once the vehicle may leave at `timestep`.
    pub fn is_departing(&self, timestep: usize) -> bool {
        timestep >= self.departure_step
    }

    /// Steps left until the vehicle becomes eligible to leave.
    pub fn steps_until_departure(&self, timestep: usize) -> usize {
        self.departure_step.saturating_sub(timestep)
    }

    /// State of charge as a fraction of capacity.
    pub fn soc(&self) -> f64 {
        self.energy_kwh / self.spec.capacity_kwh
    }

    /// Satisfaction score in `[0, 1]`: the share of the desired energy reached.
    ///
    /// A vehicle that reaches or exceeds its desired energy scores `1.0`.
    pub fn user_satisfaction(&self) -> f64 {
        if self.spec.desired_kwh <= 0.0 {
            return 1.0;
        }
        (self.energy_kwh / self.spec.desired_kwh).clamp(0.0, 1.0)
    }

    /// Restores the arrival state so the vehicle can be replayed.
    pub fn reset(&mut self) {
        self.port = None;
        self.energy_kwh = self.arrival_kwh;
        self.charged_kwh = 0.0;
        self.discharged_kwh = 0.0;
        self.last_energy_kwh = 0.0;
    }
}
