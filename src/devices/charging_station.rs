use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::devices::ev::Ev;
use crate::devices::types::{StepContext, action_to_power_kw};
use crate::error::CapacityError;

/// Number of station-level entries at the start of [`ChargingStation::get_state`].
pub const STATION_FEATURES: usize = 3;

/// Number of entries per port in [`ChargingStation::get_state`].
pub const PORT_FEATURES: usize = 5;

/// Static description of a charging station, persisted in replays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationSpec {
    /// Station id, equal to its index in the engine's station list.
    pub id: usize,
    /// Number of ports (maximum simultaneously connected EVs).
    pub n_ports: usize,
    /// Id of the transformer this station reports power to.
    pub transformer: usize,
    /// Grid bus the station is attached to, when the grid is simulated.
    pub bus: Option<usize>,
    /// Maximum charging power per port (kW).
    pub max_charge_kw: f64,
    /// Maximum discharging power per port (kW).
    pub max_discharge_kw: f64,
}

/// Outcome of one station step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationStepReport {
    /// Signed monetary flow of the step: non-positive for charging,
    /// non-negative for discharging.
    pub costs: f64,
    /// Satisfaction scores of the EVs that departed this step.
    pub user_satisfaction: Vec<f64>,
    /// Signed power delivered through all ports (kW).
    pub power_kw: f64,
}

/// A charging station with a fixed number of ports.
///
/// The station is the sole owner of the EVs plugged into its ports. Each
/// step it converts normalized port actions into power, moves energy in
/// and out of the connected batteries, prices that energy, and evicts
/// vehicles whose dwell window has ended.
///
/// # Power Flow Convention (Transformer)
/// - Positive power: charging (load on the transformer)
/// - Negative power: discharging (generation on the transformer)
#[derive(Debug, Clone)]
pub struct ChargingStation {
    spec: StationSpec,
    dt_hours: f64,
    verbose: bool,
    ports: Vec<Option<Ev>>,
    port_profits: Vec<f64>,
    current_step: usize,
    current_power_output: f64,
    current_charge_price: f64,
    current_discharge_price: f64,

    /// Number of EVs that completed their dwell here.
    pub total_evs_served: usize,
    /// Energy charged into departed EVs (kWh).
    pub total_energy_charged: f64,
    /// Energy discharged from departed EVs (kWh).
    pub total_energy_discharged: f64,
    /// Net monetary flow accrued by departed EVs.
    pub total_profits: f64,
    /// Sum of satisfaction scores of departed EVs.
    pub total_user_satisfaction: f64,
}

impl ChargingStation {
    /// Creates an empty station.
    ///
    /// # Arguments
    ///
    /// * `spec` - Station identity, port count and power limits
    /// * `timescale_minutes` - Duration of one step in minutes
    /// * `verbose` - Emit per-port debug events every step
    ///
    /// # Panics
    ///
    /// Panics if the station has no ports or the timescale is zero.
    pub fn new(spec: StationSpec, timescale_minutes: u32, verbose: bool) -> Self {
        assert!(spec.n_ports > 0, "a station needs at least one port");
        assert!(timescale_minutes > 0);

        Self {
            spec,
            dt_hours: f64::from(timescale_minutes) / 60.0,
            verbose,
            ports: vec![None; spec.n_ports],
            port_profits: vec![0.0; spec.n_ports],
            current_step: 0,
            current_power_output: 0.0,
            current_charge_price: 0.0,
            current_discharge_price: 0.0,
            total_evs_served: 0,
            total_energy_charged: 0.0,
            total_energy_discharged: 0.0,
            total_profits: 0.0,
            total_user_satisfaction: 0.0,
        }
    }

    /// Applies one action per port, then evicts EVs whose departure step is reached.
    ///
    /// Empty ports ignore their action. After this call the station's clock
    /// reads `context.timestep + 1`; an EV leaves when that time is at or past
    /// its departure step.
    ///
    /// # Arguments
    ///
    /// * `actions` - One normalized action in `[-1, 1]` per port
    /// * `context` - Timestep and the prices in force for it
    ///
    /// # Returns
    ///
    /// The step's signed costs, departures' satisfaction scores, and power.
    pub fn step(&mut self, actions: &[f64], context: &StepContext) -> StationStepReport {
        debug_assert_eq!(actions.len(), self.spec.n_ports);

        self.current_charge_price = context.charge_price;
        self.current_discharge_price = context.discharge_price;

        let mut report = StationStepReport::default();

        for (port, (slot, &action)) in self.ports.iter_mut().zip(actions).enumerate() {
            let Some(ev) = slot else {
                continue;
            };

            let power_kw =
                action_to_power_kw(action, self.spec.max_charge_kw, self.spec.max_discharge_kw);
            let energy_kwh = ev.step(power_kw, self.dt_hours);

            let costs = if energy_kwh >= 0.0 {
                energy_kwh * context.charge_price
            } else {
                -energy_kwh * context.discharge_price
            };

            self.port_profits[port] += costs;
            report.costs += costs;
            report.power_kw += energy_kwh / self.dt_hours;
        }

        self.current_step = context.timestep + 1;
        self.current_power_output = report.power_kw;

        for port in 0..self.ports.len() {
            let departing = self.ports[port]
                .as_ref()
                .is_some_and(|ev| ev.is_departing(self.current_step));
            if !departing {
                continue;
            }
            if let Some(ev) = self.ports[port].take() {
                let score = ev.user_satisfaction();
                self.total_evs_served += 1;
                self.total_energy_charged += ev.charged_kwh;
                self.total_energy_discharged += ev.discharged_kwh;
                self.total_profits += self.port_profits[port];
                self.total_user_satisfaction += score;
                self.port_profits[port] = 0.0;
                report.user_satisfaction.push(score);
            }
        }

        if self.verbose {
            self.trace_ports();
        }

        report
    }

    /// Plugs an EV into the first free port.
    ///
    /// # Errors
    ///
    /// Returns a `CapacityError` if every port is occupied.
    pub fn spawn_ev(&mut self, mut ev: Ev) -> Result<usize, CapacityError> {
        debug_assert_eq!(ev.station, self.spec.id);

        let port = self
            .ports
            .iter()
            .position(Option::is_none)
            .ok_or(CapacityError {
                station: self.spec.id,
                n_ports: self.spec.n_ports,
            })?;

        ev.port = Some(port);
        self.ports[port] = Some(ev);
        self.port_profits[port] = 0.0;
        Ok(port)
    }

    /// Empties every port and zeros all cumulative totals.
    pub fn reset(&mut self) {
        self.ports.iter_mut().for_each(|slot| *slot = None);
        self.port_profits.iter_mut().for_each(|p| *p = 0.0);
        self.current_step = 0;
        self.current_power_output = 0.0;
        self.current_charge_price = 0.0;
        self.current_discharge_price = 0.0;
        self.total_evs_served = 0;
        self.total_energy_charged = 0.0;
        self.total_energy_discharged = 0.0;
        self.total_profits = 0.0;
        self.total_user_satisfaction = 0.0;
    }

    /// Returns the fixed-shape numeric summary of this station.
    ///
    /// Layout: `[power_kw, charge_price, discharge_price]` followed by
    /// `[occupied, energy_kwh, soc, steps_until_departure, last_energy_kwh]`
    /// for each port (zeros for empty ports).
    pub fn get_state(&self) -> Vec<f64> {
        let mut state = Vec::with_capacity(self.state_len());
        self.write_state(&mut state);
        state
    }

    /// Appends [`get_state`](Self::get_state) to `out` without allocating.
    pub fn write_state(&self, out: &mut Vec<f64>) {
        out.push(self.current_power_output);
        out.push(self.current_charge_price);
        out.push(self.current_discharge_price);

        for slot in &self.ports {
            match slot {
                Some(ev) => out.extend_from_slice(&[
                    1.0,
                    ev.energy_kwh,
                    ev.soc(),
                    ev.steps_until_departure(self.current_step) as f64,
                    ev.last_energy_kwh,
                ]),
                None => out.extend_from_slice(&[0.0; PORT_FEATURES]),
            }
        }
    }

    /// Length of the vector produced by [`get_state`](Self::get_state).
    pub fn state_len(&self) -> usize {
        STATION_FEATURES + self.spec.n_ports * PORT_FEATURES
    }

    pub fn id(&self) -> usize {
        self.spec.id
    }

    pub fn n_ports(&self) -> usize {
        self.spec.n_ports
    }

    /// Id of the transformer this station feeds.
    pub fn transformer(&self) -> usize {
        self.spec.transformer
    }

    pub fn spec(&self) -> &StationSpec {
        &self.spec
    }

    /// Signed power delivered in the last step (kW).
    pub fn current_power_output(&self) -> f64 {
        self.current_power_output
    }

    /// Number of occupied ports.
    pub fn n_evs_connected(&self) -> usize {
        self.ports.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn has_free_port(&self) -> bool {
        self.n_evs_connected() < self.spec.n_ports
    }

    /// Iterates over `(port, ev)` for every occupied port.
    pub fn evs(&self) -> impl Iterator<Item = (usize, &Ev)> {
        self.ports
            .iter()
            .enumerate()
            .filter_map(|(port, slot)| slot.as_ref().map(|ev| (port, ev)))
    }

    /// Mean satisfaction of the EVs served so far, `0.0` if none.
    pub fn avg_user_satisfaction(&self) -> f64 {
        if self.total_evs_served == 0 {
            0.0
        } else {
            self.total_user_satisfaction / self.total_evs_served as f64
        }
    }

    fn trace_ports(&self) {
        debug!(
            station = self.spec.id,
            power_kw = self.current_power_output,
            charge_price = self.current_charge_price,
            discharge_price = self.current_discharge_price,
            evs_served = self.total_evs_served,
            profits = self.total_profits,
            "charging station"
        );
        for (port, ev) in self.evs() {
            debug!(
                station = self.spec.id,
                port,
                energy_kwh = ev.energy_kwh,
                soc = ev.soc(),
                departure_step = ev.departure_step,
                "port"
            );
        }
    }
}
