//! Common types passed to charging stations during a step.

/// Contextual information passed to a station for one timestep.
/// # Fields
/// * `timestep` - Step index being simulated (before the clock advances)
/// * `charge_price` - Price paid per kWh charged (non-positive)
/// * `discharge_price` - Price earned per kWh discharged (non-negative)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepContext {
    pub timestep: usize,
    pub charge_price: f64,
    pub discharge_price: f64,
}

impl StepContext {
    /// Creates a new StepContext for the given timestep and prices.
    pub fn new(timestep: usize, charge_price: f64, discharge_price: f64) -> Self {
        Self {
            timestep,
            charge_price,
            discharge_price,
        }
    }
}

/// Maps a normalized port action to a power request in kW.
///
/// Actions are clamped to `[-1, 1]`; positive values scale the maximum
/// charging power, negative values the maximum discharging power.
///
/// # Arguments
///
/// * `action` - Normalized action (negative = discharge, positive = charge)
/// * `max_charge_kw` - Power at `action == 1.0`
/// * `max_discharge_kw` - Power magnitude at `action == -1.0`
pub fn action_to_power_kw(action: f64, max_charge_kw: f64, max_discharge_kw: f64) -> f64 {
    let action = action.clamp(-1.0, 1.0);
    if action >= 0.0 {
        action * max_charge_kw
    } else {
        action * max_discharge_kw
    }
}

#[cfg(test)]
mod tests {
    use super::action_to_power_kw;

    #[test]
    fn scales_by_direction() {
        assert_eq!(action_to_power_kw(0.5, 22.0, 11.0), 11.0);
        assert_eq!(action_to_power_kw(-0.5, 22.0, 11.0), -5.5);
        assert_eq!(action_to_power_kw(0.0, 22.0, 11.0), 0.0);
    }

    #[test]
    fn clamps_out_of_range_actions() {
        assert_eq!(action_to_power_kw(3.0, 22.0, 11.0), 22.0);
        assert_eq!(action_to_power_kw(-7.0, 22.0, 11.0), -11.0);
    }
}
