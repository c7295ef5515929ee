use super::types::StepReport;

/// Turns the outcome of one step into the scalar reward handed to the agent.
///
/// Implement this trait to experiment with reward shaping without touching
/// the engine.
pub trait RewardFunction {
    /// Computes the reward for a step that has just been applied.
    fn reward(&mut self, report: &StepReport) -> f64;
}

/// Reward equal to the signed monetary flow of the step.
///
/// Charging costs money and lowers the reward, discharging earns revenue
/// and raises it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProfitReward;

impl RewardFunction for ProfitReward {
    fn reward(&mut self, report: &StepReport) -> f64 {
        report.total_costs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn report(total_costs: f64) -> StepReport {
        StepReport {
            step: 0,
            date: NaiveDateTime::default(),
            total_costs,
            user_satisfaction: vec![],
            arrived: 0,
            departed: 0,
            parked: 0,
            transformer_power_kw: vec![],
            overloaded: false,
            reward: 0.0,
        }
    }

    #[test]
    fn profit_reward_is_total_costs() {
        let mut r = ProfitReward;
        assert_eq!(r.reward(&report(-1.25)), -1.25);
        assert_eq!(r.reward(&report(0.75)), 0.75);
    }
}
