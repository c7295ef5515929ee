use chrono::{NaiveDateTime, TimeDelta};

/// A simulation clock that tracks the step counter and the simulated date.
///
/// Every tick advances the counter by one and the date by the timescale.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use ev_city_sim::sim::clock::SimClock;
///
/// let start = NaiveDate::from_ymd_opt(2023, 7, 21)
///     .and_then(|d| d.and_hms_opt(18, 0, 0))
///     .unwrap();
/// let mut clock = SimClock::new(start, 5, 3);
///
/// assert_eq!(clock.tick(), Some(1));
/// assert_eq!(clock.date(), start + chrono::TimeDelta::minutes(5));
/// ```
#[derive(Debug, Clone)]
pub struct SimClock {
    /// Date of step 0
    start: NaiveDateTime,
    /// Current simulated date
    date: NaiveDateTime,
    /// Minutes per step
    timescale_minutes: u32,
    /// Current step of the simulation
    current: usize,
    /// Total steps in an episode
    total: usize,
}

impl SimClock {
    /// Creates a clock at step 0.
    ///
    /// # Arguments
    ///
    /// * `start` - Simulated date of step 0
    /// * `timescale_minutes` - Minutes advanced per step
    /// * `total` - Episode length in steps
    pub fn new(start: NaiveDateTime, timescale_minutes: u32, total: usize) -> Self {
        Self {
            start,
            date: start,
            timescale_minutes,
            current: 0,
            total,
        }
    }

    /// Advances the clock by one step.
    ///
    /// # Returns
    ///
    /// * `Some(step)` - The new step number after advancing
    /// * `None` - If the clock had already reached its total steps
    pub fn tick(&mut self) -> Option<usize> {
        if self.current < self.total {
            self.current += 1;
            self.date += TimeDelta::minutes(i64::from(self.timescale_minutes));
            Some(self.current)
        } else {
            None
        }
    }

    /// Rewinds to step 0 and the start date.
    pub fn reset(&mut self) {
        self.current = 0;
        self.date = self.start;
    }

    /// Returns the current step.
    pub fn current(&self) -> usize {
        self.current
    }

    /// Returns the episode length in steps.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns `true` once every step has been taken.
    pub fn is_exhausted(&self) -> bool {
        self.current >= self.total
    }

    /// Returns the current simulated date.
    pub fn date(&self) -> NaiveDateTime {
        self.date
    }

    /// Returns the simulated date of step 0.
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }
}
