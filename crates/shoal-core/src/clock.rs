//! Simulation clock for the Shoal simulation.
//!
//! The clock is the single source of truth for temporal state. It tracks a
//! 1-based step counter across the whole horizon; calendar year, step of
//! year, step length and sub-step count are all derived from the counter and
//! the configured calendar, never stored independently.
//!
//! A year is divided into steps whose lengths are given in months and must
//! sum to twelve; each step may be split into equal sub-steps for the
//! consumption loop. All derivations use checked arithmetic.

/// Months in a simulation year.
const MONTHS_PER_YEAR: u32 = 12;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// The step counter would overflow.
    #[error("step counter overflow: cannot advance beyond u64::MAX")]
    StepOverflow,

    /// Invalid calendar configuration.
    #[error("invalid calendar: {reason}")]
    InvalidCalendar {
        /// Explanation of what is wrong with the calendar.
        reason: String,
    },
}

/// Clock tracking the simulation's position in its horizon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimClock {
    /// First simulated calendar year.
    first_year: i32,
    /// Last simulated calendar year, inclusive.
    last_year: i32,
    /// Step lengths in months, one per step of year; sums to twelve.
    step_months: Vec<u32>,
    /// Sub-step count per step of year, each at least one.
    sub_steps: Vec<u32>,
    /// Total number of steps in the horizon.
    total_steps: u64,
    /// Current step, 1-based; `total_steps + 1` once the horizon is done.
    current_time: u64,
}

impl SimClock {
    /// Builds a clock from the calendar parameters.
    ///
    /// The clock starts positioned on the first step of the first year.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidCalendar`] when the years are reversed,
    /// the step lengths do not sum to twelve months, or any step has zero
    /// months or zero sub-steps.
    pub fn new(
        first_year: i32,
        last_year: i32,
        step_months: Vec<u32>,
        sub_steps: Vec<u32>,
    ) -> Result<Self, ClockError> {
        if last_year < first_year {
            return Err(ClockError::InvalidCalendar {
                reason: format!("last year {last_year} precedes first year {first_year}"),
            });
        }
        if step_months.is_empty() {
            return Err(ClockError::InvalidCalendar {
                reason: "at least one step per year must be configured".to_owned(),
            });
        }
        if step_months.iter().any(|&months| months == 0) {
            return Err(ClockError::InvalidCalendar {
                reason: "every step must span at least one month".to_owned(),
            });
        }
        let total_months: u32 = step_months.iter().sum();
        if total_months != MONTHS_PER_YEAR {
            return Err(ClockError::InvalidCalendar {
                reason: format!("step lengths sum to {total_months} months, expected 12"),
            });
        }
        if sub_steps.len() != step_months.len() {
            return Err(ClockError::InvalidCalendar {
                reason: format!(
                    "{} sub-step counts for {} steps",
                    sub_steps.len(),
                    step_months.len()
                ),
            });
        }
        if sub_steps.iter().any(|&n| n == 0) {
            return Err(ClockError::InvalidCalendar {
                reason: "every step needs at least one sub-step".to_owned(),
            });
        }

        let years = i64::from(last_year)
            .saturating_sub(i64::from(first_year))
            .saturating_add(1);
        let years = u64::try_from(years).map_err(|_err| ClockError::InvalidCalendar {
            reason: "year span exceeds u64 range".to_owned(),
        })?;
        let steps_per_year = step_months.len() as u64;
        let total_steps =
            years
                .checked_mul(steps_per_year)
                .ok_or_else(|| ClockError::InvalidCalendar {
                    reason: "total step count overflows u64".to_owned(),
                })?;

        Ok(Self {
            first_year,
            last_year,
            step_months,
            sub_steps,
            total_steps,
            current_time: 1,
        })
    }

    /// Advances to the next step.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::StepOverflow`] if the counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<(), ClockError> {
        self.current_time = self
            .current_time
            .checked_add(1)
            .ok_or(ClockError::StepOverflow)?;
        Ok(())
    }

    /// Current step number across the whole horizon, 1-based.
    pub const fn current_time(&self) -> u64 {
        self.current_time
    }

    /// Whether the clock sits on the very first step of the run.
    pub const fn at_start(&self) -> bool {
        self.current_time == 1
    }

    /// Whether the horizon has been stepped past.
    pub const fn finished(&self) -> bool {
        self.current_time > self.total_steps
    }

    /// Total number of steps in the horizon.
    pub const fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Number of steps in one year.
    pub fn steps_per_year(&self) -> usize {
        self.step_months.len()
    }

    /// Zero-based step within the current year, for table indexing.
    pub fn step_index(&self) -> usize {
        let per_year = self.step_months.len().max(1) as u64;
        let raw = self
            .current_time
            .saturating_sub(1)
            .checked_rem(per_year)
            .unwrap_or(0);
        usize::try_from(raw).unwrap_or(0)
    }

    /// One-based step within the current year, for configuration matching
    /// and logs.
    pub fn step_of_year(&self) -> usize {
        self.step_index().saturating_add(1)
    }

    /// Calendar year the current step falls in.
    pub fn year(&self) -> i32 {
        let per_year = self.step_months.len().max(1) as u64;
        let elapsed = self
            .current_time
            .saturating_sub(1)
            .checked_div(per_year)
            .unwrap_or(0);
        let year = i64::from(self.first_year).saturating_add(i64::try_from(elapsed).unwrap_or(0));
        i32::try_from(year).unwrap_or(self.last_year)
    }

    /// Whether the current step is the first of its year.
    pub fn is_first_step_of_year(&self) -> bool {
        self.step_index() == 0
    }

    /// Whether the current step is the last of its year.
    pub fn is_last_step_of_year(&self) -> bool {
        self.step_of_year() == self.step_months.len()
    }

    /// Length of the current step as a fraction of a year.
    pub fn step_size(&self) -> f64 {
        let months = self
            .step_months
            .get(self.step_index())
            .copied()
            .unwrap_or(MONTHS_PER_YEAR);
        f64::from(months) / f64::from(MONTHS_PER_YEAR)
    }

    /// Number of sub-steps in the current step.
    pub fn current_sub_steps(&self) -> u32 {
        self.sub_steps.get(self.step_index()).copied().unwrap_or(1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    fn make_clock() -> SimClock {
        SimClock::new(2000, 2001, vec![3, 3, 3, 3], vec![1, 1, 2, 1]).unwrap()
    }

    #[test]
    fn calendar_is_validated() {
        assert!(SimClock::new(2001, 2000, vec![12], vec![1]).is_err());
        assert!(SimClock::new(2000, 2001, vec![], vec![]).is_err());
        assert!(SimClock::new(2000, 2001, vec![6, 5], vec![1, 1]).is_err());
        assert!(SimClock::new(2000, 2001, vec![6, 0, 6], vec![1, 1, 1]).is_err());
        assert!(SimClock::new(2000, 2001, vec![6, 6], vec![1]).is_err());
        assert!(SimClock::new(2000, 2001, vec![6, 6], vec![1, 0]).is_err());
    }

    #[test]
    fn horizon_covers_every_step_once() {
        let mut clock = make_clock();
        assert_eq!(clock.total_steps(), 8);
        assert!(clock.at_start());
        let mut seen = 0;
        while !clock.finished() {
            seen += 1;
            clock.advance().unwrap();
        }
        assert_eq!(seen, 8);
        assert!(!clock.at_start());
    }

    #[test]
    fn year_and_step_derive_from_the_counter() {
        let mut clock = make_clock();
        assert_eq!(clock.year(), 2000);
        assert_eq!(clock.step_of_year(), 1);
        assert!(clock.is_first_step_of_year());
        for _ in 0..4 {
            clock.advance().unwrap();
        }
        assert_eq!(clock.year(), 2001);
        assert_eq!(clock.step_index(), 0);
        for _ in 0..3 {
            clock.advance().unwrap();
        }
        assert_eq!(clock.step_of_year(), 4);
        assert!(clock.is_last_step_of_year());
    }

    #[test]
    fn step_size_follows_the_month_table() {
        let clock = SimClock::new(2000, 2000, vec![2, 4, 6], vec![1, 3, 1]).unwrap();
        assert!((clock.step_size() - 2.0 / 12.0).abs() < 1e-12);
        let mut clock = clock;
        clock.advance().unwrap();
        assert!((clock.step_size() - 4.0 / 12.0).abs() < 1e-12);
        assert_eq!(clock.current_sub_steps(), 3);
    }
}
