//! Step cycle: the phase-ordered engine loop that drives a Shoal run.
//!
//! Each time step runs through these phases:
//!
//! 1. **Migrate** -- at the start of every sub-step, stocks with a movement
//!    matrix for this step redistribute their populations across areas.
//!
//! 2. **ComputeNumbers** -- every edible stock refreshes its prey face with
//!    a population snapshot on the prey division.
//!
//! 3. **Eat** -- every fleet books its demand on every targeted prey,
//!    spread over prey lengths by suitability and biomass.
//!
//! 4. **CheckEat** -- every prey compares aggregate demand per length group
//!    against the consumption cap and caps overdrawn groups.
//!
//! 5. **AdjustEat** -- every fleet rescales its share of capped groups and
//!    commits the sub-step's consumption into the run accumulators.
//!
//! 6. **ReducePopulation** -- eaten fish leave the populations, then
//!    natural mortality thins each age class.
//!
//! Phases 2-6 repeat once per configured sub-step. After the last sub-step,
//! **Grow** applies length and weight increments, **SpecialTransactions**
//! adds scheduled recruits, and **AgeUpdate** captures and delivers
//! stock-to-stock transitions, then ages every population on the last step
//! of the year.
//!
//! Every phase is a barrier: all entities finish a phase on all areas
//! before any entity starts the next, because later phases read aggregate
//! state produced by earlier ones. The run is strictly single-threaded.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, error, info};

use shoal_pop::AgeLengthMatrix;

use crate::clock::SimClock;
use crate::config::SimulationConfig;
use crate::error::{SetupError, StepError};
use crate::fleet::Fleet;
use crate::stock::Stock;
use crate::transition::Transition;

/// Summary of one completed step, keyed by stock name.
#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    /// Calendar year of the step.
    pub year: i32,
    /// One-based step of year.
    pub step: usize,
    /// Individuals per stock, summed over areas.
    pub stock_numbers: BTreeMap<String, f64>,
    /// Biomass per stock, summed over areas.
    pub stock_biomass: BTreeMap<String, f64>,
    /// Accumulated consumed biomass per edible stock.
    pub consumed: BTreeMap<String, f64>,
    /// Accumulated overconsumed biomass per edible stock.
    pub overconsumed: BTreeMap<String, f64>,
}

/// The mutable run state passed through the step cycle.
#[derive(Debug)]
pub struct Ecosystem {
    /// The simulation clock.
    pub clock: SimClock,
    /// Ordered area names; ordinals follow this order.
    pub areas: Vec<String>,
    /// The stocks, in configuration order.
    pub stocks: Vec<Stock>,
    /// The fleets, in configuration order.
    pub fleets: Vec<Fleet>,
    /// Resolved transitions, parallel to `stocks`.
    transitions: Vec<Option<Transition>>,
    /// Stock name to ordinal lookup.
    index: BTreeMap<String, usize>,
    /// Whole-step consumption cap.
    max_ratio_consumed: f64,
}

impl Ecosystem {
    /// Builds the full run state from a validated configuration.
    ///
    /// # Errors
    ///
    /// Fails when the configuration fails validation, an entity rejects its
    /// parameters, or a transition recipient does not resolve.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, SetupError> {
        config.validate()?;
        let clock = SimClock::new(
            config.simulation.first_year,
            config.simulation.last_year,
            config.simulation.step_months.clone(),
            config.simulation.sub_steps.clone(),
        )?;
        let steps_per_year = clock.steps_per_year();

        let stocks = config
            .stocks
            .iter()
            .map(|stock| Stock::new(stock, &config.areas, steps_per_year))
            .collect::<Result<Vec<_>, _>>()?;
        let index: BTreeMap<String, usize> = stocks
            .iter()
            .enumerate()
            .map(|(i, stock)| (stock.name().to_owned(), i))
            .collect();
        let transitions = stocks
            .iter()
            .map(|stock| {
                stock
                    .transition_config()
                    .map(|transition| Transition::resolve(stock, transition, &stocks))
                    .transpose()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut fleets = config
            .fleets
            .iter()
            .map(|fleet| Fleet::new(fleet, &config.areas))
            .collect::<Result<Vec<_>, _>>()?;
        for fleet in &mut fleets {
            let targets: Vec<String> = fleet.targets().map(str::to_owned).collect();
            for name in targets {
                let stock = index
                    .get(&name)
                    .and_then(|&i| stocks.get(i))
                    .ok_or_else(|| SetupError::UnknownStock { name: name.clone() })?;
                let num_lengths = stock
                    .prey()
                    .map(shoal_dynamics::Prey::num_lengths)
                    .ok_or_else(|| SetupError::TargetNotEdible {
                        fleet: fleet.name().to_owned(),
                        name: name.clone(),
                    })?;
                fleet.register_prey(&name, num_lengths);
            }
        }

        info!(
            areas = config.areas.len(),
            stocks = stocks.len(),
            fleets = fleets.len(),
            "ecosystem built"
        );
        Ok(Self {
            clock,
            areas: config.areas.clone(),
            stocks,
            fleets,
            transitions,
            index,
            max_ratio_consumed: config.simulation.max_ratio_consumed,
        })
    }

    /// Whole-step consumption cap from the run configuration.
    #[must_use]
    pub const fn max_ratio_consumed(&self) -> f64 {
        self.max_ratio_consumed
    }
}

/// Executes one complete time step of the run.
///
/// This is the engine's main entry point. It runs every phase in order,
/// advances the clock, and returns a summary of the finished step.
///
/// # Errors
///
/// Fails when the run is already past its horizon or a phase reports a
/// defect in the run state.
pub fn run_step(eco: &mut Ecosystem) -> Result<StepSummary, StepError> {
    if eco.clock.finished() {
        return Err(StepError::PastHorizon {
            last_year: eco.clock.year(),
        });
    }
    if eco.clock.at_start() {
        phase_reset(eco);
    }

    let year = eco.clock.year();
    let step = eco.clock.step_of_year();
    let step_index = eco.clock.step_index();
    let step_size = eco.clock.step_size();
    let sub_steps = eco.clock.current_sub_steps();
    info!(year, step, sub_steps, "step started");

    phase_update_fleets(eco, year, step_index)?;

    // The cap must hold across the whole step, so each sub-step gets the
    // sub-step-count power of the configured ratio.
    let cap = eco
        .max_ratio_consumed
        .powi(i32::try_from(sub_steps).unwrap_or(i32::MAX));
    let sub_step_size = step_size / f64::from(sub_steps);
    let num_areas = eco.areas.len();

    for sub_step in 1..=sub_steps {
        debug!(sub_step, "sub-step started");
        phase_migrate(eco, step_index);
        for area in 0..num_areas {
            phase_compute_numbers(eco, area)?;
            phase_eat(eco, area, sub_step_size)?;
            phase_check_eat(eco, area, cap)?;
            phase_adjust_eat(eco, area, cap)?;
            phase_reduce_population(eco, area, sub_step_size)?;
        }
    }

    phase_grow(eco, step_size, step_index)?;
    phase_special_transactions(eco, year, step_index);
    phase_age_update(eco, step_index);

    let summary = summarize(eco, year, step)?;
    eco.clock.advance()?;
    info!(year, step, "step completed");
    Ok(summary)
}

/// Zeroes every entity and seeds the initial populations.
fn phase_reset(eco: &mut Ecosystem) {
    for stock in &mut eco.stocks {
        stock.reset();
    }
    for fleet in &mut eco.fleets {
        fleet.reset();
    }
    info!("run state reset");
}

/// Refreshes every fleet's per-area effort for this step.
fn phase_update_fleets(eco: &mut Ecosystem, year: i32, step_index: usize) -> Result<(), StepError> {
    for fleet in &mut eco.fleets {
        fleet.update_effort(year, step_index)?;
    }
    Ok(())
}

/// Applies every stock's movement matrix for this step, if any.
fn phase_migrate(eco: &mut Ecosystem, step_index: usize) {
    for stock in &mut eco.stocks {
        stock.migrate(step_index);
    }
}

/// Refreshes every edible stock's prey snapshot on one area.
fn phase_compute_numbers(eco: &mut Ecosystem, area: usize) -> Result<(), StepError> {
    for stock in &mut eco.stocks {
        if stock.lives_on(area) {
            stock.compute_numbers(area)?;
        }
    }
    Ok(())
}

/// Books every fleet's demand on every targeted prey for one area.
fn phase_eat(eco: &mut Ecosystem, area: usize, scaler: f64) -> Result<(), StepError> {
    for fleet in &mut eco.fleets {
        let targets: Vec<String> = fleet.targets().map(str::to_owned).collect();
        for name in targets {
            let Some(stock) = eco.index.get(&name).and_then(|&i| eco.stocks.get_mut(i)) else {
                continue;
            };
            if !stock.lives_on(area) {
                continue;
            }
            let Some(prey) = stock.prey_mut() else {
                continue;
            };
            fleet.eat(area, prey, scaler)?;
        }
    }
    Ok(())
}

/// Caps aggregate demand on every prey length group on one area.
fn phase_check_eat(eco: &mut Ecosystem, area: usize, cap: f64) -> Result<(), StepError> {
    for stock in &mut eco.stocks {
        if !stock.lives_on(area) {
            continue;
        }
        let name = stock.name().to_owned();
        if let Some(prey) = stock.prey_mut() {
            let capped = prey.check_consumption(area, cap)?;
            if capped {
                debug!(prey = %name, area, "consumption capped");
            }
        }
    }
    Ok(())
}

/// Rescales every fleet's share of capped groups and commits consumption.
fn phase_adjust_eat(eco: &mut Ecosystem, area: usize, cap: f64) -> Result<(), StepError> {
    for fleet in &mut eco.fleets {
        let targets: Vec<String> = fleet.targets().map(str::to_owned).collect();
        for name in targets {
            let Some(stock) = eco.index.get(&name).and_then(|&i| eco.stocks.get(i)) else {
                continue;
            };
            if !stock.lives_on(area) {
                continue;
            }
            let Some(prey) = stock.prey() else {
                continue;
            };
            fleet.adjust_and_commit(area, prey, cap)?;
        }
    }
    Ok(())
}

/// Removes eaten fish and applies natural mortality on one area.
fn phase_reduce_population(
    eco: &mut Ecosystem,
    area: usize,
    sub_step_size: f64,
) -> Result<(), StepError> {
    for stock in &mut eco.stocks {
        if stock.lives_on(area) {
            stock.reduce_population(area, sub_step_size)?;
        }
    }
    Ok(())
}

/// Runs every stock's growth pipeline on every lived area.
fn phase_grow(eco: &mut Ecosystem, step_size: f64, step_index: usize) -> Result<(), StepError> {
    let num_areas = eco.areas.len();
    for stock in &mut eco.stocks {
        for area in 0..num_areas {
            if stock.lives_on(area) {
                stock.grow(area, step_size, step_index)?;
            }
        }
    }
    Ok(())
}

/// Adds every recruitment scheduled for this year and step.
fn phase_special_transactions(eco: &mut Ecosystem, year: i32, step_index: usize) {
    for stock in &mut eco.stocks {
        stock.renew(year, step_index);
    }
}

/// Captures and delivers stock-to-stock transitions, then ages every
/// population on the last step of the year.
///
/// Capture finishes for every source before any delivery, so a stock both
/// giving and receiving fish in the same step never double-moves a group.
fn phase_age_update(eco: &mut Ecosystem, step_index: usize) {
    let num_areas = eco.areas.len();

    let mut staged: Vec<(usize, usize, AgeLengthMatrix)> = Vec::new();
    for (source_i, transition) in eco.transitions.iter().enumerate() {
        let Some(transition) = transition else {
            continue;
        };
        if !transition.fires_on(step_index) {
            continue;
        }
        let Some(source) = eco.stocks.get_mut(source_i) else {
            continue;
        };
        for area in 0..num_areas {
            if !source.lives_on(area) {
                continue;
            }
            if let Some(matrix) = source
                .population_mut(area)
                .and_then(|population| transition.capture(population))
            {
                debug!(
                    area,
                    age = transition.age(),
                    moved = matrix.total_number(),
                    "transition group captured"
                );
                staged.push((source_i, area, matrix));
            }
        }
    }

    for (source_i, area, matrix) in &staged {
        let Some(transition) = eco.transitions.get(*source_i).and_then(Option::as_ref) else {
            continue;
        };
        for recipient in transition.recipients() {
            let Some(target) = eco.stocks.get_mut(recipient.stock()) else {
                continue;
            };
            if !target.lives_on(*area) {
                error!(
                    recipient = %target.name(),
                    area,
                    dropped = matrix.total_number() * recipient.ratio(),
                    "transition recipient does not live on the delivery area, group dropped"
                );
                continue;
            }
            if let Some(population) = target.population_mut(*area) {
                population.add_remapped(matrix, recipient.conversion(), recipient.ratio());
            }
        }
    }

    if eco.clock.is_last_step_of_year() {
        for stock in &mut eco.stocks {
            stock.increment_age();
        }
        debug!("populations aged at the year boundary");
    }
}

/// Collects the step's per-stock totals and consumption figures.
fn summarize(eco: &Ecosystem, year: i32, step: usize) -> Result<StepSummary, StepError> {
    let mut stock_numbers = BTreeMap::new();
    let mut stock_biomass = BTreeMap::new();
    let mut consumed = BTreeMap::new();
    let mut overconsumed = BTreeMap::new();
    for stock in &eco.stocks {
        let mut number = 0.0;
        let mut biomass = 0.0;
        for &area in stock.areas() {
            number += stock.total_number(area);
            biomass += stock.total_biomass(area);
        }
        stock_numbers.insert(stock.name().to_owned(), number);
        stock_biomass.insert(stock.name().to_owned(), biomass);
        if let Some(prey) = stock.prey() {
            let mut eaten = 0.0;
            let mut over = 0.0;
            for &area in stock.areas() {
                eaten += prey.total_consumption(area)?.iter().sum::<f64>();
                over += prey.total_overconsumption(area)?.iter().sum::<f64>();
            }
            consumed.insert(stock.name().to_owned(), eaten);
            overconsumed.insert(stock.name().to_owned(), over);
        }
    }
    Ok(StepSummary {
        year,
        step,
        stock_numbers,
        stock_biomass,
        consumed,
        overconsumed,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn two_stock_yaml() -> &'static str {
        r"
simulation:
  first_year: 2000
  last_year: 2000
  step_months: [3, 3, 3, 3]
  sub_steps: [1, 1, 1, 1]
  max_ratio_consumed: 0.95
areas: [north]
stocks:
  - name: young
    min_age: 1
    max_age: 3
    lengths: { min: 10.0, max: 50.0, width: 10.0 }
    length_weight: { coefficient: 1.0e-5, exponent: 3.0 }
    growth:
      function: { function: von_bertalanffy, l_infinity: 60.0, kappa: 0.2 }
      kernel: { kind: beta_binomial, max_jump: 2, beta: 0.7 }
    initial:
      - { area: north, age: 3, number: 500.0, mean_length: 30.0, sd: 4.0 }
    transition:
      step: 2
      age: 3
      to:
        - { stock: old, ratio: 1.0 }
  - name: old
    min_age: 3
    max_age: 6
    lengths: { min: 10.0, max: 50.0, width: 10.0 }
    length_weight: { coefficient: 1.0e-5, exponent: 3.0 }
    growth:
      function: { function: von_bertalanffy, l_infinity: 60.0, kappa: 0.2 }
      kernel: { kind: beta_binomial, max_jump: 2, beta: 0.7 }
"
    }

    #[test]
    fn transitions_move_the_age_group_between_stocks() {
        let config = SimulationConfig::parse(two_stock_yaml()).unwrap();
        let mut eco = Ecosystem::from_config(&config).unwrap();

        let first = run_step(&mut eco).unwrap();
        assert!((first.stock_numbers["young"] - 500.0).abs() < 1e-6);
        assert!(first.stock_numbers["old"].abs() < 1e-12);

        let second = run_step(&mut eco).unwrap();
        assert!(second.stock_numbers["young"].abs() < 1e-9);
        assert!((second.stock_numbers["old"] - 500.0).abs() < 1e-6);
    }

    #[test]
    fn the_run_ends_at_the_configured_horizon() {
        let config = SimulationConfig::parse(two_stock_yaml()).unwrap();
        let mut eco = Ecosystem::from_config(&config).unwrap();
        for _ in 0..4 {
            run_step(&mut eco).unwrap();
        }
        assert!(eco.clock.finished());
        assert!(matches!(
            run_step(&mut eco),
            Err(StepError::PastHorizon { .. })
        ));
    }

    #[test]
    fn aging_happens_once_at_the_year_boundary() {
        let yaml = two_stock_yaml().replace("last_year: 2000", "last_year: 2001");
        let config = SimulationConfig::parse(&yaml).unwrap();
        let mut eco = Ecosystem::from_config(&config).unwrap();

        // Steps 1 and 2: the age-3 group transitions into `old` at step 2.
        run_step(&mut eco).unwrap();
        run_step(&mut eco).unwrap();
        let old = &eco.stocks[1];
        let at_three: f64 = old
            .population(0)
            .unwrap()
            .row(3)
            .map(|row| row.total_number())
            .unwrap();
        assert!((at_three - 500.0).abs() < 1e-6);

        // Steps 3 and 4: nobody ages until the year closes.
        run_step(&mut eco).unwrap();
        run_step(&mut eco).unwrap();
        let old = &eco.stocks[1];
        let aged: f64 = old
            .population(0)
            .unwrap()
            .row(4)
            .map(|row| row.total_number())
            .unwrap();
        assert!((aged - 500.0).abs() < 1e-6);
        assert!(old.population(0).unwrap().row(3).unwrap().total_number() < 1e-9);
    }
}
