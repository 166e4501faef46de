//! A simulated stock: per-area populations plus the biology acting on them.
//!
//! Each stock owns one age-length matrix per area, a growth pipeline, an
//! optional prey face for fleets to eat through, per-age natural mortality,
//! and its seeding and movement rules. The ecosystem scheduler drives these
//! pieces phase by phase; the stock itself never reorders them.

use tracing::{debug, warn};

use shoal_dynamics::{
    BetaBinomialKernel, DynamicsError, EmpiricalKernel, Grower, GrowthKernel, LengthWeight, Prey,
};
use shoal_pop::{AgeLengthMatrix, LengthDivision, PopCell, VERY_SMALL};

use crate::config::{KernelConfig, StockConfig, TransitionConfig};
use crate::error::{SetupError, StepError};
use crate::migration::Migration;

/// Tolerance for matching a configured length to a group boundary.
const BOUNDARY_TOLERANCE: f64 = 1e-6;

/// One cohort injection: where, which age, how many, and how lengths spread.
#[derive(Debug, Clone)]
struct Seeding {
    area: usize,
    age: usize,
    number: f64,
    mean_length: f64,
    sd: f64,
}

/// A seeding scheduled for a specific year and step.
#[derive(Debug, Clone)]
struct Renewal {
    year: i32,
    step_index: usize,
    seeding: Seeding,
}

/// A stock and everything that acts on its population.
#[derive(Debug)]
pub struct Stock {
    name: String,
    division: LengthDivision,
    min_age: usize,
    max_age: usize,
    /// Lived global area ordinals, in configured order.
    areas: Vec<usize>,
    /// Global area mask derived from `areas`.
    lives_on: Vec<bool>,
    /// Per-global-area populations; areas outside `areas` stay empty.
    alkeys: Vec<AgeLengthMatrix>,
    grower: Grower,
    prey: Option<Prey>,
    relation: LengthWeight,
    natural_mortality: Vec<f64>,
    survival: Vec<f64>,
    initials: Vec<Seeding>,
    renewals: Vec<Renewal>,
    transition: Option<TransitionConfig>,
    migration: Migration,
}

impl Stock {
    /// Builds a stock from validated configuration.
    ///
    /// # Errors
    ///
    /// Fails when a division cannot be built, an age window does not sit on
    /// group boundaries, an area name does not resolve, or the growth
    /// pipeline rejects its parameters.
    pub fn new(
        config: &StockConfig,
        run_areas: &[String],
        steps_per_year: usize,
    ) -> Result<Self, SetupError> {
        let division =
            LengthDivision::uniform(config.lengths.min, config.lengths.max, config.lengths.width)?;
        let num_lengths = division.num_groups();
        let num_ages = config
            .max_age
            .saturating_sub(config.min_age)
            .saturating_add(1);

        let mut windows = vec![(0, num_lengths); num_ages];
        for window in &config.age_windows {
            let start = boundary_index(&division, window.min_length).ok_or_else(|| {
                SetupError::MisalignedWindow {
                    stock: config.name.clone(),
                    age: window.age,
                    length: window.min_length,
                }
            })?;
            let end = boundary_index(&division, window.max_length).ok_or_else(|| {
                SetupError::MisalignedWindow {
                    stock: config.name.clone(),
                    age: window.age,
                    length: window.max_length,
                }
            })?;
            if let Some(slot) = windows.get_mut(window.age.saturating_sub(config.min_age)) {
                *slot = (start, end);
            }
        }

        let num_global = run_areas.len();
        let areas: Vec<usize> = if config.areas.is_empty() {
            (0..num_global).collect()
        } else {
            config
                .areas
                .iter()
                .map(|name| resolve_area(name, run_areas))
                .collect::<Result<_, _>>()?
        };
        let mut lives_on = vec![false; num_global];
        for &area in &areas {
            if let Some(flag) = lives_on.get_mut(area) {
                *flag = true;
            }
        }

        let alkeys = (0..num_global)
            .map(|_| AgeLengthMatrix::new(config.min_age, config.max_age, &windows, num_lengths))
            .collect::<Result<Vec<_>, _>>()?;

        let kernel = match &config.growth.kernel {
            KernelConfig::BetaBinomial {
                max_jump,
                power,
                beta,
            } => GrowthKernel::BetaBinomial(BetaBinomialKernel::new(*max_jump, *power, *beta)?),
            KernelConfig::Empirical { probabilities } => {
                GrowthKernel::Empirical(EmpiricalKernel::new(probabilities.clone())?)
            }
        };
        let calc_division = match &config.growth.calc_lengths {
            Some(range) => LengthDivision::uniform(range.min, range.max, range.width)?,
            None => division.clone(),
        };
        let grower = Grower::new(
            &config.name,
            &calc_division,
            &division,
            config.growth.function.clone(),
            config.length_weight.clone(),
            kernel,
            num_global,
            steps_per_year,
        )?;

        let prey = match &config.prey {
            Some(prey_config) => {
                let prey_division = match &prey_config.lengths {
                    Some(range) => LengthDivision::uniform(range.min, range.max, range.width)?,
                    None => division.clone(),
                };
                Some(Prey::new(
                    &config.name,
                    prey_division,
                    &division,
                    num_global,
                )?)
            }
            None => None,
        };

        let natural_mortality = if config.natural_mortality.is_empty() {
            vec![0.0; num_ages]
        } else {
            config.natural_mortality.clone()
        };

        let initials = config
            .initial
            .iter()
            .map(|seed| {
                Ok(Seeding {
                    area: resolve_area(&seed.area, run_areas)?,
                    age: seed.age,
                    number: seed.number,
                    mean_length: seed.mean_length,
                    sd: seed.sd,
                })
            })
            .collect::<Result<Vec<_>, SetupError>>()?;
        let renewals = config
            .renewal
            .iter()
            .map(|renewal| {
                Ok(Renewal {
                    year: renewal.year,
                    step_index: renewal.step.saturating_sub(1),
                    seeding: Seeding {
                        area: resolve_area(&renewal.area, run_areas)?,
                        age: renewal.age,
                        number: renewal.number,
                        mean_length: renewal.mean_length,
                        sd: renewal.sd,
                    },
                })
            })
            .collect::<Result<Vec<_>, SetupError>>()?;

        Ok(Self {
            name: config.name.clone(),
            division,
            min_age: config.min_age,
            max_age: config.max_age,
            areas,
            lives_on,
            alkeys,
            grower,
            prey,
            relation: config.length_weight.clone(),
            natural_mortality,
            survival: vec![1.0; num_ages],
            initials,
            renewals,
            transition: config.transition.clone(),
            migration: Migration::new(&config.migration, steps_per_year),
        })
    }

    /// Stock name, unique across the run.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stock's own length division.
    #[must_use]
    pub const fn division(&self) -> &LengthDivision {
        &self.division
    }

    /// Youngest tracked age.
    #[must_use]
    pub const fn min_age(&self) -> usize {
        self.min_age
    }

    /// Oldest tracked age.
    #[must_use]
    pub const fn max_age(&self) -> usize {
        self.max_age
    }

    /// Lived global area ordinals, in configured order.
    #[must_use]
    pub fn areas(&self) -> &[usize] {
        &self.areas
    }

    /// Whether the stock lives on a global area.
    #[must_use]
    pub fn lives_on(&self, area: usize) -> bool {
        self.lives_on.get(area).copied().unwrap_or(false)
    }

    /// The population on one global area.
    #[must_use]
    pub fn population(&self, area: usize) -> Option<&AgeLengthMatrix> {
        self.alkeys.get(area)
    }

    /// Mutable population access, used for transition delivery.
    pub fn population_mut(&mut self, area: usize) -> Option<&mut AgeLengthMatrix> {
        self.alkeys.get_mut(area)
    }

    /// Whether any fleet can eat this stock.
    #[must_use]
    pub const fn is_eaten(&self) -> bool {
        self.prey.is_some()
    }

    /// The prey face, when the stock is edible.
    #[must_use]
    pub const fn prey(&self) -> Option<&Prey> {
        self.prey.as_ref()
    }

    /// Mutable prey face, used by the eat cycle.
    pub const fn prey_mut(&mut self) -> Option<&mut Prey> {
        self.prey.as_mut()
    }

    /// The transition rule, when the stock matures into others.
    #[must_use]
    pub const fn transition_config(&self) -> Option<&TransitionConfig> {
        self.transition.as_ref()
    }

    /// Zeroes all state and seeds the initial populations.
    pub fn reset(&mut self) {
        for population in &mut self.alkeys {
            population.zero();
        }
        self.grower.reset();
        if let Some(prey) = &mut self.prey {
            prey.reset();
        }
        for seeding in &self.initials {
            seed_cohort(&mut self.alkeys, &self.division, &self.relation, seeding);
        }
        debug!(stock = %self.name, cohorts = self.initials.len(), "stock reset and seeded");
    }

    /// Adds every renewal scheduled for the given year and step of year.
    pub fn renew(&mut self, year: i32, step_index: usize) {
        for renewal in &self.renewals {
            if renewal.year != year || renewal.step_index != step_index {
                continue;
            }
            seed_cohort(
                &mut self.alkeys,
                &self.division,
                &self.relation,
                &renewal.seeding,
            );
            debug!(
                stock = %self.name,
                year,
                step = step_index.saturating_add(1),
                number = renewal.seeding.number,
                "recruits added"
            );
        }
    }

    /// Moves fish between lived areas using the matrix for this step of
    /// year, if any.
    pub fn migrate(&mut self, step_index: usize) {
        self.migration
            .apply(step_index, &self.areas, &mut self.alkeys);
    }

    /// Refreshes the prey face's population snapshot for one area.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range.
    pub fn compute_numbers(&mut self, area: usize) -> Result<(), StepError> {
        let num_areas = self.alkeys.len();
        if let Some(prey) = &mut self.prey {
            let population = self
                .alkeys
                .get(area)
                .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
            prey.sum(area, population)?;
        }
        Ok(())
    }

    /// Removes eaten fish and applies natural mortality for one sub-step.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range or the survival factors do not
    /// match the population shape.
    pub fn reduce_population(&mut self, area: usize, sub_step_size: f64) -> Result<(), StepError> {
        let num_areas = self.alkeys.len();
        if let Some(prey) = &mut self.prey {
            prey.update_reduction_factors(area)?;
        }
        if let Some(prey) = &self.prey {
            let population = self
                .alkeys
                .get_mut(area)
                .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
            population.multiply_count_by_length(prey.reduction_factors(area)?, prey.conversion())?;
        }
        for (slot, rate) in self.survival.iter_mut().zip(&self.natural_mortality) {
            *slot = (-rate * sub_step_size).exp();
        }
        self.alkeys
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?
            .multiply_by_age(&self.survival)?;
        Ok(())
    }

    /// Runs the growth pipeline and applies the increments for one area.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range or the growth matrices do not
    /// match the population shape.
    pub fn grow(&mut self, area: usize, step_size: f64, step_index: usize) -> Result<(), StepError> {
        self.grower.calculate(area, step_size, step_index)?;
        self.grower.implement(area)?;
        let num_areas = self.alkeys.len();
        let population = self
            .alkeys
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        population.grow(
            self.grower.length_matrix(area)?,
            self.grower.weight_matrix(area)?,
        )?;
        Ok(())
    }

    /// Shifts every lived area's population one age up, with a plus group
    /// at the oldest age.
    pub fn increment_age(&mut self) {
        for population in &mut self.alkeys {
            population.increment_age();
        }
    }

    /// Total number of individuals on one area.
    #[must_use]
    pub fn total_number(&self, area: usize) -> f64 {
        self.alkeys
            .get(area)
            .map_or(0.0, AgeLengthMatrix::total_number)
    }

    /// Total biomass on one area.
    #[must_use]
    pub fn total_biomass(&self, area: usize) -> f64 {
        self.alkeys
            .get(area)
            .map_or(0.0, AgeLengthMatrix::total_biomass)
    }
}

/// Maps a configured length to the index of the matching group boundary,
/// `0..=num_groups`, or `None` when no boundary is close enough.
fn boundary_index(division: &LengthDivision, length: f64) -> Option<usize> {
    let groups = division.num_groups();
    for i in 0..groups {
        if let Some(bound) = division.lower_bound(i) {
            if (bound - length).abs() < BOUNDARY_TOLERANCE {
                return Some(i);
            }
        }
    }
    if (division.max_length() - length).abs() < BOUNDARY_TOLERANCE {
        return Some(groups);
    }
    None
}

/// Maps an area name to its global ordinal.
pub(crate) fn resolve_area(name: &str, run_areas: &[String]) -> Result<usize, SetupError> {
    run_areas
        .iter()
        .position(|area| area == name)
        .ok_or_else(|| SetupError::UnknownArea {
            name: name.to_owned(),
        })
}

/// Spreads one cohort over the length groups of its age window with a
/// normal distribution, weighting each group by the density at its
/// midpoint, and gives every added fish its reference weight.
fn seed_cohort(
    alkeys: &mut [AgeLengthMatrix],
    division: &LengthDivision,
    relation: &LengthWeight,
    seeding: &Seeding,
) {
    let Some(population) = alkeys.get_mut(seeding.area) else {
        return;
    };
    let Some(row) = population.row_mut(seeding.age) else {
        return;
    };
    let mut masses: Vec<(usize, f64)> = Vec::new();
    for (length, _) in row.iter_cells() {
        if let Some(mid) = division.mean_length(length) {
            let z = (mid - seeding.mean_length) / seeding.sd;
            masses.push((length, (-0.5 * z * z).exp()));
        }
    }
    let total: f64 = masses.iter().map(|(_, mass)| mass).sum();
    if total < VERY_SMALL {
        warn!(
            age = seeding.age,
            mean_length = seeding.mean_length,
            "cohort lies outside its age's length window, nothing seeded"
        );
        return;
    }
    for (length, mass) in masses {
        let Some(mid) = division.mean_length(length) else {
            continue;
        };
        if let Some(cell) = row.cell_mut(length) {
            *cell += PopCell::new(seeding.number * mass / total, relation.weight_at(mid));
        }
    }
}
