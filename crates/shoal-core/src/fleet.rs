//! A harvesting fleet: an effort-driven predator over the run's areas.
//!
//! Fleets are the only predators in a run. Each wraps a [`Predator`] whose
//! driving abundance is the fleet's effort, refreshed at the start of every
//! step from the configured effort series. Within the series the most
//! recently listed matching entry wins, so a run file can state a default
//! effort first and override single steps after it.

use std::collections::BTreeMap;

use shoal_dynamics::{DynamicsError, Predator, Prey, Suitability};

use crate::config::FleetConfig;
use crate::error::{SetupError, StepError};
use crate::stock::resolve_area;

/// One resolved effort entry; `None` matches every year or step.
#[derive(Debug, Clone)]
struct Effort {
    year: Option<i32>,
    step_index: Option<usize>,
    area: usize,
    value: f64,
}

/// A fleet and its effort series.
#[derive(Debug)]
pub struct Fleet {
    predator: Predator,
    efforts: Vec<Effort>,
}

impl Fleet {
    /// Builds a fleet from validated configuration.
    ///
    /// # Errors
    ///
    /// Fails when an effort area does not resolve or the predator rejects
    /// its parameters.
    pub fn new(config: &FleetConfig, run_areas: &[String]) -> Result<Self, SetupError> {
        let catchability: BTreeMap<String, f64> = config
            .targets
            .iter()
            .map(|(prey, target)| (prey.clone(), target.catchability))
            .collect();
        let suitability: BTreeMap<String, Suitability> = config
            .targets
            .iter()
            .map(|(prey, target)| (prey.clone(), target.suitability.clone()))
            .collect();
        let predator = Predator::new(
            &config.name,
            catchability,
            suitability,
            config.sanity_threshold,
            run_areas.len(),
        )?;
        let efforts = config
            .efforts
            .iter()
            .map(|effort| {
                Ok(Effort {
                    year: effort.year,
                    step_index: effort.step.map(|step| step.saturating_sub(1)),
                    area: resolve_area(&effort.area, run_areas)?,
                    value: effort.value,
                })
            })
            .collect::<Result<Vec<_>, SetupError>>()?;
        Ok(Self { predator, efforts })
    }

    /// Fleet name used in logs and reports.
    #[must_use]
    pub fn name(&self) -> &str {
        self.predator.name()
    }

    /// Names of the stocks this fleet targets.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.predator.targets()
    }

    /// Allocates consumption buffers for one targeted prey.
    pub fn register_prey(&mut self, prey: &str, num_lengths: usize) {
        self.predator.register_prey(prey, num_lengths);
    }

    /// Clears every buffer, including the run accumulators.
    pub fn reset(&mut self) {
        self.predator.reset();
    }

    /// Sets each area's effort for the given year and zero-based step of
    /// year; areas without a matching entry idle at zero.
    ///
    /// # Errors
    ///
    /// Fails when the predator's area buffers are out of shape.
    pub fn update_effort(&mut self, year: i32, step_index: usize) -> Result<(), StepError> {
        for area in 0..self.predator.num_areas() {
            let value = self
                .efforts
                .iter()
                .rev()
                .find(|effort| {
                    effort.area == area
                        && effort.year.is_none_or(|y| y == year)
                        && effort.step_index.is_none_or(|s| s == step_index)
                })
                .map_or(0.0, |effort| effort.value);
            self.predator.set_abundance(area, value)?;
        }
        Ok(())
    }

    /// The effort currently driving one area.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range.
    pub fn effort(&self, area: usize) -> Result<f64, DynamicsError> {
        self.predator.abundance(area)
    }

    /// Computes this fleet's demand on a prey for one area and books it.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range or the prey was never registered.
    pub fn eat(&mut self, area: usize, prey: &mut Prey, scaler: f64) -> Result<(), DynamicsError> {
        self.predator.eat(area, prey, scaler)
    }

    /// Rescales this fleet's share of any capped length classes and commits
    /// the sub-step's consumption into the run totals.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range or the prey was never registered.
    pub fn adjust_and_commit(
        &mut self,
        area: usize,
        prey: &Prey,
        max_ratio: f64,
    ) -> Result<(), DynamicsError> {
        self.predator.adjust_and_commit(area, prey, max_ratio)
    }

    /// Accumulated consumption of one prey on one area, by prey length.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range or the prey was never registered.
    pub fn consumption(&self, area: usize, prey: &str) -> Result<&[f64], DynamicsError> {
        self.predator.consumption(area, prey)
    }

    /// Biomass this fleet wanted but could not take on one area.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range.
    pub fn over_consumption(&self, area: usize) -> Result<f64, DynamicsError> {
        self.predator.over_consumption(area)
    }
}
