//! Predator-side consumption state.
//!
//! A [`Predator`] holds the consumption buffers for every prey it targets,
//! one per area. During the eat phase it turns its abundance into a demand
//! per prey length group; after every prey has checked its aggregate cap,
//! [`Predator::adjust_and_commit`] rescales the predator's own share of any
//! capped group by the same factor the prey applied, so the cap stays a
//! property of the aggregate, and folds the result into the run
//! accumulators.
//!
//! Demand is allocated across a prey's length groups in proportion to
//! suitability at the group's mean length times the biomass standing in the
//! group. A demand far beyond the prey's whole biomass is a sign of broken
//! parameters and is logged, not rejected.

use std::collections::BTreeMap;

use shoal_pop::{PopError, VERY_SMALL};
use tracing::warn;

use crate::error::DynamicsError;
use crate::prey::Prey;
use crate::suitability::Suitability;

/// Demand-to-biomass ratio above which the eat phase logs a warning.
pub const DEFAULT_SANITY_THRESHOLD: f64 = 10.0;

/// One predator and its per-area consumption buffers.
#[derive(Debug)]
pub struct Predator {
    name: String,
    catchability: BTreeMap<String, f64>,
    suitability: BTreeMap<String, Suitability>,
    sanity_threshold: f64,
    abundance: Vec<f64>,
    /// Demand per prey and length group this sub-step, per area.
    cons: Vec<BTreeMap<String, Vec<f64>>>,
    total_consumption: Vec<BTreeMap<String, Vec<f64>>>,
    over_consumption: Vec<f64>,
}

impl Predator {
    /// Builds a predator from its per-prey parameters.
    ///
    /// # Errors
    ///
    /// Fails when a targeted prey lacks a suitability curve, a curve or
    /// coefficient is invalid, or the sanity threshold is not positive.
    pub fn new(
        name: &str,
        catchability: BTreeMap<String, f64>,
        suitability: BTreeMap<String, Suitability>,
        sanity_threshold: f64,
        num_areas: usize,
    ) -> Result<Self, DynamicsError> {
        if sanity_threshold <= 0.0 {
            return Err(DynamicsError::NonPositiveParameter {
                name: "sanity threshold",
                value: sanity_threshold,
            });
        }
        for (prey, &coefficient) in &catchability {
            if coefficient < 0.0 {
                return Err(DynamicsError::NonPositiveParameter {
                    name: "catchability",
                    value: coefficient,
                });
            }
            let Some(curve) = suitability.get(prey) else {
                return Err(DynamicsError::MissingSuitability {
                    predator: name.to_owned(),
                    prey: prey.clone(),
                });
            };
            curve.validate()?;
        }
        Ok(Self {
            name: name.to_owned(),
            catchability,
            suitability,
            sanity_threshold,
            abundance: vec![0.0; num_areas],
            cons: vec![BTreeMap::new(); num_areas],
            total_consumption: vec![BTreeMap::new(); num_areas],
            over_consumption: vec![0.0; num_areas],
        })
    }

    /// Predator name used in logs and reports.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the preys this predator targets, in deterministic order.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.catchability.keys().map(String::as_str)
    }

    /// Number of areas the predator carries buffers for.
    #[must_use]
    pub fn num_areas(&self) -> usize {
        self.abundance.len()
    }

    /// Allocates the consumption buffers for one prey in every area.
    ///
    /// Must be called once per targeted prey before the first eat phase.
    pub fn register_prey(&mut self, prey: &str, num_lengths: usize) {
        for buffers in [&mut self.cons, &mut self.total_consumption] {
            for area in buffers.iter_mut() {
                area.insert(prey.to_owned(), vec![0.0; num_lengths]);
            }
        }
    }

    /// Sets the driving abundance for one area.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range.
    pub fn set_abundance(&mut self, area: usize, value: f64) -> Result<(), DynamicsError> {
        let num_areas = self.abundance.len();
        let slot = self
            .abundance
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        *slot = value;
        Ok(())
    }

    /// The driving abundance for one area.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range.
    pub fn abundance(&self, area: usize) -> Result<f64, DynamicsError> {
        let num_areas = self.abundance.len();
        self.abundance
            .get(area)
            .copied()
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })
    }

    /// Clears every buffer, including the run accumulators.
    pub fn reset(&mut self) {
        self.abundance.fill(0.0);
        self.over_consumption.fill(0.0);
        for buffers in [&mut self.cons, &mut self.total_consumption] {
            for area in buffers.iter_mut() {
                for amounts in area.values_mut() {
                    amounts.fill(0.0);
                }
            }
        }
    }

    /// Computes this predator's demand on one prey for one area and adds it
    /// to the prey's aggregate consumption.
    ///
    /// The total demand is catchability times `scaler` times the predator's
    /// abundance; it is spread over the prey's length groups in proportion
    /// to suitability times standing biomass. A prey with no edible biomass
    /// receives no demand.
    ///
    /// # Errors
    ///
    /// Fails when the prey is not targeted or registered, or `area` is out
    /// of range.
    pub fn eat(&mut self, area: usize, prey: &mut Prey, scaler: f64) -> Result<(), DynamicsError> {
        let num_areas = self.abundance.len();
        let q = self
            .catchability
            .get(prey.name())
            .copied()
            .ok_or_else(|| DynamicsError::MissingCatchability {
                predator: self.name.clone(),
                prey: prey.name().to_owned(),
            })?;
        let curve = self
            .suitability
            .get(prey.name())
            .ok_or_else(|| DynamicsError::MissingSuitability {
                predator: self.name.clone(),
                prey: prey.name().to_owned(),
            })?;
        let abundance = self
            .abundance
            .get(area)
            .copied()
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        let buffer = self
            .cons
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?
            .get_mut(prey.name())
            .ok_or_else(|| DynamicsError::UnregisteredPrey {
                predator: self.name.clone(),
                prey: prey.name().to_owned(),
            })?;

        let biomass = prey.biomass(area)?;
        if buffer.len() != biomass.len() {
            return Err(PopError::LengthVectorSize {
                expected: biomass.len(),
                actual: buffer.len(),
            }
            .into());
        }
        let total_biomass: f64 = biomass.iter().sum();
        let mut weight_sum = 0.0;
        for ((slot, &stock), &length) in buffer
            .iter_mut()
            .zip(biomass.iter())
            .zip(prey.mean_lengths().iter())
        {
            let weight = curve.at_length(length) * stock;
            *slot = weight;
            weight_sum += weight;
        }

        let desired = q * scaler * abundance;
        if desired < VERY_SMALL || weight_sum < VERY_SMALL {
            buffer.fill(0.0);
            return Ok(());
        }
        if desired > self.sanity_threshold * total_biomass {
            warn!(
                predator = %self.name,
                prey = %prey.name(),
                area,
                desired,
                biomass = total_biomass,
                "consumption demand far exceeds available biomass"
            );
        }
        let scale = desired / weight_sum;
        for slot in buffer.iter_mut() {
            *slot *= scale;
        }
        prey.add_consumption(area, buffer)?;
        Ok(())
    }

    /// Rescales this predator's share of any capped length group and folds
    /// the surviving demand into the run accumulators.
    ///
    /// Must run after the prey's cap check, for every predator that ate
    /// from the prey this sub-step.
    ///
    /// # Errors
    ///
    /// Fails when the prey is not registered or `area` is out of range.
    pub fn adjust_and_commit(
        &mut self,
        area: usize,
        prey: &Prey,
        max_ratio: f64,
    ) -> Result<(), DynamicsError> {
        let num_areas = self.abundance.len();
        let buffer = self
            .cons
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?
            .get_mut(prey.name())
            .ok_or_else(|| DynamicsError::UnregisteredPrey {
                predator: self.name.clone(),
                prey: prey.name().to_owned(),
            })?;
        if prey.was_overconsumed(area)? {
            let ratios = prey.ratios(area)?;
            let mut over = 0.0;
            for (amount, &ratio) in buffer.iter_mut().zip(ratios.iter()) {
                if ratio > max_ratio {
                    let kept = max_ratio / ratio;
                    let removed = (1.0 - kept) * *amount;
                    over += removed;
                    *amount *= kept;
                }
            }
            if let Some(slot) = self.over_consumption.get_mut(area) {
                *slot += over;
            }
        }
        let totals = self
            .total_consumption
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?
            .get_mut(prey.name())
            .ok_or_else(|| DynamicsError::UnregisteredPrey {
                predator: self.name.clone(),
                prey: prey.name().to_owned(),
            })?;
        let committed = self
            .cons
            .get(area)
            .and_then(|demands| demands.get(prey.name()))
            .map_or(&[][..], Vec::as_slice);
        for (total, &amount) in totals.iter_mut().zip(committed.iter()) {
            *total += amount;
        }
        Ok(())
    }

    /// Accumulated consumption of one prey for one area.
    ///
    /// # Errors
    ///
    /// Fails when the prey is not registered or `area` is out of range.
    pub fn consumption(&self, area: usize, prey: &str) -> Result<&[f64], DynamicsError> {
        self.total_consumption
            .get(area)
            .ok_or(DynamicsError::AreaOutOfRange {
                area,
                num_areas: self.abundance.len(),
            })?
            .get(prey)
            .map(Vec::as_slice)
            .ok_or_else(|| DynamicsError::UnregisteredPrey {
                predator: self.name.clone(),
                prey: prey.to_owned(),
            })
    }

    /// Accumulated overconsumption attributed to this predator for one area.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range.
    pub fn over_consumption(&self, area: usize) -> Result<f64, DynamicsError> {
        self.over_consumption
            .get(area)
            .copied()
            .ok_or(DynamicsError::AreaOutOfRange {
                area,
                num_areas: self.abundance.len(),
            })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::cast_precision_loss
)]
mod tests {
    use super::*;
    use shoal_pop::{AgeLengthMatrix, LengthDivision};

    fn make_prey(counts: &[f64], mean_weight: f64) -> Prey {
        let max = 10.0_f64.mul_add(counts.len() as f64, 10.0);
        let division = LengthDivision::uniform(10.0, max, 10.0).unwrap();
        let stock_division = division.clone();
        let mut prey = Prey::new("capelin", division, &stock_division, 1).unwrap();
        let mut matrix = AgeLengthMatrix::full(1, 1, counts.len()).unwrap();
        for (l, &count) in counts.iter().enumerate() {
            let cell = matrix.cell_mut(1, l).unwrap();
            cell.count = count;
            cell.mean_weight = mean_weight;
        }
        prey.sum(0, &matrix).unwrap();
        prey
    }

    fn make_predator(q: f64, suitability: Suitability, num_lengths: usize) -> Predator {
        let mut predator = Predator::new(
            "cod",
            BTreeMap::from([("capelin".to_owned(), q)]),
            BTreeMap::from([("capelin".to_owned(), suitability)]),
            DEFAULT_SANITY_THRESHOLD,
            1,
        )
        .unwrap();
        predator.register_prey("capelin", num_lengths);
        predator
    }

    #[test]
    fn capped_demand_splits_into_consumption_and_overconsumption() {
        // One length group holding 1000 biomass; a demand of 100 against a
        // 0.05 cap leaves 50 eaten and 50 booked as overconsumption.
        let mut prey = make_prey(&[500.0], 2.0);
        let mut predator = make_predator(0.5, Suitability::Constant { value: 1.0 }, 1);
        predator.set_abundance(0, 100.0).unwrap();
        predator.eat(0, &mut prey, 2.0).unwrap();
        let capped = prey.check_consumption(0, 0.05).unwrap();
        assert!(capped);
        predator.adjust_and_commit(0, &prey, 0.05).unwrap();
        assert!((predator.consumption(0, "capelin").unwrap()[0] - 50.0).abs() < 1e-9);
        assert!((predator.over_consumption(0).unwrap() - 50.0).abs() < 1e-9);
        assert!((prey.total_consumption(0).unwrap()[0] - 50.0).abs() < 1e-9);
        assert!((prey.total_overconsumption(0).unwrap()[0] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn demand_is_allocated_by_suitability_and_biomass() {
        let mut prey = make_prey(&[100.0, 300.0], 1.0);
        let mut predator = make_predator(1.0, Suitability::Constant { value: 0.5 }, 2);
        predator.set_abundance(0, 40.0).unwrap();
        predator.eat(0, &mut prey, 1.0).unwrap();
        prey.check_consumption(0, 0.9).unwrap();
        predator.adjust_and_commit(0, &prey, 0.9).unwrap();
        let eaten = predator.consumption(0, "capelin").unwrap();
        // Constant suitability cancels out; the 40 units split 1:3.
        assert!((eaten[0] - 10.0).abs() < 1e-9);
        assert!((eaten[1] - 30.0).abs() < 1e-9);
    }

    #[test]
    fn empty_prey_receives_no_demand() {
        let mut prey = make_prey(&[0.0], 2.0);
        let mut predator = make_predator(0.5, Suitability::Constant { value: 1.0 }, 1);
        predator.set_abundance(0, 100.0).unwrap();
        predator.eat(0, &mut prey, 2.0).unwrap();
        prey.check_consumption(0, 0.05).unwrap();
        predator.adjust_and_commit(0, &prey, 0.05).unwrap();
        assert!(predator.consumption(0, "capelin").unwrap()[0].abs() < 1e-12);
        assert!(predator.over_consumption(0).unwrap().abs() < 1e-12);
    }

    #[test]
    fn two_predators_are_scaled_by_the_same_factor() {
        let mut prey = make_prey(&[500.0], 2.0);
        let mut first = make_predator(0.5, Suitability::Constant { value: 1.0 }, 1);
        let mut second = make_predator(0.5, Suitability::Constant { value: 1.0 }, 1);
        first.set_abundance(0, 100.0).unwrap();
        second.set_abundance(0, 300.0).unwrap();
        first.eat(0, &mut prey, 2.0).unwrap();
        second.eat(0, &mut prey, 2.0).unwrap();
        // Aggregate demand 400 against cap 0.2 * 1000 = 200: halved.
        prey.check_consumption(0, 0.2).unwrap();
        first.adjust_and_commit(0, &prey, 0.2).unwrap();
        second.adjust_and_commit(0, &prey, 0.2).unwrap();
        assert!((first.consumption(0, "capelin").unwrap()[0] - 50.0).abs() < 1e-9);
        assert!((second.consumption(0, "capelin").unwrap()[0] - 150.0).abs() < 1e-9);
        assert!((prey.total_consumption(0).unwrap()[0] - 200.0).abs() < 1e-9);
    }

    #[test]
    fn missing_parameters_are_setup_errors() {
        let missing_suitability = Predator::new(
            "cod",
            BTreeMap::from([("capelin".to_owned(), 0.5)]),
            BTreeMap::new(),
            DEFAULT_SANITY_THRESHOLD,
            1,
        );
        assert!(matches!(
            missing_suitability,
            Err(DynamicsError::MissingSuitability { .. })
        ));
        let mut prey = make_prey(&[500.0], 2.0);
        let mut predator = make_predator(0.5, Suitability::Constant { value: 1.0 }, 1);
        let mut other = Prey::new(
            "herring",
            LengthDivision::uniform(10.0, 20.0, 10.0).unwrap(),
            &LengthDivision::uniform(10.0, 20.0, 10.0).unwrap(),
            1,
        )
        .unwrap();
        assert!(matches!(
            predator.eat(0, &mut other, 1.0),
            Err(DynamicsError::MissingCatchability { .. })
        ));
        predator.set_abundance(0, 1.0).unwrap();
        assert!(predator.eat(2, &mut prey, 1.0).is_err());
    }

    #[test]
    fn oversized_demand_still_computes() {
        let mut prey = make_prey(&[10.0], 1.0);
        let mut predator = make_predator(10.0, Suitability::Constant { value: 1.0 }, 1);
        predator.set_abundance(0, 1000.0).unwrap();
        // Demand of 10000 against 10 biomass only logs; the cap handles it.
        predator.eat(0, &mut prey, 1.0).unwrap();
        prey.check_consumption(0, 0.5).unwrap();
        predator.adjust_and_commit(0, &prey, 0.5).unwrap();
        assert!((prey.total_consumption(0).unwrap()[0] - 5.0).abs() < 1e-9);
    }
}
