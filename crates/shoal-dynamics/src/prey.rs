//! Prey-side consumption state.
//!
//! A [`Prey`] is the edible face of a stock. Each sub-step it snapshots the
//! owning stock's population onto its own length division, collects the
//! demands of every predator, and enforces the aggregate consumption cap:
//! no length group may lose more than the configured fraction of its
//! biomass. The pre-cap consumption-to-biomass ratios are kept so that
//! predators can later rescale their own shares by the same factor, which
//! keeps the cap aggregate rather than per predator pair.
//!
//! All buffers are per area and allocated once at construction.

use shoal_pop::{AgeLengthMatrix, ConversionIndex, LengthDivision, PopCell, PopError, VERY_SMALL};

use crate::error::DynamicsError;

/// Consumable population of one stock, on the prey's own length division.
#[derive(Debug)]
pub struct Prey {
    name: String,
    division: LengthDivision,
    mean_lengths: Vec<f64>,
    /// Mapping from the owning stock's division onto this division.
    ci: ConversionIndex,
    /// Population snapshot per area, refreshed by [`Prey::sum`].
    number: Vec<Vec<PopCell>>,
    biomass: Vec<Vec<f64>>,
    /// Aggregate consumption demanded this sub-step.
    cons: Vec<Vec<f64>>,
    /// Pre-cap consumption-to-biomass ratios.
    ratios: Vec<Vec<f64>>,
    overcons: Vec<Vec<f64>>,
    flagged: Vec<bool>,
    factors: Vec<Vec<f64>>,
    total_consumption: Vec<Vec<f64>>,
    total_overconsumption: Vec<Vec<f64>>,
}

impl Prey {
    /// Builds the prey state for a stock.
    ///
    /// `stock_division` is the division the owning stock's population lives
    /// on; the conversion index built from it drives both the population
    /// snapshot and the survival factors handed back to the stock.
    ///
    /// # Errors
    ///
    /// Fails when the two divisions do not overlap.
    pub fn new(
        name: &str,
        division: LengthDivision,
        stock_division: &LengthDivision,
        num_areas: usize,
    ) -> Result<Self, DynamicsError> {
        let ci = ConversionIndex::build(stock_division, &division)?;
        let groups = division.num_groups();
        Ok(Self {
            name: name.to_owned(),
            mean_lengths: division.mean_lengths(),
            division,
            ci,
            number: vec![vec![PopCell::default(); groups]; num_areas],
            biomass: vec![vec![0.0; groups]; num_areas],
            cons: vec![vec![0.0; groups]; num_areas],
            ratios: vec![vec![0.0; groups]; num_areas],
            overcons: vec![vec![0.0; groups]; num_areas],
            flagged: vec![false; num_areas],
            factors: vec![vec![1.0; groups]; num_areas],
            total_consumption: vec![vec![0.0; groups]; num_areas],
            total_overconsumption: vec![vec![0.0; groups]; num_areas],
        })
    }

    /// Prey name used by predators to address this prey.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The prey's own length division.
    #[must_use]
    pub const fn division(&self) -> &LengthDivision {
        &self.division
    }

    /// Mean lengths of the prey's length groups.
    #[must_use]
    pub fn mean_lengths(&self) -> &[f64] {
        &self.mean_lengths
    }

    /// Mapping from the owning stock's division onto this division.
    #[must_use]
    pub const fn conversion(&self) -> &ConversionIndex {
        &self.ci
    }

    /// Number of length groups on the prey division.
    #[must_use]
    pub fn num_lengths(&self) -> usize {
        self.mean_lengths.len()
    }

    /// Number of areas the prey carries buffers for.
    #[must_use]
    pub fn num_areas(&self) -> usize {
        self.flagged.len()
    }

    /// Clears every buffer, including the run accumulators.
    pub fn reset(&mut self) {
        for row in &mut self.number {
            for cell in row.iter_mut() {
                cell.zero();
            }
        }
        for buffers in [
            &mut self.biomass,
            &mut self.cons,
            &mut self.ratios,
            &mut self.overcons,
            &mut self.total_consumption,
            &mut self.total_overconsumption,
        ] {
            for row in buffers.iter_mut() {
                row.fill(0.0);
            }
        }
        for row in &mut self.factors {
            row.fill(1.0);
        }
        self.flagged.fill(false);
    }

    /// Snapshots the owning stock's population for one area and clears the
    /// sub-step consumption state.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range or the population matrix does not
    /// match the conversion index.
    pub fn sum(&mut self, area: usize, population: &AgeLengthMatrix) -> Result<(), DynamicsError> {
        let num_areas = self.flagged.len();
        let number = self
            .number
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        population.sum_columns_into(number, &self.ci)?;
        let biomass = self
            .biomass
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        for (slot, cell) in biomass.iter_mut().zip(number.iter()) {
            *slot = cell.biomass();
        }
        for buffer in [&mut self.cons, &mut self.ratios, &mut self.overcons] {
            if let Some(row) = buffer.get_mut(area) {
                row.fill(0.0);
            }
        }
        if let Some(flag) = self.flagged.get_mut(area) {
            *flag = false;
        }
        Ok(())
    }

    /// Biomass per length group for one area.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range.
    pub fn biomass(&self, area: usize) -> Result<&[f64], DynamicsError> {
        self.biomass
            .get(area)
            .map(Vec::as_slice)
            .ok_or(DynamicsError::AreaOutOfRange {
                area,
                num_areas: self.flagged.len(),
            })
    }

    /// Total biomass across length groups for one area.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range.
    pub fn total_biomass(&self, area: usize) -> Result<f64, DynamicsError> {
        Ok(self.biomass(area)?.iter().sum())
    }

    /// Adds one predator's demand to the aggregate consumption.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range or `amounts` does not match the
    /// prey division.
    pub fn add_consumption(&mut self, area: usize, amounts: &[f64]) -> Result<(), DynamicsError> {
        let cons = self
            .cons
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange {
                area,
                num_areas: self.flagged.len(),
            })?;
        if amounts.len() != cons.len() {
            return Err(PopError::LengthVectorSize {
                expected: cons.len(),
                actual: amounts.len(),
            }
            .into());
        }
        for (slot, &amount) in cons.iter_mut().zip(amounts.iter()) {
            *slot += amount;
        }
        Ok(())
    }

    /// Enforces the consumption cap for one area.
    ///
    /// Stores the pre-cap consumption-to-biomass ratio of every length
    /// group, caps the aggregate consumption of groups above `max_ratio`,
    /// books the removed amount as overconsumption, and folds the capped
    /// figures into the run accumulators. Returns whether any group was
    /// capped.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range.
    pub fn check_consumption(
        &mut self,
        area: usize,
        max_ratio: f64,
    ) -> Result<bool, DynamicsError> {
        let num_areas = self.flagged.len();
        let cons = self
            .cons
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        let biomass = self
            .biomass
            .get(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        let ratios = self
            .ratios
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        let overcons = self
            .overcons
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        let mut capped = false;
        for (((amount, &stock), ratio), over) in cons
            .iter_mut()
            .zip(biomass.iter())
            .zip(ratios.iter_mut())
            .zip(overcons.iter_mut())
        {
            *ratio = if stock < VERY_SMALL {
                0.0
            } else {
                *amount / stock
            };
            *over = 0.0;
            if *ratio > max_ratio {
                capped = true;
                let tmp = max_ratio / *ratio;
                let removed = (1.0 - tmp) * *amount;
                *over = removed;
                *amount *= tmp;
            }
        }
        if let Some(flag) = self.flagged.get_mut(area) {
            *flag = capped;
        }
        let totals = self
            .total_consumption
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        for (total, &amount) in totals.iter_mut().zip(cons.iter()) {
            *total += amount;
        }
        let totals = self
            .total_overconsumption
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        for (total, &amount) in totals.iter_mut().zip(overcons.iter()) {
            *total += amount;
        }
        Ok(capped)
    }

    /// Whether any length group was capped in the last check for `area`.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range.
    pub fn was_overconsumed(&self, area: usize) -> Result<bool, DynamicsError> {
        self.flagged
            .get(area)
            .copied()
            .ok_or(DynamicsError::AreaOutOfRange {
                area,
                num_areas: self.flagged.len(),
            })
    }

    /// Pre-cap consumption-to-biomass ratios for one area.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range.
    pub fn ratios(&self, area: usize) -> Result<&[f64], DynamicsError> {
        self.ratios
            .get(area)
            .map(Vec::as_slice)
            .ok_or(DynamicsError::AreaOutOfRange {
                area,
                num_areas: self.flagged.len(),
            })
    }

    /// Recomputes the survival factors `1 - consumed / biomass` for one
    /// area from the capped consumption.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range.
    pub fn update_reduction_factors(&mut self, area: usize) -> Result<(), DynamicsError> {
        let num_areas = self.flagged.len();
        let factors = self
            .factors
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        let cons = self
            .cons
            .get(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        let biomass = self
            .biomass
            .get(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        for ((slot, &amount), &stock) in factors.iter_mut().zip(cons.iter()).zip(biomass.iter()) {
            *slot = if stock < VERY_SMALL {
                1.0
            } else {
                (1.0 - amount / stock).max(0.0)
            };
        }
        Ok(())
    }

    /// Survival factors computed by the last
    /// [`update_reduction_factors`](Prey::update_reduction_factors) call.
    ///
    /// The factors live on the prey division; the owning stock applies them
    /// through [`Prey::conversion`].
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range.
    pub fn reduction_factors(&self, area: usize) -> Result<&[f64], DynamicsError> {
        self.factors
            .get(area)
            .map(Vec::as_slice)
            .ok_or(DynamicsError::AreaOutOfRange {
                area,
                num_areas: self.flagged.len(),
            })
    }

    /// Accumulated consumption per length group for one area.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range.
    pub fn total_consumption(&self, area: usize) -> Result<&[f64], DynamicsError> {
        self.total_consumption
            .get(area)
            .map(Vec::as_slice)
            .ok_or(DynamicsError::AreaOutOfRange {
                area,
                num_areas: self.flagged.len(),
            })
    }

    /// Accumulated overconsumption per length group for one area.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range.
    pub fn total_overconsumption(&self, area: usize) -> Result<&[f64], DynamicsError> {
        self.total_overconsumption
            .get(area)
            .map(Vec::as_slice)
            .ok_or(DynamicsError::AreaOutOfRange {
                area,
                num_areas: self.flagged.len(),
            })
    }
}
