//! Overconsumption aggregation across preys and areas.

use shoal_core::Ecosystem;
use shoal_pop::{ConversionIndex, LengthDivision, remap};
use tracing::debug;

use crate::error::ReportError;
use crate::select;

/// One selected prey and its mapping onto the aggregation division.
#[derive(Debug)]
struct PreySource {
    stock: usize,
    ci: ConversionIndex,
}

/// Sums the overconsumption accumulators of selected preys onto one length
/// division, bucketed by area group.
///
/// Overconsumption is the demand refused by the consumption cap; the
/// figures grow monotonically between resets.
#[derive(Debug)]
pub struct PreyOverAggregator {
    preys: Vec<PreySource>,
    area_groups: Vec<Vec<usize>>,
    division: LengthDivision,
    /// Bucket quantities, indexed by area group.
    totals: Vec<Vec<f64>>,
}

impl PreyOverAggregator {
    /// Builds the aggregator for a fixed selection.
    ///
    /// # Errors
    ///
    /// Fails when a name does not resolve, the selection is empty, a
    /// selected stock cannot be eaten, or a prey division does not overlap
    /// the aggregation division.
    pub fn new(
        eco: &Ecosystem,
        preys: &[String],
        area_groups: &[Vec<String>],
        division: LengthDivision,
    ) -> Result<Self, ReportError> {
        if preys.is_empty() {
            return Err(ReportError::EmptySelection { what: "prey" });
        }
        let preys = preys
            .iter()
            .map(|name| {
                let ordinal = select::stock_ordinal(eco, name)?;
                let prey = eco
                    .stocks
                    .get(ordinal)
                    .and_then(|stock| stock.prey())
                    .ok_or_else(|| ReportError::NotEdible { name: name.clone() })?;
                let ci = ConversionIndex::build(prey.division(), &division)?;
                Ok(PreySource { stock: ordinal, ci })
            })
            .collect::<Result<Vec<_>, ReportError>>()?;
        let area_groups = select::area_groups(eco, area_groups)?;
        let totals = vec![vec![0.0; division.num_groups()]; area_groups.len()];
        Ok(Self {
            preys,
            area_groups,
            division,
            totals,
        })
    }

    /// The division the buckets live on.
    #[must_use]
    pub const fn division(&self) -> &LengthDivision {
        &self.division
    }

    /// Recomputes every bucket from live ecosystem state.
    ///
    /// # Errors
    ///
    /// Fails when an overconsumption record cannot be read back; with an
    /// aggregator built from the same ecosystem this cannot happen.
    pub fn sum(&mut self, eco: &Ecosystem) -> Result<(), ReportError> {
        for bucket in &mut self.totals {
            bucket.fill(0.0);
        }
        for source in &self.preys {
            let Some(stock) = eco.stocks.get(source.stock) else {
                continue;
            };
            let Some(prey) = stock.prey() else {
                continue;
            };
            for (g, areas) in self.area_groups.iter().enumerate() {
                let Some(bucket) = self.totals.get_mut(g) else {
                    continue;
                };
                for &area in areas {
                    if !stock.lives_on(area) {
                        continue;
                    }
                    let amounts = prey.total_overconsumption(area)?;
                    remap::accumulate_values(bucket, amounts, &source.ci)?;
                }
            }
        }
        debug!(preys = self.preys.len(), "overconsumption aggregation refreshed");
        Ok(())
    }

    /// Overconsumed biomass per length group for one area group.
    #[must_use]
    pub fn overconsumed(&self, area_group: usize) -> Option<&[f64]> {
        self.totals.get(area_group).map(Vec::as_slice)
    }

    /// Total overconsumed biomass for one area group.
    #[must_use]
    pub fn total(&self, area_group: usize) -> Option<f64> {
        self.overconsumed(area_group)
            .map(|amounts| amounts.iter().sum())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use shoal_core::{SimulationConfig, run_step};

    /// One unit-weight prey fished hard in the north and lightly in the
    /// south, so only the north books overconsumption.
    const FIXTURE: &str = r"
simulation:
  first_year: 2000
  last_year: 2001
  step_months: [12]
  sub_steps: [1]
  max_ratio_consumed: 0.1
areas: [north, south]
stocks:
  - name: capelin
    min_age: 1
    max_age: 1
    lengths: { min: 0.5, max: 1.5, width: 1.0 }
    length_weight: { coefficient: 1.0, exponent: 1.0 }
    growth:
      function: { function: length_power, coefficient: 0.0, exponent: 1.0 }
      kernel: { kind: empirical, probabilities: [1.0] }
    prey: {}
    initial:
      - { area: north, age: 1, number: 1000.0, mean_length: 1.0, sd: 0.1 }
      - { area: south, age: 1, number: 500.0, mean_length: 1.0, sd: 0.1 }
  - name: halibut
    min_age: 1
    max_age: 1
    lengths: { min: 0.5, max: 1.5, width: 1.0 }
    length_weight: { coefficient: 1.0, exponent: 1.0 }
    growth:
      function: { function: length_power, coefficient: 0.0, exponent: 1.0 }
      kernel: { kind: empirical, probabilities: [1.0] }
fleets:
  - name: trawler
    targets:
      capelin:
        catchability: 1.0
        suitability: { curve: constant, value: 1.0 }
    efforts:
      - { area: north, value: 600.0 }
      - { area: south, value: 30.0 }
";

    fn fished_ecosystem() -> Ecosystem {
        let config = SimulationConfig::parse(FIXTURE).unwrap();
        let mut eco = Ecosystem::from_config(&config).unwrap();
        run_step(&mut eco).unwrap();
        eco
    }

    fn make_aggregator(eco: &Ecosystem) -> PreyOverAggregator {
        PreyOverAggregator::new(
            eco,
            &["capelin".to_owned()],
            &[vec!["north".to_owned()], vec!["south".to_owned()]],
            LengthDivision::uniform(0.5, 1.5, 1.0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn refused_demand_lands_in_its_area_group() {
        let eco = fished_ecosystem();
        let mut aggregator = make_aggregator(&eco);
        aggregator.sum(&eco).unwrap();

        // North: demand 600 against a cap of 100 refuses 500.
        assert!((aggregator.overconsumed(0).unwrap()[0] - 500.0).abs() < 1e-9);
        // South: demand 30 against a cap of 50 refuses nothing.
        assert!(aggregator.total(1).unwrap().abs() < 1e-12);
        assert!(aggregator.overconsumed(2).is_none());
    }

    #[test]
    fn resummation_follows_the_running_accumulator() {
        let mut eco = fished_ecosystem();
        let mut aggregator = make_aggregator(&eco);
        aggregator.sum(&eco).unwrap();
        assert!((aggregator.total(0).unwrap() - 500.0).abs() < 1e-9);

        // The second year fishes the surviving 900 and refuses 510 more.
        run_step(&mut eco).unwrap();
        aggregator.sum(&eco).unwrap();
        assert!((aggregator.total(0).unwrap() - 1010.0).abs() < 1e-9);
    }

    #[test]
    fn selection_errors_are_fatal() {
        let eco = fished_ecosystem();
        let division = LengthDivision::uniform(0.5, 1.5, 1.0).unwrap();
        let areas = vec![vec!["north".to_owned()]];
        assert!(matches!(
            PreyOverAggregator::new(&eco, &["halibut".to_owned()], &areas, division.clone()),
            Err(ReportError::NotEdible { .. })
        ));
        assert!(matches!(
            PreyOverAggregator::new(&eco, &[], &areas, division),
            Err(ReportError::EmptySelection { what: "prey" })
        ));
    }
}
