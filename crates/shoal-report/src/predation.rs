//! Consumption aggregation across fleets, preys and areas.

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

/// Sums the biomass consumed by fleet groups from prey groups onto one
/// length division, bucketed by area group.
///
/// The figures are the run accumulators committed by the adjust phase, so a
/// bucket is monotonically non-decreasing between resets. A (fleet, prey)
/// pair the fleet does not target contributes nothing.
#[derive(Debug)]
pub struct PredationAggregator {
    fleets: Vec<Vec<usize>>,
    preys: Vec<Vec<PreySource>>,
    area_groups: Vec<Vec<usize>>,
    division: LengthDivision,
    /// Bucket quantities, indexed by area group, fleet group, prey group.
    totals: Vec<Vec<Vec<Vec<f64>>>>,
}

impl PredationAggregator {
    /// Builds the aggregator for a fixed selection.
    ///
    /// # Errors
    ///
    /// Fails when a name does not resolve, a group is empty, a prey-group
    /// stock cannot be eaten, or a prey division does not overlap the
    /// aggregation division.
    pub fn new(
        eco: &Ecosystem,
        fleet_groups: &[Vec<String>],
        prey_groups: &[Vec<String>],
        area_groups: &[Vec<String>],
        division: LengthDivision,
    ) -> Result<Self, ReportError> {
        if fleet_groups.is_empty() || fleet_groups.iter().any(Vec::is_empty) {
            return Err(ReportError::EmptySelection { what: "fleet" });
        }
        if prey_groups.is_empty() || prey_groups.iter().any(Vec::is_empty) {
            return Err(ReportError::EmptySelection { what: "prey" });
        }
        let fleets = fleet_groups
            .iter()
            .map(|group| {
                group
                    .iter()
                    .map(|name| select::fleet_ordinal(eco, name))
                    .collect()
            })
            .collect::<Result<Vec<_>, ReportError>>()?;
        let preys = prey_groups
            .iter()
            .map(|group| {
                group
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
                    .collect()
            })
            .collect::<Result<Vec<_>, ReportError>>()?;
        let area_groups = select::area_groups(eco, area_groups)?;
        let totals = vec![
            vec![vec![vec![0.0; division.num_groups()]; preys.len()]; fleets.len()];
            area_groups.len()
        ];
        Ok(Self {
            fleets,
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
    /// Fails when a consumption record cannot be read back; with an
    /// aggregator built from the same ecosystem this cannot happen.
    pub fn sum(&mut self, eco: &Ecosystem) -> Result<(), ReportError> {
        for per_area in &mut self.totals {
            for per_fleet in per_area {
                for bucket in per_fleet {
                    bucket.fill(0.0);
                }
            }
        }
        for (g, areas) in self.area_groups.iter().enumerate() {
            for (f, fleet_ids) in self.fleets.iter().enumerate() {
                for (p, sources) in self.preys.iter().enumerate() {
                    let Some(bucket) = self
                        .totals
                        .get_mut(g)
                        .and_then(|row| row.get_mut(f))
                        .and_then(|row| row.get_mut(p))
                    else {
                        continue;
                    };
                    for &fleet_id in fleet_ids {
                        let Some(fleet) = eco.fleets.get(fleet_id) else {
                            continue;
                        };
                        for source in sources {
                            let Some(stock) = eco.stocks.get(source.stock) else {
                                continue;
                            };
                            let name = stock.name();
                            if !fleet.targets().any(|target| target == name) {
                                continue;
                            }
                            for &area in areas {
                                if !stock.lives_on(area) {
                                    continue;
                                }
                                let amounts = fleet.consumption(area, name)?;
                                remap::accumulate_values(bucket, amounts, &source.ci)?;
                            }
                        }
                    }
                }
            }
        }
        debug!(
            fleet_groups = self.fleets.len(),
            prey_groups = self.preys.len(),
            "predation aggregation refreshed"
        );
        Ok(())
    }

    /// Consumed biomass per length group for one bucket.
    #[must_use]
    pub fn consumed(
        &self,
        area_group: usize,
        fleet_group: usize,
        prey_group: usize,
    ) -> Option<&[f64]> {
        self.totals
            .get(area_group)
            .and_then(|row| row.get(fleet_group))
            .and_then(|row| row.get(prey_group))
            .map(Vec::as_slice)
    }

    /// Total consumed biomass in one bucket.
    #[must_use]
    pub fn total(&self, area_group: usize, fleet_group: usize, prey_group: usize) -> Option<f64> {
        self.consumed(area_group, fleet_group, prey_group)
            .map(|amounts| amounts.iter().sum())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use shoal_core::{SimulationConfig, run_step};

    /// Two edible unit-weight stocks, one fleet that only targets capelin,
    /// and one non-edible stock for the selection error path.
    const FIXTURE: &str = r"
simulation:
  first_year: 2000
  last_year: 2000
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
  - name: mackerel
    min_age: 1
    max_age: 1
    lengths: { min: 0.5, max: 1.5, width: 1.0 }
    length_weight: { coefficient: 1.0, exponent: 1.0 }
    growth:
      function: { function: length_power, coefficient: 0.0, exponent: 1.0 }
      kernel: { kind: empirical, probabilities: [1.0] }
    prey: {}
    initial:
      - { area: north, age: 1, number: 200.0, mean_length: 1.0, sd: 0.1 }
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
      - { area: north, value: 40.0 }
      - { area: south, value: 30.0 }
";

    fn fished_ecosystem() -> Ecosystem {
        let config = SimulationConfig::parse(FIXTURE).unwrap();
        let mut eco = Ecosystem::from_config(&config).unwrap();
        run_step(&mut eco).unwrap();
        eco
    }

    #[test]
    fn consumption_is_bucketed_by_area_and_pair() {
        let eco = fished_ecosystem();
        let mut aggregator = PredationAggregator::new(
            &eco,
            &[vec!["trawler".to_owned()]],
            &[vec!["capelin".to_owned()], vec!["mackerel".to_owned()]],
            &[vec!["north".to_owned()], vec!["south".to_owned()]],
            LengthDivision::uniform(0.5, 1.5, 1.0).unwrap(),
        )
        .unwrap();
        aggregator.sum(&eco).unwrap();

        // Both demands sat below the cap, so the full effort was eaten.
        assert!((aggregator.consumed(0, 0, 0).unwrap()[0] - 40.0).abs() < 1e-9);
        assert!((aggregator.consumed(1, 0, 0).unwrap()[0] - 30.0).abs() < 1e-9);
        // The fleet never targets mackerel, so the pair stays empty.
        assert!(aggregator.total(0, 0, 1).unwrap().abs() < 1e-12);
        assert!(aggregator.consumed(2, 0, 0).is_none());
    }

    #[test]
    fn merged_area_group_sums_both_coasts() {
        let eco = fished_ecosystem();
        let mut aggregator = PredationAggregator::new(
            &eco,
            &[vec!["trawler".to_owned()]],
            &[vec!["capelin".to_owned()]],
            &[vec!["north".to_owned(), "south".to_owned()]],
            LengthDivision::uniform(0.5, 1.5, 1.0).unwrap(),
        )
        .unwrap();
        aggregator.sum(&eco).unwrap();
        assert!((aggregator.total(0, 0, 0).unwrap() - 70.0).abs() < 1e-9);
    }

    #[test]
    fn selection_errors_are_fatal() {
        let eco = fished_ecosystem();
        let division = LengthDivision::uniform(0.5, 1.5, 1.0).unwrap();
        let areas = vec![vec!["north".to_owned()]];
        assert!(matches!(
            PredationAggregator::new(
                &eco,
                &[vec!["ghost".to_owned()]],
                &[vec!["capelin".to_owned()]],
                &areas,
                division.clone(),
            ),
            Err(ReportError::UnknownFleet { .. })
        ));
        assert!(matches!(
            PredationAggregator::new(
                &eco,
                &[vec!["trawler".to_owned()]],
                &[vec!["halibut".to_owned()]],
                &areas,
                division.clone(),
            ),
            Err(ReportError::NotEdible { .. })
        ));
        assert!(matches!(
            PredationAggregator::new(
                &eco,
                &[vec!["trawler".to_owned()]],
                &[],
                &areas,
                division,
            ),
            Err(ReportError::EmptySelection { what: "prey" })
        ));
    }
}
