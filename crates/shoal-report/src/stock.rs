//! Population aggregation across stocks, areas and ages.

use shoal_core::Ecosystem;
use shoal_pop::{ConversionIndex, LengthDivision, PopCell, remap};
use tracing::debug;

use crate::error::ReportError;
use crate::select;

/// One selected stock and its mapping onto the aggregation division.
#[derive(Debug)]
struct Source {
    stock: usize,
    ci: ConversionIndex,
}

/// Sums selected stocks' populations onto one length division, bucketed by
/// area group and age group.
///
/// The selection is fixed at construction; [`sum`](StockAggregator::sum)
/// recomputes the buckets from live ecosystem state. A stock that does not
/// live on an area of a group, or does not track an age of a group, simply
/// contributes nothing there.
#[derive(Debug)]
pub struct StockAggregator {
    sources: Vec<Source>,
    area_groups: Vec<Vec<usize>>,
    age_groups: Vec<Vec<usize>>,
    division: LengthDivision,
    /// Bucket cells, indexed by area group then age group.
    totals: Vec<Vec<Vec<PopCell>>>,
}

impl StockAggregator {
    /// Builds the aggregator for a fixed selection.
    ///
    /// # Errors
    ///
    /// Fails when a name does not resolve, a group is empty, or a selected
    /// stock's division does not overlap the aggregation division.
    pub fn new(
        eco: &Ecosystem,
        stocks: &[String],
        area_groups: &[Vec<String>],
        age_groups: &[Vec<usize>],
        division: LengthDivision,
    ) -> Result<Self, ReportError> {
        if stocks.is_empty() {
            return Err(ReportError::EmptySelection { what: "stock" });
        }
        if age_groups.is_empty() || age_groups.iter().any(Vec::is_empty) {
            return Err(ReportError::EmptySelection { what: "age" });
        }
        let sources = stocks
            .iter()
            .map(|name| {
                let ordinal = select::stock_ordinal(eco, name)?;
                let stock_division = eco
                    .stocks
                    .get(ordinal)
                    .map(|stock| stock.division())
                    .ok_or_else(|| ReportError::UnknownStock { name: name.clone() })?;
                let ci = ConversionIndex::build(stock_division, &division)?;
                Ok(Source {
                    stock: ordinal,
                    ci,
                })
            })
            .collect::<Result<Vec<_>, ReportError>>()?;
        let area_groups = select::area_groups(eco, area_groups)?;
        let totals = vec![
            vec![vec![PopCell::default(); division.num_groups()]; age_groups.len()];
            area_groups.len()
        ];
        Ok(Self {
            sources,
            area_groups,
            age_groups: age_groups.to_vec(),
            division,
            totals,
        })
    }

    /// The division the buckets live on.
    #[must_use]
    pub const fn division(&self) -> &LengthDivision {
        &self.division
    }

    /// Number of area groups in the selection.
    #[must_use]
    pub fn num_area_groups(&self) -> usize {
        self.area_groups.len()
    }

    /// Number of age groups in the selection.
    #[must_use]
    pub fn num_age_groups(&self) -> usize {
        self.age_groups.len()
    }

    /// Recomputes every bucket from live ecosystem state.
    ///
    /// # Errors
    ///
    /// Fails when a remapped population row does not span its division;
    /// with an aggregator built from the same ecosystem this cannot happen.
    pub fn sum(&mut self, eco: &Ecosystem) -> Result<(), ReportError> {
        for per_area in &mut self.totals {
            for bucket in per_area {
                for cell in bucket.iter_mut() {
                    cell.zero();
                }
            }
        }
        for source in &self.sources {
            let Some(stock) = eco.stocks.get(source.stock) else {
                continue;
            };
            for (g, areas) in self.area_groups.iter().enumerate() {
                for &area in areas {
                    if !stock.lives_on(area) {
                        continue;
                    }
                    let Some(population) = stock.population(area) else {
                        continue;
                    };
                    for (h, ages) in self.age_groups.iter().enumerate() {
                        let Some(bucket) =
                            self.totals.get_mut(g).and_then(|row| row.get_mut(h))
                        else {
                            continue;
                        };
                        for &age in ages {
                            let Some(row) = population.row(age) else {
                                continue;
                            };
                            remap::accumulate_cells(bucket, row.cells(), row.start(), &source.ci)?;
                        }
                    }
                }
            }
        }
        debug!(
            stocks = self.sources.len(),
            buckets = self.area_groups.len().saturating_mul(self.age_groups.len()),
            "stock aggregation refreshed"
        );
        Ok(())
    }

    /// Bucket cells for one (area group, age group) pair.
    #[must_use]
    pub fn cells(&self, area_group: usize, age_group: usize) -> Option<&[PopCell]> {
        self.totals
            .get(area_group)
            .and_then(|row| row.get(age_group))
            .map(Vec::as_slice)
    }

    /// Total number of individuals in one bucket.
    #[must_use]
    pub fn number(&self, area_group: usize, age_group: usize) -> Option<f64> {
        self.cells(area_group, age_group)
            .map(|cells| cells.iter().map(|c| c.count).sum())
    }

    /// Total biomass in one bucket.
    #[must_use]
    pub fn biomass(&self, area_group: usize, age_group: usize) -> Option<f64> {
        self.cells(area_group, age_group)
            .map(|cells| cells.iter().copied().map(PopCell::biomass).sum())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use shoal_core::SimulationConfig;

    /// Two stocks on two areas: herring everywhere, cod in the north only,
    /// every cohort seeded tightly into a single length group.
    const FIXTURE: &str = r"
areas: [north, south]
stocks:
  - name: herring
    min_age: 1
    max_age: 2
    lengths: { min: 10.0, max: 30.0, width: 10.0 }
    length_weight: { coefficient: 1.0e-5, exponent: 3.0 }
    growth:
      function: { function: von_bertalanffy, l_infinity: 40.0, kappa: 0.2 }
      kernel: { kind: beta_binomial, max_jump: 2, beta: 0.8 }
    initial:
      - { area: north, age: 1, number: 600.0, mean_length: 15.0, sd: 0.1 }
      - { area: south, age: 2, number: 400.0, mean_length: 25.0, sd: 0.1 }
  - name: cod
    min_age: 2
    max_age: 3
    areas: [north]
    lengths: { min: 20.0, max: 40.0, width: 10.0 }
    length_weight: { coefficient: 1.0e-5, exponent: 3.0 }
    growth:
      function: { function: von_bertalanffy, l_infinity: 60.0, kappa: 0.2 }
      kernel: { kind: beta_binomial, max_jump: 2, beta: 0.8 }
    initial:
      - { area: north, age: 2, number: 100.0, mean_length: 25.0, sd: 0.1 }
      - { area: north, age: 3, number: 50.0, mean_length: 35.0, sd: 0.1 }
";

    fn seeded_ecosystem() -> Ecosystem {
        let config = SimulationConfig::parse(FIXTURE).unwrap();
        let mut eco = Ecosystem::from_config(&config).unwrap();
        for stock in &mut eco.stocks {
            stock.reset();
        }
        eco
    }

    fn make_aggregator(eco: &Ecosystem) -> StockAggregator {
        StockAggregator::new(
            eco,
            &["herring".to_owned(), "cod".to_owned()],
            &[vec!["north".to_owned()], vec!["south".to_owned()]],
            &[vec![1, 2], vec![3]],
            LengthDivision::uniform(10.0, 40.0, 10.0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn selected_cells_land_in_their_area_and_age_groups() {
        let eco = seeded_ecosystem();
        let mut aggregator = make_aggregator(&eco);
        aggregator.sum(&eco).unwrap();

        // North, ages one and two: herring's 600 small fish plus cod's 100.
        let bucket = aggregator.cells(0, 0).unwrap();
        assert!((bucket[0].count - 600.0).abs() < 1e-9);
        assert!((bucket[1].count - 100.0).abs() < 1e-9);
        assert!(bucket[2].count.abs() < 1e-12);
        let expected = 600.0 * 1.0e-5 * 15.0_f64.powi(3) + 100.0 * 1.0e-5 * 25.0_f64.powi(3);
        assert!((aggregator.biomass(0, 0).unwrap() - expected).abs() < 1e-9);

        // North, age three: only cod's oldest cohort.
        let bucket = aggregator.cells(0, 1).unwrap();
        assert!((bucket[2].count - 50.0).abs() < 1e-9);
        assert!((aggregator.number(0, 1).unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn contributors_outside_their_ranges_never_appear() {
        let eco = seeded_ecosystem();
        let mut aggregator = make_aggregator(&eco);
        aggregator.sum(&eco).unwrap();

        // South holds only herring; cod does not live there.
        let bucket = aggregator.cells(1, 0).unwrap();
        assert!(bucket[0].count.abs() < 1e-12);
        assert!((bucket[1].count - 400.0).abs() < 1e-9);
        // Neither stock puts an age-three cohort in the south.
        assert!(aggregator.number(1, 1).unwrap().abs() < 1e-12);
        assert!(aggregator.cells(2, 0).is_none());
    }

    #[test]
    fn resummation_reads_live_state() {
        let mut eco = seeded_ecosystem();
        let mut aggregator = make_aggregator(&eco);
        aggregator.sum(&eco).unwrap();
        assert!((aggregator.number(0, 0).unwrap() - 700.0).abs() < 1e-9);

        let herring = eco.stocks.get_mut(0).unwrap();
        herring
            .population_mut(0)
            .unwrap()
            .row_mut(1)
            .unwrap()
            .zero();
        aggregator.sum(&eco).unwrap();
        assert!((aggregator.number(0, 0).unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn selection_errors_are_fatal() {
        let eco = seeded_ecosystem();
        let division = LengthDivision::uniform(10.0, 40.0, 10.0).unwrap();
        assert!(matches!(
            StockAggregator::new(
                &eco,
                &["ghost".to_owned()],
                &[vec!["north".to_owned()]],
                &[vec![1]],
                division.clone(),
            ),
            Err(ReportError::UnknownStock { .. })
        ));
        assert!(matches!(
            StockAggregator::new(
                &eco,
                &["herring".to_owned()],
                &[vec!["atlantis".to_owned()]],
                &[vec![1]],
                division.clone(),
            ),
            Err(ReportError::UnknownArea { .. })
        ));
        assert!(matches!(
            StockAggregator::new(&eco, &["herring".to_owned()], &[], &[vec![1]], division),
            Err(ReportError::EmptySelection { what: "area" })
        ));
        // A division that shares no lengths with the stock cannot be summed onto.
        assert!(matches!(
            StockAggregator::new(
                &eco,
                &["herring".to_owned()],
                &[vec!["north".to_owned()]],
                &[vec![1]],
                LengthDivision::uniform(100.0, 200.0, 10.0).unwrap(),
            ),
            Err(ReportError::Pop { .. })
        ));
    }
}
