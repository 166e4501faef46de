//! Between-area movement of whole populations.
//!
//! A stock may carry one movement matrix per step of year. Row `from` of a
//! matrix gives the share of that area's population sent to each area, so
//! every row sums to one and the matrix conserves fish exactly. The matrix
//! for the current step is applied at the start of every sub-step, moving
//! whole age-length cells with their weights intact.

use shoal_pop::AgeLengthMatrix;

use crate::config::MigrationConfig;

/// Per-step-of-year movement matrices for one stock.
#[derive(Debug, Clone, Default)]
pub struct Migration {
    /// Indexed by zero-based step of year; `None` means no movement.
    matrices: Vec<Option<Vec<Vec<f64>>>>,
}

impl Migration {
    /// Builds the per-step matrix table from validated configuration.
    #[must_use]
    pub fn new(configs: &[MigrationConfig], steps_per_year: usize) -> Self {
        let mut matrices = vec![None; steps_per_year];
        for config in configs {
            if let Some(slot) = matrices.get_mut(config.step.saturating_sub(1)) {
                *slot = Some(config.matrix.clone());
            }
        }
        Self { matrices }
    }

    /// Returns whether any step of the year moves fish at all.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.matrices.iter().all(Option::is_none)
    }

    /// The matrix for a zero-based step of year, if one is configured.
    #[must_use]
    pub fn matrix_for(&self, step_index: usize) -> Option<&[Vec<f64>]> {
        self.matrices
            .get(step_index)
            .and_then(Option::as_ref)
            .map(Vec::as_slice)
    }

    /// Redistributes the per-area populations using the matrix for the given
    /// step of year. Does nothing when that step has no matrix.
    ///
    /// `areas` maps the matrix's local ordinals to global area ordinals, in
    /// the stock's configured order; `populations` is globally indexed.
    pub fn apply(&self, step_index: usize, areas: &[usize], populations: &mut [AgeLengthMatrix]) {
        let Some(matrix) = self.matrix_for(step_index) else {
            return;
        };
        let mut staged: Vec<AgeLengthMatrix> = areas
            .iter()
            .filter_map(|&global| populations.get(global))
            .map(|population| {
                let mut blank = population.clone();
                blank.zero();
                blank
            })
            .collect();
        for (from, row) in matrix.iter().enumerate() {
            let Some(source) = areas.get(from).and_then(|&global| populations.get(global)) else {
                continue;
            };
            for (to, share) in row.iter().enumerate() {
                if *share <= 0.0 {
                    continue;
                }
                if let Some(target) = staged.get_mut(to) {
                    target.add_scaled(source, *share);
                }
            }
        }
        for (local, moved) in staged.into_iter().enumerate() {
            if let Some(slot) = areas.get(local).and_then(|&global| populations.get_mut(global)) {
                *slot = moved;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use shoal_pop::AgeLengthMatrix;

    fn seeded_population(count: f64, weight: f64) -> AgeLengthMatrix {
        let mut population = AgeLengthMatrix::full(1, 2, 3).unwrap();
        for age in 1..=2 {
            for length in 0..3 {
                let cell = population.cell_mut(age, length).unwrap();
                cell.count = count;
                cell.mean_weight = weight;
            }
        }
        population
    }

    #[test]
    fn movement_conserves_totals_across_areas() {
        let configs = vec![MigrationConfig {
            step: 2,
            matrix: vec![vec![0.75, 0.25], vec![0.0, 1.0]],
        }];
        let migration = Migration::new(&configs, 4);
        let mut populations = vec![seeded_population(100.0, 2.0), seeded_population(40.0, 2.0)];
        let before: f64 = populations.iter().map(AgeLengthMatrix::total_number).sum();

        migration.apply(1, &[0, 1], &mut populations);

        let after: f64 = populations.iter().map(AgeLengthMatrix::total_number).sum();
        assert!((before - after).abs() < 1e-9);
        // Each of the six cells in area one kept 75 of its 100 fish.
        let kept = populations[0].cell(1, 0).unwrap();
        assert!((kept.count - 75.0).abs() < 1e-9);
        // Area two kept its own fish and gained a quarter of area one's.
        let gained = populations[1].cell(1, 0).unwrap();
        assert!((gained.count - 65.0).abs() < 1e-9);
        assert!((gained.mean_weight - 2.0).abs() < 1e-9);
    }

    #[test]
    fn steps_without_a_matrix_leave_populations_alone() {
        let configs = vec![MigrationConfig {
            step: 2,
            matrix: vec![vec![0.5, 0.5], vec![0.5, 0.5]],
        }];
        let migration = Migration::new(&configs, 4);
        let mut populations = vec![seeded_population(10.0, 1.0), seeded_population(20.0, 1.0)];

        migration.apply(0, &[0, 1], &mut populations);

        assert!((populations[0].total_number() - 60.0).abs() < 1e-9);
        assert!((populations[1].total_number() - 120.0).abs() < 1e-9);
        assert!(!migration.is_static());
    }

    #[test]
    fn subset_stocks_move_between_their_own_areas() {
        // The stock lives on global areas 2 and 0, in that order, so matrix
        // row 0 moves fish out of global area 2.
        let configs = vec![MigrationConfig {
            step: 1,
            matrix: vec![vec![0.0, 1.0], vec![0.0, 1.0]],
        }];
        let migration = Migration::new(&configs, 4);
        let mut populations = vec![
            seeded_population(10.0, 1.0),
            seeded_population(999.0, 1.0),
            seeded_population(30.0, 1.0),
        ];

        migration.apply(0, &[2, 0], &mut populations);

        assert!(populations[2].total_number().abs() < 1e-12);
        assert!((populations[0].total_number() - 240.0).abs() < 1e-9);
        // Global area 1 is outside the stock's range and stays untouched.
        assert!((populations[1].total_number() - 5994.0).abs() < 1e-9);
    }

    #[test]
    fn empty_configuration_is_static() {
        let migration = Migration::new(&[], 4);
        assert!(migration.is_static());
        assert!(migration.matrix_for(0).is_none());
    }
}
