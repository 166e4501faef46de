//! Movement of one age group from a maturing stock into recipient stocks.
//!
//! On the configured step of the year, after growth, the whole transition
//! age group of the source stock is captured into a single-age staging
//! matrix and the source rows are zeroed. Each recipient then receives its
//! configured fraction, remapped onto its own length division. The two
//! halves are separate phases so that a stock both giving and receiving
//! fish in the same step sees every capture finish before any delivery.

use shoal_pop::{AgeLengthMatrix, ConversionIndex};

use crate::config::TransitionConfig;
use crate::error::SetupError;
use crate::stock::Stock;

/// One recipient of a transition, resolved to a stock ordinal.
#[derive(Debug, Clone)]
pub struct Recipient {
    stock: usize,
    ratio: f64,
    ci: ConversionIndex,
}

impl Recipient {
    /// Ordinal of the receiving stock.
    #[must_use]
    pub const fn stock(&self) -> usize {
        self.stock
    }

    /// Fraction of the captured group this recipient receives.
    #[must_use]
    pub const fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Source-to-recipient length conversion.
    #[must_use]
    pub const fn conversion(&self) -> &ConversionIndex {
        &self.ci
    }
}

/// A resolved stock-to-stock transition.
#[derive(Debug, Clone)]
pub struct Transition {
    step_index: usize,
    age: usize,
    recipients: Vec<Recipient>,
}

impl Transition {
    /// Resolves a transition's recipient names against the stock list and
    /// prepares the length conversions.
    ///
    /// # Errors
    ///
    /// Fails when a recipient name does not resolve, when the source or a
    /// recipient does not track the transition age, or when a length
    /// conversion cannot be built.
    pub fn resolve(
        source: &Stock,
        config: &TransitionConfig,
        stocks: &[Stock],
    ) -> Result<Self, SetupError> {
        if config.age < source.min_age() || config.age > source.max_age() {
            return Err(SetupError::TransitionAge {
                name: source.name().to_owned(),
                age: config.age,
            });
        }
        let mut recipients = Vec::with_capacity(config.to.len());
        for target in &config.to {
            let (index, stock) = stocks
                .iter()
                .enumerate()
                .find(|(_, stock)| stock.name() == target.stock)
                .ok_or_else(|| SetupError::UnknownStock {
                    name: target.stock.clone(),
                })?;
            if config.age < stock.min_age() || config.age > stock.max_age() {
                return Err(SetupError::TransitionAge {
                    name: stock.name().to_owned(),
                    age: config.age,
                });
            }
            let ci = ConversionIndex::build(source.division(), stock.division())?;
            recipients.push(Recipient {
                stock: index,
                ratio: target.ratio,
                ci,
            });
        }
        Ok(Self {
            step_index: config.step.saturating_sub(1),
            age: config.age,
            recipients,
        })
    }

    /// Whether the transition fires on a zero-based step of year.
    #[must_use]
    pub const fn fires_on(&self, step_index: usize) -> bool {
        self.step_index == step_index
    }

    /// The captured age group.
    #[must_use]
    pub const fn age(&self) -> usize {
        self.age
    }

    /// The resolved recipients.
    #[must_use]
    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    /// Moves the transition age group out of one area's population into a
    /// single-age staging matrix, zeroing the source row.
    ///
    /// Returns `None` when the population does not track the age.
    pub fn capture(&self, population: &mut AgeLengthMatrix) -> Option<AgeLengthMatrix> {
        let num_lengths = population.num_lengths();
        let row = population.row_mut(self.age)?;
        let window = (row.start(), row.end());
        let mut staged = AgeLengthMatrix::new(self.age, self.age, &[window], num_lengths).ok()?;
        if let Some(staged_row) = staged.row_mut(self.age) {
            for (length, cell) in row.iter_cells() {
                if let Some(slot) = staged_row.cell_mut(length) {
                    *slot = *cell;
                }
            }
        }
        row.zero();
        Some(staged)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn bare_transition(age: usize) -> Transition {
        Transition {
            step_index: 3,
            age,
            recipients: Vec::new(),
        }
    }

    #[test]
    fn capture_moves_the_whole_age_group_and_zeroes_the_source() {
        let mut population = AgeLengthMatrix::full(1, 3, 4).unwrap();
        for length in 0..4 {
            let cell = population.cell_mut(3, length).unwrap();
            cell.count = 50.0;
            cell.mean_weight = 2.0;
            let younger = population.cell_mut(2, length).unwrap();
            younger.count = 10.0;
            younger.mean_weight = 1.0;
        }
        let transition = bare_transition(3);

        let staged = transition.capture(&mut population).unwrap();

        assert!((staged.total_number() - 200.0).abs() < 1e-9);
        assert_eq!(staged.min_age(), 3);
        assert_eq!(staged.max_age(), 3);
        let moved = staged.cell(3, 1).unwrap();
        assert!((moved.mean_weight - 2.0).abs() < 1e-12);
        // The donor row is empty, the rest of the stock is untouched.
        assert!(population.row(3).unwrap().total_number().abs() < 1e-12);
        assert!((population.row(2).unwrap().total_number() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn capture_of_an_untracked_age_is_a_no_op() {
        let mut population = AgeLengthMatrix::full(1, 3, 4).unwrap();
        let transition = bare_transition(7);
        assert!(transition.capture(&mut population).is_none());
    }

    #[test]
    fn firing_step_matches_the_configured_step_only() {
        let transition = bare_transition(2);
        assert!(transition.fires_on(3));
        assert!(!transition.fires_on(0));
    }
}
