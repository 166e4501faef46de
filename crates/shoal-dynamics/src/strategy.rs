//! Expected growth per length group.
//!
//! A [`GrowthFunction`] maps the mean length of each group to the expected
//! length increment over one step, on the stock's own length division. The
//! matching weight increment comes either from the configured
//! [`LengthWeight`] relation evaluated before and after the length increment,
//! or from the tabulated weights when the function itself is a table.
//!
//! Tabulated increments are indexed by step of year and length group; every
//! area shares the same row for a given step.

use serde::{Deserialize, Serialize};

use crate::error::DynamicsError;

/// Closed set of growth strategies a stock can be configured with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "function", rename_all = "snake_case")]
pub enum GrowthFunction {
    /// Von Bertalanffy growth towards an asymptotic length.
    VonBertalanffy {
        /// Asymptotic length, same unit as the length division.
        l_infinity: f64,
        /// Growth rate per year.
        kappa: f64,
    },
    /// Power-law growth in mean length.
    LengthPower {
        /// Multiplier on the length power.
        coefficient: f64,
        /// Exponent applied to mean length.
        exponent: f64,
    },
    /// Externally supplied increments per step of year and length group.
    Tabulated {
        /// Length increments, one row per step of year.
        lengths: Vec<Vec<f64>>,
        /// Weight increments, one row per step of year.
        weights: Vec<Vec<f64>>,
    },
}

impl GrowthFunction {
    /// Checks table shapes against the division and calendar.
    ///
    /// # Errors
    ///
    /// Fails when a tabulated function has the wrong number of rows for the
    /// calendar, a row of the wrong width, or a negative increment.
    pub fn validate(
        &self,
        num_lengths: usize,
        steps_per_year: usize,
    ) -> Result<(), DynamicsError> {
        let Self::Tabulated { lengths, weights } = self else {
            return Ok(());
        };
        for table in [lengths, weights] {
            if table.len() != steps_per_year {
                return Err(DynamicsError::TabulatedRows {
                    rows: table.len(),
                    expected: steps_per_year,
                });
            }
            for (row, increments) in table.iter().enumerate() {
                if increments.len() != num_lengths {
                    return Err(DynamicsError::TabulatedWidth {
                        row,
                        cols: increments.len(),
                        expected: num_lengths,
                    });
                }
                for (col, &value) in increments.iter().enumerate() {
                    if value < 0.0 {
                        return Err(DynamicsError::NegativeIncrement { row, col, value });
                    }
                }
            }
        }
        Ok(())
    }

    /// Writes the expected length increment for each group into `out`.
    ///
    /// `step_size` is the step length as a fraction of a year and
    /// `step_of_year` selects the row of a tabulated function.
    pub fn length_growth(
        &self,
        mean_lengths: &[f64],
        step_size: f64,
        step_of_year: usize,
        out: &mut [f64],
    ) {
        match self {
            Self::VonBertalanffy { l_infinity, kappa } => {
                let fraction = -(-kappa * step_size).exp_m1();
                for (slot, &length) in out.iter_mut().zip(mean_lengths.iter()) {
                    *slot = ((l_infinity - length) * fraction).max(0.0);
                }
            }
            Self::LengthPower {
                coefficient,
                exponent,
            } => {
                for (slot, &length) in out.iter_mut().zip(mean_lengths.iter()) {
                    *slot = coefficient * length.powf(*exponent) * step_size;
                }
            }
            Self::Tabulated { lengths, .. } => {
                let row = lengths.get(step_of_year).map_or(&[][..], Vec::as_slice);
                for (slot, &value) in out.iter_mut().zip(row.iter()) {
                    *slot = value;
                }
            }
        }
    }

    /// Writes the expected weight increment for each group into `out`.
    ///
    /// Parametric functions derive the increment from the length-weight
    /// relation across the length increment; tabulated functions read their
    /// own weight row.
    pub fn weight_growth(
        &self,
        mean_lengths: &[f64],
        length_growth: &[f64],
        relation: &LengthWeight,
        step_of_year: usize,
        out: &mut [f64],
    ) {
        if let Self::Tabulated { weights, .. } = self {
            let row = weights.get(step_of_year).map_or(&[][..], Vec::as_slice);
            for (slot, &value) in out.iter_mut().zip(row.iter()) {
                *slot = value;
            }
            return;
        }
        for ((slot, &length), &growth) in
            out.iter_mut().zip(mean_lengths.iter()).zip(length_growth.iter())
        {
            *slot = (relation.weight_at(length + growth) - relation.weight_at(length)).max(0.0);
        }
    }
}

/// Allometric length-weight relation `w = a * l^b`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LengthWeight {
    /// Condition coefficient `a`.
    pub coefficient: f64,
    /// Allometric exponent `b`.
    pub exponent: f64,
}

impl LengthWeight {
    /// Checks that both parameters are positive.
    ///
    /// # Errors
    ///
    /// Fails with the offending parameter name when one is not positive.
    pub fn validate(&self) -> Result<(), DynamicsError> {
        if self.coefficient <= 0.0 {
            return Err(DynamicsError::NonPositiveParameter {
                name: "length-weight coefficient",
                value: self.coefficient,
            });
        }
        if self.exponent <= 0.0 {
            return Err(DynamicsError::NonPositiveParameter {
                name: "length-weight exponent",
                value: self.exponent,
            });
        }
        Ok(())
    }

    /// Reference weight of an individual at `length`.
    #[must_use]
    pub fn weight_at(&self, length: f64) -> f64 {
        self.coefficient * length.powf(self.exponent)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn von_bertalanffy_slows_towards_asymptote() {
        let function = GrowthFunction::VonBertalanffy {
            l_infinity: 100.0,
            kappa: 0.2,
        };
        let lengths = [10.0, 50.0, 90.0, 120.0];
        let mut out = [0.0; 4];
        function.length_growth(&lengths, 0.25, 0, &mut out);
        let fraction = 1.0 - (-0.05_f64).exp();
        assert!((out[0] - 90.0 * fraction).abs() < 1e-12);
        assert!((out[1] - 50.0 * fraction).abs() < 1e-12);
        assert!(out[0] > out[1] && out[1] > out[2]);
        // Beyond the asymptote nothing shrinks.
        assert!(out[3].abs() < 1e-12);
    }

    #[test]
    fn length_power_scales_with_step_size() {
        let function = GrowthFunction::LengthPower {
            coefficient: 0.01,
            exponent: 2.0,
        };
        let lengths = [10.0, 20.0];
        let mut quarter = [0.0; 2];
        let mut half = [0.0; 2];
        function.length_growth(&lengths, 0.25, 0, &mut quarter);
        function.length_growth(&lengths, 0.5, 0, &mut half);
        assert!((quarter[0] - 0.25).abs() < 1e-12);
        assert!((half[0] - 2.0 * quarter[0]).abs() < 1e-12);
        assert!((half[1] - 2.0 * quarter[1]).abs() < 1e-12);
    }

    #[test]
    fn tabulated_rows_follow_the_step_of_year() {
        let function = GrowthFunction::Tabulated {
            lengths: vec![vec![0.5, 0.4], vec![0.1, 0.2]],
            weights: vec![vec![5.0, 4.0], vec![1.0, 2.0]],
        };
        function.validate(2, 2).unwrap();
        let relation = LengthWeight {
            coefficient: 1.0,
            exponent: 3.0,
        };
        let mut lgrowth = [0.0; 2];
        let mut wgrowth = [0.0; 2];
        function.length_growth(&[10.0, 20.0], 0.25, 1, &mut lgrowth);
        function.weight_growth(&[10.0, 20.0], &lgrowth, &relation, 1, &mut wgrowth);
        assert!((lgrowth[0] - 0.1).abs() < 1e-12);
        assert!((wgrowth[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn tabulated_shape_mismatches_are_rejected() {
        let short = GrowthFunction::Tabulated {
            lengths: vec![vec![0.5, 0.4]],
            weights: vec![vec![5.0, 4.0]],
        };
        assert!(short.validate(2, 4).is_err());
        let ragged = GrowthFunction::Tabulated {
            lengths: vec![vec![0.5], vec![0.1]],
            weights: vec![vec![5.0], vec![1.0]],
        };
        assert!(ragged.validate(2, 2).is_err());
        let negative = GrowthFunction::Tabulated {
            lengths: vec![vec![0.5, -0.4]],
            weights: vec![vec![5.0, 4.0]],
        };
        assert!(negative.validate(2, 1).is_err());
    }

    #[test]
    fn weight_growth_tracks_the_relation() {
        let function = GrowthFunction::VonBertalanffy {
            l_infinity: 100.0,
            kappa: 0.3,
        };
        let relation = LengthWeight {
            coefficient: 1e-5,
            exponent: 3.0,
        };
        let lengths = [40.0];
        let mut lgrowth = [0.0];
        let mut wgrowth = [0.0];
        function.length_growth(&lengths, 1.0, 0, &mut lgrowth);
        function.weight_growth(&lengths, &lgrowth, &relation, 0, &mut wgrowth);
        let expected = relation.weight_at(40.0 + lgrowth[0]) - relation.weight_at(40.0);
        assert!((wgrowth[0] - expected).abs() < 1e-15);
    }

    #[test]
    fn relation_parameters_are_validated() {
        assert!(LengthWeight {
            coefficient: 0.0,
            exponent: 3.0
        }
        .validate()
        .is_err());
        assert!(LengthWeight {
            coefficient: 1e-5,
            exponent: -1.0
        }
        .validate()
        .is_err());
        assert!(LengthWeight {
            coefficient: 1e-5,
            exponent: 3.0
        }
        .validate()
        .is_ok());
    }
}
