//! Suitability curves: how strongly a predator prefers prey of each length.
//!
//! A curve is evaluated at a prey length group's midpoint and weights that
//! group's biomass when a predator's demand is spread over the prey. The
//! variants form a closed set selected at configuration time; an unknown
//! curve name fails at deserialization, before any entity is built.

use serde::{Deserialize, Serialize};

use crate::error::DynamicsError;

/// Length-dependent prey preference weighting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "curve", rename_all = "snake_case")]
pub enum Suitability {
    /// The same weight for every prey length.
    Constant {
        /// Proportion in `[0, 1]` applied to every length group.
        value: f64,
    },
    /// A logistic ramp over prey length: `max / (1 + exp(-(alpha + beta * l)))`.
    Logistic {
        /// Intercept of the logistic exponent.
        alpha: f64,
        /// Slope of the logistic exponent per length unit.
        beta: f64,
        /// Upper asymptote of the curve.
        max: f64,
    },
    /// A linear ramp over prey length, clamped into `[0, 1]`.
    StraightLine {
        /// Slope per length unit.
        slope: f64,
        /// Value at zero length.
        intercept: f64,
    },
}

impl Suitability {
    /// Evaluates the curve at a prey length.
    #[must_use]
    pub fn at_length(&self, length: f64) -> f64 {
        match self {
            Self::Constant { value } => *value,
            Self::Logistic { alpha, beta, max } => {
                let exponent = beta.mul_add(length, *alpha);
                max / (1.0 + (-exponent).exp())
            }
            Self::StraightLine { slope, intercept } => {
                slope.mul_add(length, *intercept).clamp(0.0, 1.0)
            }
        }
    }

    /// Checks the curve's parameters at configuration time.
    ///
    /// # Errors
    ///
    /// Fails when a constant lies outside `[0, 1]` or a logistic asymptote
    /// is not positive.
    pub fn validate(&self) -> Result<(), DynamicsError> {
        match self {
            Self::Constant { value } => {
                if !(0.0..=1.0).contains(value) {
                    return Err(DynamicsError::SuitabilityRange { value: *value });
                }
            }
            Self::Logistic { max, .. } => {
                if *max <= 0.0 {
                    return Err(DynamicsError::NonPositiveParameter {
                        name: "suitability max",
                        value: *max,
                    });
                }
            }
            Self::StraightLine { .. } => {}
        }
        Ok(())
    }
}
