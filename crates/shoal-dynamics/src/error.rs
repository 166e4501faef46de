//! Error types for the `shoal-dynamics` crate.
//!
//! Construction-time validation failures here are fatal configuration
//! errors: they abort simulation setup before the stepping loop starts.

use shoal_pop::PopError;

/// Errors raised by the growth and predation engines.
#[derive(Debug, thiserror::Error)]
pub enum DynamicsError {
    /// An underlying population or grid operation failed.
    #[error(transparent)]
    Pop(#[from] PopError),

    /// The parametric growth kernel needs a uniform-width division to
    /// express growth in whole group jumps.
    #[error("division for {name} has variable group widths, parametric growth needs a uniform one")]
    NonUniformDivision {
        /// Owner of the offending division.
        name: String,
    },

    /// The kernel must allow at least one group jump.
    #[error("maximum length-group growth must be at least 1")]
    MaxJumpZero,

    /// The beta-binomial shape parameter must be positive.
    #[error("growth kernel shape parameter must be positive, got {beta}")]
    NonPositiveBeta {
        /// The offending value.
        beta: f64,
    },

    /// An empirical growth distribution was supplied with no entries.
    #[error("empirical growth distribution is empty")]
    EmptyDistribution,

    /// An empirical growth distribution holds a negative probability.
    #[error("empirical growth distribution entry {index} is negative ({value})")]
    NegativeProbability {
        /// Offending jump-count entry.
        index: usize,
        /// The offending value.
        value: f64,
    },

    /// An empirical growth distribution does not sum to one.
    #[error("empirical growth distribution sums to {sum}, expected 1")]
    UnnormalizedDistribution {
        /// Sum of the supplied probabilities.
        sum: f64,
    },

    /// A tabulated growth table has the wrong number of step rows.
    #[error("tabulated growth has {rows} step rows, expected {expected}")]
    TabulatedRows {
        /// Rows supplied.
        rows: usize,
        /// Rows required (one per step of the year).
        expected: usize,
    },

    /// A tabulated growth row has the wrong number of length columns.
    #[error("tabulated growth row {row} has {cols} columns, expected {expected}")]
    TabulatedWidth {
        /// Offending row.
        row: usize,
        /// Columns supplied.
        cols: usize,
        /// Columns required (one per length group).
        expected: usize,
    },

    /// A tabulated growth increment is negative.
    #[error("tabulated growth increment at row {row}, column {col} is negative ({value})")]
    NegativeIncrement {
        /// Offending row.
        row: usize,
        /// Offending column.
        col: usize,
        /// The offending value.
        value: f64,
    },

    /// A growth or suitability parameter that must be positive is not.
    #[error("{name} must be positive, got {value}")]
    NonPositiveParameter {
        /// Parameter name.
        name: &'static str,
        /// The offending value.
        value: f64,
    },

    /// A constant suitability must be a proportion.
    #[error("constant suitability must lie in [0, 1], got {value}")]
    SuitabilityRange {
        /// The offending value.
        value: f64,
    },

    /// A predator consumes a prey it has no catchability coefficient for.
    #[error("predator {predator} has no catchability for prey {prey}")]
    MissingCatchability {
        /// The predator.
        predator: String,
        /// The prey without a coefficient.
        prey: String,
    },

    /// A predator consumes a prey it has no suitability curve for.
    #[error("predator {predator} has no suitability for prey {prey}")]
    MissingSuitability {
        /// The predator.
        predator: String,
        /// The prey without a curve.
        prey: String,
    },

    /// A predator was asked to eat a prey it never registered a buffer for.
    #[error("predator {predator} has no consumption buffer for prey {prey}")]
    UnregisteredPrey {
        /// The predator.
        predator: String,
        /// The prey without a buffer.
        prey: String,
    },

    /// An area ordinal fell outside the configured arena.
    #[error("area {area} outside the {num_areas} configured areas")]
    AreaOutOfRange {
        /// The requested area.
        area: usize,
        /// Number of configured areas.
        num_areas: usize,
    },
}
