//! Error types for the `shoal-pop` crate.
//!
//! All fallible operations in this crate return [`PopError`] through the
//! standard [`Result`] type alias.

/// Errors that can occur while building or manipulating population state.
#[derive(Debug, thiserror::Error)]
pub enum PopError {
    /// A length division needs at least two boundaries to form one group.
    #[error("length division needs at least 2 boundaries, got {count}")]
    TooFewBoundaries {
        /// Number of boundaries supplied.
        count: usize,
    },

    /// Length-division boundaries must be strictly increasing.
    #[error("length boundary at index {index} is not above its predecessor ({value} <= {previous})")]
    NonIncreasingBoundary {
        /// Index of the offending boundary.
        index: usize,
        /// The offending boundary value.
        value: f64,
        /// The preceding boundary value.
        previous: f64,
    },

    /// A uniform division was requested with a non-positive group width.
    #[error("group width must be positive, got {width}")]
    NonPositiveWidth {
        /// The requested width.
        width: f64,
    },

    /// A uniform division was requested whose span is not a whole number of groups.
    #[error("length range [{min}, {max}) is not a whole number of groups of width {width}")]
    UnevenSpan {
        /// Lower bound of the range.
        min: f64,
        /// Upper bound of the range.
        max: f64,
        /// The requested group width.
        width: f64,
    },

    /// Two divisions shared no overlapping length range.
    #[error("length divisions do not overlap: [{source_min}, {source_max}) vs [{target_min}, {target_max})")]
    NoOverlap {
        /// Source division lower bound.
        source_min: f64,
        /// Source division upper bound.
        source_max: f64,
        /// Target division lower bound.
        target_min: f64,
        /// Target division upper bound.
        target_max: f64,
    },

    /// A conversion lookup fell outside the valid mapped range.
    #[error("conversion position {index} outside valid range [{min}, {max})")]
    PositionOutOfRange {
        /// The requested source index.
        index: usize,
        /// First valid source index.
        min: usize,
        /// One past the last valid source index.
        max: usize,
    },

    /// An age row window does not fit inside the owner's length division.
    #[error("age {age}: window [{start}, {end}) outside division with {num_lengths} groups")]
    WindowOutOfRange {
        /// The age class.
        age: usize,
        /// Window start index.
        start: usize,
        /// Window end index (exclusive).
        end: usize,
        /// Number of groups in the division.
        num_lengths: usize,
    },

    /// An age-length matrix was requested with no age classes.
    #[error("age range [{min_age}, {max_age}] holds no age classes")]
    EmptyAgeRange {
        /// Requested minimum age.
        min_age: usize,
        /// Requested maximum age.
        max_age: usize,
    },

    /// Per-age windows were supplied for the wrong number of ages.
    #[error("expected {expected} age windows, got {actual}")]
    WindowCountMismatch {
        /// Number of age classes in the matrix.
        expected: usize,
        /// Number of windows supplied.
        actual: usize,
    },

    /// A growth redistribution matrix does not match the owning division.
    #[error("growth matrix is {rows}x{cols}, expected {expected_cols} length columns")]
    GrowthMatrixShape {
        /// Rows in the supplied matrix.
        rows: usize,
        /// Columns in the supplied matrix.
        cols: usize,
        /// Columns required by the division.
        expected_cols: usize,
    },

    /// A per-age factor vector does not cover every age class.
    #[error("expected {expected} per-age factors, got {actual}")]
    AgeFactorLength {
        /// Number of age classes.
        expected: usize,
        /// Number of factors supplied.
        actual: usize,
    },

    /// A per-length vector does not cover the expected division.
    #[error("expected a vector of {expected} length groups, got {actual}")]
    LengthVectorSize {
        /// Groups in the expected division.
        expected: usize,
        /// Elements supplied.
        actual: usize,
    },

    /// Matrix rows of unequal width were supplied where a rectangle is required.
    #[error("row {row} has {actual} columns, expected {expected}")]
    RaggedRows {
        /// Index of the offending row.
        row: usize,
        /// Columns required.
        expected: usize,
        /// Columns found.
        actual: usize,
    },
}
