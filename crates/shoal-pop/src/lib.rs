//! Population state and length-grid machinery for the Shoal simulation.
//!
//! This crate holds the biological bookkeeping every other layer builds on:
//! populations discretized into age and length classes, and the conversion
//! machinery that lets stocks, predators and preys with different length
//! discretizations exchange quantities consistently.
//!
//! # Modules
//!
//! - [`cell`] -- [`PopCell`], the `{count, mean weight}` aggregate that is the
//!   unit of population state, with count-weighted combination arithmetic.
//! - [`division`] -- [`LengthDivision`], an ordered sequence of length-class
//!   boundaries with uniform-width detection.
//! - [`conversion`] -- [`ConversionIndex`], a precomputed mapping between two
//!   divisions (offset, position and group-count tables).
//! - [`dense`] -- [`DenseMatrix`], a flat row-major `f64` matrix used for
//!   growth redistribution and consumption bookkeeping.
//! - [`remap`] -- slice-level remapping between divisions: summing, scaled
//!   addition and value interpolation through a [`ConversionIndex`].
//! - [`matrix`] -- [`AgeLengthMatrix`], per-age windowed rows of cells, with
//!   growth application, aging and consumption subtraction.
//! - [`error`] -- [`PopError`] for every fallible operation in this crate.

pub mod cell;
pub mod conversion;
pub mod dense;
pub mod division;
pub mod error;
pub mod matrix;
pub mod remap;

// Re-export primary types at crate root.
pub use cell::{PopCell, VERY_SMALL};
pub use conversion::ConversionIndex;
pub use dense::DenseMatrix;
pub use division::LengthDivision;
pub use error::PopError;
pub use matrix::AgeLengthMatrix;
