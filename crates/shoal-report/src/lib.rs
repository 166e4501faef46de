//! Aggregation layer for the Shoal simulation.
//!
//! The aggregators read live [`shoal_core::Ecosystem`] state and bucket it
//! by caller-supplied groups of stocks, fleets, areas and ages, remapping
//! everything onto one target length division. Selections are resolved and
//! validated at construction; every `sum` call recomputes the buckets from
//! the current state, so one aggregator can follow a whole run.
//!
//! # Modules
//!
//! - [`stock`] -- [`StockAggregator`], populations bucketed by area group
//!   and age group.
//! - [`predation`] -- [`PredationAggregator`], consumed biomass bucketed by
//!   area, fleet and prey group.
//! - [`overconsumption`] -- [`PreyOverAggregator`], cap-refused demand
//!   bucketed by area group.
//! - [`error`] -- [`ReportError`] for selection and summation failures.

pub mod error;
pub mod overconsumption;
pub mod predation;
mod select;
pub mod stock;

// Re-export primary types at crate root.
pub use error::ReportError;
pub use overconsumption::PreyOverAggregator;
pub use predation::PredationAggregator;
pub use stock::StockAggregator;
