//! Error type for the aggregation layer.

use shoal_dynamics::DynamicsError;
use shoal_pop::PopError;
use thiserror::Error;

/// Errors from building or refreshing an aggregator.
#[derive(Debug, Error)]
pub enum ReportError {
    /// A selection named a stock the run does not simulate.
    #[error("unknown stock in selection: {name}")]
    UnknownStock {
        /// The name that did not resolve.
        name: String,
    },

    /// A selection named a fleet the run does not simulate.
    #[error("unknown fleet in selection: {name}")]
    UnknownFleet {
        /// The name that did not resolve.
        name: String,
    },

    /// A selection named an area the run does not define.
    #[error("unknown area in selection: {name}")]
    UnknownArea {
        /// The name that did not resolve.
        name: String,
    },

    /// A prey selection named a stock that cannot be eaten.
    #[error("stock {name} has no prey side to aggregate")]
    NotEdible {
        /// The stock without a prey side.
        name: String,
    },

    /// A selection contained no entries at all.
    #[error("empty {what} group in selection")]
    EmptySelection {
        /// Which part of the selection was empty.
        what: &'static str,
    },

    /// Population bookkeeping error.
    #[error("population error: {source}")]
    Pop {
        /// The underlying population error.
        #[from]
        source: PopError,
    },

    /// Growth or predation state error.
    #[error("dynamics error: {source}")]
    Dynamics {
        /// The underlying dynamics error.
        #[from]
        source: DynamicsError,
    },
}
