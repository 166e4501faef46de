//! Errors for ecosystem setup and stepping.
//!
//! Setup errors end the run before the first step: they mean the run file
//! describes something the ecosystem cannot build, such as a transition into
//! a stock that does not exist. Step errors surface defects in the stepping
//! loop itself and are equally fatal, but carry the phase context of the
//! failure.

use shoal_dynamics::DynamicsError;
use shoal_pop::PopError;

use crate::clock::ClockError;
use crate::config::ConfigError;

/// Errors raised while building an ecosystem from a run configuration.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// The run configuration could not be loaded or failed validation.
    #[error("configuration error: {source}")]
    Config {
        /// The underlying configuration error.
        #[from]
        source: ConfigError,
    },

    /// The simulation clock rejected the calendar.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// A population-dynamics entity rejected its parameters.
    #[error("dynamics error: {source}")]
    Dynamics {
        /// The underlying dynamics error.
        #[from]
        source: DynamicsError,
    },

    /// A population structure rejected its parameters.
    #[error("population error: {source}")]
    Pop {
        /// The underlying population error.
        #[from]
        source: PopError,
    },

    /// A transition or fleet names a stock the run does not define.
    #[error("reference to unknown stock {name}")]
    UnknownStock {
        /// The unresolved stock name.
        name: String,
    },

    /// A stock names an area the run does not define.
    #[error("reference to unknown area {name}")]
    UnknownArea {
        /// The unresolved area name.
        name: String,
    },

    /// A fleet targets a stock that has no prey side to consume.
    #[error("fleet {fleet} targets stock {name}, which is not edible")]
    TargetNotEdible {
        /// The fleet naming the target.
        fleet: String,
        /// The targeted stock.
        name: String,
    },

    /// A transition age is outside a participating stock's tracked range.
    #[error("transition age {age} is outside the tracked ages of stock {name}")]
    TransitionAge {
        /// The stock whose age range does not cover the transition age.
        name: String,
        /// The configured transition age.
        age: usize,
    },

    /// An age window bound does not sit on a length group boundary.
    #[error("stock {stock}: age {age} window bound {length} is not a group boundary")]
    MisalignedWindow {
        /// The stock owning the window.
        stock: String,
        /// The age the window applies to.
        age: usize,
        /// The offending bound.
        length: f64,
    },
}

/// Errors raised while advancing the ecosystem by one step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// The simulation clock could not advance.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// A population-dynamics phase failed.
    #[error("dynamics error: {source}")]
    Dynamics {
        /// The underlying dynamics error.
        #[from]
        source: DynamicsError,
    },

    /// A population operation failed.
    #[error("population error: {source}")]
    Pop {
        /// The underlying population error.
        #[from]
        source: PopError,
    },

    /// The run was stepped past its configured horizon.
    #[error("step requested after the final step of {last_year}")]
    PastHorizon {
        /// The last simulated year.
        last_year: i32,
    },
}
