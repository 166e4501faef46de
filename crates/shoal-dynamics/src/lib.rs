//! Growth and predation dynamics for the Shoal simulation.
//!
//! This crate implements the two biological processes that reshape a
//! population within a time step: growth, which moves fish between length
//! classes without changing their number, and consumption, which removes
//! biomass under an aggregate cap. Both work on the population types from
//! [`shoal_pop`] and leave scheduling to the ecosystem layer.
//!
//! # Modules
//!
//! - [`strategy`] -- [`GrowthFunction`], the closed set of growth curves, and
//!   the [`LengthWeight`] relation deriving weight gain from length gain.
//! - [`kernel`] -- [`GrowthKernel`], turning an expected jump into a
//!   probability distribution over length-group jumps.
//! - [`grower`] -- [`Grower`], the per-area pipeline from growth function to
//!   redistribution matrices.
//! - [`suitability`] -- [`Suitability`] curves over prey length.
//! - [`predator`] -- [`Predator`], per-area demand buffers and the rescale
//!   step that keeps the consumption cap aggregate.
//! - [`prey`] -- [`Prey`], population snapshots, the cap check and the
//!   survival factors handed back to the stock.
//! - [`error`] -- [`DynamicsError`] for every fallible operation in this
//!   crate.

pub mod error;
pub mod grower;
pub mod kernel;
pub mod predator;
pub mod prey;
pub mod strategy;
pub mod suitability;

// Re-export primary types at crate root.
pub use error::DynamicsError;
pub use grower::Grower;
pub use kernel::{BetaBinomialKernel, EmpiricalKernel, GrowthKernel};
pub use predator::{DEFAULT_SANITY_THRESHOLD, Predator};
pub use prey::Prey;
pub use strategy::{GrowthFunction, LengthWeight};
pub use suitability::Suitability;
