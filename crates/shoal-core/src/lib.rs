//! Simulation clock, configuration, stocks, fleets and the ecosystem
//! scheduler for the Shoal simulation.
//!
//! This crate owns the phase-ordered step cycle that drives a run:
//! Migrate, ComputeNumbers, Eat, CheckEat, AdjustEat, ReducePopulation per
//! sub-step, then Grow, SpecialTransactions and AgeUpdate once per step.
//!
//! # Modules
//!
//! - [`clock`] -- Simulation calendar with a step counter and derived
//!   year, step-of-year and step-size values.
//! - [`config`] -- Run file loading into strongly-typed structs, with
//!   cross-field validation.
//! - [`ecosystem`] -- The step cycle engine loop and its per-step summary.
//! - [`error`] -- Setup and stepping error types.
//! - [`fleet`] -- Effort-driven predators over the run's areas.
//! - [`migration`] -- Between-area movement matrices.
//! - [`stock`] -- Per-area populations and the biology acting on them.
//! - [`transition`] -- Movement of one age group into recipient stocks.

pub mod clock;
pub mod config;
pub mod ecosystem;
pub mod error;
pub mod fleet;
pub mod migration;
pub mod stock;
pub mod transition;

pub use clock::{ClockError, SimClock};
pub use config::{ConfigError, SimulationConfig};
pub use ecosystem::{Ecosystem, StepSummary, run_step};
pub use error::{SetupError, StepError};
pub use fleet::Fleet;
pub use migration::Migration;
pub use stock::Stock;
pub use transition::Transition;
