//! Configuration loading and typed run structures for the Shoal simulation.
//!
//! A run is described by one YAML file: the calendar, the areas, the stocks
//! with their biology, and the fleets harvesting them. This module defines
//! strongly-typed structs mirroring that YAML, a loader, and a validator
//! that runs every cross-field check before any entity is built, so a broken
//! run file fails before the stepping loop starts.
//!
//! Selector enums (growth function, kernel, suitability) are closed: an
//! unknown selector fails at deserialization, not at run time.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use shoal_dynamics::{DEFAULT_SANITY_THRESHOLD, GrowthFunction, LengthWeight, Suitability};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the run file from disk.
    #[error("failed to read run file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse run YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The parsed configuration fails a cross-field check.
    #[error("invalid run configuration: {reason}")]
    Invalid {
        /// Explanation of the failed check.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Calendar and consumption-cap settings.
    #[serde(default)]
    pub simulation: RunConfig,

    /// Ordered area names; ordinals follow this order.
    #[serde(default = "default_areas")]
    pub areas: Vec<String>,

    /// The simulated stocks.
    #[serde(default)]
    pub stocks: Vec<StockConfig>,

    /// The harvesting fleets.
    #[serde(default)]
    pub fleets: Vec<FleetConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            simulation: RunConfig::default(),
            areas: default_areas(),
            stocks: Vec::new(),
            fleets: Vec::new(),
        }
    }
}

impl SimulationConfig {
    /// Loads and validates a run file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if a cross-field check fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parses and validates a run description from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a cross-field check fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Runs every cross-field check.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first failed check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate()?;
        self.validate_areas()?;
        self.validate_stocks()?;
        self.validate_fleets()?;
        Ok(())
    }

    fn validate_areas(&self) -> Result<(), ConfigError> {
        if self.areas.is_empty() {
            return Err(invalid("at least one area must be configured"));
        }
        let unique: BTreeSet<&str> = self.areas.iter().map(String::as_str).collect();
        if unique.len() != self.areas.len() {
            return Err(invalid("area names must be unique"));
        }
        Ok(())
    }

    fn validate_stocks(&self) -> Result<(), ConfigError> {
        if self.stocks.is_empty() {
            return Err(invalid("at least one stock must be configured"));
        }
        let names: BTreeSet<&str> = self.stocks.iter().map(|s| s.name.as_str()).collect();
        if names.len() != self.stocks.len() {
            return Err(invalid("stock names must be unique"));
        }
        let steps = self.simulation.step_months.len();
        for stock in &self.stocks {
            stock.validate(&self.areas, &names, steps)?;
        }
        Ok(())
    }

    fn validate_fleets(&self) -> Result<(), ConfigError> {
        let edible: BTreeSet<&str> = self
            .stocks
            .iter()
            .filter(|s| s.prey.is_some())
            .map(|s| s.name.as_str())
            .collect();
        let steps = self.simulation.step_months.len();
        for fleet in &self.fleets {
            if fleet.targets.is_empty() {
                return Err(invalid(format!(
                    "fleet {} targets no stocks",
                    fleet.name
                )));
            }
            for prey in fleet.targets.keys() {
                if !edible.contains(prey.as_str()) {
                    return Err(invalid(format!(
                        "fleet {} targets {prey}, which is not an edible stock",
                        fleet.name
                    )));
                }
            }
            for effort in &fleet.efforts {
                if !self.areas.contains(&effort.area) {
                    return Err(invalid(format!(
                        "fleet {} has effort in unknown area {}",
                        fleet.name, effort.area
                    )));
                }
                if let Some(step) = effort.step {
                    if step == 0 || step > steps {
                        return Err(invalid(format!(
                            "fleet {} has effort at step {step}, outside 1..={steps}",
                            fleet.name
                        )));
                    }
                }
                if effort.value < 0.0 {
                    return Err(invalid(format!(
                        "fleet {} has a negative effort value",
                        fleet.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Calendar and consumption-cap settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    /// First simulated calendar year.
    #[serde(default = "default_first_year")]
    pub first_year: i32,

    /// Last simulated calendar year, inclusive.
    #[serde(default = "default_last_year")]
    pub last_year: i32,

    /// Step lengths in months; must sum to twelve.
    #[serde(default = "default_step_months")]
    pub step_months: Vec<u32>,

    /// Sub-steps per step of year.
    #[serde(default = "default_sub_steps")]
    pub sub_steps: Vec<u32>,

    /// Largest fraction of a prey length group's biomass consumable in one
    /// whole step.
    #[serde(default = "default_max_ratio_consumed")]
    pub max_ratio_consumed: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            first_year: default_first_year(),
            last_year: default_last_year(),
            step_months: default_step_months(),
            sub_steps: default_sub_steps(),
            max_ratio_consumed: default_max_ratio_consumed(),
        }
    }
}

impl RunConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_ratio_consumed <= 0.0 || self.max_ratio_consumed > 1.0 {
            return Err(invalid(format!(
                "max_ratio_consumed must lie in (0, 1], got {}",
                self.max_ratio_consumed
            )));
        }
        // Month sums and sub-step counts are checked when the clock is
        // built; only the cap is config-local.
        Ok(())
    }
}

/// A uniform length range `[min, max)` divided into groups of `width`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LengthRange {
    /// Lower bound of the first group.
    pub min: f64,
    /// Upper bound of the last group.
    pub max: f64,
    /// Width of every group.
    pub width: f64,
}

impl LengthRange {
    fn validate(&self, owner: &str) -> Result<(), ConfigError> {
        if !(self.min < self.max) {
            return Err(invalid(format!(
                "{owner}: length range [{}, {}) is empty",
                self.min, self.max
            )));
        }
        if self.width <= 0.0 {
            return Err(invalid(format!(
                "{owner}: length group width must be positive, got {}",
                self.width
            )));
        }
        Ok(())
    }
}

/// One simulated stock.
#[derive(Debug, Clone, Deserialize)]
pub struct StockConfig {
    /// Stock name, unique across the run.
    pub name: String,

    /// Youngest tracked age.
    pub min_age: usize,

    /// Oldest tracked age; acts as a plus group.
    pub max_age: usize,

    /// Areas the stock lives on; every area when empty.
    #[serde(default)]
    pub areas: Vec<String>,

    /// The stock's own length division.
    pub lengths: LengthRange,

    /// Allometric length-weight relation.
    pub length_weight: LengthWeight,

    /// Optional per-age length windows; ages not listed span the division.
    #[serde(default)]
    pub age_windows: Vec<AgeWindowConfig>,

    /// Instantaneous natural mortality per age; empty means none.
    #[serde(default)]
    pub natural_mortality: Vec<f64>,

    /// Growth function, kernel and calculation grid.
    pub growth: GrowthConfig,

    /// Present when the stock can be eaten.
    #[serde(default)]
    pub prey: Option<PreyConfig>,

    /// Populations seeded at run start.
    #[serde(default)]
    pub initial: Vec<SeedConfig>,

    /// Recruitment injections during the run.
    #[serde(default)]
    pub renewal: Vec<RenewalConfig>,

    /// Movement of one age group into other stocks.
    #[serde(default)]
    pub transition: Option<TransitionConfig>,

    /// Between-area movement per step of year.
    #[serde(default)]
    pub migration: Vec<MigrationConfig>,
}

impl StockConfig {
    fn validate(
        &self,
        areas: &[String],
        stock_names: &BTreeSet<&str>,
        steps_per_year: usize,
    ) -> Result<(), ConfigError> {
        if self.max_age < self.min_age {
            return Err(invalid(format!(
                "stock {}: max age {} below min age {}",
                self.name, self.max_age, self.min_age
            )));
        }
        for area in &self.areas {
            if !areas.contains(area) {
                return Err(invalid(format!(
                    "stock {}: lives on unknown area {area}",
                    self.name
                )));
            }
        }
        let lived: BTreeSet<&str> = self.areas.iter().map(String::as_str).collect();
        if lived.len() != self.areas.len() {
            return Err(invalid(format!(
                "stock {}: repeated area in the lived-on list",
                self.name
            )));
        }
        let lived_areas: Vec<String> = if self.areas.is_empty() {
            areas.to_vec()
        } else {
            self.areas.clone()
        };
        self.lengths.validate(&self.name)?;
        if let Some(calc) = &self.growth.calc_lengths {
            calc.validate(&self.name)?;
        }
        let num_ages = self
            .max_age
            .saturating_sub(self.min_age)
            .saturating_add(1);
        if !self.natural_mortality.is_empty() && self.natural_mortality.len() != num_ages {
            return Err(invalid(format!(
                "stock {}: {} mortality rates for {} ages",
                self.name,
                self.natural_mortality.len(),
                num_ages
            )));
        }
        if self.natural_mortality.iter().any(|&m| m < 0.0) {
            return Err(invalid(format!(
                "stock {}: natural mortality must be non-negative",
                self.name
            )));
        }
        for window in &self.age_windows {
            if window.age < self.min_age || window.age > self.max_age {
                return Err(invalid(format!(
                    "stock {}: length window for untracked age {}",
                    self.name, window.age
                )));
            }
            if !(window.min_length < window.max_length) {
                return Err(invalid(format!(
                    "stock {}: empty length window at age {}",
                    self.name, window.age
                )));
            }
        }
        for seed in &self.initial {
            seed.validate(&self.name, &lived_areas, self.min_age, self.max_age)?;
        }
        for renewal in &self.renewal {
            renewal.validate(
                &self.name,
                &lived_areas,
                self.min_age,
                self.max_age,
                steps_per_year,
            )?;
        }
        if let Some(transition) = &self.transition {
            transition.validate(&self.name, stock_names, steps_per_year)?;
        }
        let mut seen_steps = BTreeSet::new();
        for migration in &self.migration {
            if !seen_steps.insert(migration.step) {
                return Err(invalid(format!(
                    "stock {}: two migration matrices for step {}",
                    self.name, migration.step
                )));
            }
            migration.validate(&self.name, lived_areas.len(), steps_per_year)?;
        }
        Ok(())
    }
}

/// A per-age length window.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AgeWindowConfig {
    /// The age the window applies to.
    pub age: usize,
    /// Lower length bound; must sit on a group boundary.
    pub min_length: f64,
    /// Upper length bound; must sit on a group boundary.
    pub max_length: f64,
}

/// Growth settings for one stock.
#[derive(Debug, Clone, Deserialize)]
pub struct GrowthConfig {
    /// Grid the growth function is evaluated on; the stock's own division
    /// when absent.
    #[serde(default)]
    pub calc_lengths: Option<LengthRange>,

    /// The growth function.
    pub function: GrowthFunction,

    /// The redistribution kernel.
    pub kernel: KernelConfig,
}

/// Redistribution kernel selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KernelConfig {
    /// Parametric beta-binomial kernel.
    BetaBinomial {
        /// Largest group jump representable in one step.
        max_jump: usize,
        /// Exponent applied to mean length when scaling expected growth.
        #[serde(default)]
        power: f64,
        /// Shape parameter of the distribution.
        beta: f64,
    },
    /// Externally supplied jump distribution.
    Empirical {
        /// Probability of jumping `k` groups, for `k = 0..`.
        probabilities: Vec<f64>,
    },
}

/// Prey settings for an edible stock.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreyConfig {
    /// Division consumption is recorded on; the stock's own when absent.
    #[serde(default)]
    pub lengths: Option<LengthRange>,
}

/// One population seeded at run start.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeedConfig {
    /// Area receiving the fish.
    pub area: String,
    /// Age class receiving the fish.
    pub age: usize,
    /// Number of individuals.
    pub number: f64,
    /// Mean length of the cohort.
    pub mean_length: f64,
    /// Standard deviation of length.
    pub sd: f64,
}

impl SeedConfig {
    fn validate(
        &self,
        stock: &str,
        areas: &[String],
        min_age: usize,
        max_age: usize,
    ) -> Result<(), ConfigError> {
        if !areas.contains(&self.area) {
            return Err(invalid(format!(
                "stock {stock}: seed in area {} outside the stock's areas",
                self.area
            )));
        }
        if self.age < min_age || self.age > max_age {
            return Err(invalid(format!(
                "stock {stock}: seed at untracked age {}",
                self.age
            )));
        }
        if self.number < 0.0 {
            return Err(invalid(format!("stock {stock}: negative seed number")));
        }
        if self.sd <= 0.0 {
            return Err(invalid(format!(
                "stock {stock}: seed length deviation must be positive"
            )));
        }
        Ok(())
    }
}

/// One recruitment injection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RenewalConfig {
    /// Calendar year of the injection.
    pub year: i32,
    /// One-based step of year.
    pub step: usize,
    /// Area receiving the recruits.
    pub area: String,
    /// Age class receiving the recruits.
    pub age: usize,
    /// Number of recruits.
    pub number: f64,
    /// Mean length of the recruits.
    pub mean_length: f64,
    /// Standard deviation of length.
    pub sd: f64,
}

impl RenewalConfig {
    fn validate(
        &self,
        stock: &str,
        areas: &[String],
        min_age: usize,
        max_age: usize,
        steps_per_year: usize,
    ) -> Result<(), ConfigError> {
        if !areas.contains(&self.area) {
            return Err(invalid(format!(
                "stock {stock}: renewal in area {} outside the stock's areas",
                self.area
            )));
        }
        if self.age < min_age || self.age > max_age {
            return Err(invalid(format!(
                "stock {stock}: renewal at untracked age {}",
                self.age
            )));
        }
        if self.step == 0 || self.step > steps_per_year {
            return Err(invalid(format!(
                "stock {stock}: renewal at step {}, outside 1..={steps_per_year}",
                self.step
            )));
        }
        if self.number < 0.0 {
            return Err(invalid(format!("stock {stock}: negative renewal number")));
        }
        if self.sd <= 0.0 {
            return Err(invalid(format!(
                "stock {stock}: renewal length deviation must be positive"
            )));
        }
        Ok(())
    }
}

/// Movement of one age group into other stocks at a configured step.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionConfig {
    /// One-based step of year the transition fires on.
    pub step: usize,
    /// Age group captured from the source stock.
    pub age: usize,
    /// Recipient stocks and the fraction each receives.
    pub to: Vec<TransitionTarget>,
}

/// One transition recipient.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransitionTarget {
    /// Recipient stock name.
    pub stock: String,
    /// Fraction of the captured group delivered, in (0, 1].
    pub ratio: f64,
}

impl TransitionConfig {
    fn validate(
        &self,
        stock: &str,
        stock_names: &BTreeSet<&str>,
        steps_per_year: usize,
    ) -> Result<(), ConfigError> {
        if self.step == 0 || self.step > steps_per_year {
            return Err(invalid(format!(
                "stock {stock}: transition at step {}, outside 1..={steps_per_year}",
                self.step
            )));
        }
        if self.to.is_empty() {
            return Err(invalid(format!(
                "stock {stock}: transition with no recipients"
            )));
        }
        for target in &self.to {
            if !stock_names.contains(target.stock.as_str()) {
                return Err(invalid(format!(
                    "stock {stock}: transition into unknown stock {}",
                    target.stock
                )));
            }
            if target.stock == stock {
                return Err(invalid(format!(
                    "stock {stock}: transition into itself"
                )));
            }
            if target.ratio <= 0.0 || target.ratio > 1.0 {
                return Err(invalid(format!(
                    "stock {stock}: transition ratio {} outside (0, 1]",
                    target.ratio
                )));
            }
        }
        Ok(())
    }
}

/// Between-area movement applied at the start of every sub-step of one step.
#[derive(Debug, Clone, Deserialize)]
pub struct MigrationConfig {
    /// One-based step of year the matrix applies to.
    pub step: usize,
    /// Square matrix over the stock's lived areas, in their configured
    /// order; row `from` gives the share sent to each `to` area.
    pub matrix: Vec<Vec<f64>>,
}

impl MigrationConfig {
    fn validate(
        &self,
        stock: &str,
        num_areas: usize,
        steps_per_year: usize,
    ) -> Result<(), ConfigError> {
        if self.step == 0 || self.step > steps_per_year {
            return Err(invalid(format!(
                "stock {stock}: migration at step {}, outside 1..={steps_per_year}",
                self.step
            )));
        }
        if self.matrix.len() != num_areas {
            return Err(invalid(format!(
                "stock {stock}: migration matrix has {} rows for {num_areas} areas",
                self.matrix.len()
            )));
        }
        for (from, row) in self.matrix.iter().enumerate() {
            if row.len() != num_areas {
                return Err(invalid(format!(
                    "stock {stock}: migration row {from} has {} entries for {num_areas} areas",
                    row.len()
                )));
            }
            if row.iter().any(|&share| share < 0.0) {
                return Err(invalid(format!(
                    "stock {stock}: migration row {from} holds a negative share"
                )));
            }
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > 1e-6 {
                return Err(invalid(format!(
                    "stock {stock}: migration row {from} sums to {sum}, expected 1"
                )));
            }
        }
        Ok(())
    }
}

/// One harvesting fleet.
#[derive(Debug, Clone, Deserialize)]
pub struct FleetConfig {
    /// Fleet name, used in logs and reports.
    pub name: String,

    /// Demand-to-biomass ratio above which the eat phase warns.
    #[serde(default = "default_sanity_threshold")]
    pub sanity_threshold: f64,

    /// Targeted stocks and the parameters for each.
    pub targets: std::collections::BTreeMap<String, TargetConfig>,

    /// Effort series; the most specific matching entry wins.
    #[serde(default)]
    pub efforts: Vec<EffortConfig>,
}

/// Catch parameters for one targeted stock.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Catchability coefficient.
    pub catchability: f64,
    /// Suitability curve over prey length.
    pub suitability: Suitability,
}

/// One effort entry; `year`/`step` absent means the entry matches always.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EffortConfig {
    /// Calendar year the entry applies to, or every year when absent.
    #[serde(default)]
    pub year: Option<i32>,
    /// One-based step of year, or every step when absent.
    #[serde(default)]
    pub step: Option<usize>,
    /// Area the effort is spent in.
    pub area: String,
    /// Effort value driving the predator.
    pub value: f64,
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.into(),
    }
}

fn default_areas() -> Vec<String> {
    vec!["area".to_owned()]
}

const fn default_first_year() -> i32 {
    2000
}

const fn default_last_year() -> i32 {
    2001
}

fn default_step_months() -> Vec<u32> {
    vec![3, 3, 3, 3]
}

fn default_sub_steps() -> Vec<u32> {
    vec![1, 1, 1, 1]
}

const fn default_max_ratio_consumed() -> f64 {
    0.95
}

const fn default_sanity_threshold() -> f64 {
    DEFAULT_SANITY_THRESHOLD
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn minimal_stock_yaml() -> &'static str {
        r"
areas: [north]
stocks:
  - name: cod
    min_age: 1
    max_age: 3
    lengths: { min: 10.0, max: 60.0, width: 10.0 }
    length_weight: { coefficient: 1.0e-5, exponent: 3.0 }
    growth:
      function: { function: von_bertalanffy, l_infinity: 120.0, kappa: 0.2 }
      kernel: { kind: beta_binomial, max_jump: 3, beta: 0.6 }
    initial:
      - { area: north, age: 1, number: 1000.0, mean_length: 20.0, sd: 4.0 }
"
    }

    #[test]
    fn minimal_run_parses_with_defaults() {
        let config = SimulationConfig::parse(minimal_stock_yaml()).unwrap();
        assert_eq!(config.simulation.first_year, 2000);
        assert_eq!(config.simulation.step_months, vec![3, 3, 3, 3]);
        assert!((config.simulation.max_ratio_consumed - 0.95).abs() < 1e-12);
        assert_eq!(config.areas, vec!["north".to_owned()]);
        assert_eq!(config.stocks.len(), 1);
        let stock = config.stocks.first().unwrap();
        assert!(stock.prey.is_none());
        assert!(stock.transition.is_none());
        assert!(matches!(
            stock.growth.kernel,
            KernelConfig::BetaBinomial { max_jump: 3, .. }
        ));
    }

    #[test]
    fn full_run_with_fleet_parses() {
        let yaml = r"
simulation:
  first_year: 2000
  last_year: 2002
  step_months: [3, 3, 3, 3]
  sub_steps: [1, 1, 2, 1]
  max_ratio_consumed: 0.9
areas: [north, south]
stocks:
  - name: capelin
    min_age: 1
    max_age: 5
    lengths: { min: 4.0, max: 20.0, width: 2.0 }
    length_weight: { coefficient: 1.0e-5, exponent: 3.0 }
    natural_mortality: [0.2, 0.2, 0.2, 0.3, 0.5]
    growth:
      function: { function: length_power, coefficient: 0.1, exponent: 1.0 }
      kernel: { kind: empirical, probabilities: [0.6, 0.3, 0.1] }
    prey: {}
    initial:
      - { area: north, age: 1, number: 1.0e6, mean_length: 8.0, sd: 1.5 }
    renewal:
      - { year: 2001, step: 1, area: north, age: 1, number: 5.0e5, mean_length: 6.0, sd: 1.0 }
    migration:
      - step: 2
        matrix: [[0.8, 0.2], [0.1, 0.9]]
fleets:
  - name: trawler
    targets:
      capelin:
        catchability: 2.0e-5
        suitability: { curve: logistic, alpha: 4.0, beta: 0.5, max: 1.0 }
    efforts:
      - { area: north, value: 100.0 }
      - { year: 2001, step: 3, area: north, value: 250.0 }
";
        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.fleets.len(), 1);
        let fleet = config.fleets.first().unwrap();
        assert!((fleet.sanity_threshold - DEFAULT_SANITY_THRESHOLD).abs() < 1e-12);
        assert_eq!(fleet.efforts.len(), 2);
        let stock = config.stocks.first().unwrap();
        assert_eq!(stock.migration.len(), 1);
        assert_eq!(stock.natural_mortality.len(), 5);
    }

    #[test]
    fn unknown_selectors_fail_at_parse() {
        let yaml = minimal_stock_yaml()
            .replace("von_bertalanffy", "logistic_surprise");
        assert!(matches!(
            SimulationConfig::parse(&yaml),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn cross_field_checks_reject_broken_runs() {
        // A cap outside (0, 1].
        let yaml = format!("simulation: {{ max_ratio_consumed: 1.5 }}\n{}", minimal_stock_yaml());
        assert!(SimulationConfig::parse(&yaml).is_err());

        // A seed in an area the run does not define.
        let yaml = minimal_stock_yaml().replace("area: north", "area: atlantis");
        assert!(matches!(
            SimulationConfig::parse(&yaml),
            Err(ConfigError::Invalid { .. })
        ));

        // Mortality vector not matching the age span.
        let yaml = minimal_stock_yaml().replace(
            "    initial:",
            "    natural_mortality: [0.2]\n    initial:",
        );
        assert!(SimulationConfig::parse(&yaml).is_err());
    }

    #[test]
    fn fleets_may_only_target_edible_stocks() {
        let yaml = format!(
            "{}fleets:\n  - name: trawler\n    targets:\n      cod: {{ catchability: 1.0e-5, suitability: {{ curve: constant, value: 1.0 }} }}\n",
            minimal_stock_yaml()
        );
        // cod has no prey section, so it cannot be fished.
        assert!(matches!(
            SimulationConfig::parse(&yaml),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn migration_rows_must_be_stochastic() {
        let yaml = r"
areas: [north, south]
stocks:
  - name: cod
    min_age: 1
    max_age: 3
    lengths: { min: 10.0, max: 60.0, width: 10.0 }
    length_weight: { coefficient: 1.0e-5, exponent: 3.0 }
    growth:
      function: { function: von_bertalanffy, l_infinity: 120.0, kappa: 0.2 }
      kernel: { kind: beta_binomial, max_jump: 3, beta: 0.6 }
    migration:
      - step: 1
        matrix: [[0.8, 0.1], [0.1, 0.9]]
";
        assert!(matches!(
            SimulationConfig::parse(yaml),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn transitions_must_resolve_and_stay_in_range() {
        let base = r"
areas: [north]
stocks:
  - name: young
    min_age: 1
    max_age: 3
    lengths: { min: 10.0, max: 60.0, width: 10.0 }
    length_weight: { coefficient: 1.0e-5, exponent: 3.0 }
    growth:
      function: { function: von_bertalanffy, l_infinity: 120.0, kappa: 0.2 }
      kernel: { kind: beta_binomial, max_jump: 3, beta: 0.6 }
    transition:
      step: 4
      age: 3
      to:
        - { stock: TARGET, ratio: 1.0 }
  - name: old
    min_age: 3
    max_age: 7
    lengths: { min: 10.0, max: 60.0, width: 10.0 }
    length_weight: { coefficient: 1.0e-5, exponent: 3.0 }
    growth:
      function: { function: von_bertalanffy, l_infinity: 120.0, kappa: 0.2 }
      kernel: { kind: beta_binomial, max_jump: 3, beta: 0.6 }
";
        assert!(SimulationConfig::parse(&base.replace("TARGET", "old")).is_ok());
        assert!(matches!(
            SimulationConfig::parse(&base.replace("TARGET", "ghost")),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
