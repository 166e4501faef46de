//! Integration tests for the `shoal-core` stepping cycle.
//!
//! Every scenario here is small enough to be checked by hand: one or two
//! length groups, a length-weight relation that makes one fish weigh one
//! unit at the group midpoint, and a growth function that moves nothing.
//! Run with:
//!
//! ```bash
//! cargo test -p shoal-core
//! ```

// Tests use unwrap and map indexing extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::missing_panics_doc,
    clippy::too_many_lines
)]

use shoal_core::{Ecosystem, SimulationConfig, StepSummary, run_step};

/// One stock, one area, one length group `[0.5, 1.5)` whose midpoint weight
/// is exactly one, so counts and biomass coincide. The fleet fishes with a
/// flat effort and the cap allows a tenth of the biomass per step.
fn fishery_yaml(effort: f64) -> String {
    format!(
        r"
simulation:
  first_year: 2000
  last_year: 2001
  step_months: [12]
  sub_steps: [1]
  max_ratio_consumed: 0.1
areas: [coast]
stocks:
  - name: capelin
    min_age: 1
    max_age: 1
    lengths: {{ min: 0.5, max: 1.5, width: 1.0 }}
    length_weight: {{ coefficient: 1.0, exponent: 1.0 }}
    growth:
      function: {{ function: length_power, coefficient: 0.0, exponent: 1.0 }}
      kernel: {{ kind: empirical, probabilities: [1.0] }}
    prey: {{}}
    initial:
      - {{ area: coast, age: 1, number: 1000.0, mean_length: 1.0, sd: 0.1 }}
fleets:
  - name: trawler
    targets:
      capelin:
        catchability: 1.0
        suitability: {{ curve: constant, value: 1.0 }}
    efforts:
      - {{ area: coast, value: {effort} }}
"
    )
}

fn build(yaml: &str) -> Ecosystem {
    let config = SimulationConfig::parse(yaml).unwrap();
    Ecosystem::from_config(&config).unwrap()
}

fn step(eco: &mut Ecosystem) -> StepSummary {
    run_step(eco).unwrap()
}

// =============================================================================
// Consumption cap
// =============================================================================

#[test]
fn capped_fishery_books_consumption_and_overconsumption() {
    // Demand of 600 against 1000 biomass and a 0.1 cap: 100 eaten, 500
    // refused. The next year fishes the surviving 900 the same way.
    let mut eco = build(&fishery_yaml(600.0));

    let first = step(&mut eco);
    assert_eq!((first.year, first.step), (2000, 1));
    assert!((first.stock_numbers["capelin"] - 900.0).abs() < 1e-9);
    assert!((first.stock_biomass["capelin"] - 900.0).abs() < 1e-9);
    assert!((first.consumed["capelin"] - 100.0).abs() < 1e-9);
    assert!((first.overconsumed["capelin"] - 500.0).abs() < 1e-9);

    let second = step(&mut eco);
    assert_eq!((second.year, second.step), (2001, 1));
    assert!((second.stock_numbers["capelin"] - 810.0).abs() < 1e-9);
    // The summaries carry run accumulators, not per-step figures.
    assert!((second.consumed["capelin"] - 190.0).abs() < 1e-9);
    assert!((second.overconsumed["capelin"] - 1010.0).abs() < 1e-9);
}

#[test]
fn uncapped_fishery_removes_exactly_the_demand() {
    // Demand of 40 sits below the 100 the cap would allow, so the removed
    // biomass equals the demand and nothing is booked as overconsumption.
    let mut eco = build(&fishery_yaml(40.0));

    let summary = step(&mut eco);
    assert!((summary.stock_numbers["capelin"] - 960.0).abs() < 1e-9);
    assert!((summary.consumed["capelin"] - 40.0).abs() < 1e-9);
    assert!(summary.overconsumed["capelin"].abs() < 1e-12);
}

#[test]
fn sub_step_caps_compound_across_the_step() {
    // With two sub-steps the per-sub-step cap is the square of the
    // configured ratio, and the second sub-step sees the thinned biomass.
    let yaml = fishery_yaml(600.0)
        .replace("sub_steps: [1]", "sub_steps: [2]")
        .replace("max_ratio_consumed: 0.1", "max_ratio_consumed: 0.36");
    let mut eco = build(&yaml);

    let summary = step(&mut eco);

    // Each sub-step demands catchability * half-year scaler * 600 = 300.
    let cap = 0.36_f64 * 0.36;
    let first = cap * 1000.0;
    let after_first = 1000.0 - first;
    let second = cap * after_first;
    assert!((summary.consumed["capelin"] - (first + second)).abs() < 1e-6);
    assert!(
        (summary.overconsumed["capelin"] - ((300.0 - first) + (300.0 - second))).abs() < 1e-6
    );
    assert!((summary.stock_numbers["capelin"] - (after_first - second)).abs() < 1e-6);
}

// =============================================================================
// Mortality alongside harvest
// =============================================================================

#[test]
fn natural_mortality_compounds_with_harvest() {
    // Each step removes the catch first, then thins by exp(-M). Both years
    // stay under the cap, so the arithmetic is exact.
    let yaml = fishery_yaml(40.0).replace(
        "    growth:",
        "    natural_mortality: [0.5]\n    growth:",
    );
    let mut eco = build(&yaml);
    let survival = (-0.5_f64).exp();

    let first = step(&mut eco);
    let after_first = (1000.0 - 40.0) * survival;
    assert!((first.stock_numbers["capelin"] - after_first).abs() < 1e-6);
    assert!((first.consumed["capelin"] - 40.0).abs() < 1e-9);

    let second = step(&mut eco);
    let after_second = (after_first - 40.0) * survival;
    assert!((second.stock_numbers["capelin"] - after_second).abs() < 1e-6);
    assert!((second.consumed["capelin"] - 80.0).abs() < 1e-9);
    assert!(second.overconsumed["capelin"].abs() < 1e-12);
}

// =============================================================================
// Movement and harvest interplay
// =============================================================================

#[test]
fn fleets_only_harvest_where_they_spend_effort() {
    // Half the stock moves south at the start of the step; the fleet only
    // fishes the south, so the northern half is untouched.
    let yaml = r"
simulation:
  first_year: 2000
  last_year: 2000
  step_months: [12]
  sub_steps: [1]
  max_ratio_consumed: 0.1
areas: [north, south]
stocks:
  - name: capelin
    min_age: 1
    max_age: 1
    lengths: { min: 0.5, max: 1.5, width: 1.0 }
    length_weight: { coefficient: 1.0, exponent: 1.0 }
    growth:
      function: { function: length_power, coefficient: 0.0, exponent: 1.0 }
      kernel: { kind: empirical, probabilities: [1.0] }
    prey: {}
    initial:
      - { area: north, age: 1, number: 1000.0, mean_length: 1.0, sd: 0.1 }
    migration:
      - step: 1
        matrix: [[0.5, 0.5], [0.0, 1.0]]
fleets:
  - name: trawler
    targets:
      capelin:
        catchability: 1.0
        suitability: { curve: constant, value: 1.0 }
    efforts:
      - { area: south, value: 40.0 }
";
    let mut eco = build(yaml);

    let summary = step(&mut eco);

    assert!((summary.consumed["capelin"] - 40.0).abs() < 1e-9);
    assert!((summary.stock_numbers["capelin"] - 960.0).abs() < 1e-9);
    let stock = &eco.stocks[0];
    assert!((stock.total_number(0) - 500.0).abs() < 1e-9);
    assert!((stock.total_number(1) - 460.0).abs() < 1e-9);
}
