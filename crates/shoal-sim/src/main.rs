//! Command-line driver for Shoal simulation runs.
//!
//! Loads a YAML run file, builds the ecosystem, advances the clock to the
//! end of the simulated horizon, and prints a JSON run summary on stdout.
//! Progress is logged through `tracing`; set `RUST_LOG` to adjust the level.
//!
//! ```bash
//! # Run a simulation
//! shoal-sim run.yaml
//!
//! # Same run with per-step detail
//! RUST_LOG=debug shoal-sim run.yaml
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use shoal_core::{Ecosystem, SimulationConfig, StepSummary, run_step};
use shoal_report::{PredationAggregator, PreyOverAggregator, StockAggregator};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Everything the run produced, serialized to stdout once the clock stops.
#[derive(Debug, Serialize)]
struct RunSummary {
    /// Timestamp-derived identifier for this run.
    run_id: String,
    /// First simulated calendar year.
    first_year: i32,
    /// Last simulated calendar year, inclusive.
    last_year: i32,
    /// Number of steps per simulated year.
    steps_per_year: usize,
    /// Per-step state snapshots in execution order.
    steps: Vec<StepSummary>,
    /// Final abundance per length group, keyed by stock.
    final_numbers_at_length: BTreeMap<String, Vec<f64>>,
    /// Cumulative catch per length group, keyed by stock then fleet.
    catch_at_length: BTreeMap<String, BTreeMap<String, Vec<f64>>>,
    /// Cumulative refused demand per length group, keyed by stock.
    refused_at_length: BTreeMap<String, Vec<f64>>,
    /// Wall-clock duration of the run loop.
    duration_ms: i64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("shoal-sim starting");

    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .ok_or("usage: shoal-sim <run.yaml>")?;

    let config = SimulationConfig::from_file(&path)?;
    info!(
        path = %path.display(),
        first_year = config.simulation.first_year,
        last_year = config.simulation.last_year,
        steps_per_year = config.simulation.step_months.len(),
        "run file loaded"
    );

    let mut eco = Ecosystem::from_config(&config)?;
    info!(
        areas = eco.areas.len(),
        stocks = eco.stocks.len(),
        fleets = eco.fleets.len(),
        "ecosystem ready"
    );

    let run_id = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let started = Utc::now();

    let mut steps = Vec::new();
    while !eco.clock.finished() {
        steps.push(run_step(&mut eco)?);
    }

    let duration_ms = Utc::now().signed_duration_since(started).num_milliseconds();
    info!(
        run_id = %run_id,
        steps = steps.len(),
        duration_ms,
        "simulation complete"
    );

    let summary = summarize(&eco, &config, run_id, steps, duration_ms)?;
    let rendered = serde_json::to_string_pretty(&summary)?;
    println!("{rendered}");
    Ok(())
}

/// Aggregates final ecosystem state into the run summary.
///
/// Every stock reports its final length composition over all areas and ages.
/// Edible stocks additionally report cumulative catch per fleet and cumulative
/// refused demand, both on the stock's own length division.
fn summarize(
    eco: &Ecosystem,
    config: &SimulationConfig,
    run_id: String,
    steps: Vec<StepSummary>,
    duration_ms: i64,
) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let all_areas = vec![eco.areas.clone()];
    let fleet_groups: Vec<Vec<String>> = eco
        .fleets
        .iter()
        .map(|fleet| vec![fleet.name().to_owned()])
        .collect();

    let stocks: Vec<_> = eco
        .stocks
        .iter()
        .map(|stock| {
            (
                stock.name().to_owned(),
                (stock.min_age()..=stock.max_age()).collect::<Vec<_>>(),
                stock.division().clone(),
                stock.is_eaten(),
            )
        })
        .collect();

    let mut final_numbers_at_length = BTreeMap::new();
    let mut catch_at_length = BTreeMap::new();
    let mut refused_at_length = BTreeMap::new();

    for (name, ages, division, eaten) in stocks {
        if eaten {
            if !fleet_groups.is_empty() {
                let mut catches = PredationAggregator::new(
                    eco,
                    &fleet_groups,
                    &[vec![name.clone()]],
                    &all_areas,
                    division.clone(),
                )?;
                catches.sum(eco)?;
                let mut per_fleet = BTreeMap::new();
                for (ordinal, group) in fleet_groups.iter().enumerate() {
                    let Some(fleet_name) = group.first() else {
                        continue;
                    };
                    if let Some(amounts) = catches.consumed(0, ordinal, 0) {
                        per_fleet.insert(fleet_name.clone(), amounts.to_vec());
                    }
                }
                catch_at_length.insert(name.clone(), per_fleet);
            }

            let mut refused =
                PreyOverAggregator::new(eco, &[name.clone()], &all_areas, division.clone())?;
            refused.sum(eco)?;
            if let Some(amounts) = refused.overconsumed(0) {
                refused_at_length.insert(name.clone(), amounts.to_vec());
            }
        }

        let mut totals = StockAggregator::new(eco, &[name.clone()], &all_areas, &[ages], division)?;
        totals.sum(eco)?;
        let numbers = totals.cells(0, 0).map_or_else(Vec::new, |cells| {
            cells.iter().map(|cell| cell.count).collect()
        });
        final_numbers_at_length.insert(name, numbers);
    }

    Ok(RunSummary {
        run_id,
        first_year: config.simulation.first_year,
        last_year: config.simulation.last_year,
        steps_per_year: config.simulation.step_months.len(),
        steps,
        final_numbers_at_length,
        catch_at_length,
        refused_at_length,
        duration_ms,
    })
}
