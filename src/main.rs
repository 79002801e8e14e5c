use anyhow::{Context, Result};
use chrono::FixedOffset;
use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use std::path::PathBuf;

use crate::estimate::{estimate_cost, estimate_cost_with, StandingChargeBasis};
use crate::input::{load_tariff, load_usage};
use crate::report::Report;
use crate::tariff::build_tariff_model;
use crate::time_of_day::Granularity;
use crate::usage::{normalize_usage, parse_utc_offset, TimestampPolicy};

mod errors;
mod estimate;
mod input;
mod numeric;
mod report;
mod tariff;
mod time_of_day;
mod usage;

/// Estimate electricity cost from a time-of-use tariff and meter readings
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Tariff JSON file
    #[arg(short, long)]
    tariff: PathBuf,

    /// Energy usage file: CSV with dateTime and kWh columns, or a .json array of records
    #[arg(short, long, visible_alias = "usage")]
    energydata: PathBuf,

    /// Tariff slot width in minutes
    #[arg(short, long, default_value_t = Granularity::HALF_HOUR)]
    granularity: Granularity,

    /// UTC offset for timestamps that carry none, e.g. +01:00
    #[arg(long, default_value = "+00:00", allow_hyphen_values = true, value_parser = parse_utc_offset)]
    utc_offset: FixedOffset,

    /// chrono format string for timestamps, tried before the built-in formats
    #[arg(long)]
    timestamp_format: Option<String>,

    /// Apply the standing charge once per day of usage instead of once
    #[arg(long)]
    daily_standing_charge: bool,

    /// Decimal places for costs
    #[arg(short, long, default_value_t = 2)]
    precision: u32,

    /// Write the breakdown as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn run(args: &Args) -> Result<Report> {
    let raw_tariff = load_tariff(&args.tariff)?;
    let model = build_tariff_model(&raw_tariff, args.granularity)
        .with_context(|| format!("invalid tariff {}", args.tariff.display()))?;
    info!(
        "run: tariff '{}' with {} rate bands over {}-minute slots",
        model.name,
        model.bands().len(),
        model.granularity()
    );
    if !model.is_complete() {
        let uncovered = model.uncovered_slots();
        warn!(
            "run: tariff '{}' has no rate for {} slots, first at {}",
            model.name,
            uncovered.len(),
            model.granularity().slot_key(uncovered[0])
        );
    }

    let rows = load_usage(&args.energydata)?;
    let policy = TimestampPolicy {
        default_offset: args.utc_offset,
        format: args.timestamp_format.clone(),
    };
    let series = normalize_usage(&rows, &policy)
        .with_context(|| format!("invalid usage data {}", args.energydata.display()))?;
    if series.is_empty() {
        warn!("run: no usage in {}", args.energydata.display());
    }
    info!("run: {} usage samples over {} days", series.len(), series.days());

    let breakdown = match args.daily_standing_charge {
        true => estimate_cost_with(&model, &series, StandingChargeBasis::PerDay)?,
        false => estimate_cost(&model, &series)?,
    };
    Ok(Report::new(&breakdown, args.precision))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let report = run(&args).map_err(|e| {
        error!("Failed to estimate cost: {:#}", e);
        e
    })?;
    print!("{}", report);
    if let Some(path) = &args.output {
        report.write_json(path)?;
        info!("main: wrote breakdown to {}", path.display());
    }
    Ok(())
}
