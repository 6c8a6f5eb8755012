#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plays headless Nighthold siege runs.

mod config;
mod driver;
mod snapshot_store;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use nighthold_core::config::SiegeConfig;

use crate::driver::{Driver, DriverOptions};

/// Arguments accepted by the Nighthold runner.
#[derive(Parser, Debug)]
#[command(name = "nighthold")]
#[command(about = "Play a deterministic Nighthold siege run to its end")]
struct Args {
    /// Seed for the run; random when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Target day to survive; overrides the configured run length.
    #[arg(long)]
    days: Option<u32>,

    /// Path to a TOML tuning file; built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory that receives day-boundary snapshots.
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Suppress per-event output and print only the final summary.
    #[arg(long)]
    quiet: bool,
}

/// Entry point for the Nighthold command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);

    let config = match &args.config {
        Some(path) => match config::load_config(path) {
            Ok(loaded) => loaded,
            Err(error) => {
                eprintln!("tuning rejected, playing with defaults: {error:#}");
                SiegeConfig::default()
            }
        },
        None => SiegeConfig::default(),
    };

    let mut driver = Driver::new(
        DriverOptions {
            seed,
            days: args.days,
            save_dir: args.save_dir,
            quiet: args.quiet,
        },
        config,
    );
    let report = driver.run()?;

    println!("seed: {seed:#x}");
    match report.outcome {
        Some(outcome) => println!("outcome: {outcome:?} on day {}", report.days_survived),
        None => println!("outcome: stopped on day {}", report.days_survived),
    }
    println!(
        "castle hp: {}, gold: {}, events: {}, fingerprint: {:#018x}",
        report.castle_hp, report.gold, report.events_rendered, report.fingerprint
    );
    Ok(())
}
