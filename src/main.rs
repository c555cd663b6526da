mod config;
mod engine;
mod error;
mod graph;
mod manager;
mod model;
mod runner;
mod stats;

use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one shock-and-diffuse cycle and write a snapshot.
    Simulate,

    /// Run the Monte Carlo batch and write the raw samples.
    Batch,

    /// Compute statistics over a previous batch.
    Analyze,

    /// Remove all simulation outputs.
    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.sim_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Simulate => mgr.simulate_run()?,
        Command::Batch => mgr.run_batch()?,
        Command::Analyze => mgr.analyze_results()?,
        Command::Clean => mgr.clean_sim()?,
    }

    Ok(())
}
