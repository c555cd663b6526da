//! Simulation directory orchestration.
//!
//! A sim directory holds a `config.toml` plus the files the presentation
//! layer consumes: per-run snapshots, raw batch results, and the statistics
//! report.

use crate::config::Config;
use crate::engine::{DiffusionEngine, RunOutcome};
use crate::graph::SocialGraph;
use crate::model::HappinessState;
use crate::runner::MonteCarloRunner;
use crate::stats::RunStatistics;
use anyhow::{Context, Result};
use glob::glob;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Everything the presentation layer needs to render one simulation run:
/// node colors (happiness), edge topology and weights, and the bar-chart
/// summary values.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub outcome: RunOutcome,
    pub final_happiness: HappinessState,
    pub graph: SocialGraph,
}

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Perform one shock-and-diffuse cycle and write a snapshot file.
    pub fn simulate_run(&self) -> Result<()> {
        let master_seed = self.master_seed();
        let mut rng = ChaCha12Rng::seed_from_u64(master_seed);
        rng.set_stream(0);
        let graph = SocialGraph::build(self.cfg.graph.n_actors, self.cfg.graph.topology, &mut rng)
            .context("failed to build graph")?;

        let mut engine_rng = ChaCha12Rng::seed_from_u64(master_seed);
        engine_rng.set_stream(1);
        let mut engine = DiffusionEngine::seeded(self.cfg.clone(), graph, engine_rng)
            .context("failed to construct engine")?;

        let outcome = engine.run().context("failed to run simulation")?;
        log::info!("net happiness change: {:+.4}", outcome.net_change);

        let snapshot = Snapshot {
            final_happiness: engine.happiness().clone(),
            graph: engine.graph().clone(),
            outcome,
        };

        let snapshot_idx = self
            .count_snapshot_files()
            .context("failed to count snapshot files")?;
        let file = self.snapshot_file(snapshot_idx);
        write_msgpack(&file, &snapshot)?;
        log::info!("wrote {file:?}");

        Ok(())
    }

    /// Run the Monte Carlo batch and write the raw samples.
    pub fn run_batch(&self) -> Result<()> {
        let master_seed = self.master_seed();
        let runner =
            MonteCarloRunner::new(self.cfg.clone(), master_seed).context("failed to construct runner")?;

        let outcome = runner.run().context("failed to run batch")?;

        let file = self.results_file();
        write_msgpack(&file, &outcome.samples)?;
        log::info!("wrote {} samples to {file:?}", outcome.samples.len());

        Ok(())
    }

    /// Compute statistics over a previously written batch and report them.
    pub fn analyze_results(&self) -> Result<()> {
        let file = self.results_file();
        let file_handle =
            File::open(&file).with_context(|| format!("failed to open {file:?}"))?;
        let reader = BufReader::new(file_handle);
        let samples: Vec<f64> =
            decode::from_read(reader).context("failed to deserialize samples")?;

        let stats = RunStatistics::compute(&samples).context("failed to compute statistics")?;

        log::info!("over {} simulations:", samples.len());
        log::info!("the average net change in happiness was {:.2}", stats.mean);
        log::info!("the median net change in happiness was {:.2}", stats.median);
        log::info!(
            "the standard deviation of the net change in happiness was {:.2}",
            stats.std_dev
        );

        let stats_file = self.stats_file();
        let file_handle = File::create(&stats_file)
            .with_context(|| format!("failed to create {stats_file:?}"))?;
        let mut writer = BufWriter::new(file_handle);
        serde_json::to_writer_pretty(&mut writer, &stats)
            .context("failed to serialize statistics")?;
        writer.flush().context("failed to flush writer stream")?;
        log::info!("wrote {stats_file:?}");

        Ok(())
    }

    /// Remove all simulation outputs, keeping the config.
    pub fn clean_sim(&self) -> Result<()> {
        let snapshot_count = self
            .count_snapshot_files()
            .context("failed to count snapshot files")?;
        for snapshot_idx in 0..snapshot_count {
            let file = self.snapshot_file(snapshot_idx);
            fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
        }

        for file in [self.results_file(), self.stats_file()] {
            if file.exists() {
                fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
            }
        }

        log::info!("cleaned {:?}", self.sim_dir);
        Ok(())
    }

    fn master_seed(&self) -> u64 {
        match self.cfg.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::rng().random();
                log::info!("no seed configured, drew {seed}");
                seed
            }
        }
    }

    fn count_snapshot_files(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("snapshot-*.msgpack");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob snapshot files")?
            .filter_map(Result::ok)
            .count();
        Ok(count)
    }

    fn snapshot_file(&self, snapshot_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("snapshot-{snapshot_idx:04}.msgpack"))
    }

    fn results_file(&self) -> PathBuf {
        self.sim_dir.join("results.msgpack")
    }

    fn stats_file(&self) -> PathBuf {
        self.sim_dir.join("stats.json")
    }
}

fn write_msgpack<T: Serialize>(file: &Path, value: &T) -> Result<()> {
    let file_handle = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file_handle);
    encode::write(&mut writer, value).context("failed to serialize value")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}
