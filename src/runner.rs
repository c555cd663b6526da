//! Monte Carlo harness.
//!
//! Runs many independent shock-and-diffuse simulations and collects the
//! net-happiness-change distribution.

use crate::config::Config;
use crate::engine::DiffusionEngine;
use crate::error::SimResult;
use crate::graph::SocialGraph;
use crate::stats::RunStatistics;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Results of a Monte Carlo batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Net happiness change per run, ordered by run index.
    pub samples: Vec<f64>,
    /// Summary statistics over all samples.
    pub stats: RunStatistics,
}

/// Monte Carlo runner.
///
/// The graph topology is generated once and shared read-only; every run
/// clones it and reseeds the weights from its own fresh happiness, so runs
/// share no mutable state. Run `k` owns a private generator derived from
/// the master seed on ChaCha stream `k + 1` (stream 0 builds the topology),
/// which makes the batch reproducible and independent of how rayon
/// schedules the runs.
pub struct MonteCarloRunner {
    cfg: Config,
    template: SocialGraph,
    master_seed: u64,
}

impl MonteCarloRunner {
    /// Validate the configuration and generate the shared topology.
    pub fn new(cfg: Config, master_seed: u64) -> SimResult<Self> {
        cfg.validate()?;

        let mut rng = ChaCha12Rng::seed_from_u64(master_seed);
        rng.set_stream(0);
        let template = SocialGraph::build(cfg.graph.n_actors, cfg.graph.topology, &mut rng)?;

        Ok(Self {
            cfg,
            template,
            master_seed,
        })
    }

    /// The shared topology template, for rendering.
    pub fn template(&self) -> &SocialGraph {
        &self.template
    }

    /// Run the whole batch and compute summary statistics.
    ///
    /// The failure policy is strict: the first failed run aborts the batch
    /// and its error is returned, with a log line reporting how many runs
    /// had completed out of the requested count.
    pub fn run(&self) -> SimResult<BatchOutcome> {
        let num_simulations = self.cfg.batch.num_simulations;
        let completed = AtomicUsize::new(0);
        let log_stride = (num_simulations / 20).max(1);

        let samples = (0..num_simulations)
            .into_par_iter()
            .map(|run_idx| {
                let sample = self.single_run(run_idx)?;

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % log_stride == 0 || done == num_simulations {
                    let progress = 100.0 * done as f64 / num_simulations as f64;
                    log::info!("completed {progress:06.2}%");
                }

                Ok(sample)
            })
            .collect::<SimResult<Vec<f64>>>()
            .inspect_err(|_| {
                log::warn!(
                    "batch aborted after {} of {num_simulations} runs",
                    completed.load(Ordering::Relaxed)
                );
            })?;

        let stats = RunStatistics::compute(&samples)?;
        Ok(BatchOutcome { samples, stats })
    }

    fn single_run(&self, run_idx: usize) -> SimResult<f64> {
        let mut rng = ChaCha12Rng::seed_from_u64(self.master_seed);
        rng.set_stream(run_idx as u64 + 1);

        let mut engine = DiffusionEngine::seeded(self.cfg.clone(), self.template.clone(), rng)?;
        let outcome = engine.run()?;
        Ok(outcome.net_change)
    }
}
