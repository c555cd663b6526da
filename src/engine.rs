//! Diffusion engine.
//!
//! Applies the trolley-decision shock and runs the contagion rounds over a
//! social graph and happiness state.

use crate::config::{Config, WeightFeedback};
use crate::error::{SimError, SimResult};
use crate::graph::SocialGraph;
use crate::model::{HappinessState, clamp_unit};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::{Bernoulli, Uniform};
use serde::{Deserialize, Serialize};

/// Engine phase.
///
/// A decision may only be applied from `Seeded` or `Settled`, and diffusion
/// only from `Shocked`, so one cycle is always shock-then-diffuse. `Settled`
/// permits the next decision so that consecutive cycles can reuse the
/// evolved state, as the interactive front end does.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Seeded,
    Shocked,
    Settled,
}

/// Record of a single trolley decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Actors that received the positive shock.
    pub saved: Vec<usize>,
    /// Actor that received the scaled negative shock.
    pub sacrificed: usize,
}

/// Outcome of one full shock-and-diffuse cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// The decision that was applied.
    pub decision: Decision,
    /// Happiness before the shock.
    pub initial: HappinessState,
    /// Total final happiness minus total initial happiness.
    pub net_change: f64,
}

/// Diffusion engine.
///
/// Holds the configuration, social graph, happiness state, and random
/// number generator. Given a fixed seed and configuration the whole round
/// sequence is bit-for-bit reproducible.
pub struct DiffusionEngine {
    cfg: Config,
    graph: SocialGraph,
    happiness: HappinessState,
    rng: ChaCha12Rng,
    phase: Phase,
}

impl DiffusionEngine {
    /// Create an engine with freshly drawn happiness and seeded edge weights.
    ///
    /// The graph keeps its topology; its weights are reset to the mean of
    /// each edge's endpoint happiness before any diffusion happens.
    pub fn seeded(cfg: Config, mut graph: SocialGraph, mut rng: ChaCha12Rng) -> SimResult<Self> {
        cfg.validate()?;
        if graph.n_actors() != cfg.graph.n_actors {
            return Err(SimError::InvalidParameter(format!(
                "graph has {} actors but the config declares {}",
                graph.n_actors(),
                cfg.graph.n_actors
            )));
        }

        let happiness = HappinessState::init_uniform(
            cfg.graph.n_actors,
            cfg.init.happiness_low,
            cfg.init.happiness_high,
            &mut rng,
        )?;
        graph.seed_weights(&happiness)?;

        Ok(Self {
            cfg,
            graph,
            happiness,
            rng,
            phase: Phase::Seeded,
        })
    }

    /// Current happiness, for rendering and measurement.
    pub fn happiness(&self) -> &HappinessState {
        &self.happiness
    }

    /// Current graph, for rendering and measurement.
    pub fn graph(&self) -> &SocialGraph {
        &self.graph
    }

    /// Draw and apply a trolley decision.
    ///
    /// `group_size` saved actors are drawn uniformly without replacement
    /// and one sacrificed actor is drawn uniformly over all actors.
    pub fn apply_decision(&mut self) -> SimResult<Decision> {
        if self.phase == Phase::Shocked {
            return Err(SimError::InvalidParameter(
                "a decision is already pending diffusion".into(),
            ));
        }

        let n_actors = self.cfg.graph.n_actors;
        let saved =
            rand::seq::index::sample(&mut self.rng, n_actors, self.cfg.decision.group_size)
                .into_vec();
        let sacrificed = self.rng.random_range(0..n_actors);

        self.happiness
            .apply_shock(&saved, sacrificed, self.cfg.decision.shock_gain)?;

        self.phase = Phase::Shocked;
        Ok(Decision { saved, sacrificed })
    }

    /// Run all diffusion rounds for the pending decision.
    pub fn diffuse(&mut self) -> SimResult<()> {
        if self.phase != Phase::Shocked {
            return Err(SimError::InvalidParameter(
                "diffusion requires a pending decision".into(),
            ));
        }

        let event_dist = Bernoulli::new(self.cfg.diffusion.random_event_probability)?;
        let decay = self.cfg.diffusion.ripple_decay;
        let ripple_dist = if decay > 0.0 {
            Some(Uniform::new(-decay, decay)?)
        } else {
            None
        };

        for _ in 0..self.cfg.diffusion.rounds {
            self.diffusion_round(&event_dist, ripple_dist.as_ref());
            if self.cfg.diffusion.weight_feedback == WeightFeedback::EveryRound {
                self.graph.seed_weights(&self.happiness)?;
            }
        }

        if self.cfg.diffusion.weight_feedback == WeightFeedback::AfterRounds {
            self.graph.seed_weights(&self.happiness)?;
        }

        self.phase = Phase::Settled;
        Ok(())
    }

    /// Perform one full shock-and-diffuse cycle and measure the net change.
    pub fn run(&mut self) -> SimResult<RunOutcome> {
        let initial = self.happiness.clone();
        let decision = self.apply_decision()?;
        self.diffuse()?;
        let net_change = self.happiness.total() - initial.total();

        Ok(RunOutcome {
            decision,
            initial,
            net_change,
        })
    }

    /// One contagion round over a read snapshot of the previous round.
    ///
    /// Every actor's update reads only the snapshot, so the propagation
    /// order within a round cannot leak into the results.
    fn diffusion_round(&mut self, event_dist: &Bernoulli, ripple_dist: Option<&Uniform<f64>>) {
        let current = self.happiness.values().to_vec();
        let mut next = Vec::with_capacity(current.len());

        for (i, &value) in current.iter().enumerate() {
            let mut diff_sum = 0.0;
            for &(neighbor, edge_idx) in self.graph.incident(i) {
                diff_sum += self.graph.edge_weight(edge_idx) * (current[neighbor] - value);
            }

            let mut updated = value + self.cfg.diffusion.contagion_factor * diff_sum;
            if event_dist.sample(&mut self.rng) {
                if let Some(dist) = ripple_dist {
                    updated += dist.sample(&mut self.rng);
                }
            }
            next.push(clamp_unit(updated));
        }

        self.happiness.replace(next);
    }
}
