//! Simulation configuration parameters.
//!
//! Loaded from a TOML file and validated before use.

use crate::error::{SimError, SimResult};
use crate::graph::Topology;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Full simulation configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Master random seed; absent means fresh OS entropy on every invocation.
    pub seed: Option<u64>,

    pub graph: GraphConfig,
    pub init: InitConfig,
    pub decision: DecisionConfig,
    pub diffusion: DiffusionConfig,
    pub batch: BatchConfig,
}

/// Social graph construction parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Number of actors.
    pub n_actors: usize,
    /// Generative topology.
    pub topology: Topology,
}

/// Initial happiness distribution.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    /// Lower bound of the uniform initial happiness draw.
    pub happiness_low: f64,
    /// Upper bound (exclusive) of the uniform initial happiness draw.
    pub happiness_high: f64,
}

/// Trolley-decision shock parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Number of actors saved by the decision.
    pub group_size: usize,
    /// Happiness gained by each saved actor; the sacrificed actor loses
    /// `shock_gain * group_size`.
    pub shock_gain: f64,
}

/// When edge weights are recomputed from the current happiness.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightFeedback {
    /// Weights stay as seeded from the initial happiness.
    Off,
    /// Weights are recomputed once, after the last round.
    AfterRounds,
    /// Weights are recomputed after every round.
    EveryRound,
}

/// Contagion and noise parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DiffusionConfig {
    /// Number of diffusion rounds per simulation.
    pub rounds: usize,
    /// Strength of the neighbor-difference contagion term.
    pub contagion_factor: f64,
    /// Per-actor, per-round probability of a random perturbation.
    pub random_event_probability: f64,
    /// Half-width of the uniform random perturbation.
    pub ripple_decay: f64,
    /// Edge-weight feedback policy.
    pub weight_feedback: WeightFeedback,
}

/// Monte Carlo batch parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of independent simulation runs.
    pub num_simulations: usize,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or if the
    /// configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to parse config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Check every parameter against its valid range.
    pub fn validate(&self) -> SimResult<()> {
        let n_actors = self.graph.n_actors;
        check_num("number of actors", n_actors, 1..100_000)?;

        match self.graph.topology {
            Topology::ScaleFree { edges_per_node } => {
                check_num("edges per node", edges_per_node, 1..n_actors.max(1))?;
            }
            Topology::SmallWorld {
                ring_degree,
                rewire_prob,
            } => {
                check_num("ring degree", ring_degree, 2..n_actors.max(2))?;
                if ring_degree % 2 != 0 {
                    return Err(SimError::InvalidParameter(format!(
                        "ring degree must be even, but is {ring_degree}"
                    )));
                }
                check_num("rewire probability", rewire_prob, 0.0..=1.0)?;
            }
        }

        check_num("initial happiness low", self.init.happiness_low, 0.0..=1.0)?;
        check_num("initial happiness high", self.init.happiness_high, 0.0..=1.0)?;
        if self.init.happiness_low >= self.init.happiness_high {
            return Err(SimError::InvalidParameter(format!(
                "initial happiness bounds must satisfy low < high, but are [{}, {})",
                self.init.happiness_low, self.init.happiness_high
            )));
        }

        check_num("group size", self.decision.group_size, 1..=n_actors)?;
        check_num(
            "shock gain",
            self.decision.shock_gain,
            0.0..f64::INFINITY,
        )?;

        check_num("rounds", self.diffusion.rounds, 0..1_000_000)?;
        check_num(
            "contagion factor",
            self.diffusion.contagion_factor,
            0.0..=1.0,
        )?;
        check_num(
            "random event probability",
            self.diffusion.random_event_probability,
            0.0..=1.0,
        )?;
        check_num(
            "ripple decay",
            self.diffusion.ripple_decay,
            0.0..f64::INFINITY,
        )?;

        check_num(
            "number of simulations",
            self.batch.num_simulations,
            1..10_000_000,
        )?;

        Ok(())
    }
}

fn check_num<T, R>(name: &str, num: T, range: R) -> SimResult<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        return Err(SimError::InvalidParameter(format!(
            "{name} must be in the range {range:?}, but is {num:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_toml() -> &'static str {
        r#"
seed = 90125

[graph]
n_actors = 100

[graph.topology]
kind = "scale_free"
edges_per_node = 3

[init]
happiness_low = 0.5
happiness_high = 1.0

[decision]
group_size = 5
shock_gain = 0.5

[diffusion]
rounds = 50
contagion_factor = 0.1
random_event_probability = 0.05
ripple_decay = 0.1
weight_feedback = "after_rounds"

[batch]
num_simulations = 1000
"#
    }

    fn example_config() -> Config {
        toml::from_str(example_toml()).unwrap()
    }

    #[test]
    fn example_config_parses_and_validates() {
        let config = example_config();
        config.validate().unwrap();

        assert_eq!(config.seed, Some(90125));
        assert_eq!(config.graph.n_actors, 100);
        assert_eq!(
            config.graph.topology,
            Topology::ScaleFree { edges_per_node: 3 }
        );
        assert_eq!(config.diffusion.weight_feedback, WeightFeedback::AfterRounds);
        assert_eq!(config.batch.num_simulations, 1000);
    }

    #[test]
    fn small_world_topology_parses() {
        let toml_str = example_toml().replace(
            "kind = \"scale_free\"\nedges_per_node = 3",
            "kind = \"small_world\"\nring_degree = 4\nrewire_prob = 0.2",
        );
        let config: Config = toml::from_str(&toml_str).unwrap();
        config.validate().unwrap();

        assert_eq!(
            config.graph.topology,
            Topology::SmallWorld {
                ring_degree: 4,
                rewire_prob: 0.2,
            }
        );
    }

    #[test]
    fn out_of_range_parameters_are_rejected() {
        let mut config = example_config();
        config.diffusion.contagion_factor = 1.5;
        assert!(config.validate().is_err());

        let mut config = example_config();
        config.diffusion.random_event_probability = -0.1;
        assert!(config.validate().is_err());

        let mut config = example_config();
        config.diffusion.ripple_decay = -0.5;
        assert!(config.validate().is_err());

        let mut config = example_config();
        config.decision.group_size = 101;
        assert!(config.validate().is_err());

        let mut config = example_config();
        config.init.happiness_low = 0.9;
        config.init.happiness_high = 0.5;
        assert!(config.validate().is_err());

        let mut config = example_config();
        config.graph.topology = Topology::SmallWorld {
            ring_degree: 3,
            rewire_prob: 0.1,
        };
        assert!(config.validate().is_err());
    }
}
