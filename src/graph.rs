//! Weighted undirected social graph.
//!
//! The topology is fixed after construction; only edge weights mutate.
//! Weights always lie in `[0, 1]`.

use crate::error::{SimError, SimResult};
use crate::model::{HappinessState, clamp_unit};
use rand::prelude::*;
use rand_distr::Bernoulli;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Generative topology of the social graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Topology {
    /// Barabási-Albert preferential attachment.
    ScaleFree { edges_per_node: usize },

    /// Watts-Strogatz ring lattice with random rewiring.
    SmallWorld { ring_degree: usize, rewire_prob: f64 },
}

/// Social graph over `n_actors` actors with per-edge weights in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialGraph {
    n_actors: usize,
    edges: Vec<(usize, usize)>,
    weights: Vec<f64>,
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl SocialGraph {
    /// Construct a graph over `n_actors` actors with the given generative topology.
    pub fn build<R: Rng>(n_actors: usize, topology: Topology, rng: &mut R) -> SimResult<Self> {
        if n_actors == 0 {
            return Err(SimError::InvalidParameter(
                "number of actors must be at least 1".into(),
            ));
        }

        let edges = match topology {
            Topology::ScaleFree { edges_per_node } => {
                scale_free_edges(n_actors, edges_per_node, rng)?
            }
            Topology::SmallWorld {
                ring_degree,
                rewire_prob,
            } => small_world_edges(n_actors, ring_degree, rewire_prob, rng)?,
        };

        Self::from_edges(n_actors, &edges)
    }

    /// Construct a graph from an explicit edge list.
    ///
    /// Weights start at the neutral value 0.5; call [`SocialGraph::seed_weights`]
    /// before the first diffusion round.
    pub fn from_edges(n_actors: usize, edges: &[(usize, usize)]) -> SimResult<Self> {
        if n_actors == 0 {
            return Err(SimError::InvalidParameter(
                "number of actors must be at least 1".into(),
            ));
        }

        let mut graph = Self {
            n_actors,
            edges: Vec::with_capacity(edges.len()),
            weights: Vec::with_capacity(edges.len()),
            adjacency: vec![Vec::new(); n_actors],
        };

        let mut seen = HashSet::with_capacity(edges.len());
        for &(i, j) in edges {
            graph.check_index(i)?;
            graph.check_index(j)?;
            if i == j {
                return Err(SimError::InvalidParameter(format!(
                    "self-loop on actor {i}"
                )));
            }
            if !seen.insert(edge_key(i, j)) {
                return Err(SimError::InvalidParameter(format!(
                    "duplicate edge between actors {i} and {j}"
                )));
            }

            let edge_idx = graph.edges.len();
            graph.edges.push(edge_key(i, j));
            graph.weights.push(0.5);
            graph.adjacency[i].push((j, edge_idx));
            graph.adjacency[j].push((i, edge_idx));
        }

        Ok(graph)
    }

    pub fn n_actors(&self) -> usize {
        self.n_actors
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Iterate over all edges as `(i, j, weight)` triples.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.edges
            .iter()
            .zip(self.weights.iter())
            .map(|(&(i, j), &w)| (i, j, w))
    }

    /// Actors adjacent to `i`, in an order that is stable for the graph's lifetime.
    pub fn neighbors(&self, i: usize) -> SimResult<impl Iterator<Item = usize> + '_> {
        self.check_index(i)?;
        Ok(self.adjacency[i].iter().map(|&(nbr, _)| nbr))
    }

    /// Get the current weight of the edge `(i, j)`.
    pub fn weight(&self, i: usize, j: usize) -> SimResult<f64> {
        let edge_idx = self.edge_index(i, j)?;
        Ok(self.weights[edge_idx])
    }

    /// Set the weight of the edge `(i, j)`, clamping it into `[0, 1]`.
    pub fn set_weight(&mut self, i: usize, j: usize, weight: f64) -> SimResult<()> {
        if !weight.is_finite() {
            return Err(SimError::InvalidParameter(format!(
                "edge weight must be finite, but is {weight}"
            )));
        }
        let edge_idx = self.edge_index(i, j)?;
        self.weights[edge_idx] = clamp_unit(weight);
        Ok(())
    }

    /// Reset every edge weight to the clamped mean of its endpoints' happiness.
    pub fn seed_weights(&mut self, happiness: &HappinessState) -> SimResult<()> {
        if happiness.len() != self.n_actors {
            return Err(SimError::InvalidParameter(format!(
                "happiness state has {} values but the graph has {} actors",
                happiness.len(),
                self.n_actors
            )));
        }
        let values = happiness.values();
        for (&(i, j), weight) in self.edges.iter().zip(self.weights.iter_mut()) {
            *weight = clamp_unit((values[i] + values[j]) / 2.0);
        }
        Ok(())
    }

    /// Incident edges of `i` as `(neighbor, edge index)` pairs.
    ///
    /// The caller must ensure `i < n_actors`.
    pub(crate) fn incident(&self, i: usize) -> &[(usize, usize)] {
        &self.adjacency[i]
    }

    pub(crate) fn edge_weight(&self, edge_idx: usize) -> f64 {
        self.weights[edge_idx]
    }

    fn check_index(&self, index: usize) -> SimResult<()> {
        if index >= self.n_actors {
            return Err(SimError::IndexOutOfRange {
                index,
                n_actors: self.n_actors,
            });
        }
        Ok(())
    }

    fn edge_index(&self, i: usize, j: usize) -> SimResult<usize> {
        self.check_index(i)?;
        self.check_index(j)?;
        self.adjacency[i]
            .iter()
            .find(|&&(nbr, _)| nbr == j)
            .map(|&(_, edge_idx)| edge_idx)
            .ok_or(SimError::UnknownEdge { i, j })
    }
}

fn edge_key(i: usize, j: usize) -> (usize, usize) {
    if i < j { (i, j) } else { (j, i) }
}

/// Barabási-Albert preferential attachment.
///
/// The first added node links to all `m` initial nodes; every later node
/// draws `m` distinct targets from a pool in which each node appears once
/// per incident edge.
fn scale_free_edges<R: Rng>(
    n_actors: usize,
    edges_per_node: usize,
    rng: &mut R,
) -> SimResult<Vec<(usize, usize)>> {
    let m = edges_per_node;
    if m == 0 || m >= n_actors {
        return Err(SimError::InvalidParameter(format!(
            "edges per node must be in the range 1..{n_actors}, but is {m}"
        )));
    }

    let mut edges = Vec::with_capacity((n_actors - m) * m);
    let mut pool = Vec::with_capacity(2 * (n_actors - m) * m);
    let mut targets: Vec<usize> = (0..m).collect();

    for new_node in m..n_actors {
        for &target in &targets {
            edges.push((new_node, target));
        }
        pool.extend(targets.iter().copied());
        pool.extend(std::iter::repeat_n(new_node, m));

        targets.clear();
        while targets.len() < m {
            if let Some(&candidate) = pool.choose(rng) {
                if !targets.contains(&candidate) {
                    targets.push(candidate);
                }
            }
        }
    }

    Ok(edges)
}

/// Watts-Strogatz small-world rewiring.
///
/// Builds a ring lattice of even degree `k` and rewires each lattice edge
/// with probability `p`, avoiding self-loops and duplicate edges.
fn small_world_edges<R: Rng>(
    n_actors: usize,
    ring_degree: usize,
    rewire_prob: f64,
    rng: &mut R,
) -> SimResult<Vec<(usize, usize)>> {
    let k = ring_degree;
    if k == 0 || k % 2 != 0 || k >= n_actors {
        return Err(SimError::InvalidParameter(format!(
            "ring degree must be even and in the range 2..{n_actors}, but is {k}"
        )));
    }
    if !(0.0..=1.0).contains(&rewire_prob) {
        return Err(SimError::InvalidParameter(format!(
            "rewire probability must be in the range 0.0..=1.0, but is {rewire_prob}"
        )));
    }

    let mut edges = Vec::with_capacity(n_actors * k / 2);
    for dist in 1..=k / 2 {
        for i in 0..n_actors {
            edges.push((i, (i + dist) % n_actors));
        }
    }

    let mut present: HashSet<(usize, usize)> =
        edges.iter().map(|&(i, j)| edge_key(i, j)).collect();
    let mut degree = vec![k; n_actors];

    let rewire_dist = Bernoulli::new(rewire_prob)?;
    for idx in 0..edges.len() {
        if !rewire_dist.sample(rng) {
            continue;
        }
        let (u, v) = edges[idx];
        // A saturated node has no free endpoint left to rewire to.
        if degree[u] >= n_actors - 1 {
            continue;
        }
        loop {
            let w = rng.random_range(0..n_actors);
            if w != u && !present.contains(&edge_key(u, w)) {
                present.remove(&edge_key(u, v));
                present.insert(edge_key(u, w));
                degree[v] -= 1;
                degree[w] += 1;
                edges[idx] = (u, w);
                break;
            }
        }
    }

    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha12Rng;

    fn rng(seed: u64) -> ChaCha12Rng {
        ChaCha12Rng::seed_from_u64(seed)
    }

    #[test]
    fn scale_free_has_expected_edge_count() {
        let n = 20;
        let m = 3;
        let graph = SocialGraph::build(
            n,
            Topology::ScaleFree { edges_per_node: m },
            &mut rng(0),
        )
        .unwrap();

        assert_eq!(graph.n_actors(), n);
        assert_eq!(graph.edge_count(), (n - m) * m);
        // Every added node links to exactly m distinct earlier nodes.
        for i in m..n {
            assert!(graph.neighbors(i).unwrap().count() >= m);
        }
    }

    #[test]
    fn scale_free_adjacency_is_symmetric() {
        let graph = SocialGraph::build(
            30,
            Topology::ScaleFree { edges_per_node: 2 },
            &mut rng(1),
        )
        .unwrap();

        for (i, j, _) in graph.edges() {
            assert!(graph.neighbors(i).unwrap().any(|nbr| nbr == j));
            assert!(graph.neighbors(j).unwrap().any(|nbr| nbr == i));
        }
    }

    #[test]
    fn small_world_without_rewiring_is_a_ring_lattice() {
        let n = 10;
        let graph = SocialGraph::build(
            n,
            Topology::SmallWorld {
                ring_degree: 4,
                rewire_prob: 0.0,
            },
            &mut rng(2),
        )
        .unwrap();

        assert_eq!(graph.edge_count(), n * 2);
        for i in 0..n {
            let mut neighbors: Vec<_> = graph.neighbors(i).unwrap().collect();
            neighbors.sort_unstable();
            let mut expected = vec![
                (i + n - 2) % n,
                (i + n - 1) % n,
                (i + 1) % n,
                (i + 2) % n,
            ];
            expected.sort_unstable();
            assert_eq!(neighbors, expected);
        }
    }

    #[test]
    fn small_world_rewiring_preserves_edge_count() {
        let n = 40;
        let graph = SocialGraph::build(
            n,
            Topology::SmallWorld {
                ring_degree: 6,
                rewire_prob: 0.5,
            },
            &mut rng(3),
        )
        .unwrap();

        assert_eq!(graph.edge_count(), n * 3);
        for (i, j, _) in graph.edges() {
            assert_ne!(i, j);
        }
    }

    #[test]
    fn invalid_topology_parameters_are_rejected() {
        let result = SocialGraph::build(
            0,
            Topology::ScaleFree { edges_per_node: 1 },
            &mut rng(4),
        );
        assert!(matches!(result, Err(SimError::InvalidParameter(_))));

        let result = SocialGraph::build(
            5,
            Topology::ScaleFree { edges_per_node: 5 },
            &mut rng(4),
        );
        assert!(matches!(result, Err(SimError::InvalidParameter(_))));

        let result = SocialGraph::build(
            10,
            Topology::SmallWorld {
                ring_degree: 3,
                rewire_prob: 0.1,
            },
            &mut rng(4),
        );
        assert!(matches!(result, Err(SimError::InvalidParameter(_))));

        let result = SocialGraph::build(
            10,
            Topology::SmallWorld {
                ring_degree: 4,
                rewire_prob: 1.5,
            },
            &mut rng(4),
        );
        assert!(matches!(result, Err(SimError::InvalidParameter(_))));
    }

    #[test]
    fn from_edges_rejects_bad_edge_lists() {
        let result = SocialGraph::from_edges(3, &[(0, 3)]);
        assert!(matches!(
            result,
            Err(SimError::IndexOutOfRange { index: 3, n_actors: 3 })
        ));

        let result = SocialGraph::from_edges(3, &[(1, 1)]);
        assert!(matches!(result, Err(SimError::InvalidParameter(_))));

        let result = SocialGraph::from_edges(3, &[(0, 1), (1, 0)]);
        assert!(matches!(result, Err(SimError::InvalidParameter(_))));
    }

    #[test]
    fn weight_lookup_fails_on_missing_edge() {
        let graph = SocialGraph::from_edges(3, &[(0, 1)]).unwrap();
        assert!(matches!(
            graph.weight(0, 2),
            Err(SimError::UnknownEdge { i: 0, j: 2 })
        ));
        assert!(matches!(
            graph.weight(0, 5),
            Err(SimError::IndexOutOfRange { index: 5, .. })
        ));
    }

    #[test]
    fn set_weight_clamps_into_unit_interval() {
        let mut graph = SocialGraph::from_edges(2, &[(0, 1)]).unwrap();

        graph.set_weight(0, 1, 1.5).unwrap();
        assert_eq!(graph.weight(0, 1).unwrap(), 1.0);

        graph.set_weight(1, 0, -0.25).unwrap();
        assert_eq!(graph.weight(0, 1).unwrap(), 0.0);

        assert!(matches!(
            graph.set_weight(0, 1, f64::NAN),
            Err(SimError::InvalidParameter(_))
        ));
    }

    #[test]
    fn seed_weights_uses_endpoint_means() {
        let mut graph = SocialGraph::from_edges(3, &[(0, 1), (1, 2)]).unwrap();
        let happiness = HappinessState::from_values(vec![0.25, 0.75, 1.0]).unwrap();

        graph.seed_weights(&happiness).unwrap();

        // Dyadic values, so the means are exact.
        assert_eq!(graph.weight(0, 1).unwrap(), 0.5);
        assert_eq!(graph.weight(1, 2).unwrap(), 0.875);
    }

    #[test]
    fn seed_weights_rejects_mismatched_state() {
        let mut graph = SocialGraph::from_edges(3, &[(0, 1)]).unwrap();
        let happiness = HappinessState::from_values(vec![0.5, 0.5]).unwrap();
        assert!(matches!(
            graph.seed_weights(&happiness),
            Err(SimError::InvalidParameter(_))
        ));
    }
}
