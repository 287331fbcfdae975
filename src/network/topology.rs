//! Network topology generation.
//!
//! Builds the device graph for a simulation: scale-free (Barabási-Albert),
//! small-world (Watts-Strogatz), random (Erdős-Rényi), complete, or a
//! composite "segmented" graph of interconnected sub-topologies.
//!
//! Edge generation for the independent-edge models (`random`, `complete`)
//! partitions the node id space across rayon workers and merges the per-row
//! edge lists, which keeps construction tractable for node counts in the
//! tens of thousands. Preferential attachment is inherently sequential and
//! runs single-threaded.

use std::collections::HashSet;
use std::str::FromStr;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::network::graph::NetworkGraph;
use crate::utils::seeding::{derive_rng, random_seed};

/// Barabási-Albert attachment count
const SCALE_FREE_ATTACH: usize = 3;
/// Watts-Strogatz ring-lattice neighbor count
const SMALL_WORLD_K: usize = 4;
/// Watts-Strogatz rewiring probability
const SMALL_WORLD_REWIRE: f64 = 0.3;
/// Erdős-Rényi edge inclusion probability
const RANDOM_EDGE_PROB: f64 = 0.1;
/// Row count above which independent-edge generation goes parallel
const PARALLEL_THRESHOLD: usize = 2_000;

// RNG stream ids, one per stochastic construction phase
const STREAM_SCALE_FREE: u64 = 1;
const STREAM_SMALL_WORLD: u64 = 2;
const STREAM_RANDOM: u64 = 3;
const STREAM_SUBNET: u64 = 4;

/// Flat (non-segmented) topology families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyKind {
    ScaleFree,
    SmallWorld,
    Random,
    Complete,
}

impl TopologyKind {
    pub fn label(&self) -> &'static str {
        match self {
            TopologyKind::ScaleFree => "scale_free",
            TopologyKind::SmallWorld => "small_world",
            TopologyKind::Random => "random",
            TopologyKind::Complete => "complete",
        }
    }
}

impl FromStr for TopologyKind {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scale_free" => Ok(TopologyKind::ScaleFree),
            "small_world" => Ok(TopologyKind::SmallWorld),
            "random" => Ok(TopologyKind::Random),
            "complete" => Ok(TopologyKind::Complete),
            other => Err(SimulationError::UnsupportedTopology(other.to_string())),
        }
    }
}

/// One subnet of a segmented graph.
#[derive(Debug, Clone)]
pub struct SubnetSpec {
    pub count: usize,
    pub kind: TopologyKind,
}

/// An interconnect edge between two subnets of a segmented graph.
///
/// Node indices are subnet-local; both default to the subnet's node 0.
#[derive(Debug, Clone)]
pub struct InterconnectSpec {
    pub source_subnet: usize,
    pub target_subnet: usize,
    pub source_node: Option<usize>,
    pub target_node: Option<usize>,
    pub firewall: bool,
}

/// Build a flat topology of the given kind.
///
/// Passing `None` for the seed draws one from entropy; either way the seed
/// fully determines the generated graph.
pub fn build(
    node_count: usize,
    kind: TopologyKind,
    seed: Option<u64>,
) -> Result<NetworkGraph, SimulationError> {
    if node_count == 0 {
        return Err(SimulationError::InvalidTopologyConfig(
            "node count must be greater than zero".to_string(),
        ));
    }

    let seed = seed.unwrap_or_else(random_seed);
    info!(
        "Generating {}-node {} topology (seed {})",
        node_count,
        kind.label(),
        seed
    );

    let edges = match kind {
        TopologyKind::ScaleFree => barabasi_albert(node_count, SCALE_FREE_ATTACH, seed),
        TopologyKind::SmallWorld => {
            watts_strogatz(node_count, SMALL_WORLD_K, SMALL_WORLD_REWIRE, seed)
        }
        TopologyKind::Random => erdos_renyi(node_count, RANDOM_EDGE_PROB, seed),
        TopologyKind::Complete => complete(node_count),
    };

    let mut graph = NetworkGraph::new(kind.label(), node_count);
    graph.add_edges_bulk(&edges);
    info!(
        "Topology generated: {} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    );
    Ok(graph)
}

/// Build a segmented graph: independently generated subnets relabeled into
/// one contiguous id space, joined by explicit interconnect edges.
pub fn build_segmented(
    subnets: &[SubnetSpec],
    interconnects: &[InterconnectSpec],
    seed: Option<u64>,
) -> Result<NetworkGraph, SimulationError> {
    if subnets.is_empty() {
        return Err(SimulationError::InvalidTopologyConfig(
            "segmented topology requires at least one subnet".to_string(),
        ));
    }

    let seed = seed.unwrap_or_else(random_seed);
    let total_nodes: usize = subnets.iter().map(|s| s.count).sum();
    info!(
        "Generating segmented topology: {} subnets, {} nodes total",
        subnets.len(),
        total_nodes
    );

    // Relabel each subnet into [offset, offset + count)
    let mut offsets = Vec::with_capacity(subnets.len());
    let mut offset = 0usize;
    for subnet in subnets {
        offsets.push(offset);
        offset += subnet.count;
    }

    let mut graph = NetworkGraph::new("segmented", total_nodes);
    for (index, subnet) in subnets.iter().enumerate() {
        let sub_seed = derive_rng(seed, STREAM_SUBNET, index as u64).gen::<u64>();
        let sub = build(subnet.count, subnet.kind, Some(sub_seed))?;
        let base = offsets[index] as u32;
        let shifted: Vec<(u32, u32)> = sub.edges().map(|(a, b)| (a + base, b + base)).collect();
        graph.add_edges_bulk(&shifted);
        debug!(
            "Subnet {}: {} nodes ({}) at offset {}",
            index,
            subnet.count,
            subnet.kind.label(),
            base
        );
    }

    for (index, ic) in interconnects.iter().enumerate() {
        let resolve = |subnet: usize, node: Option<usize>| -> Result<u32, SimulationError> {
            let spec = subnets.get(subnet).ok_or_else(|| {
                SimulationError::InvalidInterconnect(format!(
                    "interconnect {index} references subnet {subnet}, but only {} subnets exist",
                    subnets.len()
                ))
            })?;
            let node = node.unwrap_or(0);
            if node >= spec.count {
                return Err(SimulationError::InvalidInterconnect(format!(
                    "interconnect {index} references node {node} in subnet {subnet} of size {}",
                    spec.count
                )));
            }
            Ok((offsets[subnet] + node) as u32)
        };

        let a = resolve(ic.source_subnet, ic.source_node)?;
        let b = resolve(ic.target_subnet, ic.target_node)?;
        if a == b {
            return Err(SimulationError::InvalidInterconnect(format!(
                "interconnect {index} connects a node to itself"
            )));
        }
        if !graph.add_connection(a, b)? {
            warn!("Interconnect {index} duplicates an existing edge, skipping");
        }
        if ic.firewall {
            graph.mark_firewalled(a, b);
        }
    }

    info!(
        "Segmented topology generated: {} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    );
    Ok(graph)
}

/// Barabási-Albert preferential attachment.
///
/// Each new node attaches to `m` distinct existing nodes chosen with
/// probability proportional to their current degree, producing the
/// hub-dominated power-law degree distribution typical of enterprise
/// networks.
fn barabasi_albert(n: usize, m: usize, seed: u64) -> Vec<(u32, u32)> {
    let m = m.min(n.saturating_sub(1)).max(1);
    if n <= 1 {
        return Vec::new();
    }

    let mut rng = derive_rng(seed, STREAM_SCALE_FREE, 0);
    let mut edges: Vec<(u32, u32)> = Vec::with_capacity((n - m) * m);
    // Degree-weighted sampling pool: every endpoint of every edge appears
    // once, so uniform draws from the pool are proportional to degree.
    let mut repeated: Vec<u32> = Vec::with_capacity(2 * (n - m) * m);
    let mut targets: Vec<u32> = (0..m as u32).collect();

    for source in m as u32..n as u32 {
        for &target in &targets {
            edges.push((source, target));
        }
        repeated.extend_from_slice(&targets);
        repeated.extend(std::iter::repeat(source).take(m));
        targets = random_subset(&repeated, m, &mut rng);
    }
    edges
}

/// Draw `m` distinct values uniformly from the (non-distinct) pool, in
/// draw order so the result depends only on the RNG.
fn random_subset(pool: &[u32], m: usize, rng: &mut StdRng) -> Vec<u32> {
    let mut seen = HashSet::with_capacity(m);
    let mut chosen = Vec::with_capacity(m);
    while chosen.len() < m && chosen.len() < pool.len() {
        let candidate = pool[rng.gen_range(0..pool.len())];
        if seen.insert(candidate) {
            chosen.push(candidate);
        }
    }
    chosen
}

/// Watts-Strogatz ring lattice with random rewiring.
fn watts_strogatz(n: usize, k: usize, p: f64, seed: u64) -> Vec<(u32, u32)> {
    if n <= 1 {
        return Vec::new();
    }
    let k = k.min(n - 1);
    let mut rng = derive_rng(seed, STREAM_SMALL_WORLD, 0);
    let mut present: HashSet<(u32, u32)> = HashSet::new();
    let norm = |a: u32, b: u32| (a.min(b), a.max(b));

    // Ring lattice: each node connected to k/2 neighbors on each side
    for i in 0..n as u32 {
        for j in 1..=(k / 2) as u32 {
            let other = (i + j) % n as u32;
            if i != other {
                present.insert(norm(i, other));
            }
        }
    }

    // Rewire each lattice edge (i, i+j) with probability p
    for j in 1..=(k / 2) as u32 {
        for i in 0..n as u32 {
            let other = (i + j) % n as u32;
            if i == other || !rng.gen_bool(p) {
                continue;
            }
            // A node adjacent to everything has nowhere to rewire to
            if present.iter().filter(|&&(a, b)| a == i || b == i).count() >= n - 1 {
                continue;
            }
            let mut candidate = rng.gen_range(0..n as u32);
            while candidate == i || present.contains(&norm(i, candidate)) {
                candidate = rng.gen_range(0..n as u32);
            }
            present.remove(&norm(i, other));
            present.insert(norm(i, candidate));
        }
    }
    present.into_iter().collect()
}

/// Erdős-Rényi: each pair included independently with probability `p`.
///
/// Rows are partitioned across workers; each row derives its own RNG from
/// the base seed so the result is identical regardless of scheduling.
fn erdos_renyi(n: usize, p: f64, seed: u64) -> Vec<(u32, u32)> {
    let row = |u: u32| -> Vec<(u32, u32)> {
        let mut rng = derive_rng(seed, STREAM_RANDOM, u as u64);
        ((u + 1)..n as u32)
            .filter(|_| rng.gen_bool(p))
            .map(|v| (u, v))
            .collect()
    };

    if n >= PARALLEL_THRESHOLD {
        (0..n as u32).into_par_iter().flat_map_iter(row).collect()
    } else {
        (0..n as u32).flat_map(row).collect()
    }
}

/// Every pair of devices connected.
fn complete(n: usize) -> Vec<(u32, u32)> {
    let row = |u: u32| -> Vec<(u32, u32)> { ((u + 1)..n as u32).map(|v| (u, v)).collect() };
    if n >= PARALLEL_THRESHOLD {
        (0..n as u32).into_par_iter().flat_map_iter(row).collect()
    } else {
        (0..n as u32).flat_map(row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_nodes_rejected() {
        match build(0, TopologyKind::Random, Some(1)) {
            Err(SimulationError::InvalidTopologyConfig(_)) => {}
            other => panic!("expected InvalidTopologyConfig, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        match "mesh".parse::<TopologyKind>() {
            Err(SimulationError::UnsupportedTopology(kind)) => assert_eq!(kind, "mesh"),
            other => panic!("expected UnsupportedTopology, got {other:?}"),
        }
    }

    #[test]
    fn test_complete_graph_edge_count() {
        let graph = build(10, TopologyKind::Complete, Some(1)).unwrap();
        assert_eq!(graph.edge_count(), 45);
        for i in 0..10 {
            assert_eq!(graph.degree(i), 9);
        }
    }

    #[test]
    fn test_scale_free_is_connected_and_hubby() {
        let graph = build(200, TopologyKind::ScaleFree, Some(7)).unwrap();
        // (n - m) * m edges for m = 3
        assert_eq!(graph.edge_count(), 197 * 3);
        let max_degree = (0..200).map(|i| graph.degree(i)).max().unwrap();
        // Preferential attachment concentrates degree on early nodes
        assert!(max_degree > 10, "expected a hub, max degree {max_degree}");
    }

    #[test]
    fn test_small_world_edge_count_preserved_by_rewiring() {
        let graph = build(100, TopologyKind::SmallWorld, Some(3)).unwrap();
        // Rewiring moves edges but never changes their number
        assert_eq!(graph.edge_count(), 100 * (SMALL_WORLD_K / 2));
    }

    #[test]
    fn test_scale_free_deterministic_under_seed() {
        let a = build(150, TopologyKind::ScaleFree, Some(4)).unwrap();
        let b = build(150, TopologyKind::ScaleFree, Some(4)).unwrap();
        let ea: Vec<_> = a.edges().collect();
        let eb: Vec<_> = b.edges().collect();
        assert_eq!(ea, eb);
    }

    #[test]
    fn test_random_graph_deterministic_under_seed() {
        let a = build(300, TopologyKind::Random, Some(11)).unwrap();
        let b = build(300, TopologyKind::Random, Some(11)).unwrap();
        assert_eq!(a.edge_count(), b.edge_count());
        let ea: Vec<_> = a.edges().collect();
        let eb: Vec<_> = b.edges().collect();
        assert_eq!(ea, eb);
    }

    #[test]
    fn test_single_node_topologies() {
        for kind in [
            TopologyKind::ScaleFree,
            TopologyKind::SmallWorld,
            TopologyKind::Random,
            TopologyKind::Complete,
        ] {
            let graph = build(1, kind, Some(1)).unwrap();
            assert_eq!(graph.node_count(), 1);
            assert_eq!(graph.edge_count(), 0);
        }
    }

    #[test]
    fn test_segmented_offsets_and_firewall() {
        let subnets = vec![
            SubnetSpec { count: 5, kind: TopologyKind::Complete },
            SubnetSpec { count: 4, kind: TopologyKind::Complete },
        ];
        let interconnects = vec![InterconnectSpec {
            source_subnet: 0,
            target_subnet: 1,
            source_node: Some(2),
            target_node: None,
            firewall: true,
        }];
        let graph = build_segmented(&subnets, &interconnects, Some(5)).unwrap();
        assert_eq!(graph.node_count(), 9);
        // complete(5) + complete(4) + one interconnect
        assert_eq!(graph.edge_count(), 10 + 6 + 1);
        assert!(graph.has_edge(2, 5));
        assert!(graph.is_firewalled(2, 5));
        // No stray edges across the subnet boundary
        assert!(!graph.has_edge(0, 5));
    }

    #[test]
    fn test_segmented_bad_subnet_index() {
        let subnets = vec![SubnetSpec { count: 3, kind: TopologyKind::Complete }];
        let interconnects = vec![InterconnectSpec {
            source_subnet: 0,
            target_subnet: 4,
            source_node: None,
            target_node: None,
            firewall: false,
        }];
        match build_segmented(&subnets, &interconnects, Some(1)) {
            Err(SimulationError::InvalidInterconnect(_)) => {}
            other => panic!("expected InvalidInterconnect, got {other:?}"),
        }
    }

    #[test]
    fn test_segmented_bad_node_index() {
        let subnets = vec![
            SubnetSpec { count: 3, kind: TopologyKind::Complete },
            SubnetSpec { count: 3, kind: TopologyKind::Complete },
        ];
        let interconnects = vec![InterconnectSpec {
            source_subnet: 0,
            target_subnet: 1,
            source_node: Some(7),
            target_node: None,
            firewall: false,
        }];
        assert!(matches!(
            build_segmented(&subnets, &interconnects, Some(1)),
            Err(SimulationError::InvalidInterconnect(_))
        ));
    }
}
