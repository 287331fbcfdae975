//! Structural network statistics.
//!
//! Computes topology metrics and attribute demographics for a generated
//! graph. The quadratic-and-worse metrics (components, clustering,
//! assortativity, diameter) are individually reported but collectively
//! gated behind a `skip_expensive` flag so large networks can skip them.

use std::collections::{HashMap, VecDeque};

use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::network::graph::NetworkGraph;

/// Attribute demographics across the device population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demographics {
    /// Device count per OS label; unset OS counts under "Unknown"
    pub os_breakdown: HashMap<String, usize>,
    /// Fraction of devices with admin_user=true
    pub admin_ratio: f64,
}

/// Structural statistics for a network graph.
///
/// Expensive fields are `None` when skipped, or when undefined (diameter of
/// a disconnected graph, assortativity of a degree-regular graph).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkStatistics {
    pub num_nodes: usize,
    pub num_edges: usize,
    pub density: f64,
    pub demographics: Demographics,
    pub avg_degree: f64,
    pub max_degree: usize,
    pub num_components: Option<usize>,
    pub giant_component_size: Option<usize>,
    pub avg_clustering: Option<f64>,
    pub assortativity: Option<f64>,
    pub diameter: Option<usize>,
}

/// Compute structural statistics for the graph.
pub fn compute(graph: &NetworkGraph, skip_expensive: bool) -> NetworkStatistics {
    let n = graph.node_count();
    let e = graph.edge_count();

    let density = if n > 1 {
        2.0 * e as f64 / (n as f64 * (n as f64 - 1.0))
    } else {
        0.0
    };

    let mut os_breakdown: HashMap<String, usize> = HashMap::new();
    let mut admin_count = 0usize;
    for i in 0..n as u32 {
        let attrs = graph.attributes(i);
        let os = attrs.os.clone().unwrap_or_else(|| "Unknown".to_string());
        *os_breakdown.entry(os).or_insert(0) += 1;
        if attrs.admin_user {
            admin_count += 1;
        }
    }
    let admin_ratio = if n > 0 { admin_count as f64 / n as f64 } else { 0.0 };

    let degrees: Vec<usize> = (0..n as u32).map(|i| graph.degree(i)).collect();
    let avg_degree = if n > 0 {
        degrees.iter().sum::<usize>() as f64 / n as f64
    } else {
        0.0
    };
    let max_degree = degrees.iter().copied().max().unwrap_or(0);

    let mut stats = NetworkStatistics {
        num_nodes: n,
        num_edges: e,
        density,
        demographics: Demographics { os_breakdown, admin_ratio },
        avg_degree,
        max_degree,
        num_components: None,
        giant_component_size: None,
        avg_clustering: None,
        assortativity: None,
        diameter: None,
    };

    if skip_expensive || n == 0 {
        return stats;
    }

    let components = connected_components(graph);
    stats.giant_component_size = components.iter().map(|c| c.len()).max();
    let single_component = components.len() == 1;
    stats.num_components = Some(components.len());

    info!("Computing clustering coefficient...");
    stats.avg_clustering = Some(average_clustering(graph));
    stats.assortativity = degree_assortativity(graph);

    if single_component {
        info!("Computing diameter...");
        stats.diameter = diameter(graph);
    }

    stats
}

/// Connected components via breadth-first search.
fn connected_components(graph: &NetworkGraph) -> Vec<Vec<u32>> {
    let n = graph.node_count();
    let mut visited = vec![false; n];
    let mut components = Vec::new();

    for start in 0..n as u32 {
        if visited[start as usize] {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = VecDeque::from([start]);
        visited[start as usize] = true;
        while let Some(node) = queue.pop_front() {
            component.push(node);
            for &next in graph.neighbors(node) {
                if !visited[next as usize] {
                    visited[next as usize] = true;
                    queue.push_back(next);
                }
            }
        }
        components.push(component);
    }
    components
}

/// Average local clustering coefficient, parallelized per node.
fn average_clustering(graph: &NetworkGraph) -> f64 {
    let n = graph.node_count();
    if n == 0 {
        return 0.0;
    }
    let total: f64 = (0..n as u32)
        .into_par_iter()
        .map(|node| {
            let neighbors = graph.neighbors(node);
            let k = neighbors.len();
            if k < 2 {
                return 0.0;
            }
            let mut links = 0usize;
            for (i, &a) in neighbors.iter().enumerate() {
                for &b in &neighbors[i + 1..] {
                    if graph.has_edge(a, b) {
                        links += 1;
                    }
                }
            }
            2.0 * links as f64 / (k as f64 * (k as f64 - 1.0))
        })
        .sum();
    total / n as f64
}

/// Pearson degree correlation across edges (hub-to-hub connectivity).
///
/// `None` when undefined, e.g. every device has the same degree.
fn degree_assortativity(graph: &NetworkGraph) -> Option<f64> {
    // Each undirected edge contributes both orientations
    let pairs: Vec<(f64, f64)> = graph
        .edges()
        .flat_map(|(a, b)| {
            let da = graph.degree(a) as f64;
            let db = graph.degree(b) as f64;
            [(da, db), (db, da)]
        })
        .collect();
    if pairs.is_empty() {
        return None;
    }

    let m = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / m;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / m;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }
    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        None
    } else {
        Some(cov / denom)
    }
}

/// Exact diameter of a connected graph: max BFS eccentricity over all nodes.
fn diameter(graph: &NetworkGraph) -> Option<usize> {
    let n = graph.node_count();
    (0..n as u32)
        .into_par_iter()
        .map(|start| {
            let mut dist = vec![usize::MAX; n];
            let mut queue = VecDeque::from([start]);
            dist[start as usize] = 0;
            let mut eccentricity = 0;
            while let Some(node) = queue.pop_front() {
                for &next in graph.neighbors(node) {
                    if dist[next as usize] == usize::MAX {
                        dist[next as usize] = dist[node as usize] + 1;
                        eccentricity = eccentricity.max(dist[next as usize]);
                        queue.push_back(next);
                    }
                }
            }
            eccentricity
        })
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::topology::{build, TopologyKind};

    #[test]
    fn test_complete_graph_statistics() {
        let graph = build(10, TopologyKind::Complete, Some(1)).unwrap();
        let stats = compute(&graph, false);
        assert_eq!(stats.num_nodes, 10);
        assert_eq!(stats.num_edges, 45);
        assert!((stats.density - 1.0).abs() < 1e-12);
        assert_eq!(stats.num_components, Some(1));
        assert_eq!(stats.giant_component_size, Some(10));
        assert_eq!(stats.diameter, Some(1));
        assert!((stats.avg_clustering.unwrap() - 1.0).abs() < 1e-12);
        // Degree-regular graph has no defined degree correlation
        assert!(stats.assortativity.is_none());
    }

    #[test]
    fn test_skip_expensive_leaves_gaps() {
        let graph = build(50, TopologyKind::Random, Some(2)).unwrap();
        let stats = compute(&graph, true);
        assert!(stats.num_components.is_none());
        assert!(stats.avg_clustering.is_none());
        assert!(stats.diameter.is_none());
        assert!(stats.avg_degree >= 0.0);
    }

    #[test]
    fn test_disconnected_graph_has_no_diameter() {
        let graph = NetworkGraph::new("random", 4);
        let stats = compute(&graph, false);
        assert_eq!(stats.num_components, Some(4));
        assert_eq!(stats.giant_component_size, Some(1));
        assert!(stats.diameter.is_none());
    }

    #[test]
    fn test_demographics() {
        let mut graph = NetworkGraph::new("random", 4);
        let overlay = crate::network::attributes::AttributeOverlay {
            os: Some("Linux".to_string()),
            admin_user: Some(false),
            ..Default::default()
        };
        graph.apply_overlay(0, &overlay);
        graph.apply_overlay(1, &overlay);
        let stats = compute(&graph, true);
        assert_eq!(stats.demographics.os_breakdown.get("Linux"), Some(&2));
        assert_eq!(stats.demographics.os_breakdown.get("Unknown"), Some(&2));
        assert!((stats.demographics.admin_ratio - 0.5).abs() < 1e-12);
    }
}
