//! Batch attribute assignment ("node definitions").
//!
//! Applies ordered attribute batches onto the generated device-id space,
//! either clustered (sequential id ranges, useful for controlled
//! experiments) or mixed (random-shuffle placement, which avoids artificial
//! correlation between topology position and security posture).

use std::ops::Range;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::network::attributes::AttributeOverlay;
use crate::network::graph::NetworkGraph;

/// A declarative attribute assignment for a group of devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Number of devices this batch covers
    pub count: usize,
    /// Attributes applied to each covered device
    pub attributes: AttributeOverlay,
}

/// How batch attributes are placed onto device ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionMode {
    /// Batch *i* claims the next contiguous id range
    #[default]
    Sequential,
    /// Same attribute multiset, uniformly shuffled device-id placement
    Random,
}

/// Apply ordered node-definition batches to the graph's devices.
///
/// Batches over-subscribing the device count are truncated at N with a
/// warning rather than failing, to stay tolerant of un-validated inputs.
/// Devices not covered by any batch keep their earlier-seeded attributes.
pub fn apply_batches(
    graph: &mut NetworkGraph,
    definitions: &[NodeDefinition],
    mode: DistributionMode,
    rng: &mut StdRng,
) {
    let range = 0..graph.node_count() as u32;
    apply_batches_range(graph, definitions, mode, rng, range);
}

/// Apply batches to a contiguous device-id range: one subnet of a segmented
/// graph, or the whole graph.
pub fn apply_batches_range(
    graph: &mut NetworkGraph,
    definitions: &[NodeDefinition],
    mode: DistributionMode,
    rng: &mut StdRng,
    range: Range<u32>,
) {
    if definitions.is_empty() {
        return;
    }

    let node_count = range.len();
    let requested: usize = definitions.iter().map(|d| d.count).sum();
    if requested > node_count {
        warn!(
            "Node definitions cover {requested} devices but only {node_count} are available; \
             truncating the excess"
        );
    }

    // Flatten into one overlay per covered device, in batch order
    let covered = requested.min(node_count);
    let mut overlays: Vec<&AttributeOverlay> = Vec::with_capacity(covered);
    'flatten: for definition in definitions {
        for _ in 0..definition.count {
            if overlays.len() == covered {
                break 'flatten;
            }
            overlays.push(&definition.attributes);
        }
    }

    // The permutation moves device ids, never the attribute list, so both
    // modes assign the same attribute multiset.
    let mut targets: Vec<u32> = range.collect();
    if mode == DistributionMode::Random {
        targets.shuffle(rng);
    }

    for (overlay, &device) in overlays.iter().zip(targets.iter()) {
        graph.apply_overlay(device, overlay);
    }

    info!(
        "Applied {} node definition batches to {} devices ({:?} distribution)",
        definitions.len(),
        covered,
        mode
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn admin_batch(count: usize, admin: bool) -> NodeDefinition {
        NodeDefinition {
            count,
            attributes: AttributeOverlay { admin_user: Some(admin), ..Default::default() },
        }
    }

    fn admin_count(graph: &NetworkGraph) -> usize {
        (0..graph.node_count() as u32)
            .filter(|&i| graph.attributes(i).admin_user)
            .count()
    }

    #[test]
    fn test_sequential_claims_contiguous_ranges() {
        let mut graph = NetworkGraph::new("random", 10);
        let mut rng = StdRng::seed_from_u64(0);
        apply_batches(
            &mut graph,
            &[admin_batch(7, true), admin_batch(3, false)],
            DistributionMode::Sequential,
            &mut rng,
        );
        for i in 0..7 {
            assert!(graph.attributes(i).admin_user);
        }
        for i in 7..10 {
            assert!(!graph.attributes(i).admin_user);
        }
    }

    #[test]
    fn test_random_preserves_attribute_counts() {
        let mut sequential = NetworkGraph::new("random", 100);
        let mut shuffled = NetworkGraph::new("random", 100);
        let batches = [admin_batch(70, true), admin_batch(30, false)];
        let mut rng = StdRng::seed_from_u64(9);
        apply_batches(&mut sequential, &batches, DistributionMode::Sequential, &mut rng);
        apply_batches(&mut shuffled, &batches, DistributionMode::Random, &mut rng);
        assert_eq!(admin_count(&sequential), 70);
        assert_eq!(admin_count(&shuffled), 70);
    }

    #[test]
    fn test_oversubscription_truncates() {
        let mut graph = NetworkGraph::new("random", 5);
        let mut rng = StdRng::seed_from_u64(0);
        apply_batches(
            &mut graph,
            &[admin_batch(3, false), admin_batch(10, true)],
            DistributionMode::Sequential,
            &mut rng,
        );
        // First batch fully applied, second truncated to the remaining 2
        assert_eq!(admin_count(&graph), 2);
    }

    #[test]
    fn test_range_application_leaves_rest_untouched() {
        let mut graph = NetworkGraph::new("segmented", 10);
        let mut rng = StdRng::seed_from_u64(0);
        apply_batches_range(
            &mut graph,
            &[admin_batch(2, false)],
            DistributionMode::Sequential,
            &mut rng,
            4..8,
        );
        assert!(!graph.attributes(4).admin_user);
        assert!(!graph.attributes(5).admin_user);
        // Outside the range and the uncovered tail keep their defaults
        assert!(graph.attributes(3).admin_user);
        assert!(graph.attributes(6).admin_user);
        assert!(graph.attributes(9).admin_user);
    }

    #[test]
    fn test_undersubscription_keeps_defaults() {
        let mut graph = NetworkGraph::new("random", 5);
        let mut rng = StdRng::seed_from_u64(0);
        apply_batches(&mut graph, &[admin_batch(2, false)], DistributionMode::Sequential, &mut rng);
        // Remaining devices keep the admin_user=true default
        assert_eq!(admin_count(&graph), 3);
    }
}
