//! Device graph representation.
//!
//! An undirected graph over a dense id space `0..N-1`. Device ids are
//! rendered as `device_<i>` at the protocol boundary. Edges are structural
//! only, except interconnect edges in a segmented graph which additionally
//! carry a firewall flag.
//!
//! The graph and its attributes are read-only for the entire life of a
//! simulation run once construction completes; nothing mutates topology or
//! attributes mid-run.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::network::attributes::{AttributeOverlay, DeviceAttributes};

/// Render the canonical id string for a device index.
pub fn device_id(index: u32) -> String {
    format!("device_{index}")
}

/// Parse a `device_<i>` id string back into an index.
pub fn parse_device_id(id: &str) -> Option<u32> {
    id.strip_prefix("device_")?.parse().ok()
}

/// Undirected device graph with per-device attributes.
#[derive(Debug, Clone)]
pub struct NetworkGraph {
    network_type: String,
    adjacency: Vec<Vec<u32>>,
    attributes: Vec<DeviceAttributes>,
    /// Interconnect edges flagged with `firewall=true`, normalized (min, max)
    firewalled: HashSet<(u32, u32)>,
    num_edges: usize,
}

impl NetworkGraph {
    /// Create a graph with `node_count` devices carrying default attributes
    /// and no edges.
    pub fn new(network_type: impl Into<String>, node_count: usize) -> Self {
        Self {
            network_type: network_type.into(),
            adjacency: vec![Vec::new(); node_count],
            attributes: vec![DeviceAttributes::default(); node_count],
            firewalled: HashSet::new(),
            num_edges: 0,
        }
    }

    pub fn network_type(&self) -> &str {
        &self.network_type
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.num_edges
    }

    /// Neighbors of a device, sorted by id.
    pub fn neighbors(&self, device: u32) -> &[u32] {
        &self.adjacency[device as usize]
    }

    pub fn degree(&self, device: u32) -> usize {
        self.adjacency[device as usize].len()
    }

    pub fn attributes(&self, device: u32) -> &DeviceAttributes {
        &self.attributes[device as usize]
    }

    /// Set attributes for a single device (construction time only).
    pub fn set_attributes(&mut self, device: u32, attributes: DeviceAttributes) {
        self.attributes[device as usize] = attributes;
    }

    /// Apply a partial overlay to a single device.
    pub fn apply_overlay(&mut self, device: u32, overlay: &AttributeOverlay) {
        self.attributes[device as usize].apply(overlay);
    }

    /// Apply a uniform overlay to every device.
    pub fn apply_overlay_all(&mut self, overlay: &AttributeOverlay) {
        if overlay.is_empty() {
            return;
        }
        for attrs in &mut self.attributes {
            attrs.apply(overlay);
        }
    }

    pub fn has_edge(&self, a: u32, b: u32) -> bool {
        self.adjacency[a as usize].binary_search(&b).is_ok()
    }

    /// Add an undirected edge, rejecting self-loops and out-of-range ids.
    ///
    /// Returns `Ok(true)` if the edge was added, `Ok(false)` if it already
    /// existed.
    pub fn add_connection(&mut self, a: u32, b: u32) -> Result<bool, SimulationError> {
        let n = self.node_count() as u32;
        if a >= n || b >= n {
            let bad = if a >= n { a } else { b };
            return Err(SimulationError::UnknownDeviceId(device_id(bad)));
        }
        if a == b {
            return Err(SimulationError::InvalidTopologyConfig(format!(
                "self-loop on {}",
                device_id(a)
            )));
        }
        if self.has_edge(a, b) {
            return Ok(false);
        }
        let pos_a = self.adjacency[a as usize].binary_search(&b).unwrap_err();
        self.adjacency[a as usize].insert(pos_a, b);
        let pos_b = self.adjacency[b as usize].binary_search(&a).unwrap_err();
        self.adjacency[b as usize].insert(pos_b, a);
        self.num_edges += 1;
        Ok(true)
    }

    /// Bulk-add edges produced by a topology generator.
    ///
    /// Generators guarantee no duplicates and no self-loops, so this skips
    /// the per-edge checks and sorts adjacency lists once at the end.
    pub(crate) fn add_edges_bulk(&mut self, edges: &[(u32, u32)]) {
        for &(a, b) in edges {
            debug_assert_ne!(a, b);
            self.adjacency[a as usize].push(b);
            self.adjacency[b as usize].push(a);
        }
        self.num_edges += edges.len();
        for list in &mut self.adjacency {
            list.sort_unstable();
            debug_assert!(list.windows(2).all(|w| w[0] != w[1]));
        }
    }

    /// Flag an existing edge as a firewalled interconnect.
    pub fn mark_firewalled(&mut self, a: u32, b: u32) {
        self.firewalled.insert((a.min(b), a.max(b)));
    }

    pub fn is_firewalled(&self, a: u32, b: u32) -> bool {
        self.firewalled.contains(&(a.min(b), a.max(b)))
    }

    /// Resolve a `device_<i>` id string, checking it refers to a real device.
    pub fn resolve_device_id(&self, id: &str) -> Result<u32, SimulationError> {
        match parse_device_id(id) {
            Some(index) if (index as usize) < self.node_count() => Ok(index),
            _ => Err(SimulationError::UnknownDeviceId(id.to_string())),
        }
    }

    /// Iterate all undirected edges as normalized (min, max) pairs.
    pub fn edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.adjacency.iter().enumerate().flat_map(|(a, list)| {
            let a = a as u32;
            list.iter().copied().filter_map(move |b| (a < b).then_some((a, b)))
        })
    }

    /// Export the graph (nodes, attributes, edges, firewall flags) to a JSON
    /// file.
    pub fn to_json(&self, path: &Path) -> Result<(), SimulationError> {
        let doc = GraphJson {
            network_type: self.network_type.clone(),
            nodes: (0..self.node_count() as u32)
                .map(|i| NodeJson {
                    id: device_id(i),
                    attributes: self.attributes(i).clone(),
                })
                .collect(),
            edges: self
                .edges()
                .map(|(a, b)| EdgeJson {
                    source: device_id(a),
                    target: device_id(b),
                    firewall: self.is_firewalled(a, b),
                })
                .collect(),
        };
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, &doc).map_err(|e| SimulationError::Parse(e.to_string()))
    }

    /// Load a graph previously written by [`NetworkGraph::to_json`].
    pub fn from_json(path: &Path) -> Result<Self, SimulationError> {
        let file = File::open(path)?;
        let doc: GraphJson =
            serde_json::from_reader(file).map_err(|e| SimulationError::Parse(e.to_string()))?;

        let mut graph = NetworkGraph::new(doc.network_type, doc.nodes.len());
        for node in &doc.nodes {
            let index = graph.resolve_device_id(&node.id)?;
            graph.set_attributes(index, node.attributes.clone());
        }
        for edge in &doc.edges {
            let a = graph.resolve_device_id(&edge.source)?;
            let b = graph.resolve_device_id(&edge.target)?;
            graph.add_connection(a, b)?;
            if edge.firewall {
                graph.mark_firewalled(a, b);
            }
        }
        Ok(graph)
    }
}

fn is_false(value: &bool) -> bool {
    !value
}

#[derive(Debug, Serialize, Deserialize)]
struct GraphJson {
    network_type: String,
    nodes: Vec<NodeJson>,
    edges: Vec<EdgeJson>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeJson {
    id: String,
    #[serde(flatten)]
    attributes: DeviceAttributes,
}

#[derive(Debug, Serialize, Deserialize)]
struct EdgeJson {
    source: String,
    target: String,
    #[serde(default, skip_serializing_if = "is_false")]
    firewall: bool,
}
