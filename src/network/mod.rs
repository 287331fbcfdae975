//! Network model: device graph, attributes, topology generation, batch
//! assignment, and structural statistics.

pub mod attributes;
pub mod batches;
pub mod graph;
pub mod statistics;
pub mod topology;

// Re-export key types and functions for easier access
pub use attributes::{AttributeOverlay, DeviceAttributes};
pub use batches::{apply_batches, apply_batches_range, DistributionMode, NodeDefinition};
pub use graph::{device_id, parse_device_id, NetworkGraph};
pub use statistics::NetworkStatistics;
pub use topology::{build, build_segmented, InterconnectSpec, SubnetSpec, TopologyKind};
