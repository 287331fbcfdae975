//! Wire-level message contract and request orchestration.
//!
//! Defines the request/response shapes consumed by a transport layer (HTTP
//! batch and a streaming channel) and the single entry points the transport
//! calls. The transport itself (routing, framing, CORS) is an external
//! collaborator; only the message contract lives here.
//!
//! Batch and streaming share one driver: the transport either awaits the
//! final [`SimulationResponse`] or subscribes to per-step
//! [`StreamMessage`]s via a [`StreamSink`].

use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::network::attributes::AttributeOverlay;
use crate::network::batches::{self, DistributionMode, NodeDefinition};
use crate::network::graph::{device_id, NetworkGraph};
use crate::network::topology::{self, InterconnectSpec, SubnetSpec, TopologyKind};
use crate::simulation::{RunState, SimulationDriver, StepObserver, StepRecord};
use crate::spread::config::MalwareConfig;
use crate::utils::seeding::{derive_rng, random_seed};

fn default_max_steps() -> u32 {
    100
}

/// Topology family requested on the wire; `segmented` switches the config
/// into subnet/interconnect mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    ScaleFree,
    SmallWorld,
    Random,
    Complete,
    Segmented,
}

/// Network portion of a simulation request.
///
/// Flat topologies use `num_nodes` + `network_type`; `segmented` uses
/// `subnets` + `interconnects` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_nodes: Option<usize>,
    pub network_type: NetworkType,
    /// Uniform attribute overlay applied to every device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_attributes: Option<AttributeOverlay>,
    /// Ordered attribute batches applied after the uniform overlay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_definitions: Option<Vec<NodeDefinition>>,
    #[serde(default)]
    pub node_distribution: DistributionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnets: Option<Vec<NetworkConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interconnects: Option<Vec<InterconnectConfig>>,
}

/// Wire shape of a segmented-graph interconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterconnectConfig {
    pub source_subnet: usize,
    pub target_subnet: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_node: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_node: Option<usize>,
    #[serde(default)]
    pub firewall: bool,
}

/// A complete simulation request, as accepted by both the batch and
/// streaming surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub network_config: NetworkConfig,
    pub malware_config: MalwareConfig,
    /// Patient-zero device ids; at least one required
    pub initial_infected: Vec<String>,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

/// One history entry of the batch response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub step: u32,
    /// Cumulative infected count after this step
    pub infected_count: usize,
    pub newly_infected: Vec<String>,
}

/// One-shot batch response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResponse {
    pub total_steps: u32,
    pub total_devices: usize,
    pub total_infected: usize,
    pub infection_percentage: f64,
    pub malware_type: String,
    pub history: Vec<HistoryEntry>,
}

/// Messages of the streaming surface, in delivery order: `initialized`,
/// repeated `step`, then a terminal `complete` or `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    Initialized {
        total_devices: usize,
        initial_infected: Vec<String>,
    },
    Step {
        step: u32,
        newly_infected: usize,
        total_infected: usize,
        devices_infected: Vec<String>,
    },
    Complete {
        statistics: SimulationResponse,
    },
    Error {
        message: String,
    },
}

/// Liveness probe payload; no behavioral contract beyond availability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

/// Report service liveness.
pub fn health() -> HealthStatus {
    HealthStatus { status: "healthy" }
}

/// Options the transport layer chooses per run, outside the request body.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Base seed; `None` draws one from entropy
    pub seed: Option<u64>,
    /// Wall-clock budget for the step loop
    pub max_duration: Option<Duration>,
}

/// Destination for streaming messages.
///
/// `send` returns `false` once the consumer has disconnected, which
/// terminates the run early.
pub trait StreamSink {
    fn send(&mut self, message: &StreamMessage) -> bool;
}

/// Sink that buffers every message, for tests and batch adapters.
#[derive(Debug, Default)]
pub struct VecSink {
    pub messages: Vec<StreamMessage>,
}

impl StreamSink for VecSink {
    fn send(&mut self, message: &StreamMessage) -> bool {
        self.messages.push(message.clone());
        true
    }
}

// RNG stream ids for deriving sub-seeds from the run seed
const STREAM_TOPOLOGY: u64 = 1;
const STREAM_BATCHES: u64 = 2;
const STREAM_SPREAD: u64 = 3;

/// Build the device graph described by a network config, including
/// attribute seeding (defaults, uniform overlay, batches). In a segmented
/// config, each subnet's own overlay and node definitions apply to that
/// subnet's id range before the top-level ones apply to the whole graph.
pub fn build_network(
    config: &NetworkConfig,
    seed: u64,
) -> Result<NetworkGraph, SimulationError> {
    use rand::Rng;

    let topology_seed = derive_rng(seed, STREAM_TOPOLOGY, 0).gen();
    let mut graph = match config.network_type {
        NetworkType::Segmented => {
            let subnets = config.subnets.as_deref().ok_or_else(|| {
                SimulationError::InvalidTopologyConfig(
                    "segmented topology requires a subnets list".to_string(),
                )
            })?;
            let specs = subnets
                .iter()
                .map(subnet_spec)
                .collect::<Result<Vec<_>, _>>()?;
            let interconnects: Vec<InterconnectSpec> = config
                .interconnects
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|ic| InterconnectSpec {
                    source_subnet: ic.source_subnet,
                    target_subnet: ic.target_subnet,
                    source_node: ic.source_node,
                    target_node: ic.target_node,
                    firewall: ic.firewall,
                })
                .collect();
            let mut graph = topology::build_segmented(&specs, &interconnects, Some(topology_seed))?;

            let mut offset = 0u32;
            for (index, subnet) in subnets.iter().enumerate() {
                let range = offset..offset + specs[index].count as u32;
                if let Some(overlay) = &subnet.device_attributes {
                    for device in range.clone() {
                        graph.apply_overlay(device, overlay);
                    }
                }
                if let Some(definitions) = &subnet.node_definitions {
                    let mut rng = derive_rng(seed, STREAM_BATCHES, index as u64 + 1);
                    batches::apply_batches_range(
                        &mut graph,
                        definitions,
                        subnet.node_distribution,
                        &mut rng,
                        range.clone(),
                    );
                }
                offset = range.end;
            }
            graph
        }
        flat => {
            let num_nodes = config.num_nodes.ok_or_else(|| {
                SimulationError::InvalidTopologyConfig(
                    "num_nodes is required for non-segmented topologies".to_string(),
                )
            })?;
            topology::build(num_nodes, flat_kind(flat)?, Some(topology_seed))?
        }
    };

    if let Some(overlay) = &config.device_attributes {
        graph.apply_overlay_all(overlay);
    }
    if let Some(definitions) = &config.node_definitions {
        let mut rng = derive_rng(seed, STREAM_BATCHES, 0);
        batches::apply_batches(&mut graph, definitions, config.node_distribution, &mut rng);
    }
    Ok(graph)
}

fn flat_kind(network_type: NetworkType) -> Result<TopologyKind, SimulationError> {
    match network_type {
        NetworkType::ScaleFree => Ok(TopologyKind::ScaleFree),
        NetworkType::SmallWorld => Ok(TopologyKind::SmallWorld),
        NetworkType::Random => Ok(TopologyKind::Random),
        NetworkType::Complete => Ok(TopologyKind::Complete),
        NetworkType::Segmented => Err(SimulationError::UnsupportedTopology(
            "nested segmented subnets are not supported".to_string(),
        )),
    }
}

fn subnet_spec(config: &NetworkConfig) -> Result<SubnetSpec, SimulationError> {
    let count = config.num_nodes.ok_or_else(|| {
        SimulationError::InvalidTopologyConfig("subnet requires num_nodes".to_string())
    })?;
    Ok(SubnetSpec { count, kind: flat_kind(config.network_type)? })
}

/// Run a simulation to completion and return the batch response.
///
/// All configuration errors surface before any simulation work begins.
pub fn run_simulation(
    request: &SimulationRequest,
    options: &RunOptions,
) -> Result<SimulationResponse, SimulationError> {
    use rand::Rng;

    request.malware_config.validate()?;
    let seed = options.seed.unwrap_or_else(random_seed);
    let graph = build_network(&request.network_config, seed)?;

    let spread_seed = derive_rng(seed, STREAM_SPREAD, 0).gen();
    let mut driver = SimulationDriver::new(&graph, request.malware_config.clone(), Some(spread_seed))?;
    if let Some(budget) = options.max_duration {
        driver = driver.with_max_duration(budget);
    }
    driver.initialize(&request.initial_infected)?;
    driver.run(request.max_steps)?;

    info!(
        "Simulation finished: {} steps, {}/{} devices infected",
        driver.current_step(),
        driver.total_infected(),
        graph.node_count()
    );
    Ok(response_from_driver(&driver))
}

/// Run a simulation in streaming mode, emitting messages to the sink as
/// each step commits.
///
/// Configuration errors are reported as a single `error` message (and
/// returned); a consumer disconnect terminates the run silently.
pub fn run_simulation_streaming(
    request: &SimulationRequest,
    options: &RunOptions,
    sink: &mut dyn StreamSink,
) -> Result<(), SimulationError> {
    use rand::Rng;

    let prepared = (|| -> Result<_, SimulationError> {
        request.malware_config.validate()?;
        let seed = options.seed.unwrap_or_else(random_seed);
        let graph = build_network(&request.network_config, seed)?;
        let spread_seed = derive_rng(seed, STREAM_SPREAD, 0).gen::<u64>();
        Ok((graph, spread_seed))
    })();

    let (graph, spread_seed) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            sink.send(&StreamMessage::Error { message: e.to_string() });
            return Err(e);
        }
    };

    let mut driver = match SimulationDriver::new(&graph, request.malware_config.clone(), Some(spread_seed)) {
        Ok(driver) => driver,
        Err(e) => {
            sink.send(&StreamMessage::Error { message: e.to_string() });
            return Err(e);
        }
    };
    if let Some(budget) = options.max_duration {
        driver = driver.with_max_duration(budget);
    }
    if let Err(e) = driver.initialize(&request.initial_infected) {
        sink.send(&StreamMessage::Error { message: e.to_string() });
        return Err(e);
    }

    if !sink.send(&StreamMessage::Initialized {
        total_devices: graph.node_count(),
        initial_infected: request.initial_infected.clone(),
    }) {
        return Ok(());
    }

    struct SinkObserver<'s> {
        sink: &'s mut dyn StreamSink,
    }
    impl StepObserver for SinkObserver<'_> {
        fn on_step(&mut self, record: &StepRecord) -> bool {
            self.sink.send(&StreamMessage::Step {
                step: record.step,
                newly_infected: record.newly_infected.len(),
                total_infected: record.total_infected,
                devices_infected: record.newly_infected.iter().map(|&i| device_id(i)).collect(),
            })
        }
    }

    let state = driver.run_with_observer(request.max_steps, &mut SinkObserver { sink: &mut *sink })?;

    if state == RunState::Aborted {
        if driver.cancelled() {
            return Ok(());
        }
        // Degraded run: report the failure and close the channel
        let message = driver.abort_reason().unwrap_or("run aborted").to_string();
        sink.send(&StreamMessage::Error { message });
        return Ok(());
    }

    sink.send(&StreamMessage::Complete { statistics: response_from_driver(&driver) });
    Ok(())
}

fn response_from_driver(driver: &SimulationDriver<'_>) -> SimulationResponse {
    let stats = driver.get_statistics();
    SimulationResponse {
        total_steps: stats.total_steps,
        total_devices: stats.total_devices,
        total_infected: stats.total_infected,
        infection_percentage: stats.infection_percentage,
        malware_type: stats.malware_type,
        history: driver
            .history()
            .iter()
            .map(|record| HistoryEntry {
                step: record.step,
                infected_count: record.total_infected,
                newly_infected: record.newly_infected.iter().map(|&i| device_id(i)).collect(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> SimulationRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_request_parses_with_defaults() {
        let req = request(
            r#"{
                "network_config": {"num_nodes": 20, "network_type": "scale_free"},
                "malware_config": {"malware_type": "worm", "infection_rate": 0.35},
                "initial_infected": ["device_0"]
            }"#,
        );
        assert_eq!(req.max_steps, 100);
        assert_eq!(req.network_config.network_type, NetworkType::ScaleFree);
        assert_eq!(req.malware_config.latency, 1);
    }

    #[test]
    fn test_unknown_network_type_rejected() {
        let result: Result<NetworkConfig, _> =
            serde_json::from_str(r#"{"num_nodes": 5, "network_type": "mesh"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_num_nodes_rejected() {
        let req = request(
            r#"{
                "network_config": {"network_type": "random"},
                "malware_config": {"malware_type": "worm", "infection_rate": 0.5},
                "initial_infected": ["device_0"]
            }"#,
        );
        assert!(matches!(
            run_simulation(&req, &RunOptions::default()),
            Err(SimulationError::InvalidTopologyConfig(_))
        ));
    }

    #[test]
    fn test_batch_run_complete_topology() {
        let req = request(
            r#"{
                "network_config": {"num_nodes": 10, "network_type": "complete"},
                "malware_config": {"malware_type": "worm", "infection_rate": 1.0, "latency": 0},
                "initial_infected": ["device_0"],
                "max_steps": 50
            }"#,
        );
        let options = RunOptions { seed: Some(1), ..Default::default() };
        let response = run_simulation(&req, &options).unwrap();
        assert_eq!(response.total_devices, 10);
        assert_eq!(response.total_infected, 10);
        assert_eq!(response.total_steps, 1);
        assert_eq!(response.history.len(), 1);
        assert_eq!(response.history[0].newly_infected.len(), 9);
        assert!((response.infection_percentage - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_streaming_message_order() {
        let req = request(
            r#"{
                "network_config": {"num_nodes": 10, "network_type": "complete"},
                "malware_config": {"malware_type": "worm", "infection_rate": 1.0, "latency": 0},
                "initial_infected": ["device_0"],
                "max_steps": 50
            }"#,
        );
        let mut sink = VecSink::default();
        run_simulation_streaming(&req, &RunOptions { seed: Some(1), ..Default::default() }, &mut sink)
            .unwrap();

        assert!(matches!(sink.messages.first(), Some(StreamMessage::Initialized { total_devices: 10, .. })));
        assert!(matches!(sink.messages.last(), Some(StreamMessage::Complete { .. })));
        let mut last_step = 0;
        for message in &sink.messages[1..sink.messages.len() - 1] {
            match message {
                StreamMessage::Step { step, .. } => {
                    assert_eq!(*step, last_step + 1);
                    last_step = *step;
                }
                other => panic!("unexpected message between init and complete: {other:?}"),
            }
        }
    }

    #[test]
    fn test_streaming_reports_config_error() {
        let req = request(
            r#"{
                "network_config": {"num_nodes": 10, "network_type": "complete"},
                "malware_config": {"malware_type": "worm", "infection_rate": 2.0},
                "initial_infected": ["device_0"]
            }"#,
        );
        let mut sink = VecSink::default();
        let result = run_simulation_streaming(&req, &RunOptions::default(), &mut sink);
        assert!(result.is_err());
        assert_eq!(sink.messages.len(), 1);
        assert!(matches!(sink.messages[0], StreamMessage::Error { .. }));
    }

    #[test]
    fn test_stream_message_wire_shape() {
        let message = StreamMessage::Step {
            step: 3,
            newly_infected: 1,
            total_infected: 4,
            devices_infected: vec!["device_7".to_string()],
        };
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains(r#""type":"step""#));
        assert!(json.contains(r#""devices_infected":["device_7"]"#));
    }

    #[test]
    fn test_segmented_request() {
        let req = request(
            r#"{
                "network_config": {
                    "network_type": "segmented",
                    "subnets": [
                        {"num_nodes": 5, "network_type": "complete"},
                        {"num_nodes": 5, "network_type": "complete"}
                    ],
                    "interconnects": [
                        {"source_subnet": 0, "target_subnet": 1, "firewall": true}
                    ]
                },
                "malware_config": {"malware_type": "worm", "infection_rate": 1.0, "latency": 0},
                "initial_infected": ["device_0"],
                "max_steps": 20
            }"#,
        );
        let graph = build_network(&req.network_config, 9).unwrap();
        assert_eq!(graph.node_count(), 10);
        assert!(graph.is_firewalled(0, 5));
        let response = run_simulation(&req, &RunOptions { seed: Some(9), ..Default::default() }).unwrap();
        // The interconnect lets the infection cross subnets
        assert_eq!(response.total_infected, 10);
    }

    #[test]
    fn test_health_payload() {
        let json = serde_json::to_string(&health()).unwrap();
        assert_eq!(json, r#"{"status":"healthy"}"#);
    }
}
