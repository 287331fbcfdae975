//! Error types for the simulation engine.
//!
//! Configuration errors are detected eagerly at construction/initialization
//! time and surfaced before any simulation work begins. Runtime step errors
//! transition the run to `Aborted` instead of crashing the host process.

/// Errors produced by topology construction, configuration validation,
/// and simulation setup
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Invalid topology configuration: {0}")]
    InvalidTopologyConfig(String),
    #[error("Unsupported topology type: {0}")]
    UnsupportedTopology(String),
    #[error("Invalid interconnect: {0}")]
    InvalidInterconnect(String),
    #[error("Unknown device id: {0}")]
    UnknownDeviceId(String),
    #[error("Malformed malware configuration: {0}")]
    MalformedMalwareConfig(String),
    #[error("Invalid simulation request: {0}")]
    InvalidRequest(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse scenario: {0}")]
    Parse(String),
}
