//! # MSpread - Malware propagation simulation engine
//!
//! This library simulates malware spreading through synthetic device
//! networks: it generates a network topology, assigns per-device attributes,
//! and runs a discrete-time infection process over it.
//!
//! ## Overview
//!
//! MSpread enables controlled, reproducible study of propagation dynamics
//! without touching real infrastructure. A caller describes a network and a
//! malware strain, names the initially infected devices, and receives a
//! step-by-step infection history plus aggregate statistics, either as a
//! one-shot batch result or streamed step by step.
//!
//! ## Key Features
//!
//! - **Topology Families**: Scale-free (Barabási-Albert), small-world
//!   (Watts-Strogatz), random (Erdős-Rényi), complete, and segmented
//!   multi-subnet networks with firewalled interconnects
//! - **Device Attributes**: OS, patch status, device type, admin privilege,
//!   firewall and antivirus flags, assignable in bulk batches
//! - **Malware Behaviors**: Infection rate, incubation latency, spread
//!   patterns (random/BFS/DFS), privilege-aware targeting, OS and
//!   device-type allow-sets
//! - **Reproducible**: A single seed determines topology, attribute
//!   assignment, and the full infection trace, independent of thread count
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - `network`: Graph representation, topology generators, attribute
//!   batches, and structural statistics
//! - `spread`: Malware configuration and the per-step infection algorithm
//! - `simulation`: The time-step driver, termination policy, and run
//!   statistics
//! - `protocol`: Request/response/stream message contract and the entry
//!   points a transport layer calls
//! - `scenario`: On-disk scenario files (YAML/JSON)
//! - `utils`: Seeding helpers for deterministic parallel runs
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use mspread::protocol::{run_simulation, RunOptions, SimulationRequest};
//!
//! let request: SimulationRequest = serde_json::from_str(r#"{
//!     "network_config": {"num_nodes": 1000, "network_type": "scale_free"},
//!     "malware_config": {"malware_type": "worm", "infection_rate": 0.35},
//!     "initial_infected": ["device_0"],
//!     "max_steps": 50
//! }"#)?;
//!
//! let options = RunOptions { seed: Some(42), ..Default::default() };
//! let response = run_simulation(&request, &options)?;
//! println!("{} devices infected in {} steps", response.total_infected, response.total_steps);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! Configuration errors are detected eagerly and returned as
//! [`error::SimulationError`] before any simulation work begins; runtime
//! failures abort the run with a recorded reason instead of crashing the
//! host process.

pub mod error;
pub mod network;
pub mod protocol;
pub mod scenario;
pub mod simulation;
pub mod spread;
pub mod utils;

pub use error::SimulationError;
pub use network::graph::NetworkGraph;
pub use protocol::{SimulationRequest, SimulationResponse};
pub use simulation::SimulationDriver;
pub use spread::MalwareConfig;
