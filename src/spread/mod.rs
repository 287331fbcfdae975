//! Spread engine: malware configuration and the per-step infection
//! algorithm.

pub mod config;
pub mod engine;

pub use config::{MalwareConfig, SpreadPattern};
pub use engine::{step, InfectionState, StepDelta};
