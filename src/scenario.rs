//! Scenario files: complete simulation requests stored on disk.
//!
//! A scenario is a [`SimulationRequest`] plus run options (seed, wall-clock
//! budget) in one YAML or JSON document, so a run can be reproduced from a
//! single file.

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::protocol::{RunOptions, SimulationRequest};

/// On-disk simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(flatten)]
    pub request: SimulationRequest,
    /// Base seed for the run; omit for a fresh seed per run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Wall-clock budget, human-readable ("30s", "5m")
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<Duration>,
}

impl Scenario {
    pub fn run_options(&self) -> RunOptions {
        RunOptions { seed: self.seed, max_duration: self.max_duration }
    }
}

/// Load a scenario from a YAML or JSON file, chosen by extension
/// (`.json` parses as JSON, everything else as YAML).
pub fn load_scenario(path: &Path) -> Result<Scenario, SimulationError> {
    let contents = fs::read_to_string(path)?;
    let is_json = path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
    let scenario: Scenario = if is_json {
        serde_json::from_str(&contents).map_err(|e| SimulationError::Parse(e.to_string()))?
    } else {
        serde_yaml::from_str(&contents).map_err(|e| SimulationError::Parse(e.to_string()))?
    };
    info!("Loaded scenario from {}", path.display());
    Ok(scenario)
}
