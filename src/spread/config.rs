//! Malware behavior configuration.
//!
//! One configuration-driven engine replaces per-family malware subclasses:
//! the `malware_type` label is carried for reporting only, and behavior
//! varies purely by the documented parameters.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;

/// Probability multiplier for malware that needs user interaction to land
const INTERACTION_FACTOR: f64 = 0.6;

fn default_latency() -> i64 {
    1
}

/// How the eligible neighbor frontier is sampled each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadPattern {
    /// Every eligible neighbor independently Bernoulli-tested
    #[default]
    Random,
    /// Flood semantics: the whole frontier tested simultaneously
    Bfs,
    /// Stealthy path-following: at most one neighbor per source per step,
    /// lowest device id first for determinism
    Dfs,
}

/// Adversary behavior parameters, immutable for the duration of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MalwareConfig {
    /// Reporting label (e.g. "worm", "ransomware"); carries no behavior
    pub malware_type: String,
    /// Per-contact infection probability in [0, 1]
    pub infection_rate: f64,
    /// Incubation steps between infection and becoming infectious
    #[serde(default = "default_latency")]
    pub latency: i64,
    #[serde(default)]
    pub spread_pattern: SpreadPattern,
    /// Explicitly dodge admin-protected devices regardless of the source's
    /// own privilege
    #[serde(default)]
    pub avoids_admin: bool,
    /// Requires user interaction to land, reducing the effective rate
    #[serde(default)]
    pub requires_interaction: bool,
    /// Allow-set of OS labels; devices outside it are never targeted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_os: Option<HashSet<String>>,
    /// Allow-set of device types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_node_types: Option<HashSet<String>>,
}

impl Default for MalwareConfig {
    fn default() -> Self {
        Self {
            malware_type: "worm".to_string(),
            infection_rate: 0.0,
            latency: default_latency(),
            spread_pattern: SpreadPattern::default(),
            avoids_admin: false,
            requires_interaction: false,
            target_os: None,
            target_node_types: None,
        }
    }
}

impl MalwareConfig {
    /// Validate parameter ranges, surfacing problems before any simulation
    /// work begins.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if !self.infection_rate.is_finite() || !(0.0..=1.0).contains(&self.infection_rate) {
            return Err(SimulationError::MalformedMalwareConfig(format!(
                "infection_rate must be within [0, 1], got {}",
                self.infection_rate
            )));
        }
        if self.latency < 0 {
            return Err(SimulationError::MalformedMalwareConfig(format!(
                "latency must not be negative, got {}",
                self.latency
            )));
        }
        Ok(())
    }

    /// Infection probability after the interaction penalty.
    pub fn effective_rate(&self) -> f64 {
        if self.requires_interaction {
            self.infection_rate * INTERACTION_FACTOR
        } else {
            self.infection_rate
        }
    }

    /// Incubation period in steps (validated non-negative).
    pub fn latency_steps(&self) -> u32 {
        self.latency.max(0) as u32
    }
}
