//! Dynamic (per-run) simulation statistics.
//!
//! Derived, read-only views over the recorded history; computable at any
//! point, including mid-run for streaming consumers, and never fed back
//! into the simulation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::network::graph::NetworkGraph;
use crate::simulation::StepRecord;
use crate::spread::engine::InfectionState;

/// The largest single-step infection burst and when it happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeakVelocity {
    /// Newly infected devices in the peak step
    pub newly_infected: usize,
    /// Step index at which the peak occurred (0 when no step infected
    /// anything)
    pub step: u32,
}

/// OS and device-type breakdown of the infected population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfectedBreakdown {
    pub by_os: HashMap<String, usize>,
    pub by_device_type: HashMap<String, usize>,
}

/// Aggregated statistics for a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationStatistics {
    pub total_steps: u32,
    pub total_devices: usize,
    pub total_infected: usize,
    pub infection_percentage: f64,
    pub malware_type: String,
    pub peak_velocity: PeakVelocity,
    /// First step at which cumulative infections crossed 50% of devices;
    /// `Some(0)` when the initial seeding already crossed it
    pub steps_to_50_percent: Option<u32>,
    pub steps_to_90_percent: Option<u32>,
    pub infected_breakdown: InfectedBreakdown,
}

pub(crate) fn compute(
    graph: &NetworkGraph,
    state: &[InfectionState],
    history: &[StepRecord],
    malware_type: &str,
    current_step: u32,
    total_infected: usize,
) -> SimulationStatistics {
    let total_devices = graph.node_count();
    let infection_percentage = if total_devices > 0 {
        total_infected as f64 / total_devices as f64 * 100.0
    } else {
        0.0
    };

    let peak_velocity = history
        .iter()
        .max_by_key(|record| record.newly_infected.len())
        .filter(|record| !record.newly_infected.is_empty())
        .map(|record| PeakVelocity { newly_infected: record.newly_infected.len(), step: record.step })
        .unwrap_or(PeakVelocity { newly_infected: 0, step: 0 });

    let initial_infected = history
        .first()
        .map(|record| record.total_infected - record.newly_infected.len())
        .unwrap_or(total_infected);

    let mut by_os: HashMap<String, usize> = HashMap::new();
    let mut by_device_type: HashMap<String, usize> = HashMap::new();
    for (index, device_state) in state.iter().enumerate() {
        if !device_state.is_infected() {
            continue;
        }
        let attrs = graph.attributes(index as u32);
        let os = attrs.os.clone().unwrap_or_else(|| "Unknown".to_string());
        let kind = attrs.device_type.clone().unwrap_or_else(|| "Unknown".to_string());
        *by_os.entry(os).or_insert(0) += 1;
        *by_device_type.entry(kind).or_insert(0) += 1;
    }

    SimulationStatistics {
        total_steps: current_step,
        total_devices,
        total_infected,
        infection_percentage,
        malware_type: malware_type.to_string(),
        peak_velocity,
        steps_to_50_percent: steps_to_fraction(history, initial_infected, total_devices, 0.5),
        steps_to_90_percent: steps_to_fraction(history, initial_infected, total_devices, 0.9),
        infected_breakdown: InfectedBreakdown { by_os, by_device_type },
    }
}

/// First step index at which cumulative infections reach `fraction` of all
/// devices.
fn steps_to_fraction(
    history: &[StepRecord],
    initial_infected: usize,
    total_devices: usize,
    fraction: f64,
) -> Option<u32> {
    if total_devices == 0 {
        return None;
    }
    let threshold = total_devices as f64 * fraction;
    if initial_infected as f64 >= threshold {
        return Some(0);
    }
    history
        .iter()
        .find(|record| record.total_infected as f64 >= threshold)
        .map(|record| record.step)
}
