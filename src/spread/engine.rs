//! Per-step infection algorithm.
//!
//! `step` is a pure function over an immutable snapshot of the infection
//! state: all decisions for a step are computed from the state as it was
//! when the step began. Per-source decisions are independent, so they are
//! evaluated in parallel and merged by deterministic set union; each source
//! derives its RNG from (seed, step, source), making the outcome identical
//! regardless of thread scheduling.

use std::collections::BTreeSet;

use rand::Rng;
use rayon::prelude::*;

use crate::network::graph::NetworkGraph;
use crate::spread::config::{MalwareConfig, SpreadPattern};
use crate::utils::seeding::derive_rng;

/// Infection lifecycle of a single device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfectionState {
    Healthy,
    /// Infected but not yet able to spread
    Incubating { since_step: u32, activates_at: u32 },
    Infectious,
}

impl InfectionState {
    pub fn is_infected(&self) -> bool {
        !matches!(self, InfectionState::Healthy)
    }
}

/// Devices newly infected during one step.
///
/// A set, not a sequence: a device reachable from several sources in the
/// same step collapses to a single infection event.
#[derive(Debug, Clone, Default)]
pub struct StepDelta {
    pub newly_infected: BTreeSet<u32>,
}

/// Compute the infection delta for one discrete time step.
///
/// Per infectious source: take its healthy neighbors, apply the privilege
/// boundary (non-admin sources cannot reach admin devices; `avoids_admin`
/// removes admin targets outright), apply the OS/device-type allow-sets,
/// then sample the frontier per the configured spread pattern.
pub fn step(
    graph: &NetworkGraph,
    snapshot: &[InfectionState],
    config: &MalwareConfig,
    step_index: u32,
    seed: u64,
) -> StepDelta {
    debug_assert_eq!(snapshot.len(), graph.node_count());

    let sources: Vec<u32> = snapshot
        .iter()
        .enumerate()
        .filter(|(_, state)| **state == InfectionState::Infectious)
        .map(|(i, _)| i as u32)
        .collect();

    let p = config.effective_rate();

    let newly_infected = sources
        .par_iter()
        .map(|&source| {
            let mut hits = BTreeSet::new();
            if p <= 0.0 {
                return hits;
            }
            let mut rng = derive_rng(seed, step_index as u64, source as u64);
            let source_admin = graph.attributes(source).admin_user;

            let eligible = graph.neighbors(source).iter().copied().filter(|&target| {
                if snapshot[target as usize] != InfectionState::Healthy {
                    return false;
                }
                let attrs = graph.attributes(target);
                if attrs.admin_user && (config.avoids_admin || !source_admin) {
                    return false;
                }
                if let Some(allowed) = &config.target_os {
                    match &attrs.os {
                        Some(os) if allowed.contains(os) => {}
                        _ => return false,
                    }
                }
                if let Some(allowed) = &config.target_node_types {
                    match &attrs.device_type {
                        Some(kind) if allowed.contains(kind) => {}
                        _ => return false,
                    }
                }
                true
            });

            match config.spread_pattern {
                // Random and BFS both test the whole frontier; BFS is the
                // same Bernoulli trial conceived as flood semantics
                SpreadPattern::Random | SpreadPattern::Bfs => {
                    for target in eligible {
                        if rng.gen_bool(p) {
                            hits.insert(target);
                        }
                    }
                }
                // Neighbors are stored sorted, so the first eligible one is
                // the lowest device id
                SpreadPattern::Dfs => {
                    if let Some(target) = eligible.into_iter().next() {
                        if rng.gen_bool(p) {
                            hits.insert(target);
                        }
                    }
                }
            }
            hits
        })
        .reduce(BTreeSet::new, |mut acc, hits| {
            acc.extend(hits);
            acc
        });

    StepDelta { newly_infected }
}
