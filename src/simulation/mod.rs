//! Simulation driver: the time-step loop, termination policy, history
//! recording, and statistics aggregation.
//!
//! The timeline is strictly sequential: step *k+1* is only computed from
//! the committed result of step *k*. Within a step, the spread engine
//! parallelizes over sources (see [`crate::spread::engine`]); the driver
//! owns the only mutable state and applies each delta before the next step
//! begins.

pub mod statistics;

use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::error::SimulationError;
use crate::network::graph::{device_id, NetworkGraph};
use crate::spread::config::MalwareConfig;
use crate::spread::engine::{self, InfectionState};
use crate::utils::seeding::random_seed;

pub use statistics::{InfectedBreakdown, PeakVelocity, SimulationStatistics};

/// Lifecycle of a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Uninitialized,
    Running,
    Completed,
    Aborted,
}

/// One committed simulation step.
///
/// Records are appended in strictly increasing step order; within a record,
/// `newly_infected` is semantically a set (stored sorted).
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub step: u32,
    pub newly_infected: Vec<u32>,
    /// Cumulative infected count after this step
    pub total_infected: usize,
}

/// Consumer of per-step events, the single seam between the driver and any
/// streaming transport.
///
/// Returning `false` cancels the run (consumer disconnected). Batch callers
/// simply don't subscribe.
pub trait StepObserver {
    fn on_step(&mut self, record: &StepRecord) -> bool;
}

/// Observer that ignores every step (batch mode).
pub struct NullObserver;

impl StepObserver for NullObserver {
    fn on_step(&mut self, _record: &StepRecord) -> bool {
        true
    }
}

/// Owns infection state and the time-step loop for one simulation run.
///
/// The graph and its attributes are read-only for the life of the run.
pub struct SimulationDriver<'a> {
    graph: &'a NetworkGraph,
    config: MalwareConfig,
    seed: u64,
    state: Vec<InfectionState>,
    run_state: RunState,
    current_step: u32,
    history: Vec<StepRecord>,
    total_infected: usize,
    pending_incubations: usize,
    max_duration: Option<Duration>,
    abort_reason: Option<String>,
    cancelled: bool,
}

impl<'a> SimulationDriver<'a> {
    /// Create a driver for the given graph and malware configuration.
    ///
    /// The configuration is validated eagerly; no partially-configured
    /// driver is ever returned.
    pub fn new(
        graph: &'a NetworkGraph,
        config: MalwareConfig,
        seed: Option<u64>,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        Ok(Self {
            graph,
            config,
            seed: seed.unwrap_or_else(random_seed),
            state: vec![InfectionState::Healthy; graph.node_count()],
            run_state: RunState::Uninitialized,
            current_step: 0,
            history: Vec::new(),
            total_infected: 0,
            pending_incubations: 0,
            max_duration: None,
            abort_reason: None,
            cancelled: false,
        })
    }

    /// Enforce a wall-clock execution budget on `run`, protecting the host
    /// process from adversarial configurations.
    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    /// Mark the patient-zero devices `Infectious` and enter `Running`.
    pub fn initialize(&mut self, initial_infected: &[String]) -> Result<(), SimulationError> {
        if initial_infected.is_empty() {
            return Err(SimulationError::InvalidRequest(
                "initial_infected must name at least one device".to_string(),
            ));
        }
        for id in initial_infected {
            let index = self.graph.resolve_device_id(id)?;
            if self.state[index as usize] == InfectionState::Healthy {
                self.state[index as usize] = InfectionState::Infectious;
                self.total_infected += 1;
            }
        }
        self.run_state = RunState::Running;
        info!(
            "Simulation initialized: {} of {} devices infected (seed {})",
            self.total_infected,
            self.graph.node_count(),
            self.seed
        );
        Ok(())
    }

    /// Execute one simulation time step and commit its result.
    ///
    /// Incubating devices whose activation step has arrived become
    /// infectious before the spread snapshot is taken, so a device infected
    /// at step `s` with latency `L` first acts as a source at step `s + L`.
    pub fn step(&mut self) -> StepRecord {
        self.current_step += 1;

        if self.pending_incubations > 0 {
            for state in &mut self.state {
                if let InfectionState::Incubating { activates_at, .. } = *state {
                    if activates_at <= self.current_step {
                        *state = InfectionState::Infectious;
                        self.pending_incubations -= 1;
                    }
                }
            }
        }

        let delta = engine::step(self.graph, &self.state, &self.config, self.current_step, self.seed);

        let latency = self.config.latency_steps();
        for &target in &delta.newly_infected {
            let slot = &mut self.state[target as usize];
            if *slot != InfectionState::Healthy {
                // The engine only ever targets healthy snapshot entries
                self.abort_reason = Some(format!(
                    "internal inconsistency: {} infected twice at step {}",
                    device_id(target),
                    self.current_step
                ));
                continue;
            }
            *slot = if latency == 0 {
                InfectionState::Infectious
            } else {
                InfectionState::Incubating {
                    since_step: self.current_step,
                    activates_at: self.current_step + latency,
                }
            };
            if latency > 0 {
                self.pending_incubations += 1;
            }
            self.total_infected += 1;
        }

        let record = StepRecord {
            step: self.current_step,
            newly_infected: delta.newly_infected.into_iter().collect(),
            total_infected: self.total_infected,
        };
        self.history.push(record.clone());
        record
    }

    /// Run to steady state or `max_steps`, whichever comes first.
    pub fn run(&mut self, max_steps: u32) -> Result<RunState, SimulationError> {
        self.run_with_observer(max_steps, &mut NullObserver)
    }

    /// Run the step loop, handing each committed record to the observer
    /// before continuing.
    ///
    /// Stops on: steady state (a step infected nothing and no incubations
    /// are pending), the `max_steps` safety cap, observer cancellation, the
    /// wall-clock budget, or an internal inconsistency. The last three
    /// leave the run `Aborted` with whatever history was recorded.
    ///
    /// The probe step that observes steady state changes nothing, so it is
    /// neither recorded in history nor reported to the observer.
    pub fn run_with_observer(
        &mut self,
        max_steps: u32,
        observer: &mut dyn StepObserver,
    ) -> Result<RunState, SimulationError> {
        if self.run_state != RunState::Running {
            return Err(SimulationError::InvalidRequest(
                "simulation is not initialized".to_string(),
            ));
        }

        let started = Instant::now();
        for _ in 0..max_steps {
            let record = self.step();

            if self.abort_reason.is_some() {
                error!(
                    "Aborting run at step {}: {}",
                    self.current_step,
                    self.abort_reason.as_deref().unwrap_or("unknown")
                );
                self.run_state = RunState::Aborted;
                return Ok(self.run_state);
            }

            if record.newly_infected.is_empty() && self.pending_incubations == 0 {
                self.history.pop();
                self.current_step -= 1;
                info!("Steady state reached after step {}", self.current_step);
                self.run_state = RunState::Completed;
                return Ok(self.run_state);
            }

            if !observer.on_step(&record) {
                warn!("Consumer disconnected at step {}, stopping run", self.current_step);
                self.cancelled = true;
                self.run_state = RunState::Aborted;
                return Ok(self.run_state);
            }

            if let Some(budget) = self.max_duration {
                if started.elapsed() > budget {
                    warn!(
                        "Wall-clock budget of {:?} exceeded at step {}, aborting",
                        budget, self.current_step
                    );
                    self.abort_reason =
                        Some(format!("wall-clock budget of {budget:?} exceeded"));
                    self.run_state = RunState::Aborted;
                    return Ok(self.run_state);
                }
            }
        }

        info!("Safety cap of {} steps reached", max_steps);
        self.run_state = RunState::Completed;
        Ok(self.run_state)
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Why the run aborted, when it did so for a reason other than consumer
    /// disconnect.
    pub fn abort_reason(&self) -> Option<&str> {
        self.abort_reason.as_deref()
    }

    /// Whether the run stopped because the observer cancelled it.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn history(&self) -> &[StepRecord] {
        &self.history
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn total_infected(&self) -> usize {
        self.total_infected
    }

    pub fn infection_state(&self, device: u32) -> InfectionState {
        self.state[device as usize]
    }

    /// Aggregate run statistics; valid at any point, including mid-run.
    pub fn get_statistics(&self) -> SimulationStatistics {
        statistics::compute(
            self.graph,
            &self.state,
            &self.history,
            &self.config.malware_type,
            self.current_step,
            self.total_infected,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::topology::{build, TopologyKind};
    use crate::spread::config::SpreadPattern;

    fn worm(rate: f64, latency: i64) -> MalwareConfig {
        MalwareConfig {
            malware_type: "worm".to_string(),
            infection_rate: rate,
            latency,
            spread_pattern: SpreadPattern::Random,
            avoids_admin: false,
            requires_interaction: false,
            target_os: None,
            target_node_types: None,
        }
    }

    #[test]
    fn test_initialize_rejects_unknown_device() {
        let graph = build(5, TopologyKind::Complete, Some(1)).unwrap();
        let mut driver = SimulationDriver::new(&graph, worm(1.0, 0), Some(1)).unwrap();
        match driver.initialize(&["device_99".to_string()]) {
            Err(SimulationError::UnknownDeviceId(id)) => assert_eq!(id, "device_99"),
            other => panic!("expected UnknownDeviceId, got {other:?}"),
        }
    }

    #[test]
    fn test_initialize_rejects_empty_seed_list() {
        let graph = build(5, TopologyKind::Complete, Some(1)).unwrap();
        let mut driver = SimulationDriver::new(&graph, worm(1.0, 0), Some(1)).unwrap();
        assert!(driver.initialize(&[]).is_err());
    }

    #[test]
    fn test_run_requires_initialization() {
        let graph = build(5, TopologyKind::Complete, Some(1)).unwrap();
        let mut driver = SimulationDriver::new(&graph, worm(1.0, 0), Some(1)).unwrap();
        assert!(driver.run(10).is_err());
    }

    #[test]
    fn test_complete_graph_saturates_in_one_step() {
        let graph = build(10, TopologyKind::Complete, Some(1)).unwrap();
        let mut driver = SimulationDriver::new(&graph, worm(1.0, 0), Some(1)).unwrap();
        driver.initialize(&["device_0".to_string()]).unwrap();
        let state = driver.run(100).unwrap();
        assert_eq!(state, RunState::Completed);
        assert_eq!(driver.total_infected(), 10);
        // Step 1 infects everyone; the steady-state probe is not recorded
        assert_eq!(driver.history().len(), 1);
        assert_eq!(driver.history()[0].newly_infected.len(), 9);
        let stats = driver.get_statistics();
        assert_eq!(stats.total_steps, 1);
        assert_eq!(stats.peak_velocity.newly_infected, 9);
        assert_eq!(stats.peak_velocity.step, 1);
        assert!((stats.infection_percentage - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_latency_delays_spread() {
        let graph = build(6, TopologyKind::Complete, Some(1)).unwrap();
        let mut driver = SimulationDriver::new(&graph, worm(1.0, 2), Some(1)).unwrap();
        driver.initialize(&["device_0".to_string()]).unwrap();

        let first = driver.step();
        assert_eq!(first.newly_infected.len(), 5);
        for i in 1..6 {
            assert!(matches!(
                driver.infection_state(i),
                InfectionState::Incubating { since_step: 1, activates_at: 3 }
            ));
        }

        // Nothing new can happen until the incubations activate
        let second = driver.step();
        assert!(second.newly_infected.is_empty());
        let third = driver.step();
        assert!(third.newly_infected.is_empty());
        for i in 1..6 {
            assert_eq!(driver.infection_state(i), InfectionState::Infectious);
        }
    }

    #[test]
    fn test_run_halts_with_pending_incubations_counted() {
        let graph = build(20, TopologyKind::ScaleFree, Some(3)).unwrap();
        let mut driver = SimulationDriver::new(&graph, worm(1.0, 3), Some(7)).unwrap();
        driver.initialize(&["device_0".to_string()]).unwrap();
        let state = driver.run(100).unwrap();
        // The run must not declare steady state while devices are incubating
        assert_eq!(state, RunState::Completed);
        assert_eq!(driver.total_infected(), 20);
    }

    #[test]
    fn test_observer_cancellation_aborts() {
        struct StopAfter(u32);
        impl StepObserver for StopAfter {
            fn on_step(&mut self, record: &StepRecord) -> bool {
                record.step < self.0
            }
        }

        let graph = build(200, TopologyKind::ScaleFree, Some(1)).unwrap();
        let mut driver = SimulationDriver::new(&graph, worm(0.3, 1), Some(1)).unwrap();
        driver.initialize(&["device_0".to_string()]).unwrap();
        let state = driver.run_with_observer(100, &mut StopAfter(2)).unwrap();
        assert_eq!(state, RunState::Aborted);
        assert!(driver.cancelled());
        assert_eq!(driver.history().len(), 2);
    }

    #[test]
    fn test_wall_clock_budget_aborts_with_history_preserved() {
        let graph = build(50, TopologyKind::Complete, Some(1)).unwrap();
        let mut driver = SimulationDriver::new(&graph, worm(1.0, 1), Some(1))
            .unwrap()
            .with_max_duration(Duration::ZERO);
        driver.initialize(&["device_0".to_string()]).unwrap();
        let state = driver.run(100).unwrap();
        assert_eq!(state, RunState::Aborted);
        assert!(!driver.cancelled());
        assert!(driver.abort_reason().unwrap().contains("budget"));
        // The step committed before the budget check stays recorded
        assert_eq!(driver.history().len(), 1);
        assert_eq!(driver.history()[0].newly_infected.len(), 49);
    }

    #[test]
    fn test_monotonic_history() {
        let graph = build(150, TopologyKind::ScaleFree, Some(5)).unwrap();
        let mut driver = SimulationDriver::new(&graph, worm(0.4, 1), Some(11)).unwrap();
        driver.initialize(&["device_0".to_string(), "device_1".to_string()]).unwrap();
        driver.run(60).unwrap();
        let history = driver.history();
        for pair in history.windows(2) {
            assert_eq!(pair[1].step, pair[0].step + 1);
            assert!(pair[1].total_infected >= pair[0].total_infected);
        }
    }

    #[test]
    fn test_max_steps_cap() {
        let graph = build(500, TopologyKind::ScaleFree, Some(2)).unwrap();
        let mut driver = SimulationDriver::new(&graph, worm(0.05, 1), Some(3)).unwrap();
        driver.initialize(&["device_0".to_string()]).unwrap();
        driver.run(5).unwrap();
        assert!(driver.history().len() <= 5);
    }
}
