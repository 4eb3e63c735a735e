//! Per-cycle navigation driver.
//!
//! [`NavLoop`] owns the long-lived [`Environment`] and, while a gate search
//! is active, the [`GateStateMachine`] for it.  Each call to
//! [`NavLoop::tick`] performs one control cycle:
//!
//! 1. store the obstacle and raw detections (`set_targets`);
//! 2. fuse them against the current pose (`update_targets`);
//! 3. run exactly one phase of the gate machine.
//!
//! Sensor anomalies never surface as errors.  Only construction-time
//! configuration problems and the final search outcome do.

use rover_gate::{CourseSnapshot, GateStateMachine, gate_factory};
use rover_perception::Environment;
use rover_types::{DriveTarget, NavError, NavState, RoverConfig, SensorFrame, Waypoint};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, info, warn};

/// What the drive layer should do after one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleOutput {
    pub cycle: u64,
    pub state: NavState,
    pub target: DriveTarget,
}

pub struct NavLoop {
    config: RoverConfig,
    environment: Environment,
    gate: Option<GateStateMachine>,
    waypoint: Option<Waypoint>,
    state: NavState,
    cycles: u64,
    visited: usize,
    aborted_in: Option<NavState>,
}

impl NavLoop {
    /// Validate `config` and build an idle loop.
    pub fn new(config: RoverConfig) -> Result<Self, NavError> {
        config.validate()?;
        let environment = Environment::new(&config.environment)?;
        Ok(Self {
            config,
            environment,
            gate: None,
            waypoint: None,
            state: NavState::Off,
            cycles: 0,
            visited: 0,
            aborted_in: None,
        })
    }

    pub fn config(&self) -> &RoverConfig {
        &self.config
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// The active gate machine, if a search is running.
    pub fn gate(&self) -> Option<&GateStateMachine> {
        self.gate.as_ref()
    }

    pub fn waypoint(&self) -> Option<&Waypoint> {
        self.waypoint.as_ref()
    }

    /// Start a fresh search for `waypoint`.  Everything learned about posts
    /// during a previous attempt is discarded.
    pub fn begin_gate_search(&mut self, waypoint: Waypoint) -> Result<(), NavError> {
        let gate = gate_factory(&self.config.gate, &waypoint)?;
        self.environment.reset();
        info!(
            waypoint_id = waypoint.id,
            variant = gate.strategy_name(),
            search_points = gate.search_points().remaining(),
            "gate search started"
        );
        self.state = gate.state();
        self.visited = 0;
        self.aborted_in = None;
        self.gate = Some(gate);
        self.waypoint = Some(waypoint);
        Ok(())
    }

    /// Abandon the running search, if any.
    pub fn abort(&mut self) {
        if self.gate.take().is_some() {
            warn!(state = %self.state, cycles = self.cycles, "gate search aborted");
            self.aborted_in = Some(self.state);
        }
        self.state = NavState::Off;
    }

    /// Run one control cycle.
    pub fn tick(&mut self, frame: &SensorFrame) -> CycleOutput {
        self.cycles += 1;
        let span = debug_span!("nav_cycle", cycle = self.cycles);
        let _enter = span.enter();

        self.environment.set_obstacle(frame.obstacle);
        self.environment.set_targets(frame.targets);
        self.environment
            .update_targets(&frame.odometry, self.waypoint.as_ref());

        let Some(gate) = self.gate.as_mut() else {
            return CycleOutput {
                cycle: self.cycles,
                state: self.state,
                target: DriveTarget::Hold,
            };
        };

        let course = CourseSnapshot::new(frame.odometry, self.waypoint.as_ref());
        let state = gate.run(&course, &mut self.environment);
        let target = gate.drive_target();

        if state != self.state {
            debug!(from = %self.state, to = %state, "nav state changed");
        }
        if state.is_terminal() {
            self.visited = gate.search_points().visited();
            match state {
                NavState::GateTraversed => info!(cycles = self.cycles, "gate search succeeded"),
                _ => warn!(
                    cycles = self.cycles,
                    visited = self.visited,
                    "gate search failed"
                ),
            }
            self.gate = None;
        }
        self.state = state;

        CycleOutput {
            cycle: self.cycles,
            state,
            target,
        }
    }

    /// Result of the last search: `None` while one is running (or none was
    /// started), otherwise success or the reason it ended.
    pub fn outcome(&self) -> Option<Result<(), NavError>> {
        if let Some(state) = self.aborted_in {
            return Some(Err(NavError::Aborted { state }));
        }
        match self.state {
            NavState::GateTraversed => Some(Ok(())),
            NavState::GateNotFound => Some(Err(NavError::GateNotFound {
                visited: self.visited,
            })),
            _ => None,
        }
    }
}
