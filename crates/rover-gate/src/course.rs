//! Read-only view of the surrounding course state machine.

use rover_types::{Odometry, Waypoint};

/// What the gate state machine may read from its parent each cycle.
///
/// Implementors are borrowed for the duration of one `run()` call only; the
/// gate machine never stores or mutates the parent.
pub trait CourseContext {
    /// Current absolute rover pose.
    fn odometry(&self) -> Odometry;

    /// The waypoint being searched for, if the parent has one.
    fn current_waypoint(&self) -> Option<&Waypoint>;
}

/// A plain per-cycle snapshot implementing [`CourseContext`].
#[derive(Debug, Clone, Copy)]
pub struct CourseSnapshot<'a> {
    pub odometry: Odometry,
    pub waypoint: Option<&'a Waypoint>,
}

impl<'a> CourseSnapshot<'a> {
    pub fn new(odometry: Odometry, waypoint: Option<&'a Waypoint>) -> Self {
        Self { odometry, waypoint }
    }
}

impl CourseContext for CourseSnapshot<'_> {
    fn odometry(&self) -> Odometry {
        self.odometry
    }

    fn current_waypoint(&self) -> Option<&Waypoint> {
        self.waypoint
    }
}
