//! `rover-types` – shared data model for the rover navigation core.
//!
//! # Modules
//!
//! - [`geo`] – [`Odometry`] poses, the east/north [`Vec2`] local frame and
//!   angle helpers used by every other crate.
//! - [`config`] – [`RoverConfig`], the immutable threshold document with
//!   fail-fast validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod config;
pub mod geo;

pub use config::{EnvironmentConfig, GateConfig, GateVariant, RoverConfig};
pub use geo::{Odometry, Vec2, angle_diff, normalize_bearing};

// ────────────────────────────────────────────────────────────────────────────
// Vision input
// ────────────────────────────────────────────────────────────────────────────

/// One post detection from a single vision frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Range to the post in metres; negative means "not seen this frame".
    pub distance: f64,
    /// Rover-relative bearing in degrees (positive = clockwise / right).
    pub bearing: f64,
    /// Marker id printed on the post.
    pub id: i32,
}

impl Target {
    /// The "no detection" sentinel.
    pub const NONE: Target = Target {
        distance: -1.0,
        bearing: 0.0,
        id: -1,
    };

    pub fn new(distance: f64, bearing: f64, id: i32) -> Self {
        Self {
            distance,
            bearing,
            id,
        }
    }

    /// `true` when this frame carries a real detection.
    pub fn is_detected(&self) -> bool {
        self.distance >= 0.0
    }
}

impl Default for Target {
    fn default() -> Self {
        Target::NONE
    }
}

/// Which image-space slot a post occupies.  Image left is not necessarily
/// the physical left post of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostSide {
    Left,
    Right,
}

impl PostSide {
    pub const BOTH: [PostSide; 2] = [PostSide::Left, PostSide::Right];
}

/// The pair of detections produced by one vision frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TargetList {
    pub left: Target,
    pub right: Target,
}

impl TargetList {
    pub fn new(left: Target, right: Target) -> Self {
        Self { left, right }
    }

    pub fn get(&self, side: PostSide) -> &Target {
        match side {
            PostSide::Left => &self.left,
            PostSide::Right => &self.right,
        }
    }
}

/// Obstacle reading from the separate obstacle-detection channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub bearing: f64,
    /// Negative when nothing is in the way.
    pub distance: f64,
}

impl Obstacle {
    pub const CLEAR: Obstacle = Obstacle {
        bearing: 0.0,
        distance: -1.0,
    };

    pub fn detected(&self) -> bool {
        self.distance >= 0.0
    }
}

impl Default for Obstacle {
    fn default() -> Self {
        Obstacle::CLEAR
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Course input
// ────────────────────────────────────────────────────────────────────────────

/// A course waypoint.  For gate waypoints the posts carry ids `id` and
/// `id + 1`, and the post with id `id` must pass on the rover's left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub odometry: Odometry,
    pub id: i32,
    pub gate: bool,
    pub gate_width_m: f64,
    /// Search points farther than this from the waypoint are skipped;
    /// `0.0` leaves the search area unbounded.
    pub search_radius_m: f64,
}

impl Waypoint {
    /// A gate waypoint whose left-hand post carries `left_post_id`.
    pub fn gate(odometry: Odometry, left_post_id: i32, gate_width_m: f64) -> Self {
        Self {
            odometry,
            id: left_post_id,
            gate: true,
            gate_width_m,
            search_radius_m: 0.0,
        }
    }

    /// Bound the search area around this waypoint.
    pub fn with_search_radius(mut self, radius_m: f64) -> Self {
        self.search_radius_m = radius_m;
        self
    }

    /// `true` if `point` lies inside the search area.
    pub fn in_search_area(&self, point: &Odometry) -> bool {
        self.search_radius_m <= 0.0
            || self.odometry.distance_to(point) <= self.search_radius_m + 1e-6
    }

    /// `true` if `id` is one of this gate's two post ids.
    pub fn is_gate_post(&self, id: i32) -> bool {
        self.gate && (id == self.id || id == self.id + 1)
    }
}

/// Everything the rover loop hands to the navigation core each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorFrame {
    pub odometry: Odometry,
    pub targets: TargetList,
    pub obstacle: Obstacle,
}

// ────────────────────────────────────────────────────────────────────────────
// Navigation output
// ────────────────────────────────────────────────────────────────────────────

/// Navigation control state consumed by the drive-command layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NavState {
    #[default]
    Off,
    Done,
    GateSpin,
    GateSpinWait,
    GateTurn,
    GateDrive,
    GateTurnToCentPoint,
    GateDriveToCentPoint,
    GateFace,
    GateTurnToFarPost,
    GateDriveToFarPost,
    GateTurnToGateCenter,
    GateDriveThrough,
    /// The rover has passed through the gate in the mandated direction.
    GateTraversed,
    /// Every search point was visited without locating the gate.
    GateNotFound,
}

impl NavState {
    /// `true` for the two outcomes that end a gate search.
    pub fn is_terminal(self) -> bool {
        matches!(self, NavState::GateTraversed | NavState::GateNotFound)
    }

    /// `true` for states owned by the gate traversal state machine.
    pub fn is_gate_state(self) -> bool {
        !matches!(self, NavState::Off | NavState::Done)
    }
}

impl std::fmt::Display for NavState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Steering hint accompanying a [`NavState`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum DriveTarget {
    /// Stop and hold the current pose.
    #[default]
    Hold,
    /// Rotate in place to this compass bearing.
    Heading { bearing_deg: f64 },
    /// Steer toward and drive to this point.
    Point(Odometry),
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Configuration problems, reported once at construction.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigError {
    #[error("Invalid configuration value `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    #[error("Configuration parse error: {0}")]
    Parse(String),

    #[error("Configuration I/O error: {0}")]
    Io(String),
}

/// Errors that cross the navigation core's boundary.
///
/// Per-cycle sensor anomalies never show up here; they are absorbed by the
/// debounce counters and state transitions.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NavError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Gate not found after visiting {visited} search point(s)")]
    GateNotFound { visited: usize },

    #[error("Gate search aborted in state {state}")]
    Aborted { state: NavState },
}
