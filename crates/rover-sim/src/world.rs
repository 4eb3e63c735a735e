//! Headless gate world: fixed posts, a forward camera and a rover that
//! follows [`DriveTarget`]s.
//!
//! Positions live in an east/north frame (metres) anchored at the world
//! origin; everything crossing the crate boundary is converted to
//! [`Odometry`].
//!
//! # Example
//!
//! ```rust
//! use rover_sim::SimWorld;
//! use rover_types::{DriveTarget, Odometry, Vec2};
//!
//! let mut world = SimWorld::builder(Odometry::new(38.4, -110.8, 0.0))
//!     .with_post(Vec2::new(-1.0, 0.0), 4)
//!     .with_post(Vec2::new(1.0, 0.0), 5)
//!     .with_rover(Vec2::new(0.0, -8.0), 0.0)
//!     .build();
//!
//! let frame = world.observe();
//! assert!(frame.targets.left.is_detected());
//! assert!(frame.targets.right.is_detected());
//!
//! world.apply(&DriveTarget::Heading { bearing_deg: 90.0 });
//! assert!((world.heading_deg() - 8.0).abs() < 1e-9);
//! ```

use rover_types::{
    DriveTarget, Obstacle, Odometry, SensorFrame, Target, TargetList, Vec2, angle_diff,
    normalize_bearing,
};
use tracing::trace;

/// Heading error (degrees) below which the rover drives while steering.
const DRIVE_WHILE_TURNING_DEG: f64 = 20.0;

// ────────────────────────────────────────────────────────────────────────────
// Camera
// ────────────────────────────────────────────────────────────────────────────

/// Forward-facing marker camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraModel {
    /// Full horizontal field of view (degrees).
    pub fov_deg: f64,
    /// Maximum detection range (metres).
    pub range_m: f64,
    /// Drop every n-th frame entirely (`None` = never).
    pub dropout_every: Option<u64>,
}

impl Default for CameraModel {
    fn default() -> Self {
        Self {
            fov_deg: 80.0,
            range_m: 15.0,
            dropout_every: None,
        }
    }
}

/// A stationary gate post.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimPost {
    pub position: Vec2,
    pub id: i32,
}

// ────────────────────────────────────────────────────────────────────────────
// SimWorld builder
// ────────────────────────────────────────────────────────────────────────────

/// Builder for [`SimWorld`].
#[derive(Debug, Clone)]
pub struct SimWorldBuilder {
    origin: Odometry,
    posts: Vec<SimPost>,
    rover: Vec2,
    heading_deg: f64,
    camera: CameraModel,
    turn_rate_deg: f64,
    speed_m: f64,
}

impl SimWorldBuilder {
    /// Add a post at a local east/north position.
    pub fn with_post(mut self, position: Vec2, id: i32) -> Self {
        self.posts.push(SimPost { position, id });
        self
    }

    /// Place the rover.
    pub fn with_rover(mut self, position: Vec2, heading_deg: f64) -> Self {
        self.rover = position;
        self.heading_deg = normalize_bearing(heading_deg);
        self
    }

    pub fn with_camera(mut self, camera: CameraModel) -> Self {
        self.camera = camera;
        self
    }

    /// Per-cycle rotation limit (degrees) and travel (metres).
    pub fn with_kinematics(mut self, turn_rate_deg: f64, speed_m: f64) -> Self {
        self.turn_rate_deg = turn_rate_deg;
        self.speed_m = speed_m;
        self
    }

    pub fn build(mut self) -> SimWorld {
        // The lower id always reports in the left image slot.
        self.posts.sort_by_key(|p| p.id);
        self.posts.truncate(2);
        SimWorld {
            origin: self.origin,
            posts: self.posts,
            rover: self.rover,
            heading_deg: self.heading_deg,
            camera: self.camera,
            turn_rate_deg: self.turn_rate_deg,
            speed_m: self.speed_m,
            frame: 0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimWorld
// ────────────────────────────────────────────────────────────────────────────

/// A deterministic single-gate world.
#[derive(Debug, Clone)]
pub struct SimWorld {
    origin: Odometry,
    posts: Vec<SimPost>,
    rover: Vec2,
    heading_deg: f64,
    camera: CameraModel,
    turn_rate_deg: f64,
    speed_m: f64,
    frame: u64,
}

impl SimWorld {
    /// Start building a world anchored at `origin`.
    pub fn builder(origin: Odometry) -> SimWorldBuilder {
        SimWorldBuilder {
            origin,
            posts: Vec::new(),
            rover: Vec2::default(),
            heading_deg: 0.0,
            camera: CameraModel::default(),
            turn_rate_deg: 8.0,
            speed_m: 0.5,
        }
    }

    pub fn origin(&self) -> Odometry {
        self.origin
    }

    /// Rover position in the local frame.
    pub fn rover_position(&self) -> Vec2 {
        self.rover
    }

    pub fn heading_deg(&self) -> f64 {
        self.heading_deg
    }

    pub fn posts(&self) -> &[SimPost] {
        &self.posts
    }

    /// Absolute rover pose.
    pub fn odometry(&self) -> Odometry {
        Odometry::from_local(&self.origin, self.rover).with_bearing(self.heading_deg)
    }

    /// World-frame location of a post, by id.
    pub fn post_odometry(&self, id: i32) -> Option<Odometry> {
        self.posts
            .iter()
            .find(|p| p.id == id)
            .map(|p| Odometry::from_local(&self.origin, p.position))
    }

    fn detect(&self, post: &SimPost) -> Target {
        let rel = post.position - self.rover;
        let distance = rel.norm();
        let bearing = angle_diff(rel.bearing_deg(), self.heading_deg);
        if distance <= self.camera.range_m && bearing.abs() <= self.camera.fov_deg / 2.0 {
            Target::new(distance, bearing, post.id)
        } else {
            Target::NONE
        }
    }

    /// Capture one sensor frame.
    pub fn observe(&mut self) -> SensorFrame {
        self.frame += 1;
        let dropped = self
            .camera
            .dropout_every
            .is_some_and(|n| n > 0 && self.frame % n == 0);

        let slot = |i: usize| match self.posts.get(i) {
            Some(post) if !dropped => self.detect(post),
            _ => Target::NONE,
        };
        let targets = TargetList::new(slot(0), slot(1));
        trace!(frame = self.frame, ?targets, "sim frame");

        SensorFrame {
            odometry: self.odometry(),
            targets,
            obstacle: Obstacle::CLEAR,
        }
    }

    fn rotate_toward(&mut self, bearing_deg: f64) -> f64 {
        let err = angle_diff(bearing_deg, self.heading_deg);
        let step = err.clamp(-self.turn_rate_deg, self.turn_rate_deg);
        self.heading_deg = normalize_bearing(self.heading_deg + step);
        angle_diff(bearing_deg, self.heading_deg)
    }

    /// Advance the rover one control cycle.
    pub fn apply(&mut self, target: &DriveTarget) {
        match target {
            DriveTarget::Hold => {}
            DriveTarget::Heading { bearing_deg } => {
                self.rotate_toward(*bearing_deg);
            }
            DriveTarget::Point(point) => {
                let to_go = point.to_local(&self.origin) - self.rover;
                let remaining = to_go.norm();
                if remaining < 1e-9 {
                    return;
                }
                let residual = self.rotate_toward(to_go.bearing_deg());
                if residual.abs() < DRIVE_WHILE_TURNING_DEG {
                    let step = Vec2::from_bearing(self.heading_deg).scale(self.speed_m.min(remaining));
                    self.rover = self.rover + step;
                }
            }
        }
    }
}
