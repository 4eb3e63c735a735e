//! Gate-post belief state.
//!
//! The [`Environment`] is fed one raw [`TargetList`] per control cycle via
//! [`Environment::set_targets`] and fuses it with [`Environment::update_targets`].
//! Each image-space slot (left, right) is tracked independently by a
//! [`PostTracker`]:
//!
//! - a detection that matches the cached post (or arrives while nothing is
//!   cached) is a **hit**: the cache and both filters take the reading and the
//!   miss counter is cleared;
//! - a detection that does not match is a **miss** and is otherwise ignored,
//!   until the miss counter exceeds `miss_threshold`, at which point the new
//!   reading is adopted as a fresh post;
//! - a missing detection is also a miss; past the threshold the post is
//!   dropped.
//!
//! Whenever a post is held its world-frame location is recomputed from the
//! current rover pose and the filtered bearing/distance.
//!
//! # Example
//!
//! ```rust
//! use rover_perception::Environment;
//! use rover_types::{EnvironmentConfig, Odometry, Target, TargetList};
//!
//! let mut env = Environment::new(&EnvironmentConfig::default()).unwrap();
//! let pose = Odometry::new(42.0, -83.0, 0.0);
//!
//! env.set_targets(TargetList::new(Target::new(3.0, -15.0, 4), Target::NONE));
//! env.update_targets(&pose, None);
//!
//! assert!(env.left().has_post());
//! assert!(!env.right().has_post());
//! assert!(!env.has_gate_location());
//! ```

use rover_types::{
    ConfigError, EnvironmentConfig, Obstacle, Odometry, PostSide, Target, TargetList, Vec2,
    Waypoint, angle_diff, normalize_bearing,
};
use tracing::{debug, warn};

use crate::filter::Filter;

// ────────────────────────────────────────────────────────────────────────────
// PostTracker
// ────────────────────────────────────────────────────────────────────────────

/// Debounced, filtered view of one image-space post slot.
#[derive(Debug, Clone)]
pub struct PostTracker {
    side: PostSide,
    cache: Option<Target>,
    hits: u32,
    misses: u32,
    bearing: Filter<f64>,
    distance: Filter<f64>,
    location: Option<Odometry>,
}

impl PostTracker {
    fn new(side: PostSide, config: &EnvironmentConfig) -> Self {
        let filter = || {
            Filter::new(
                config.filter_window,
                config.filter_proportion,
                config.filter_min_samples,
            )
        };
        Self {
            side,
            cache: None,
            hits: 0,
            misses: 0,
            bearing: filter(),
            distance: filter(),
            location: None,
        }
    }

    pub fn side(&self) -> PostSide {
        self.side
    }

    /// `true` while a detection is cached for this slot.
    pub fn has_post(&self) -> bool {
        self.cache.is_some()
    }

    /// The last detection accepted as real.
    pub fn cache(&self) -> Option<&Target> {
        self.cache.as_ref()
    }

    /// Marker id of the cached post.
    pub fn id(&self) -> Option<i32> {
        self.cache.map(|t| t.id)
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    /// Smoothed rover-relative bearing (degrees), meaningful while held.
    pub fn filtered_bearing(&self) -> Option<f64> {
        self.has_post().then(|| self.bearing.get()).flatten()
    }

    /// Smoothed range (metres), meaningful while held.
    pub fn filtered_distance(&self) -> Option<f64> {
        self.has_post().then(|| self.distance.get()).flatten()
    }

    /// Both filters hold enough samples to be trusted.
    pub fn filters_ready(&self) -> bool {
        self.bearing.ready() && self.distance.ready()
    }

    /// Held, seen this very cycle, and filtered.
    pub fn is_confident(&self) -> bool {
        self.has_post() && self.misses == 0 && self.filters_ready()
    }

    /// World-frame post location derived at the last update.
    pub fn location(&self) -> Option<Odometry> {
        self.location
    }

    fn is_similar(&self, cached: &Target, reading: &Target, config: &EnvironmentConfig) -> bool {
        angle_diff(reading.bearing, cached.bearing).abs() <= config.bearing_tolerance_deg
            && (reading.distance - cached.distance).abs() <= config.distance_tolerance_m
    }

    fn accept(&mut self, reading: &Target) {
        self.hits = self.hits.saturating_add(1);
        self.misses = 0;
        self.bearing.push(reading.bearing);
        self.distance.push(reading.distance);
        self.cache = Some(*reading);
    }

    fn retarget(&mut self, reading: &Target) {
        self.bearing.reset();
        self.distance.reset();
        self.bearing.push(reading.bearing);
        self.distance.push(reading.distance);
        self.cache = Some(*reading);
        self.hits = 0;
        self.misses = 0;
    }

    fn clear(&mut self) {
        self.cache = None;
        self.hits = 0;
        self.bearing.reset();
        self.distance.reset();
        self.location = None;
    }

    fn observe(&mut self, reading: &Target, config: &EnvironmentConfig) {
        if reading.is_detected() {
            match self.cache {
                None => self.accept(reading),
                Some(cached) if self.is_similar(&cached, reading, config) => self.accept(reading),
                Some(cached) => {
                    self.misses = self.misses.saturating_add(1);
                    if self.misses > config.miss_threshold {
                        debug!(
                            side = ?self.side,
                            old_id = cached.id,
                            new_id = reading.id,
                            "persistent disagreement; adopting new post"
                        );
                        self.retarget(reading);
                    }
                }
            }
        } else {
            self.misses = self.misses.saturating_add(1);
            if self.misses > config.miss_threshold && self.cache.is_some() {
                warn!(side = ?self.side, misses = self.misses, "post lost");
                self.clear();
            }
        }
    }

    fn relocate(&mut self, pose: &Odometry) {
        if !self.has_post() {
            return;
        }
        if let (Some(bearing), Some(distance)) = (self.bearing.get(), self.distance.get()) {
            let absolute = normalize_bearing(pose.bearing_deg + bearing);
            self.location = Some(pose.offset(absolute, distance));
        }
    }

    /// Post position in the rover frame (x forward, y left).
    fn relative(&self) -> Option<Vec2> {
        let bearing = self.filtered_bearing()?.to_radians();
        let distance = self.filtered_distance()?;
        Some(Vec2::new(distance * bearing.cos(), -distance * bearing.sin()))
    }

    fn reset(&mut self) {
        self.clear();
        self.misses = 0;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Environment
// ────────────────────────────────────────────────────────────────────────────

/// Current belief about the gate: raw detections, per-post debounce state,
/// filtered bearing/distance, and world-frame post locations.
#[derive(Debug, Clone)]
pub struct Environment {
    config: EnvironmentConfig,
    obstacle: Obstacle,
    raw: TargetList,
    left: PostTracker,
    right: PostTracker,
}

impl Environment {
    /// Build an environment with empty caches.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a threshold is out of range.
    pub fn new(config: &EnvironmentConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            obstacle: Obstacle::CLEAR,
            raw: TargetList::new(Target::NONE, Target::NONE),
            left: PostTracker::new(PostSide::Left, config),
            right: PostTracker::new(PostSide::Right, config),
        })
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    pub fn obstacle(&self) -> Obstacle {
        self.obstacle
    }

    pub fn set_obstacle(&mut self, obstacle: Obstacle) {
        self.obstacle = obstacle;
    }

    /// Store this cycle's raw detections.  No filtering happens here.
    pub fn set_targets(&mut self, targets: TargetList) {
        self.raw = targets;
    }

    /// Raw detection for the left slot, as last set.
    pub fn left_target(&self) -> Target {
        self.raw.left
    }

    /// Raw detection for the right slot, as last set.
    pub fn right_target(&self) -> Target {
        self.raw.right
    }

    pub fn left(&self) -> &PostTracker {
        &self.left
    }

    pub fn right(&self) -> &PostTracker {
        &self.right
    }

    pub fn post(&self, side: PostSide) -> &PostTracker {
        match side {
            PostSide::Left => &self.left,
            PostSide::Right => &self.right,
        }
    }

    pub fn left_cache_target(&self) -> Option<&Target> {
        self.left.cache()
    }

    pub fn right_cache_target(&self) -> Option<&Target> {
        self.right.cache()
    }

    pub fn left_misses(&self) -> u32 {
        self.left.misses
    }

    pub fn right_misses(&self) -> u32 {
        self.right.misses
    }

    pub fn left_hits(&self) -> u32 {
        self.left.hits
    }

    pub fn right_hits(&self) -> u32 {
        self.right.hits
    }

    pub fn left_post_location(&self) -> Option<Odometry> {
        self.left.location()
    }

    pub fn right_post_location(&self) -> Option<Odometry> {
        self.right.location()
    }

    pub fn left_post_relative(&self) -> Option<Vec2> {
        self.left.relative()
    }

    pub fn right_post_relative(&self) -> Option<Vec2> {
        self.right.relative()
    }

    /// Fuse the stored raw detections into the per-post belief.
    ///
    /// When `waypoint` describes a gate, detections of any other marker id
    /// are treated as absent.
    pub fn update_targets(&mut self, pose: &Odometry, waypoint: Option<&Waypoint>) {
        let admit = |t: Target| match waypoint {
            Some(wp) if wp.gate && t.is_detected() && !wp.is_gate_post(t.id) => Target::NONE,
            _ => t,
        };
        for side in PostSide::BOTH {
            let reading = admit(*self.raw.get(side));
            let tracker = match side {
                PostSide::Left => &mut self.left,
                PostSide::Right => &mut self.right,
            };
            tracker.observe(&reading, &self.config);
            tracker.relocate(pose);
        }
    }

    /// Both posts are currently held.
    pub fn has_gate_location(&self) -> bool {
        self.left.has_post() && self.right.has_post()
    }

    /// At least one post is held and every held post has ready filters.
    pub fn are_target_filters_ready(&self) -> bool {
        let held: Vec<&PostTracker> = [&self.left, &self.right]
            .into_iter()
            .filter(|p| p.has_post())
            .collect();
        !held.is_empty() && held.iter().all(|p| p.filters_ready())
    }

    /// Zero both miss counters; caches and filters are untouched.
    pub fn reset_misses(&mut self) {
        self.left.misses = 0;
        self.right.misses = 0;
    }

    /// Forget everything learned about the posts (new search attempt).
    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
        self.raw = TargetList::new(Target::NONE, Target::NONE);
    }
}
