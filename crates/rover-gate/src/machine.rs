//! Gate traversal state machine.
//!
//! One [`GateStateMachine`] lives for exactly one gate search.  Every control
//! cycle the owner refreshes the [`Environment`] and then calls
//! [`GateStateMachine::run`] once; `run` executes the logic of the current
//! phase and returns the next [`NavState`].  The accompanying steering hint
//! is available from [`GateStateMachine::drive_target`].
//!
//! Phase sequence:
//!
//! ```text
//! Spin ─► SpinWait ─► Turn ─► Drive ─► TurnToCentPoint ─► DriveToCentPoint ─► Face
//!   ▲                                                                           │
//!   └── post lost / search point reached                  wrong side │ right side
//!                                                                     ▼          ▼
//!                                          TurnToFarPost ─► DriveToFarPost ─► TurnToGateCenter
//!                                                                                │
//!                                                                 DriveThrough ─► Traversed
//! ```
//!
//! `Spin` that completes a full sweep without finding anything pops the next
//! search point (Turn/Drive travel to it); when the queue is empty the search
//! ends in `GateNotFound`.

use std::cmp::Ordering;
use std::collections::VecDeque;

use rover_perception::{Environment, PostTracker};
use rover_types::{
    DriveTarget, GateConfig, NavState, Odometry, PostSide, Vec2, Waypoint, angle_diff,
    normalize_bearing,
};
use tracing::{debug, info, warn};

use crate::course::CourseContext;
use crate::search::SearchQueue;
use crate::strategy::TraversalStrategy;

// ────────────────────────────────────────────────────────────────────────────
// Supporting types
// ────────────────────────────────────────────────────────────────────────────

/// A post location that was trusted at some point during the search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnownPost {
    pub id: i32,
    pub location: Odometry,
}

/// Geometry of a located gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateGeometry {
    /// Midpoint between the posts.
    pub center: Odometry,
    /// Point `gate_standoff_m` past the gate in the mandated direction.
    pub exit: Odometry,
    /// Point `gate_standoff_m` before the gate.
    pub entry: Odometry,
    /// Compass bearing of the mandated travel direction.
    pub through_bearing_deg: f64,
    direction: Vec2,
}

impl GateGeometry {
    /// Plan the gate from the post that must pass on the rover's left and the
    /// other post.  `None` when the two locations coincide.
    pub fn plan(left_hand: &Odometry, right_hand: &Odometry, standoff_m: f64) -> Option<Self> {
        let center = left_hand.midpoint(right_hand);
        // Travelling along `direction`, the left-hand post is a quarter turn
        // counter-clockwise from it.
        let direction = left_hand.to_local(&center).perp_cw().normalized()?;
        let through = direction.bearing_deg();
        Some(Self {
            center: center.with_bearing(through),
            exit: Odometry::from_local(&center, direction.scale(standoff_m)).with_bearing(through),
            entry: Odometry::from_local(&center, direction.scale(-standoff_m))
                .with_bearing(through),
            through_bearing_deg: through,
            direction,
        })
    }

    /// `true` when `pose` is on the side from which driving along the
    /// through bearing passes the posts correctly.
    pub fn on_entry_side(&self, pose: &Odometry) -> bool {
        pose.to_local(&self.center).dot(self.direction) < 0.0
    }

    /// `true` when `pose` lies within `tolerance_m` of the line through the
    /// centre along the travel direction.
    pub fn on_axis(&self, pose: &Odometry, tolerance_m: f64) -> bool {
        pose.to_local(&self.center)
            .dot(self.direction.perp_cw())
            .abs()
            <= tolerance_m
    }

    /// Points to drive through in order.  A rover off the axis first goes
    /// to the entry point so the traverse itself is straight.
    fn through_legs(&self, pose: &Odometry, tolerance_m: f64) -> VecDeque<Odometry> {
        if self.on_axis(pose, tolerance_m) {
            VecDeque::from([self.center, self.exit])
        } else {
            VecDeque::from([self.entry, self.center, self.exit])
        }
    }
}

/// What Turn/Drive are currently heading for.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Approach {
    Post(PostSide),
    SearchPoint(Odometry),
}

/// Progress through one in-place rotation sweep.
#[derive(Debug, Clone, Copy)]
struct SpinSweep {
    origin_deg: f64,
    step_deg: f64,
    stop: usize,
    stops: usize,
}

impl SpinSweep {
    fn heading(&self) -> f64 {
        normalize_bearing(self.origin_deg + self.stop as f64 * self.step_deg)
    }

    fn is_exhausted(&self) -> bool {
        self.stop >= self.stops
    }
}

/// Outcome of steering toward a point for one cycle.
enum Leg {
    Arrived,
    OffCourse,
    Driving,
}

// ────────────────────────────────────────────────────────────────────────────
// GateStateMachine
// ────────────────────────────────────────────────────────────────────────────

pub struct GateStateMachine {
    config: GateConfig,
    strategy: Box<dyn TraversalStrategy>,
    state: NavState,
    last_known_left_post: Option<KnownPost>,
    last_known_right_post: Option<KnownPost>,
    search_points: SearchQueue,
    geometry: Option<GateGeometry>,
    is_correct_gate_dir: bool,
    approach: Option<Approach>,
    turn_target: Option<Odometry>,
    spin: Option<SpinSweep>,
    detour: VecDeque<Odometry>,
    through: VecDeque<Odometry>,
    drive_target: DriveTarget,
    reseeded_around: Vec<i32>,
    settled_cycles: usize,
    search_area: Waypoint,
}

impl std::fmt::Debug for GateStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateStateMachine")
            .field("strategy", &self.strategy.name())
            .field("state", &self.state)
            .field("search_points", &self.search_points.remaining())
            .field("geometry", &self.geometry)
            .finish_non_exhaustive()
    }
}

impl GateStateMachine {
    /// Start a search for `waypoint` in [`NavState::GateSpin`].  Use
    /// [`crate::gate_factory`] to build one from configuration.
    pub fn new(
        config: GateConfig,
        strategy: Box<dyn TraversalStrategy>,
        waypoint: &Waypoint,
    ) -> Self {
        let mut points =
            strategy.search_points(&waypoint.odometry, config.search_point_spacing_m);
        points.retain(|p| waypoint.in_search_area(p));
        let search_points = SearchQueue::new(points, config.max_search_points);
        Self {
            config,
            strategy,
            state: NavState::GateSpin,
            last_known_left_post: None,
            last_known_right_post: None,
            search_points,
            geometry: None,
            is_correct_gate_dir: false,
            approach: None,
            turn_target: None,
            spin: None,
            detour: VecDeque::new(),
            through: VecDeque::new(),
            drive_target: DriveTarget::Hold,
            reseeded_around: Vec::new(),
            settled_cycles: 0,
            search_area: *waypoint,
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    /// Steering hint produced by the last [`run`](Self::run).
    pub fn drive_target(&self) -> DriveTarget {
        self.drive_target
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    pub fn search_points(&self) -> &SearchQueue {
        &self.search_points
    }

    pub fn last_known_left_post(&self) -> Option<KnownPost> {
        self.last_known_left_post
    }

    pub fn last_known_right_post(&self) -> Option<KnownPost> {
        self.last_known_right_post
    }

    pub fn geometry(&self) -> Option<&GateGeometry> {
        self.geometry.as_ref()
    }

    /// Midpoint between the posts, once the gate is located.
    pub fn center_point1(&self) -> Option<Odometry> {
        self.geometry.map(|g| g.center)
    }

    /// Far-side reference point, once the gate is located.
    pub fn center_point2(&self) -> Option<Odometry> {
        self.geometry.map(|g| g.exit)
    }

    pub fn is_correct_gate_dir(&self) -> bool {
        self.is_correct_gate_dir
    }

    /// Execute one phase and return the next state.
    pub fn run(&mut self, course: &dyn CourseContext, env: &mut Environment) -> NavState {
        let odom = course.odometry();
        let waypoint = course.current_waypoint();
        let executed = self.state;

        let next = match executed {
            NavState::GateSpin => self.spin(&odom, env),
            NavState::GateSpinWait => self.spin_wait(&odom, env),
            NavState::GateTurn => self.turn(&odom, env),
            NavState::GateDrive => self.drive(&odom, env, waypoint),
            NavState::GateTurnToCentPoint => self.turn_to_cent_point(&odom, env),
            NavState::GateDriveToCentPoint => self.drive_to_cent_point(&odom, env, waypoint),
            NavState::GateFace => self.face(&odom),
            NavState::GateTurnToFarPost => self.turn_to_far_post(&odom, env, waypoint),
            NavState::GateDriveToFarPost => self.drive_to_far_post(&odom, env, waypoint),
            NavState::GateTurnToGateCenter => self.turn_to_gate_center(&odom),
            NavState::GateDriveThrough => self.drive_through(&odom),
            NavState::GateTraversed | NavState::GateNotFound | NavState::Off | NavState::Done => {
                self.drive_target = DriveTarget::Hold;
                executed
            }
        };

        // Only trust locations derived while the rover is not rotating in
        // place; the filters lag behind a turn.
        if matches!(
            executed,
            NavState::GateSpinWait | NavState::GateDrive | NavState::GateDriveToCentPoint
        ) {
            self.update_post_info(env);
        }

        if next != executed {
            debug!(from = %executed, to = %next, "gate transition");
        }
        self.state = next;
        next
    }

    // ── shared helpers ────────────────────────────────────────────────────

    fn aligned(&self, odom: &Odometry, bearing: f64) -> bool {
        angle_diff(bearing, odom.bearing_deg).abs() <= self.config.turn_tolerance_deg
    }

    fn known_posts(&self) -> impl Iterator<Item = KnownPost> {
        [self.last_known_left_post, self.last_known_right_post]
            .into_iter()
            .flatten()
    }

    fn is_known(&self, id: i32) -> bool {
        self.known_posts().any(|p| p.id == id)
    }

    /// Something worth stopping for: the whole gate, or a post never seen
    /// before.
    fn should_inspect(&self, env: &Environment) -> bool {
        env.has_gate_location()
            || PostSide::BOTH
                .into_iter()
                .any(|side| env.post(side).id().is_some_and(|id| !self.is_known(id)))
    }

    fn gate_complete(env: &Environment) -> bool {
        env.has_gate_location() && env.are_target_filters_ready()
    }

    fn lost_side(env: &Environment) -> Option<PostSide> {
        PostSide::BOTH
            .into_iter()
            .find(|&side| !env.post(side).has_post())
    }

    fn lose_post(&mut self, side: PostSide) -> NavState {
        warn!(?side, state = %self.state, "post lost; returning to spin");
        self.approach = None;
        self.spin = None;
        self.drive_target = DriveTarget::Hold;
        NavState::GateSpin
    }

    fn enter_spin_wait(&mut self, env: &mut Environment) -> NavState {
        env.reset_misses();
        self.drive_target = DriveTarget::Hold;
        NavState::GateSpinWait
    }

    fn turn_toward(
        &mut self,
        odom: &Odometry,
        target: Odometry,
        when_aligned: NavState,
        otherwise: NavState,
    ) -> NavState {
        let bearing = odom.bearing_to(&target);
        if self.aligned(odom, bearing) {
            self.drive_target = DriveTarget::Point(target);
            when_aligned
        } else {
            self.drive_target = DriveTarget::Heading {
                bearing_deg: bearing,
            };
            otherwise
        }
    }

    fn drive_leg(&mut self, odom: &Odometry, target: &Odometry, radius: f64) -> Leg {
        if odom.distance_to(target) <= radius {
            self.drive_target = DriveTarget::Hold;
            return Leg::Arrived;
        }
        let bearing = odom.bearing_to(target);
        if angle_diff(bearing, odom.bearing_deg).abs() > self.config.off_course_tolerance_deg {
            self.drive_target = DriveTarget::Heading {
                bearing_deg: bearing,
            };
            return Leg::OffCourse;
        }
        self.drive_target = DriveTarget::Point(*target);
        Leg::Driving
    }

    /// Record every post that is held, seen this cycle and filtered.
    fn update_post_info(&mut self, env: &Environment) {
        for side in PostSide::BOTH {
            let post = env.post(side);
            if !post.is_confident() {
                continue;
            }
            let (Some(id), Some(location)) = (post.id(), post.location()) else {
                continue;
            };
            let known = Some(KnownPost { id, location });
            match side {
                PostSide::Left => self.last_known_left_post = known,
                PostSide::Right => self.last_known_right_post = known,
            }
        }
    }

    /// Recompute the gate geometry from the last known posts.  Returns
    /// `false` (leaving the previous geometry in place) when either post is
    /// unknown or the posts coincide.
    fn calc_center_point(&mut self, odom: &Odometry, waypoint: Option<&Waypoint>) -> bool {
        let (Some(a), Some(b)) = (self.last_known_left_post, self.last_known_right_post) else {
            return false;
        };
        let a_is_left_hand = match waypoint {
            Some(wp) if a.id != b.id && wp.is_gate_post(a.id) && wp.is_gate_post(b.id) => {
                a.id == wp.id
            }
            _ => a.id <= b.id,
        };
        let (left_hand, right_hand) = if a_is_left_hand { (a, b) } else { (b, a) };
        let Some(geometry) = GateGeometry::plan(
            &left_hand.location,
            &right_hand.location,
            self.config.gate_standoff_m,
        ) else {
            return false;
        };
        self.is_correct_gate_dir = geometry.on_entry_side(odom);
        self.geometry = Some(geometry);
        true
    }

    fn next_search_point(&mut self) -> NavState {
        self.drive_target = DriveTarget::Hold;
        match self.search_points.next() {
            Some(point) => {
                debug!(
                    remaining = self.search_points.remaining(),
                    "moving to next search point"
                );
                self.approach = Some(Approach::SearchPoint(point));
                NavState::GateTurn
            }
            None => {
                warn!(
                    visited = self.search_points.visited(),
                    "search points exhausted; gate not found"
                );
                self.approach = None;
                NavState::GateNotFound
            }
        }
    }

    /// Queue search points around a lone post, at most once per post id.
    fn search_around(&mut self, id: Option<i32>, location: &Odometry) {
        if let Some(id) = id {
            if self.reseeded_around.contains(&id) {
                return;
            }
            self.reseeded_around.push(id);
        }
        let mut points = self
            .strategy
            .search_points(location, self.config.search_point_spacing_m);
        points.retain(|p| self.search_area.in_search_area(p));
        debug!(?id, count = points.len(), "searching around lone post");
        self.search_points.reseed(points);
    }

    // ── phases ────────────────────────────────────────────────────────────

    fn spin(&mut self, odom: &Odometry, env: &mut Environment) -> NavState {
        if self.should_inspect(env) {
            return self.enter_spin_wait(env);
        }

        let mut sweep = match self.spin {
            Some(sweep) => sweep,
            None => {
                let origin_deg = self.spin_origin(odom, env);
                debug!(origin_deg, "starting spin sweep");
                SpinSweep {
                    origin_deg,
                    step_deg: self.config.spin_step_deg,
                    stop: 0,
                    stops: ((self.config.spin_arc_deg / self.config.spin_step_deg).ceil()
                        as usize)
                        .max(1),
                }
            }
        };
        if self.aligned(odom, sweep.heading()) {
            sweep.stop += 1;
        }
        if sweep.is_exhausted() {
            self.spin = None;
            debug!("spin sweep exhausted");
            return self.next_search_point();
        }

        self.spin = Some(sweep);
        self.drive_target = DriveTarget::Heading {
            bearing_deg: sweep.heading(),
        };
        NavState::GateSpin
    }

    /// Face the nearest remembered post that is not currently held first.
    fn spin_origin(&self, odom: &Odometry, env: &Environment) -> f64 {
        let held: Vec<i32> = PostSide::BOTH
            .into_iter()
            .filter_map(|side| env.post(side).id())
            .collect();
        self.known_posts()
            .filter(|p| !held.contains(&p.id))
            .min_by(|a, b| {
                odom.distance_to(&a.location)
                    .total_cmp(&odom.distance_to(&b.location))
            })
            .map_or(odom.bearing_deg, |p| odom.bearing_to(&p.location))
    }

    fn spin_wait(&mut self, odom: &Odometry, env: &mut Environment) -> NavState {
        self.drive_target = DriveTarget::Hold;
        if !PostSide::BOTH.into_iter().any(|s| env.post(s).has_post()) {
            debug!("tentative post lost before filters settled");
            return NavState::GateSpin;
        }
        if !env.are_target_filters_ready() {
            return NavState::GateSpinWait;
        }
        let Some(side) = self.pick_target(env) else {
            return NavState::GateSpin;
        };
        let Some(location) = env.post(side).location() else {
            return NavState::GateSpinWait;
        };

        debug!(?side, id = ?env.post(side).id(), "approaching post");
        self.approach = Some(Approach::Post(side));
        self.turn_target = Some(location);
        self.spin = None;
        self.drive_target = DriveTarget::Heading {
            bearing_deg: odom.bearing_to(&location),
        };
        NavState::GateTurn
    }

    /// Prefer unseen ids, then fewer misses, more hits, shorter range, and
    /// finally the left slot.
    fn pick_target(&self, env: &Environment) -> Option<PostSide> {
        let known = |p: &PostTracker| p.id().is_some_and(|id| self.is_known(id));
        let range = |p: &PostTracker| p.filtered_distance().unwrap_or(f64::INFINITY);
        PostSide::BOTH
            .into_iter()
            .filter(|&side| env.post(side).has_post())
            .min_by(|&a, &b| {
                let (pa, pb) = (env.post(a), env.post(b));
                known(pa)
                    .cmp(&known(pb))
                    .then(pa.misses().cmp(&pb.misses()))
                    .then(pb.hits().cmp(&pa.hits()))
                    .then(range(pa).partial_cmp(&range(pb)).unwrap_or(Ordering::Equal))
            })
    }

    fn turn(&mut self, odom: &Odometry, env: &mut Environment) -> NavState {
        match self.approach {
            Some(Approach::Post(side)) => {
                if !env.post(side).has_post() {
                    return self.lose_post(side);
                }
                let Some(target) = self.turn_target else {
                    return self.lose_post(side);
                };
                self.turn_toward(odom, target, NavState::GateDrive, NavState::GateTurn)
            }
            Some(Approach::SearchPoint(point)) => {
                if self.should_inspect(env) {
                    return self.enter_spin_wait(env);
                }
                self.turn_toward(odom, point, NavState::GateDrive, NavState::GateTurn)
            }
            None => {
                self.drive_target = DriveTarget::Hold;
                NavState::GateSpin
            }
        }
    }

    fn drive(
        &mut self,
        odom: &Odometry,
        env: &mut Environment,
        waypoint: Option<&Waypoint>,
    ) -> NavState {
        match self.approach {
            Some(Approach::Post(side)) => self.drive_to_post(odom, env, waypoint, side),
            Some(Approach::SearchPoint(point)) => self.drive_to_search_point(odom, env, &point),
            None => {
                self.drive_target = DriveTarget::Hold;
                NavState::GateSpin
            }
        }
    }

    fn drive_to_post(
        &mut self,
        odom: &Odometry,
        env: &mut Environment,
        waypoint: Option<&Waypoint>,
        side: PostSide,
    ) -> NavState {
        if Self::gate_complete(env) {
            self.update_post_info(env);
            if self.calc_center_point(odom, waypoint) {
                info!(
                    center = ?self.center_point1(),
                    correct_side = self.is_correct_gate_dir,
                    "gate located"
                );
                self.approach = None;
                if let Some(center) = self.center_point1() {
                    self.drive_target = DriveTarget::Heading {
                        bearing_deg: odom.bearing_to(&center),
                    };
                }
                return NavState::GateTurnToCentPoint;
            }
        }

        let post = env.post(side);
        let (Some(location), true) = (post.location(), post.has_post()) else {
            return self.lose_post(side);
        };
        let id = post.id();
        self.turn_target = Some(location);

        match self.drive_leg(odom, &location, self.config.post_approach_dist_m) {
            Leg::Arrived => {
                self.search_around(id, &location);
                self.approach = None;
                self.spin = None;
                NavState::GateSpin
            }
            Leg::OffCourse => NavState::GateTurn,
            Leg::Driving => NavState::GateDrive,
        }
    }

    fn drive_to_search_point(
        &mut self,
        odom: &Odometry,
        env: &mut Environment,
        point: &Odometry,
    ) -> NavState {
        if self.should_inspect(env) {
            return self.enter_spin_wait(env);
        }
        match self.drive_leg(odom, point, self.config.arrival_tolerance_m) {
            Leg::Arrived => {
                debug!(visited = self.search_points.visited(), "reached search point");
                env.reset_misses();
                self.approach = None;
                self.spin = None;
                NavState::GateSpin
            }
            Leg::OffCourse => NavState::GateTurn,
            Leg::Driving => NavState::GateDrive,
        }
    }

    fn turn_to_cent_point(&mut self, odom: &Odometry, env: &Environment) -> NavState {
        if let Some(side) = Self::lost_side(env) {
            return self.lose_post(side);
        }
        let Some(geometry) = self.geometry else {
            self.drive_target = DriveTarget::Hold;
            return NavState::GateSpin;
        };
        self.turn_toward(
            odom,
            geometry.center,
            NavState::GateDriveToCentPoint,
            NavState::GateTurnToCentPoint,
        )
    }

    fn drive_to_cent_point(
        &mut self,
        odom: &Odometry,
        env: &Environment,
        waypoint: Option<&Waypoint>,
    ) -> NavState {
        if let Some(side) = Self::lost_side(env) {
            return self.lose_post(side);
        }
        if env.left().is_confident() && env.right().is_confident() {
            self.update_post_info(env);
            self.calc_center_point(odom, waypoint);
        }
        let Some(geometry) = self.geometry else {
            self.drive_target = DriveTarget::Hold;
            return NavState::GateSpin;
        };
        let leg = self.drive_leg(odom, &geometry.center, self.config.gate_standoff_m);
        if !matches!(leg, Leg::Arrived) {
            self.settled_cycles = 0;
        }
        match leg {
            // Hold until the filters only contain samples taken at rest;
            // locations derived on the move trail the rover's travel.
            Leg::Arrived if self.settled_cycles < env.config().filter_window => {
                self.settled_cycles += 1;
                NavState::GateDriveToCentPoint
            }
            Leg::Arrived => {
                self.settled_cycles = 0;
                NavState::GateFace
            }
            Leg::OffCourse => NavState::GateTurnToCentPoint,
            Leg::Driving => NavState::GateDriveToCentPoint,
        }
    }

    fn face(&mut self, odom: &Odometry) -> NavState {
        let Some(geometry) = self.geometry else {
            self.drive_target = DriveTarget::Hold;
            return NavState::GateSpin;
        };
        self.is_correct_gate_dir = geometry.on_entry_side(odom);
        let heading = if self.is_correct_gate_dir {
            geometry.through_bearing_deg
        } else {
            normalize_bearing(geometry.through_bearing_deg + 180.0)
        };
        if !self.aligned(odom, heading) {
            self.drive_target = DriveTarget::Heading {
                bearing_deg: heading,
            };
            return NavState::GateFace;
        }

        if self.is_correct_gate_dir {
            self.through = geometry.through_legs(odom, self.config.arrival_tolerance_m);
            self.drive_target = DriveTarget::Hold;
            return NavState::GateTurnToGateCenter;
        }

        // Loop around the far post to the entry point.
        let far = self.known_posts().max_by(|a, b| {
            odom.distance_to(&a.location)
                .total_cmp(&odom.distance_to(&b.location))
        });
        let Some(far) = far else {
            self.drive_target = DriveTarget::Hold;
            return NavState::GateSpin;
        };
        let far_local = far.location.to_local(&geometry.center);
        let outward = far_local.normalized().unwrap_or(geometry.direction.perp_cw());
        let clearance = Odometry::from_local(
            &geometry.center,
            far_local + outward.scale(self.config.gate_adjustment_dist_m),
        );
        info!(far_post = far.id, "approaching from the exit side; detouring");
        self.detour = VecDeque::from([clearance, geometry.entry]);
        self.drive_target = DriveTarget::Hold;
        NavState::GateTurnToFarPost
    }

    fn turn_to_far_post(
        &mut self,
        odom: &Odometry,
        env: &Environment,
        waypoint: Option<&Waypoint>,
    ) -> NavState {
        let Some(&leg) = self.detour.front() else {
            return self.finish_detour(odom, env, waypoint);
        };
        self.turn_toward(
            odom,
            leg,
            NavState::GateDriveToFarPost,
            NavState::GateTurnToFarPost,
        )
    }

    fn drive_to_far_post(
        &mut self,
        odom: &Odometry,
        env: &Environment,
        waypoint: Option<&Waypoint>,
    ) -> NavState {
        let Some(&leg) = self.detour.front() else {
            return self.finish_detour(odom, env, waypoint);
        };
        match self.drive_leg(odom, &leg, self.config.arrival_tolerance_m) {
            Leg::Arrived => {
                self.detour.pop_front();
                if self.detour.is_empty() {
                    self.finish_detour(odom, env, waypoint)
                } else {
                    NavState::GateTurnToFarPost
                }
            }
            Leg::OffCourse => NavState::GateTurnToFarPost,
            Leg::Driving => NavState::GateDriveToFarPost,
        }
    }

    fn finish_detour(
        &mut self,
        odom: &Odometry,
        env: &Environment,
        waypoint: Option<&Waypoint>,
    ) -> NavState {
        if Self::gate_complete(env) {
            self.update_post_info(env);
        }
        if self.calc_center_point(odom, waypoint) && !self.is_correct_gate_dir {
            warn!("detour finished on the exit side; driving through anyway");
        }
        self.is_correct_gate_dir = true;
        let Some(geometry) = self.geometry else {
            self.drive_target = DriveTarget::Hold;
            return NavState::GateSpin;
        };
        self.through = geometry.through_legs(odom, self.config.arrival_tolerance_m);
        self.drive_target = DriveTarget::Hold;
        NavState::GateTurnToGateCenter
    }

    fn turn_to_gate_center(&mut self, odom: &Odometry) -> NavState {
        let Some(&leg) = self.through.front() else {
            return self.traversed();
        };
        self.turn_toward(
            odom,
            leg,
            NavState::GateDriveThrough,
            NavState::GateTurnToGateCenter,
        )
    }

    fn drive_through(&mut self, odom: &Odometry) -> NavState {
        let Some(&leg) = self.through.front() else {
            return self.traversed();
        };
        match self.drive_leg(odom, &leg, self.config.arrival_tolerance_m) {
            Leg::Arrived => {
                self.through.pop_front();
                match self.through.front() {
                    Some(&next) => {
                        self.drive_target = DriveTarget::Point(next);
                        NavState::GateDriveThrough
                    }
                    None => self.traversed(),
                }
            }
            Leg::OffCourse => NavState::GateTurnToGateCenter,
            Leg::Driving => NavState::GateDriveThrough,
        }
    }

    fn traversed(&mut self) -> NavState {
        info!(center = ?self.center_point1(), "gate traversed");
        self.drive_target = DriveTarget::Hold;
        NavState::GateTraversed
    }
}
