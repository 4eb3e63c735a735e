//! `rover-gate` – drives the rover through a two-post gate in the mandated
//! direction.
//!
//! # Modules
//!
//! - [`machine`] – [`GateStateMachine`]: the spin / approach / centre / face /
//!   detour / drive-through phase sequence, one phase per control cycle.
//! - [`strategy`] – [`TraversalStrategy`] variants that lay out fallback
//!   search points, and the [`gate_factory`] that picks one from
//!   configuration.
//! - [`search`] – [`SearchQueue`], the bounded retry queue of search points.
//! - [`course`] – [`CourseContext`], the read-only handle on the parent
//!   course state machine.
//!
//! # Example
//!
//! ```rust
//! use rover_gate::{CourseSnapshot, gate_factory};
//! use rover_perception::Environment;
//! use rover_types::{NavState, Odometry, RoverConfig, Waypoint};
//!
//! let config = RoverConfig::default();
//! let waypoint = Waypoint::gate(Odometry::new(38.4, -110.8, 0.0), 4, 2.0);
//! let mut env = Environment::new(&config.environment).unwrap();
//! let mut gate = gate_factory(&config.gate, &waypoint).unwrap();
//!
//! // Nothing in view: the rover starts rotating in place.
//! let course = CourseSnapshot::new(waypoint.odometry, Some(&waypoint));
//! assert_eq!(gate.run(&course, &mut env), NavState::GateSpin);
//! ```

pub mod course;
pub mod machine;
pub mod search;
pub mod strategy;

pub use course::{CourseContext, CourseSnapshot};
pub use machine::{GateGeometry, GateStateMachine, KnownPost};
pub use search::SearchQueue;
pub use strategy::{DiamondSearch, SpiralSearch, TraversalStrategy, gate_factory, strategy_for};

#[cfg(test)]
mod tests {
    use super::*;
    use rover_perception::Environment;
    use rover_sim::scenario::{FIELD_ORIGIN, LEFT_POST_ID};
    use rover_sim::{CameraModel, Scenario, SimWorld};
    use rover_types::{EnvironmentConfig, NavState, RoverConfig, Vec2, Waypoint, angle_diff};

    const MAX_CYCLES: usize = 3000;

    fn sim_config() -> RoverConfig {
        RoverConfig {
            environment: EnvironmentConfig {
                filter_window: 3,
                filter_proportion: 1.0,
                filter_min_samples: 3,
                ..EnvironmentConfig::default()
            },
            ..RoverConfig::default()
        }
    }

    struct Outcome {
        trace: Vec<NavState>,
        path: Vec<Vec2>,
        headings: Vec<f64>,
        world: SimWorld,
        machine: GateStateMachine,
    }

    fn drive(mut world: SimWorld, waypoint: Waypoint, config: &RoverConfig) -> Outcome {
        let mut env = Environment::new(&config.environment).unwrap();
        let mut machine = gate_factory(&config.gate, &waypoint).unwrap();
        let mut trace = vec![machine.state()];
        let mut path = vec![world.rover_position()];
        let mut headings = vec![world.heading_deg()];

        for _ in 0..MAX_CYCLES {
            let frame = world.observe();
            env.set_obstacle(frame.obstacle);
            env.set_targets(frame.targets);
            env.update_targets(&frame.odometry, Some(&waypoint));

            let course = CourseSnapshot::new(frame.odometry, Some(&waypoint));
            let state = machine.run(&course, &mut env);
            if trace.last() != Some(&state) {
                trace.push(state);
            }
            world.apply(&machine.drive_target());
            path.push(world.rover_position());
            headings.push(world.heading_deg());
            if state.is_terminal() {
                break;
            }
        }
        Outcome {
            trace,
            path,
            headings,
            world,
            machine,
        }
    }

    fn run_scenario(scenario: Scenario) -> Outcome {
        drive(scenario.world(), scenario.waypoint(), &sim_config())
    }

    /// Index of the first path sample past the last crossing of the post
    /// line (north = 0).
    fn crossing_index(path: &[Vec2]) -> Option<usize> {
        path.windows(2)
            .rposition(|w| (w[0].y < 0.0) != (w[1].y < 0.0))
            .map(|i| i + 1)
    }

    /// Gate on the east/west line through the field origin, id 4 to the west,
    /// rover at `start` facing the gate centre.
    fn angled_world(start: Vec2) -> SimWorld {
        SimWorld::builder(FIELD_ORIGIN)
            .with_post(Vec2::new(-1.0, 0.0), LEFT_POST_ID)
            .with_post(Vec2::new(1.0, 0.0), LEFT_POST_ID + 1)
            .with_rover(start, Vec2::new(-start.x, -start.y).bearing_deg())
            .build()
    }

    /// East coordinate where the path last crossed the post line (north = 0).
    fn crossing_x(path: &[Vec2]) -> Option<f64> {
        path.windows(2)
            .filter_map(|w| {
                let (a, b) = (w[0], w[1]);
                if (a.y < 0.0) == (b.y < 0.0) {
                    return None;
                }
                let t = a.y / (a.y - b.y);
                Some(a.x + t * (b.x - a.x))
            })
            .last()
    }

    #[test]
    fn approach_from_entry_side_drives_straight_through() {
        let out = run_scenario(Scenario::Approach);
        assert_eq!(out.trace.last(), Some(&NavState::GateTraversed), "{:?}", out.trace);
        assert!(!out.trace.contains(&NavState::GateTurnToFarPost));
        assert!(!out.trace.contains(&NavState::GateDriveToFarPost));
        assert!(out.trace.contains(&NavState::GateFace));

        let x = crossing_x(&out.path).unwrap();
        assert!(x.abs() < 0.9, "crossed the gate line at x = {x}");
        assert!(out.world.rover_position().y > 0.0);
        assert!(angle_diff(out.world.heading_deg(), 0.0).abs() < 20.0);
    }

    #[test]
    fn angled_approach_lines_up_before_driving_through() {
        for start in [Vec2::new(-7.0, -2.5), Vec2::new(7.0, -2.0)] {
            let out = drive(angled_world(start), Scenario::Approach.waypoint(), &sim_config());
            assert_eq!(out.trace.last(), Some(&NavState::GateTraversed), "{:?}", out.trace);
            assert!(!out.trace.contains(&NavState::GateDriveToFarPost));

            let i = crossing_index(&out.path).unwrap();
            let heading = out.headings[i];
            assert!(
                angle_diff(heading, 0.0).abs() < 15.0,
                "from {start:?}: crossed the gate on heading {heading}"
            );

            let posts = [Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)];
            let clearance = out
                .path
                .iter()
                .flat_map(|p| posts.iter().map(move |post| (*p - *post).norm()))
                .fold(f64::INFINITY, f64::min);
            assert!(clearance > 0.8, "from {start:?}: passed {clearance} m from a post");
        }
    }

    #[test]
    fn approach_from_exit_side_detours_around_far_post() {
        let out = run_scenario(Scenario::WrongSide);
        assert_eq!(out.trace.last(), Some(&NavState::GateTraversed), "{:?}", out.trace);

        let far_turn = out.trace.iter().position(|s| *s == NavState::GateTurnToFarPost);
        let far_drive = out.trace.iter().position(|s| *s == NavState::GateDriveToFarPost);
        let through = out.trace.iter().rposition(|s| *s == NavState::GateDriveThrough);
        let (Some(far_turn), Some(far_drive), Some(through)) = (far_turn, far_drive, through)
        else {
            panic!("missing detour phases: {:?}", out.trace);
        };
        assert!(far_turn < far_drive && far_drive < through);

        // The naive approach heads north; the traverse is southbound.
        let final_heading = out.world.heading_deg();
        assert!(angle_diff(final_heading, 180.0).abs() < 20.0, "heading {final_heading}");
        assert!(out.world.rover_position().y < 0.0);
        let x = crossing_x(&out.path).unwrap();
        assert!(x.abs() < 0.9, "crossed the gate line at x = {x}");
        assert!(out.machine.is_correct_gate_dir());
    }

    #[test]
    fn blind_start_finds_gate_from_a_search_point() {
        let out = run_scenario(Scenario::Search);
        assert_eq!(out.trace.last(), Some(&NavState::GateTraversed), "{:?}", out.trace);
        assert!(out.machine.search_points().visited() >= 1);
    }

    #[test]
    fn empty_field_exhausts_search_points() {
        let out = run_scenario(Scenario::Empty);
        assert_eq!(out.trace.last(), Some(&NavState::GateNotFound), "{:?}", out.trace);
        let queue = out.machine.search_points();
        assert!(queue.is_exhausted());
        assert_eq!(queue.visited(), 8);
    }

    #[test]
    fn intermittent_frames_do_not_break_the_traverse() {
        let world = SimWorld::builder(FIELD_ORIGIN)
            .with_post(Vec2::new(-1.0, 0.0), LEFT_POST_ID)
            .with_post(Vec2::new(1.0, 0.0), LEFT_POST_ID + 1)
            .with_rover(Vec2::new(0.0, -8.0), 0.0)
            .with_camera(CameraModel {
                dropout_every: Some(5),
                ..CameraModel::default()
            })
            .build();
        let out = drive(world, Scenario::Approach.waypoint(), &sim_config());
        assert_eq!(out.trace.last(), Some(&NavState::GateTraversed), "{:?}", out.trace);
        assert!(!out.trace.contains(&NavState::GateNotFound));
    }

    #[test]
    fn lone_post_reseeds_search_around_it() {
        let world = SimWorld::builder(FIELD_ORIGIN)
            .with_post(Vec2::new(0.0, 0.0), LEFT_POST_ID)
            .with_rover(Vec2::new(0.0, -8.0), 0.0)
            .build();
        let waypoint = Scenario::Approach.waypoint();
        let config = sim_config();
        let mut world = world;
        let mut env = Environment::new(&config.environment).unwrap();
        let mut machine = gate_factory(&config.gate, &waypoint).unwrap();
        let initial = machine.search_points().remaining();

        let mut drove = false;
        for _ in 0..200 {
            let frame = world.observe();
            env.set_targets(frame.targets);
            env.update_targets(&frame.odometry, Some(&waypoint));
            let course = CourseSnapshot::new(frame.odometry, Some(&waypoint));
            let state = machine.run(&course, &mut env);
            world.apply(&machine.drive_target());
            drove |= state == NavState::GateDrive;
            if drove && state == NavState::GateSpin {
                break;
            }
        }
        assert!(drove);
        assert_eq!(machine.state(), NavState::GateSpin);
        assert_eq!(machine.search_points().remaining(), initial * 2);

        let post = world.post_odometry(LEFT_POST_ID).unwrap();
        let first = machine.search_points().iter().next().copied().unwrap();
        assert!((post.distance_to(&first) - config.gate.search_point_spacing_m).abs() < 1.0);
    }
}
