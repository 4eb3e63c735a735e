//! Canned gate layouts shared by tests and the `gatenav` binary.

use rover_types::{Odometry, Vec2, Waypoint};
use serde::{Deserialize, Serialize};

use crate::world::SimWorld;

/// Competition field the scenarios are anchored at.
pub const FIELD_ORIGIN: Odometry = Odometry {
    latitude_deg: 38.4063,
    longitude_deg: -110.7918,
    bearing_deg: 0.0,
};

/// Id of the post that must pass on the rover's left.
pub const LEFT_POST_ID: i32 = 4;

/// Distance between the two posts (metres).
pub const GATE_WIDTH_M: f64 = 2.0;

/// A named starting configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Rover 8 m south of an east-west gate, facing it, on the entry side.
    Approach,
    /// Same layout with the post ids swapped: the rover starts on the exit
    /// side and has to loop around the gate.
    WrongSide,
    /// Rover far outside camera range, facing away from the gate.
    Search,
    /// No posts at all; the search must give up.
    Empty,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Approach,
        Scenario::WrongSide,
        Scenario::Search,
        Scenario::Empty,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::Approach => "approach",
            Scenario::WrongSide => "wrong-side",
            Scenario::Search => "search",
            Scenario::Empty => "empty",
        }
    }

    /// The gate waypoint handed to the navigation core.
    pub fn waypoint(self) -> Waypoint {
        Waypoint::gate(FIELD_ORIGIN, LEFT_POST_ID, GATE_WIDTH_M)
    }

    /// Build the simulated world for this scenario.
    pub fn world(self) -> SimWorld {
        let half = GATE_WIDTH_M / 2.0;
        let west = Vec2::new(-half, 0.0);
        let east = Vec2::new(half, 0.0);
        let builder = SimWorld::builder(FIELD_ORIGIN);
        let builder = match self {
            Scenario::Approach => builder
                .with_post(west, LEFT_POST_ID)
                .with_post(east, LEFT_POST_ID + 1)
                .with_rover(Vec2::new(0.0, -8.0), 0.0),
            Scenario::WrongSide => builder
                .with_post(east, LEFT_POST_ID)
                .with_post(west, LEFT_POST_ID + 1)
                .with_rover(Vec2::new(0.0, -8.0), 0.0),
            Scenario::Search => builder
                .with_post(west, LEFT_POST_ID)
                .with_post(east, LEFT_POST_ID + 1)
                .with_rover(Vec2::new(0.0, -20.0), 180.0),
            Scenario::Empty => builder.with_rover(Vec2::new(0.0, -8.0), 0.0),
        };
        builder.build()
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|sc| sc.name() == s.trim())
            .ok_or_else(|| {
                let names: Vec<&str> = Scenario::ALL.iter().map(|sc| sc.name()).collect();
                format!("unknown scenario `{s}` (expected one of: {})", names.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for sc in Scenario::ALL {
            assert_eq!(sc.name().parse::<Scenario>().unwrap(), sc);
        }
        assert!("sideways".parse::<Scenario>().is_err());
    }

    #[test]
    fn approach_sees_both_posts_immediately() {
        let mut world = Scenario::Approach.world();
        let frame = world.observe();
        assert!(frame.targets.left.is_detected());
        assert!(frame.targets.right.is_detected());
    }

    #[test]
    fn wrong_side_puts_left_post_in_the_east() {
        let world = Scenario::WrongSide.world();
        let left = world.post_odometry(LEFT_POST_ID).unwrap();
        assert!(left.to_local(&FIELD_ORIGIN).x > 0.0);
    }

    #[test]
    fn search_starts_blind() {
        let mut world = Scenario::Search.world();
        let frame = world.observe();
        assert!(!frame.targets.left.is_detected());
        assert!(!frame.targets.right.is_detected());
    }

    #[test]
    fn empty_world_has_no_posts() {
        assert!(Scenario::Empty.world().posts().is_empty());
    }
}
