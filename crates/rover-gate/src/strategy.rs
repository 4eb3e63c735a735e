//! Traversal variants.
//!
//! All variants share the phase sequence of [`GateStateMachine`]; they only
//! differ in how fallback search points are laid out around a centre.  The
//! variant is picked once per search by [`gate_factory`].

use rover_types::{ConfigError, GateConfig, GateVariant, Odometry, Waypoint};
use tracing::debug;

use crate::machine::GateStateMachine;

/// Search-point geometry of one traversal variant.
pub trait TraversalStrategy: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Points to visit around `center`, nearest first, `spacing` metres apart.
    fn search_points(&self, center: &Odometry, spacing: f64) -> Vec<Odometry>;
}

// ────────────────────────────────────────────────────────────────────────────
// Diamond
// ────────────────────────────────────────────────────────────────────────────

/// Concentric rings of N/E/S/W points.
#[derive(Debug, Clone, Copy)]
pub struct DiamondSearch {
    pub rings: usize,
}

impl TraversalStrategy for DiamondSearch {
    fn name(&self) -> &str {
        "diamond"
    }

    fn search_points(&self, center: &Odometry, spacing: f64) -> Vec<Odometry> {
        (1..=self.rings)
            .flat_map(|ring| {
                let radius = ring as f64 * spacing;
                [0.0, 90.0, 180.0, 270.0].map(|bearing| center.offset(bearing, radius))
            })
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Spiral
// ────────────────────────────────────────────────────────────────────────────

/// Square spiral: legs of 1, 1, 2, 2, 3, 3 … spacings turning clockwise
/// from north.  Each revolution contributes four corners.
#[derive(Debug, Clone, Copy)]
pub struct SpiralSearch {
    pub revolutions: usize,
}

impl TraversalStrategy for SpiralSearch {
    fn name(&self) -> &str {
        "spiral"
    }

    fn search_points(&self, center: &Odometry, spacing: f64) -> Vec<Odometry> {
        let mut corner = *center;
        (0..self.revolutions * 4)
            .map(|leg| {
                let bearing = 90.0 * (leg % 4) as f64;
                let length = (leg / 2 + 1) as f64 * spacing;
                corner = corner.offset(bearing, length);
                corner
            })
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Factory
// ────────────────────────────────────────────────────────────────────────────

/// Strategy object for a configured variant.
pub fn strategy_for(config: &GateConfig) -> Box<dyn TraversalStrategy> {
    match config.variant {
        GateVariant::Diamond => Box::new(DiamondSearch {
            rings: config.search_rings,
        }),
        GateVariant::Spiral => Box::new(SpiralSearch {
            revolutions: config.search_rings,
        }),
    }
}

/// Build a gate state machine for `waypoint`, seeded with search points
/// around it.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the gate thresholds are out of range.
pub fn gate_factory(
    config: &GateConfig,
    waypoint: &Waypoint,
) -> Result<GateStateMachine, ConfigError> {
    config.validate()?;
    let strategy = strategy_for(config);
    debug!(variant = strategy.name(), waypoint_id = waypoint.id, "building gate state machine");
    Ok(GateStateMachine::new(config.clone(), strategy, waypoint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_types::{Vec2, angle_diff};

    fn center() -> Odometry {
        Odometry::new(38.4063, -110.7918, 0.0)
    }

    #[test]
    fn diamond_rings_are_evenly_spaced() {
        let pts = DiamondSearch { rings: 2 }.search_points(&center(), 3.0);
        assert_eq!(pts.len(), 8);
        for (i, p) in pts.iter().enumerate() {
            let expected = if i < 4 { 3.0 } else { 6.0 };
            assert!((center().distance_to(p) - expected).abs() < 1e-6);
        }
        assert!(angle_diff(center().bearing_to(&pts[1]), 90.0).abs() < 1e-6);
    }

    #[test]
    fn spiral_walks_outward() {
        let pts = SpiralSearch { revolutions: 2 }.search_points(&center(), 1.0);
        assert_eq!(pts.len(), 8);
        let local: Vec<Vec2> = pts.iter().map(|p| p.to_local(&center())).collect();
        // N1, E1, S2, W2, N3, E3, S4, W4
        let expected = [
            (0.0, 1.0),
            (1.0, 1.0),
            (1.0, -1.0),
            (-1.0, -1.0),
            (-1.0, 2.0),
            (2.0, 2.0),
            (2.0, -2.0),
            (-2.0, -2.0),
        ];
        for (got, (x, y)) in local.iter().zip(expected) {
            assert!((got.x - x).abs() < 1e-4 && (got.y - y).abs() < 1e-4, "{got:?}");
        }
    }

    #[test]
    fn factory_picks_configured_variant() {
        let wp = Waypoint::gate(center(), 4, 2.0);
        let mut cfg = GateConfig::default();
        cfg.variant = GateVariant::Spiral;
        let machine = gate_factory(&cfg, &wp).unwrap();
        assert_eq!(machine.strategy_name(), "spiral");
        assert_eq!(machine.search_points().remaining(), 8);
    }

    #[test]
    fn search_points_stay_inside_the_waypoint_radius() {
        let wp = Waypoint::gate(center(), 4, 2.0).with_search_radius(4.0);
        let machine = gate_factory(&GateConfig::default(), &wp).unwrap();
        let queue = machine.search_points();
        assert_eq!(queue.remaining(), 4);
        assert!(queue.iter().all(|p| center().distance_to(p) <= 4.0 + 1e-6));
    }

    #[test]
    fn factory_rejects_invalid_config() {
        let wp = Waypoint::gate(center(), 4, 2.0);
        let cfg = GateConfig {
            max_search_points: 0,
            ..GateConfig::default()
        };
        assert!(gate_factory(&cfg, &wp).is_err());
    }
}
