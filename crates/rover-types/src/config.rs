//! Immutable navigation configuration.
//!
//! Built once at startup (usually deserialised from TOML by the CLI) and
//! handed to the `Environment` and gate state machine, which keep their own
//! copies.  [`RoverConfig::validate`] must pass before either is built; both
//! constructors call it so that a bad threshold fails at construction rather
//! than mid-maneuver.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

// ────────────────────────────────────────────────────────────────────────────
// Environment (sensor fusion) settings
// ────────────────────────────────────────────────────────────────────────────

/// Debounce and filtering parameters for post tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Max bearing change (degrees) for a detection to match the cached post.
    #[serde(default = "default_bearing_tolerance")]
    pub bearing_tolerance_deg: f64,

    /// Max distance change (metres) for a detection to match the cached post.
    #[serde(default = "default_distance_tolerance")]
    pub distance_tolerance_m: f64,

    /// Consecutive misses tolerated before a post is dropped (cycles).
    #[serde(default = "default_miss_threshold")]
    pub miss_threshold: u32,

    /// Number of samples held by each bearing/distance filter.
    #[serde(default = "default_filter_window")]
    pub filter_window: usize,

    /// Fraction of the sorted window averaged by the filter (0, 1].
    #[serde(default = "default_filter_proportion")]
    pub filter_proportion: f64,

    /// Samples required before a filter is considered ready.
    #[serde(default = "default_filter_min_samples")]
    pub filter_min_samples: usize,
}

fn default_bearing_tolerance() -> f64 {
    15.0
}
fn default_distance_tolerance() -> f64 {
    1.0
}
fn default_miss_threshold() -> u32 {
    5
}
fn default_filter_window() -> usize {
    5
}
fn default_filter_proportion() -> f64 {
    0.6
}
fn default_filter_min_samples() -> usize {
    3
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            bearing_tolerance_deg: default_bearing_tolerance(),
            distance_tolerance_m: default_distance_tolerance(),
            miss_threshold: default_miss_threshold(),
            filter_window: default_filter_window(),
            filter_proportion: default_filter_proportion(),
            filter_min_samples: default_filter_min_samples(),
        }
    }
}

impl EnvironmentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("environment.bearing_tolerance_deg", self.bearing_tolerance_deg)?;
        positive("environment.distance_tolerance_m", self.distance_tolerance_m)?;
        if self.filter_window == 0 {
            return Err(invalid("environment.filter_window", "must be at least 1"));
        }
        if !(self.filter_proportion > 0.0 && self.filter_proportion <= 1.0) {
            return Err(invalid("environment.filter_proportion", "must be in (0, 1]"));
        }
        if self.filter_min_samples == 0 || self.filter_min_samples > self.filter_window {
            return Err(invalid(
                "environment.filter_min_samples",
                "must be between 1 and filter_window",
            ));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Gate traversal settings
// ────────────────────────────────────────────────────────────────────────────

/// Search-pattern variant used to lay out fallback search points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateVariant {
    /// Rings of N/E/S/W points around the search centre.
    #[default]
    Diamond,
    /// Square spiral expanding outward from the search centre.
    Spiral,
}

impl std::fmt::Display for GateVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateVariant::Diamond => write!(f, "diamond"),
            GateVariant::Spiral => write!(f, "spiral"),
        }
    }
}

impl std::str::FromStr for GateVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "diamond" => Ok(GateVariant::Diamond),
            "spiral" => Ok(GateVariant::Spiral),
            other => Err(invalid("gate.variant", &format!("unknown variant `{other}`"))),
        }
    }
}

/// Maneuver tolerances and geometry for the gate state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub variant: GateVariant,

    /// Heading increment between spin stops (degrees).
    #[serde(default = "default_spin_step")]
    pub spin_step_deg: f64,

    /// Total arc swept before a spin is considered exhausted (degrees).
    #[serde(default = "default_spin_arc")]
    pub spin_arc_deg: f64,

    /// Heading error accepted as "facing" a target (degrees).
    #[serde(default = "default_turn_tolerance")]
    pub turn_tolerance_deg: f64,

    /// Heading error while driving that forces a re-turn (degrees).
    #[serde(default = "default_off_course_tolerance")]
    pub off_course_tolerance_deg: f64,

    /// Distance at which a point counts as reached (metres).
    #[serde(default = "default_arrival_tolerance")]
    pub arrival_tolerance_m: f64,

    /// How close the rover drives to a lone post before searching around it.
    #[serde(default = "default_post_approach_dist")]
    pub post_approach_dist_m: f64,

    /// Distance of the entry/exit points from the gate centre (metres).
    #[serde(default = "default_gate_standoff")]
    pub gate_standoff_m: f64,

    /// Clearance past the far post on a wrong-side detour (metres).
    #[serde(default = "default_gate_adjustment_dist")]
    pub gate_adjustment_dist_m: f64,

    /// Spacing between consecutive search points (metres).
    #[serde(default = "default_search_point_spacing")]
    pub search_point_spacing_m: f64,

    /// Rings (diamond) or revolutions (spiral) of search points to generate.
    #[serde(default = "default_search_rings")]
    pub search_rings: usize,

    /// Upper bound on queued search points.
    #[serde(default = "default_max_search_points")]
    pub max_search_points: usize,
}

fn default_spin_step() -> f64 {
    30.0
}
fn default_spin_arc() -> f64 {
    360.0
}
fn default_turn_tolerance() -> f64 {
    5.0
}
fn default_off_course_tolerance() -> f64 {
    15.0
}
fn default_arrival_tolerance() -> f64 {
    0.5
}
fn default_post_approach_dist() -> f64 {
    2.0
}
fn default_gate_standoff() -> f64 {
    3.0
}
fn default_gate_adjustment_dist() -> f64 {
    1.5
}
fn default_search_point_spacing() -> f64 {
    3.0
}
fn default_search_rings() -> usize {
    2
}
fn default_max_search_points() -> usize {
    16
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            variant: GateVariant::default(),
            spin_step_deg: default_spin_step(),
            spin_arc_deg: default_spin_arc(),
            turn_tolerance_deg: default_turn_tolerance(),
            off_course_tolerance_deg: default_off_course_tolerance(),
            arrival_tolerance_m: default_arrival_tolerance(),
            post_approach_dist_m: default_post_approach_dist(),
            gate_standoff_m: default_gate_standoff(),
            gate_adjustment_dist_m: default_gate_adjustment_dist(),
            search_point_spacing_m: default_search_point_spacing(),
            search_rings: default_search_rings(),
            max_search_points: default_max_search_points(),
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("gate.spin_step_deg", self.spin_step_deg)?;
        positive("gate.spin_arc_deg", self.spin_arc_deg)?;
        if self.spin_step_deg > self.spin_arc_deg {
            return Err(invalid("gate.spin_step_deg", "must not exceed spin_arc_deg"));
        }
        positive("gate.turn_tolerance_deg", self.turn_tolerance_deg)?;
        if self.off_course_tolerance_deg < self.turn_tolerance_deg {
            return Err(invalid(
                "gate.off_course_tolerance_deg",
                "must be at least turn_tolerance_deg",
            ));
        }
        positive("gate.arrival_tolerance_m", self.arrival_tolerance_m)?;
        positive("gate.post_approach_dist_m", self.post_approach_dist_m)?;
        positive("gate.gate_standoff_m", self.gate_standoff_m)?;
        positive("gate.gate_adjustment_dist_m", self.gate_adjustment_dist_m)?;
        positive("gate.search_point_spacing_m", self.search_point_spacing_m)?;
        if self.max_search_points == 0 {
            return Err(invalid("gate.max_search_points", "must be at least 1"));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Root document
// ────────────────────────────────────────────────────────────────────────────

/// The complete navigation configuration document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoverConfig {
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub gate: GateConfig,
}

impl RoverConfig {
    /// Check every threshold; the first violation is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.environment.validate()?;
        self.gate.validate()
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, &format!("must be a positive finite number, got {value}")))
    }
}
