//! Local-tangent-plane geodesy for short-range rover navigation.
//!
//! Gate maneuvers span tens of metres, so an equirectangular projection
//! around a reference [`Odometry`] is accurate well below detection noise.
//! All bearings are compass bearings in degrees: 0 = north, increasing
//! clockwise.
//!
//! # Example
//!
//! ```rust
//! use rover_types::Odometry;
//!
//! let origin = Odometry::new(42.2936, -83.7166, 0.0);
//! let ahead = origin.offset(90.0, 10.0); // 10 m due east
//!
//! assert!((origin.distance_to(&ahead) - 10.0).abs() < 1e-6);
//! assert!((origin.bearing_to(&ahead) - 90.0).abs() < 1e-6);
//! ```

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the local projection (metres).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

// ────────────────────────────────────────────────────────────────────────────
// Angles
// ────────────────────────────────────────────────────────────────────────────

/// Wrap a bearing into `[0, 360)`.
pub fn normalize_bearing(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Signed smallest rotation from `from` to `to`, in `(-180, 180]`.
pub fn angle_diff(to: f64, from: f64) -> f64 {
    let d = normalize_bearing(to - from);
    if d > 180.0 { d - 360.0 } else { d }
}

// ────────────────────────────────────────────────────────────────────────────
// Vec2
// ────────────────────────────────────────────────────────────────────────────

/// A planar vector in metres.
///
/// In the world-aligned local frame `x` is east and `y` is north; in the
/// rover frame (see `Environment::left_post_relative`) `x` is forward and
/// `y` is left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn scale(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k)
    }

    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y
    }

    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector.
    pub fn normalized(self) -> Option<Self> {
        let n = self.norm();
        (n > f64::EPSILON).then(|| self.scale(1.0 / n))
    }

    /// Rotate a quarter turn clockwise (east/north frame: north → east).
    pub fn perp_cw(self) -> Self {
        Self::new(self.y, -self.x)
    }

    /// Compass bearing of this east/north vector.
    pub fn bearing_deg(self) -> f64 {
        normalize_bearing(self.x.atan2(self.y).to_degrees())
    }

    /// Unit east/north vector pointing along a compass bearing.
    pub fn from_bearing(bearing_deg: f64) -> Self {
        let rad = bearing_deg.to_radians();
        Self::new(rad.sin(), rad.cos())
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Odometry
// ────────────────────────────────────────────────────────────────────────────

/// Absolute rover pose (or a world-frame point when the bearing is unused).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Odometry {
    /// Latitude in decimal degrees.
    pub latitude_deg: f64,
    /// Longitude in decimal degrees.
    pub longitude_deg: f64,
    /// Heading as a compass bearing in degrees.
    pub bearing_deg: f64,
}

impl Odometry {
    pub fn new(latitude_deg: f64, longitude_deg: f64, bearing_deg: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            bearing_deg: normalize_bearing(bearing_deg),
        }
    }

    /// Metres per degree of longitude at this latitude.
    fn meters_per_lon_degree(&self) -> f64 {
        EARTH_RADIUS_M.to_radians() * self.latitude_deg.to_radians().cos()
    }

    /// Position of `self` in the east/north frame centred on `origin`.
    pub fn to_local(&self, origin: &Odometry) -> Vec2 {
        let north = (self.latitude_deg - origin.latitude_deg) * EARTH_RADIUS_M.to_radians();
        let east = (self.longitude_deg - origin.longitude_deg) * origin.meters_per_lon_degree();
        Vec2::new(east, north)
    }

    /// Inverse of [`Odometry::to_local`].  The returned bearing is the
    /// origin's bearing.
    pub fn from_local(origin: &Odometry, local: Vec2) -> Odometry {
        let lat = origin.latitude_deg + local.y / EARTH_RADIUS_M.to_radians();
        let lon = origin.longitude_deg + local.x / origin.meters_per_lon_degree();
        Odometry::new(lat, lon, origin.bearing_deg)
    }

    /// Project `distance_m` along the absolute `bearing_deg`, keeping this
    /// pose's heading.
    pub fn offset(&self, bearing_deg: f64, distance_m: f64) -> Odometry {
        Odometry::from_local(self, Vec2::from_bearing(bearing_deg).scale(distance_m))
    }

    /// Planar distance in metres.
    pub fn distance_to(&self, other: &Odometry) -> f64 {
        other.to_local(self).norm()
    }

    /// Compass bearing from `self` to `other`.
    pub fn bearing_to(&self, other: &Odometry) -> f64 {
        other.to_local(self).bearing_deg()
    }

    /// Point halfway between two positions (the bearing of `self` is kept).
    pub fn midpoint(&self, other: &Odometry) -> Odometry {
        Odometry::new(
            (self.latitude_deg + other.latitude_deg) / 2.0,
            (self.longitude_deg + other.longitude_deg) / 2.0,
            self.bearing_deg,
        )
    }

    /// Same position, new heading.
    pub fn with_bearing(&self, bearing_deg: f64) -> Odometry {
        Odometry::new(self.latitude_deg, self.longitude_deg, bearing_deg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Odometry {
        Odometry::new(38.4063, -110.7918, 0.0)
    }

    #[test]
    fn normalize_wraps_negative_and_large_values() {
        assert!((normalize_bearing(-90.0) - 270.0).abs() < 1e-9);
        assert!((normalize_bearing(725.0) - 5.0).abs() < 1e-9);
        assert_eq!(normalize_bearing(360.0), 0.0);
    }

    #[test]
    fn angle_diff_takes_the_short_way_round() {
        assert!((angle_diff(10.0, 350.0) - 20.0).abs() < 1e-9);
        assert!((angle_diff(350.0, 10.0) + 20.0).abs() < 1e-9);
        assert!((angle_diff(180.0, 0.0) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn offset_then_measure_recovers_distance_and_bearing() {
        let o = origin();
        for bearing in [0.0, 45.0, 135.0, 270.0, 359.0] {
            let p = o.offset(bearing, 7.5);
            assert!((o.distance_to(&p) - 7.5).abs() < 1e-6, "bearing {bearing}");
            assert!(angle_diff(o.bearing_to(&p), bearing).abs() < 1e-6);
        }
    }

    #[test]
    fn vectors_add_and_subtract_componentwise() {
        let a = Vec2::new(1.0, -2.0);
        let b = Vec2::new(0.5, 4.0);
        assert_eq!(a + b, Vec2::new(1.5, 2.0));
        assert_eq!(a - b, Vec2::new(0.5, -6.0));
        assert_eq!((a + b) - b, a);
    }

    #[test]
    fn local_frame_axes_are_east_and_north() {
        let o = origin();
        let north = o.offset(0.0, 5.0).to_local(&o);
        assert!(north.x.abs() < 1e-6);
        assert!((north.y - 5.0).abs() < 1e-6);

        let east = o.offset(90.0, 5.0).to_local(&o);
        assert!((east.x - 5.0).abs() < 1e-6);
        assert!(east.y.abs() < 1e-6);
    }

    #[test]
    fn midpoint_is_equidistant() {
        let o = origin();
        let a = o.offset(30.0, 4.0);
        let b = o.offset(120.0, 9.0);
        let m = a.midpoint(&b);
        assert!((m.distance_to(&a) - m.distance_to(&b)).abs() < 1e-6);
    }

    #[test]
    fn perp_cw_turns_north_into_east() {
        let v = Vec2::new(0.0, 1.0).perp_cw();
        assert!((v.bearing_deg() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn normalized_zero_vector_is_none() {
        assert!(Vec2::default().normalized().is_none());
    }
}
