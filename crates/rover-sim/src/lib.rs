//! `rover-sim` – headless simulation for exercising the navigation core
//! without hardware.
//!
//! # Modules
//!
//! - [`world`] – [`SimWorld`]: stationary gate posts, a forward camera with
//!   field of view, range and optional frame dropout, and rate-limited rover
//!   kinematics driven by [`rover_types::DriveTarget`].
//! - [`scenario`] – [`Scenario`] presets used by tests and the `gatenav`
//!   binary.

pub mod scenario;
pub mod world;

pub use scenario::Scenario;
pub use world::{CameraModel, SimPost, SimWorld, SimWorldBuilder};
