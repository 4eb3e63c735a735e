//! `rover-perception` – gate-post sensor fusion.
//!
//! Turns noisy, intermittent per-frame vision detections into stable,
//! world-frame post locations.
//!
//! # Modules
//!
//! - [`filter`] – [`Filter`][filter::Filter]: trimmed moving-window mean used
//!   to smooth bearing and distance readings.
//! - [`environment`] – [`Environment`][environment::Environment]: per-post
//!   hit/miss debounce, detection cache, filtered bearing/distance and the
//!   derived world-frame post locations.

pub mod environment;
pub mod filter;

pub use environment::{Environment, PostTracker};
pub use filter::Filter;
