//! `rover-runtime` – the control-cycle driver around the navigation core.
//!
//! # Modules
//!
//! - [`nav_loop`] – [`NavLoop`]: owns the [`rover_perception::Environment`]
//!   and the active [`rover_gate::GateStateMachine`], and runs one fusion
//!   step plus one gate phase per [`NavLoop::tick`].
//! - [`telemetry`] – [`init_tracing`]: installs the global `tracing`
//!   subscriber with console output and optional OTLP span export.

pub mod nav_loop;
pub mod telemetry;

pub use nav_loop::{CycleOutput, NavLoop};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
