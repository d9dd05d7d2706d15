//! `sweepnav-runtime` – the avoidance loop.
//!
//! Wires perception and the hardware boundary into a fixed-cadence
//! sense → decide → act cycle.
//!
//! # Modules
//!
//! - [`policy`] – [`decide`][policy::decide]: the ordered rule table that maps
//!   blocked flags to a [`Command`][sweepnav_types::Command].
//! - [`control_loop`] – [`ControlLoop`][control_loop::ControlLoop]: owns the
//!   sensor and transport and runs acquire → classify → evaluate → decide →
//!   dispatch → sleep, once per interval.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP exporter for the
//!   per-cycle spans.

pub mod control_loop;
pub mod policy;
pub mod telemetry;

pub use control_loop::{
    Assessment, ControlLoop, ControlLoopConfig, CycleOutcome, CycleStats, DEFAULT_CYCLE_INTERVAL,
    Pipeline,
};
pub use policy::decide;
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
