//! `sweepnav-hal` – hardware boundary.
//!
//! Capability traits for the two collaborators the control loop depends on,
//! plus the drivers that implement them.
//!
//! # Modules
//!
//! - [`sensor`] – [`SweepProvider`][sensor::SweepProvider]: anything that can
//!   hand over one full range-sensor sweep per call.
//! - [`dispatcher`] – [`CommandDispatcher`][dispatcher::CommandDispatcher]:
//!   anything that can deliver one command byte per call.
//! - [`serial`] – [`SerialDispatcher`][serial::SerialDispatcher]: UART link to
//!   the motor controller.
//! - [`i2c`] – `I2cDispatcher` (Linux only): `i2c-dev` link to the motor
//!   controller.
//! - [`rplidar`] – HQ node decoding, sweep assembly and the serial `SCAN`
//!   protocol for RPLIDAR-style rotating sensors.
//! - [`replay`] – [`ReplaySweepProvider`][replay::ReplaySweepProvider]:
//!   recorded sweeps from a JSON-lines file.
//! - [`sim`] – scripted sensor, recording transport and logging stub for
//!   headless runs.

pub mod dispatcher;
pub mod i2c;
pub mod replay;
pub mod rplidar;
pub mod sensor;
pub mod serial;
pub mod sim;

pub use dispatcher::CommandDispatcher;
pub use sensor::SweepProvider;
