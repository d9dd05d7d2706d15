//! In-process simulation drivers for CI/CD testing without physical hardware.
//!
//! [`SimSweepProvider`] plays back scripted sweeps (and scripted failures),
//! [`RecordingDispatcher`] captures every command byte, and
//! [`LogDispatcher`] just logs what it would have sent.  Together they let the
//! full control loop run headless in tests and CI pipelines.
//!
//! # Example
//!
//! ```rust
//! use sweepnav_hal::sensor::SweepProvider;
//! use sweepnav_hal::sim::{SimSweepProvider, scenarios};
//!
//! let mut sensor = SimSweepProvider::new()
//!     .then_fail("lidar unplugged")
//!     .then_sweep(scenarios::open_field());
//!
//! assert!(sensor.acquire_sweep().is_err());
//! assert_eq!(sensor.acquire_sweep().unwrap().len(), 360);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use sweepnav_types::{Command, NavError, SweepReading};
use tracing::info;

use crate::dispatcher::{CommandDispatcher, dispatch_error};
use crate::sensor::SweepProvider;

// ────────────────────────────────────────────────────────────────────────────
// Canned sweeps
// ────────────────────────────────────────────────────────────────────────────

/// Canned sweeps for the classic avoidance situations.
pub mod scenarios {
    use sweepnav_types::SweepReading;

    const QUALITY: u8 = 47;

    /// One reading per integer bearing with the same range everywhere.
    pub fn uniform(range_mm: f32) -> Vec<SweepReading> {
        (0..360)
            .map(|deg| SweepReading::new(deg as f32, range_mm, QUALITY))
            .collect()
    }

    /// Nothing within reach in any direction.
    pub fn open_field() -> Vec<SweepReading> {
        uniform(1000.0)
    }

    /// Obstacles at 100 mm all around.
    pub fn boxed_in() -> Vec<SweepReading> {
        uniform(100.0)
    }

    /// Clear ahead, a close obstacle on the left between 60° and 120°.
    pub fn left_obstacle() -> Vec<SweepReading> {
        (0..360)
            .map(|deg| {
                let range = if deg > 60 && deg < 120 { 200.0 } else { 1500.0 };
                SweepReading::new(deg as f32, range, QUALITY)
            })
            .collect()
    }

    /// A wall straight ahead and no returns anywhere else.
    pub fn front_wall() -> Vec<SweepReading> {
        (-10..=10)
            .map(|deg| SweepReading::new(deg as f32, 100.0, QUALITY))
            .collect()
    }

    /// Look up a scenario by its configuration name.
    pub fn by_name(name: &str) -> Option<Vec<SweepReading>> {
        match name {
            "open_field" => Some(open_field()),
            "boxed_in" => Some(boxed_in()),
            "left_obstacle" => Some(left_obstacle()),
            "front_wall" => Some(front_wall()),
            _ => None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scripted sweep provider
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum SimStep {
    Sweep(Vec<SweepReading>),
    Fail(String),
}

/// A simulated range sensor that returns scripted sweeps in order.
///
/// Once the script is exhausted the last step repeats forever.  An empty
/// script fails every acquisition.
#[derive(Debug, Default)]
pub struct SimSweepProvider {
    script: VecDeque<SimStep>,
    last: Option<SimStep>,
}

impl SimSweepProvider {
    /// Create a provider with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider that returns `sweep` on every acquisition.
    pub fn repeating(sweep: Vec<SweepReading>) -> Self {
        Self::new().then_sweep(sweep)
    }

    /// Append a successful acquisition to the script.
    pub fn then_sweep(mut self, sweep: Vec<SweepReading>) -> Self {
        self.script.push_back(SimStep::Sweep(sweep));
        self
    }

    /// Append a failed acquisition to the script.
    pub fn then_fail(mut self, reason: impl Into<String>) -> Self {
        self.script.push_back(SimStep::Fail(reason.into()));
        self
    }
}

impl SweepProvider for SimSweepProvider {
    fn id(&self) -> &str {
        "sim"
    }

    fn acquire_sweep(&mut self) -> Result<Vec<SweepReading>, NavError> {
        if let Some(step) = self.script.pop_front() {
            self.last = Some(step);
        }
        match &self.last {
            Some(SimStep::Sweep(sweep)) => Ok(sweep.clone()),
            Some(SimStep::Fail(reason)) => Err(NavError::Acquisition {
                sensor: "sim".to_string(),
                details: reason.clone(),
            }),
            None => Err(NavError::Acquisition {
                sensor: "sim".to_string(),
                details: "no sweeps scripted".to_string(),
            }),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Recording dispatcher
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RecorderInner {
    sent: Vec<u8>,
    failing: bool,
    attempts: usize,
}

/// A simulated transport that records every byte it is asked to send.
///
/// Clones share the same record, so a test can keep one handle while the
/// control loop owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    inner: Arc<Mutex<RecorderInner>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail (`true`) or succeed (`false`).
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Bytes delivered successfully so far.
    pub fn sent(&self) -> Vec<u8> {
        self.lock().sent.clone()
    }

    /// Delivered bytes decoded back into commands.
    pub fn commands(&self) -> Vec<Command> {
        self.lock()
            .sent
            .iter()
            .filter_map(|b| Command::from_byte(*b))
            .collect()
    }

    /// Number of `send` calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecorderInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CommandDispatcher for RecordingDispatcher {
    fn id(&self) -> &str {
        "recording"
    }

    fn send(&mut self, byte: u8) -> Result<(), NavError> {
        let mut inner = self.lock();
        inner.attempts += 1;
        if inner.failing {
            return Err(dispatch_error("recording", "simulated transport failure"));
        }
        inner.sent.push(byte);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Logging stub
// ────────────────────────────────────────────────────────────────────────────

/// A stub transport that logs each command instead of sending it.
/// Always succeeds.
#[derive(Debug, Default)]
pub struct LogDispatcher;

impl CommandDispatcher for LogDispatcher {
    fn id(&self) -> &str {
        "log"
    }

    fn send(&mut self, byte: u8) -> Result<(), NavError> {
        info!(
            byte = %char::from(byte),
            command = ?Command::from_byte(byte),
            "would send command"
        );
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
