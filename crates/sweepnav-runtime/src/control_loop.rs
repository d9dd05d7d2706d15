//! [`ControlLoop`] – the fixed-cadence avoidance cycle.
//!
//! Each cycle:
//!
//! 1. **Acquire** – request one sweep from the [`SweepProvider`].  On failure
//!    the rest of the cycle is skipped: nothing is computed, nothing is
//!    dispatched, and nothing from an earlier cycle is reused.
//! 2. **Classify** – reduce the sweep to per-zone nearest distances.
//! 3. **Evaluate** – compare the distances against the [`Thresholds`].
//! 4. **Decide** – run the [policy table][crate::policy].
//! 5. **Dispatch** – send the command's byte through the
//!    [`CommandDispatcher`].  A failed send is logged and otherwise ignored.
//! 6. **Sleep** – wait the fixed cycle interval.
//!
//! Every cycle runs inside an `info`-level `cycle` span carrying the cycle
//! number and, once decided, the command.
//!
//! The loop is single-threaded and blocking.  Between cycles it carries only
//! its collaborators, its configuration and diagnostic counters.
//!
//! # Example
//!
//! ```rust
//! use sweepnav_hal::sim::{RecordingDispatcher, SimSweepProvider, scenarios};
//! use sweepnav_runtime::control_loop::{ControlLoop, ControlLoopConfig, CycleOutcome};
//! use sweepnav_types::Command;
//!
//! let recorder = RecordingDispatcher::new();
//! let mut control = ControlLoop::new(
//!     ControlLoopConfig::default(),
//!     Box::new(SimSweepProvider::repeating(scenarios::left_obstacle())),
//!     Box::new(recorder.clone()),
//! );
//!
//! assert_eq!(control.run_cycle(), CycleOutcome::Dispatched(Command::Right));
//! assert_eq!(recorder.sent(), b"R");
//! ```

use std::thread;
use std::time::Duration;

use sweepnav_hal::{CommandDispatcher, SweepProvider};
use sweepnav_perception::{Thresholds, ZoneClassifier, ZoneLayout, evaluate};
use sweepnav_types::{BlockedFlags, Command, NavError, SweepReading, ZoneDistances};
use tracing::{debug, field, info, info_span, warn};

use crate::policy::decide;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default pause between two cycles.
pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_millis(60);

/// Configuration bundle for [`ControlLoop`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlLoopConfig {
    /// Blocking distances.
    pub thresholds: Thresholds,
    /// Angular bands of the three zones.
    pub layout: ZoneLayout,
    /// Sleep after every cycle.
    pub interval: Duration,
}

impl Default for ControlLoopConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            layout: ZoneLayout::default(),
            interval: DEFAULT_CYCLE_INTERVAL,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Everything derived from one sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub zones: ZoneDistances,
    pub flags: BlockedFlags,
    pub command: Command,
}

/// The pure classify → evaluate → decide chain.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pipeline {
    classifier: ZoneClassifier,
    thresholds: Thresholds,
}

impl Pipeline {
    pub fn new(layout: ZoneLayout, thresholds: Thresholds) -> Self {
        Self {
            classifier: ZoneClassifier::new(layout),
            thresholds,
        }
    }

    /// Run the whole chain on one sweep.
    pub fn assess(&self, readings: &[SweepReading]) -> Assessment {
        let zones = self.classifier.classify(readings);
        let flags = evaluate(zones, self.thresholds);
        let command = decide(flags);
        Assessment {
            zones,
            flags,
            command,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ControlLoop
// ─────────────────────────────────────────────────────────────────────────────

/// What happened during one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The sensor produced no sweep; nothing was dispatched.
    Skipped,
    /// The command was decided and delivered.
    Dispatched(Command),
    /// The command was decided but the transport rejected it.
    DispatchFailed(Command),
}

/// Running counters, for diagnostics only.  They never influence a decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub cycles: u64,
    pub skipped: u64,
    pub dispatched: u64,
    pub dispatch_failures: u64,
}

/// The avoidance orchestrator.
///
/// Owns the sensor and the transport.  Call [`ControlLoop::run`] to drive it
/// forever, [`ControlLoop::run_while`] to drive it until a predicate says
/// stop, or [`ControlLoop::run_cycle`] to advance it by exactly one cycle
/// without sleeping.
pub struct ControlLoop {
    sensor: Box<dyn SweepProvider>,
    dispatcher: Box<dyn CommandDispatcher>,
    pipeline: Pipeline,
    interval: Duration,
    stats: CycleStats,
}

impl ControlLoop {
    pub fn new(
        config: ControlLoopConfig,
        sensor: Box<dyn SweepProvider>,
        dispatcher: Box<dyn CommandDispatcher>,
    ) -> Self {
        info!(
            sensor = sensor.id(),
            transport = dispatcher.id(),
            front_mm = config.thresholds.front_mm,
            side_mm = config.thresholds.side_mm,
            interval_ms = config.interval.as_millis() as u64,
            "control loop configured"
        );
        Self {
            sensor,
            dispatcher,
            pipeline: Pipeline::new(config.layout, config.thresholds),
            interval: config.interval,
            stats: CycleStats::default(),
        }
    }

    /// Counters accumulated since construction.
    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    /// Execute one cycle, without the trailing sleep.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        self.stats.cycles += 1;
        let span = info_span!("cycle", n = self.stats.cycles, command = field::Empty);
        let _entered = span.enter();

        let readings = match self.sensor.acquire_sweep() {
            Ok(readings) => readings,
            Err(e) => {
                // The sensor reports its own faults; the loop just moves on.
                debug!(error = %e, "no sweep this cycle; skipping");
                self.stats.skipped += 1;
                return CycleOutcome::Skipped;
            }
        };

        let assessment = self.pipeline.assess(&readings);
        debug!(
            samples = readings.len(),
            front_mm = assessment.zones.front,
            left_mm = assessment.zones.left,
            right_mm = assessment.zones.right,
            status = %assessment.flags,
            command = %assessment.command,
            "cycle decided"
        );
        span.record("command", field::display(assessment.command));

        match self.dispatch(assessment.command) {
            Ok(()) => {
                info!(
                    command = %assessment.command,
                    byte = %char::from(assessment.command.as_byte()),
                    "command sent"
                );
                self.stats.dispatched += 1;
                CycleOutcome::Dispatched(assessment.command)
            }
            Err(e) => {
                warn!(error = %e, command = %assessment.command, "command dispatch failed");
                self.stats.dispatch_failures += 1;
                CycleOutcome::DispatchFailed(assessment.command)
            }
        }
    }

    /// Cycle at the configured cadence while `keep_running` returns `true`.
    ///
    /// The predicate is checked before every cycle.
    pub fn run_while(&mut self, mut keep_running: impl FnMut() -> bool) {
        while keep_running() {
            self.run_cycle();
            thread::sleep(self.interval);
        }
        info!(stats = ?self.stats, "control loop stopped");
    }

    /// Cycle at the configured cadence until the process ends.
    pub fn run(&mut self) {
        self.run_while(|| true);
    }

    /// Send a single `Stop` outside the regular cadence.
    ///
    /// # Errors
    ///
    /// Returns the transport's [`NavError::Dispatch`].
    pub fn halt(&mut self) -> Result<(), NavError> {
        self.dispatch(Command::Stop)
    }

    fn dispatch(&mut self, command: Command) -> Result<(), NavError> {
        self.dispatcher.send(command.as_byte())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;
    use sweepnav_hal::sim::{RecordingDispatcher, SimSweepProvider, scenarios};
    use tracing::Subscriber;
    use tracing::field::{Field, Visit};
    use tracing::span::{Attributes, Id, Record};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    fn control_with(sensor: SimSweepProvider) -> (ControlLoop, RecordingDispatcher) {
        let recorder = RecordingDispatcher::new();
        let config = ControlLoopConfig {
            interval: Duration::ZERO,
            ..ControlLoopConfig::default()
        };
        let control = ControlLoop::new(config, Box::new(sensor), Box::new(recorder.clone()));
        (control, recorder)
    }

    #[test]
    fn scenario_left_obstacle_turns_right() {
        let assessment = Pipeline::default().assess(&scenarios::left_obstacle());
        assert_eq!(assessment.zones.front, 1500.0);
        assert_eq!(assessment.zones.left, 200.0);
        assert_eq!(assessment.flags, BlockedFlags::new(false, true, false));
        assert_eq!(assessment.command, Command::Right);

        let (mut control, recorder) =
            control_with(SimSweepProvider::repeating(scenarios::left_obstacle()));
        assert_eq!(control.run_cycle(), CycleOutcome::Dispatched(Command::Right));
        assert_eq!(recorder.sent(), b"R");
    }

    #[test]
    fn scenario_boxed_in_stops() {
        let (mut control, recorder) =
            control_with(SimSweepProvider::repeating(scenarios::boxed_in()));
        assert_eq!(control.run_cycle(), CycleOutcome::Dispatched(Command::Stop));
        assert_eq!(recorder.sent(), b"S");
    }

    #[test]
    fn scenario_open_field_goes_forward() {
        let (mut control, recorder) =
            control_with(SimSweepProvider::repeating(scenarios::open_field()));
        assert_eq!(control.run_cycle(), CycleOutcome::Dispatched(Command::Forward));
        assert_eq!(recorder.sent(), b"F");
    }

    #[test]
    fn scenario_front_wall_without_side_returns_turns_left() {
        let assessment = Pipeline::default().assess(&scenarios::front_wall());
        assert!(assessment.zones.left.is_infinite());
        assert!(assessment.zones.right.is_infinite());
        assert_eq!(assessment.flags, BlockedFlags::new(true, false, false));

        let (mut control, recorder) =
            control_with(SimSweepProvider::repeating(scenarios::front_wall()));
        assert_eq!(control.run_cycle(), CycleOutcome::Dispatched(Command::Left));
        assert_eq!(recorder.sent(), b"L");
    }

    #[test]
    fn acquisition_failure_dispatches_nothing() {
        let sensor = SimSweepProvider::new()
            .then_sweep(scenarios::boxed_in())
            .then_fail("usb reset")
            .then_sweep(scenarios::open_field());
        let (mut control, recorder) = control_with(sensor);

        assert_eq!(control.run_cycle(), CycleOutcome::Dispatched(Command::Stop));
        assert_eq!(control.run_cycle(), CycleOutcome::Skipped);
        // Nothing from the previous cycle is re-sent.
        assert_eq!(recorder.sent(), b"S");
        assert_eq!(recorder.attempts(), 1);

        assert_eq!(control.run_cycle(), CycleOutcome::Dispatched(Command::Forward));
        assert_eq!(recorder.sent(), b"SF");
    }

    #[test]
    fn dispatch_failure_does_not_stop_the_loop() {
        let (mut control, recorder) =
            control_with(SimSweepProvider::repeating(scenarios::open_field()));
        recorder.set_failing(true);
        assert_eq!(control.run_cycle(), CycleOutcome::DispatchFailed(Command::Forward));
        // Not retried within the cycle.
        assert_eq!(recorder.attempts(), 1);

        recorder.set_failing(false);
        assert_eq!(control.run_cycle(), CycleOutcome::Dispatched(Command::Forward));
        assert_eq!(
            control.stats(),
            CycleStats {
                cycles: 2,
                skipped: 0,
                dispatched: 1,
                dispatch_failures: 1,
            }
        );
    }

    #[test]
    fn run_while_checks_predicate_before_each_cycle() {
        let sensor = SimSweepProvider::new()
            .then_fail("warming up")
            .then_sweep(scenarios::left_obstacle());
        let (mut control, recorder) = control_with(sensor);

        let mut remaining = 4;
        control.run_while(|| {
            remaining -= 1;
            remaining >= 0
        });

        assert_eq!(control.stats().cycles, 4);
        assert_eq!(control.stats().skipped, 1);
        assert_eq!(recorder.sent(), b"RRR");
    }

    #[test]
    fn run_while_sleeps_between_cycles_even_when_skipped() {
        let recorder = RecordingDispatcher::new();
        let config = ControlLoopConfig {
            interval: Duration::from_millis(5),
            ..ControlLoopConfig::default()
        };
        let mut control = ControlLoop::new(
            config,
            Box::new(SimSweepProvider::new()),
            Box::new(recorder.clone()),
        );

        let started = Instant::now();
        let mut cycles = 0;
        control.run_while(|| {
            cycles += 1;
            cycles <= 3
        });

        assert!(started.elapsed() >= Duration::from_millis(15));
        assert_eq!(control.stats().skipped, 3);
        assert!(recorder.sent().is_empty());
    }

    #[test]
    fn custom_thresholds_flow_through_pipeline() {
        let pipeline = Pipeline::new(ZoneLayout::default(), Thresholds::new(2000.0, 400.0));
        // 1000 mm ahead now counts as blocked; sides stay clear.
        let assessment = pipeline.assess(&scenarios::open_field());
        assert_eq!(assessment.command, Command::Left);
    }

    #[test]
    fn halt_sends_stop_byte() {
        let (mut control, recorder) =
            control_with(SimSweepProvider::repeating(scenarios::open_field()));
        control.halt().unwrap();
        assert_eq!(recorder.sent(), b"S");
    }

    // ── span capture ─────────────────────────────────────────────────────

    #[derive(Debug)]
    struct CapturedSpan {
        id: Id,
        name: &'static str,
        fields: Vec<(String, String)>,
    }

    impl CapturedSpan {
        fn field(&self, name: &str) -> Option<&str> {
            self.fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        }
    }

    struct FieldList<'a>(&'a mut Vec<(String, String)>);

    impl Visit for FieldList<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            self.0.push((field.name().to_string(), format!("{value:?}")));
        }
    }

    #[derive(Clone, Default)]
    struct SpanCapture(Arc<Mutex<Vec<CapturedSpan>>>);

    impl<S: Subscriber> Layer<S> for SpanCapture {
        fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, _ctx: Context<'_, S>) {
            let mut fields = Vec::new();
            attrs.record(&mut FieldList(&mut fields));
            self.0.lock().unwrap().push(CapturedSpan {
                id: id.clone(),
                name: attrs.metadata().name(),
                fields,
            });
        }

        fn on_record(&self, id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
            let mut spans = self.0.lock().unwrap();
            if let Some(span) = spans.iter_mut().rev().find(|s| &s.id == id) {
                values.record(&mut FieldList(&mut span.fields));
            }
        }
    }

    #[test]
    fn each_cycle_opens_a_span_with_number_and_command() {
        let capture = SpanCapture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            let sensor = SimSweepProvider::new()
                .then_sweep(scenarios::left_obstacle())
                .then_fail("usb reset");
            let (mut control, _recorder) = control_with(sensor);
            control.run_cycle();
            control.run_cycle();
        });

        let spans = capture.0.lock().unwrap();
        let cycles: Vec<&CapturedSpan> = spans.iter().filter(|s| s.name == "cycle").collect();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].field("n"), Some("1"));
        assert_eq!(cycles[0].field("command"), Some("RIGHT"));
        assert_eq!(cycles[1].field("n"), Some("2"));
        // Skipped cycles never decide a command.
        assert_eq!(cycles[1].field("command"), None);
    }
}
