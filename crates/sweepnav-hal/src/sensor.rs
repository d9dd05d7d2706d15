//! Generic `SweepProvider` trait for rotating range sensors.
//!
//! The control loop only ever talks to this trait, so a physical LiDAR, a
//! recorded replay or a scripted simulator can be swapped without touching
//! the decision logic.

use sweepnav_types::{NavError, SweepReading};

/// A source of complete range-sensor sweeps.
pub trait SweepProvider: Send {
    /// Stable identifier for this sensor, e.g. `"rplidar"` or `"replay"`.
    fn id(&self) -> &str;

    /// Block until one full sweep is available and return it.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Acquisition`] if no sweep could be produced this
    /// time.  Failures are expected to be transient; callers retry on their
    /// next cycle.
    fn acquire_sweep(&mut self) -> Result<Vec<SweepReading>, NavError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSensor {
        sweep: Vec<SweepReading>,
    }

    impl SweepProvider for FixedSensor {
        fn id(&self) -> &str {
            "fixed"
        }

        fn acquire_sweep(&mut self) -> Result<Vec<SweepReading>, NavError> {
            Ok(self.sweep.clone())
        }
    }

    #[test]
    fn trait_object_returns_fresh_sweep_each_call() {
        let mut sensor: Box<dyn SweepProvider> = Box::new(FixedSensor {
            sweep: vec![SweepReading::new(0.0, 120.0, 40)],
        });
        assert_eq!(sensor.id(), "fixed");
        let first = sensor.acquire_sweep().unwrap();
        let second = sensor.acquire_sweep().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }
}
