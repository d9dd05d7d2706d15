//! Zone classifier.
//!
//! Reduces a raw sweep to the nearest valid obstacle distance in each of the
//! three directional zones (front, left, right).
//!
//! Bearings are normalised into `[0, 360)` before classification.  Each zone
//! is a closed angular band; a band whose start lies after its end wraps
//! through 0° (the default front band `[350, 10]` covers `350..=360` and
//! `0..=10`).  Samples outside every band are ignored, as are samples without
//! a valid return.
//!
//! # Example
//!
//! ```rust
//! use sweepnav_perception::zones::classify;
//! use sweepnav_types::SweepReading;
//!
//! let sweep = vec![
//!     SweepReading::new(-5.0, 420.0, 47),  // front (normalises to 355°)
//!     SweepReading::new(90.0, 0.0, 0),     // left, but no return
//!     SweepReading::new(270.0, 900.0, 47), // right
//! ];
//!
//! let zones = classify(&sweep);
//! assert_eq!(zones.front, 420.0);
//! assert!(zones.left.is_infinite());
//! assert_eq!(zones.right, 900.0);
//! ```

use serde::{Deserialize, Serialize};
use sweepnav_types::{NavError, SweepReading, ZoneDistances};
use tracing::trace;

/// Degrees in one full sensor rotation.
pub const FULL_TURN_DEG: f32 = 360.0;

/// Map any finite bearing into `[0, 360)`.
pub fn normalize_bearing(deg: f32) -> f32 {
    let wrapped = deg.rem_euclid(FULL_TURN_DEG);
    // rem_euclid rounds tiny negative inputs up to exactly 360.
    if wrapped >= FULL_TURN_DEG { 0.0 } else { wrapped }
}

// ────────────────────────────────────────────────────────────────────────────
// ZoneBand
// ────────────────────────────────────────────────────────────────────────────

/// A closed angular band `[start_deg, end_deg]` in normalised degrees.
///
/// When `start_deg > end_deg` the band wraps through 0°.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneBand {
    pub start_deg: f32,
    pub end_deg: f32,
}

impl ZoneBand {
    pub const fn new(start_deg: f32, end_deg: f32) -> Self {
        Self { start_deg, end_deg }
    }

    /// `true` if the normalised `bearing` lies inside the band (bounds
    /// inclusive).
    pub fn contains(&self, bearing: f32) -> bool {
        if self.start_deg <= self.end_deg {
            bearing >= self.start_deg && bearing <= self.end_deg
        } else {
            bearing >= self.start_deg || bearing <= self.end_deg
        }
    }

    fn validate(&self, zone: &str) -> Result<(), NavError> {
        for bound in [self.start_deg, self.end_deg] {
            if !(0.0..=FULL_TURN_DEG).contains(&bound) {
                return Err(NavError::InvalidConfig(format!(
                    "{zone} zone bound {bound} is outside [0, 360]"
                )));
            }
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ZoneLayout
// ────────────────────────────────────────────────────────────────────────────

/// The three bands the classifier reduces a sweep into.
///
/// Bands missing from a deserialised layout take their default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneLayout {
    pub front: ZoneBand,
    pub left: ZoneBand,
    pub right: ZoneBand,
}

impl ZoneLayout {
    /// Check that every band bound lies in `[0, 360]`.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::InvalidConfig`] naming the first offending zone.
    pub fn validate(&self) -> Result<(), NavError> {
        self.front.validate("front")?;
        self.left.validate("left")?;
        self.right.validate("right")
    }
}

impl Default for ZoneLayout {
    fn default() -> Self {
        Self {
            front: ZoneBand::new(350.0, 10.0),
            left: ZoneBand::new(80.0, 100.0),
            right: ZoneBand::new(260.0, 280.0),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ZoneClassifier
// ────────────────────────────────────────────────────────────────────────────

/// Reduces a sweep into per-zone nearest distances using a [`ZoneLayout`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ZoneClassifier {
    layout: ZoneLayout,
}

impl ZoneClassifier {
    pub fn new(layout: ZoneLayout) -> Self {
        Self { layout }
    }

    /// Compute the nearest valid distance per zone.
    ///
    /// A min-reduction, so the order of `readings` does not matter.  Zones
    /// with no qualifying sample are `f32::INFINITY`.
    pub fn classify(&self, readings: &[SweepReading]) -> ZoneDistances {
        let mut zones = ZoneDistances::CLEAR;
        let mut skipped = 0usize;

        for reading in readings {
            if !reading.is_valid() {
                skipped += 1;
                continue;
            }
            let bearing = normalize_bearing(reading.bearing_deg);
            let range = reading.range_mm;

            if self.layout.front.contains(bearing) {
                zones.front = zones.front.min(range);
            }
            if self.layout.left.contains(bearing) {
                zones.left = zones.left.min(range);
            }
            if self.layout.right.contains(bearing) {
                zones.right = zones.right.min(range);
            }
        }

        trace!(
            samples = readings.len(),
            skipped,
            front = zones.front,
            left = zones.left,
            right = zones.right,
            "sweep classified"
        );
        zones
    }
}

/// Classify `readings` with the default zone layout.
pub fn classify(readings: &[SweepReading]) -> ZoneDistances {
    ZoneClassifier::default().classify(readings)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn r(bearing: f32, range: f32) -> SweepReading {
        SweepReading::new(bearing, range, 47)
    }

    #[test]
    fn normalize_wraps_negative_and_large_bearings() {
        assert_eq!(normalize_bearing(-10.0), 350.0);
        assert_eq!(normalize_bearing(370.0), 10.0);
        assert_eq!(normalize_bearing(720.0), 0.0);
        assert_eq!(normalize_bearing(-720.0), 0.0);
        assert_eq!(normalize_bearing(359.5), 359.5);
    }

    #[test]
    fn normalize_never_returns_full_turn() {
        let b = normalize_bearing(-1e-6);
        assert!((0.0..FULL_TURN_DEG).contains(&b));
    }

    #[test]
    fn front_band_wraps_through_zero() {
        let band = ZoneLayout::default().front;
        assert!(band.contains(0.0));
        assert!(band.contains(10.0));
        assert!(band.contains(350.0));
        assert!(band.contains(359.9));
        assert!(!band.contains(10.1));
        assert!(!band.contains(349.9));
    }

    #[test]
    fn side_band_bounds_are_inclusive() {
        let band = ZoneLayout::default().left;
        assert!(band.contains(80.0));
        assert!(band.contains(100.0));
        assert!(!band.contains(79.9));
        assert!(!band.contains(100.1));
    }

    #[test]
    fn empty_sweep_is_all_infinite() {
        assert_eq!(classify(&[]), ZoneDistances::CLEAR);
    }

    #[test]
    fn nearest_reading_wins_per_zone() {
        let zones = classify(&[
            r(0.0, 900.0),
            r(5.0, 450.0),
            r(355.0, 700.0),
            r(90.0, 300.0),
            r(85.0, 250.0),
            r(270.0, 1200.0),
        ]);
        assert_eq!(zones.front, 450.0);
        assert_eq!(zones.left, 250.0);
        assert_eq!(zones.right, 1200.0);
    }

    #[test]
    fn invalid_ranges_are_excluded() {
        let zones = classify(&[r(0.0, 0.0), r(1.0, -3.0), r(2.0, 800.0)]);
        assert_eq!(zones.front, 800.0);
    }

    #[test]
    fn bearings_outside_every_band_are_ignored() {
        let zones = classify(&[r(45.0, 10.0), r(180.0, 10.0), r(315.0, 10.0)]);
        assert_eq!(zones, ZoneDistances::CLEAR);
    }

    #[test]
    fn raw_bearings_are_normalised_before_banding() {
        let zones = classify(&[r(-90.0, 333.0), r(450.0, 444.0), r(-355.0, 555.0)]);
        assert_eq!(zones.right, 333.0); // -90 → 270
        assert_eq!(zones.left, 444.0); // 450 → 90
        assert_eq!(zones.front, 555.0); // -355 → 5
    }

    #[test]
    fn non_finite_samples_are_skipped() {
        let zones = classify(&[r(f32::NAN, 100.0), r(0.0, f32::NAN), r(0.0, 600.0)]);
        assert_eq!(zones.front, 600.0);
    }

    #[test]
    fn custom_layout_widens_field_of_regard() {
        let layout = ZoneLayout {
            front: ZoneBand::new(315.0, 45.0),
            left: ZoneBand::new(45.0, 135.0),
            right: ZoneBand::new(225.0, 315.0),
        };
        let zones = ZoneClassifier::new(layout).classify(&[r(30.0, 200.0), r(120.0, 300.0)]);
        assert_eq!(zones.front, 200.0);
        assert_eq!(zones.left, 300.0);
        assert!(zones.right.is_infinite());
    }

    #[test]
    fn layout_validation_rejects_out_of_range_bounds() {
        let mut layout = ZoneLayout::default();
        assert!(layout.validate().is_ok());
        layout.right = ZoneBand::new(260.0, 400.0);
        let err = layout.validate().unwrap_err();
        assert!(matches!(err, NavError::InvalidConfig(ref m) if m.contains("right")));
    }
}
