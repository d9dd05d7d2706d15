//! Blocked evaluator.
//!
//! Applies distance [`Thresholds`] to the classifier's [`ZoneDistances`].  A
//! zone is blocked when its nearest obstacle is strictly closer than the
//! threshold; an empty zone (`INFINITY`) is never blocked.

use serde::{Deserialize, Serialize};
use sweepnav_types::{BlockedFlags, NavError, ZoneDistances};

/// Default front threshold (50 cm).
pub const DEFAULT_FRONT_THRESHOLD_MM: f32 = 500.0;
/// Default side threshold (40 cm).
pub const DEFAULT_SIDE_THRESHOLD_MM: f32 = 400.0;

/// Blocking distances in millimetres.  Fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_front_mm")]
    pub front_mm: f32,
    #[serde(default = "default_side_mm")]
    pub side_mm: f32,
}

fn default_front_mm() -> f32 {
    DEFAULT_FRONT_THRESHOLD_MM
}
fn default_side_mm() -> f32 {
    DEFAULT_SIDE_THRESHOLD_MM
}

impl Thresholds {
    pub fn new(front_mm: f32, side_mm: f32) -> Self {
        Self { front_mm, side_mm }
    }

    /// Reject thresholds that are not finite and positive.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::InvalidConfig`] naming the offending threshold.
    pub fn validate(&self) -> Result<(), NavError> {
        for (name, value) in [("front", self.front_mm), ("side", self.side_mm)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(NavError::InvalidConfig(format!(
                    "{name} threshold must be a positive distance, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            front_mm: DEFAULT_FRONT_THRESHOLD_MM,
            side_mm: DEFAULT_SIDE_THRESHOLD_MM,
        }
    }
}

/// Derive per-zone blocked flags.
pub fn evaluate(zones: ZoneDistances, thresholds: Thresholds) -> BlockedFlags {
    BlockedFlags {
        front: zones.front < thresholds.front_mm,
        left: zones.left < thresholds.side_mm,
        right: zones.right < thresholds.side_mm,
    }
}
