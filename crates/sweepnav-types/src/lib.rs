use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One range/bearing sample from a rotating range sensor.
///
/// Producers do not normalize `bearing_deg`; it may lie outside `[0, 360)`.
/// A `range_mm <= 0` marks a sample with no return.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepReading {
    /// Bearing of the sample in degrees, clockwise from the robot's nose.
    pub bearing_deg: f32,
    /// Measured range in millimetres.
    pub range_mm: f32,
    /// Signal quality as reported by the sensor (0 = worst).
    #[serde(default)]
    pub quality: u8,
}

impl SweepReading {
    pub fn new(bearing_deg: f32, range_mm: f32, quality: u8) -> Self {
        Self {
            bearing_deg,
            range_mm,
            quality,
        }
    }

    /// `true` when the sample carries a usable range.
    ///
    /// Non-finite values are treated like a missing return.
    pub fn is_valid(&self) -> bool {
        self.range_mm > 0.0 && self.range_mm.is_finite() && self.bearing_deg.is_finite()
    }
}

/// Nearest valid obstacle distance per zone for one sweep, in millimetres.
///
/// A zone with no valid sample holds `f32::INFINITY`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneDistances {
    pub front: f32,
    pub left: f32,
    pub right: f32,
}

impl ZoneDistances {
    /// Distances for a sweep in which no zone saw anything.
    pub const CLEAR: ZoneDistances = ZoneDistances {
        front: f32::INFINITY,
        left: f32::INFINITY,
        right: f32::INFINITY,
    };
}

impl Default for ZoneDistances {
    fn default() -> Self {
        Self::CLEAR
    }
}

/// Per-zone blocked/clear state derived from [`ZoneDistances`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockedFlags {
    pub front: bool,
    pub left: bool,
    pub right: bool,
}

impl BlockedFlags {
    pub fn new(front: bool, left: bool, right: bool) -> Self {
        Self { front, left, right }
    }
}

/// Renders the obstacle status line, e.g. `FRONT:0|LEFT:1|RIGHT:0`.
impl fmt::Display for BlockedFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FRONT:{}|LEFT:{}|RIGHT:{}",
            u8::from(self.front),
            u8::from(self.left),
            u8::from(self.right)
        )
    }
}

/// Parses the obstacle status line.
///
/// Keys are case-insensitive and may appear in any order; a key that is
/// missing leaves its zone clear. A value of `1` means blocked, anything
/// else clear. Fields without a `:` and keys other than the three zones are
/// ignored, so parsing never fails.
impl FromStr for BlockedFlags {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = BlockedFlags::default();
        for (key, value) in s.trim().split('|').filter_map(|part| part.split_once(':')) {
            let blocked = value.trim() == "1";
            match key.trim().to_ascii_lowercase().as_str() {
                "front" => flags.front = blocked,
                "left" => flags.left = blocked,
                "right" => flags.right = blocked,
                _ => {}
            }
        }
        Ok(flags)
    }
}

/// Discrete movement command sent to the downstream motor controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Command {
    Forward,
    Left,
    Right,
    Stop,
}

impl Command {
    /// The single ASCII byte that encodes this command on the wire.
    pub fn as_byte(self) -> u8 {
        match self {
            Command::Forward => b'F',
            Command::Left => b'L',
            Command::Right => b'R',
            Command::Stop => b'S',
        }
    }

    /// Inverse of [`Command::as_byte`].
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'F' => Some(Command::Forward),
            b'L' => Some(Command::Left),
            b'R' => Some(Command::Right),
            b'S' => Some(Command::Stop),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Forward => "FORWARD",
            Command::Left => "LEFT",
            Command::Right => "RIGHT",
            Command::Stop => "STOP",
        };
        f.write_str(name)
    }
}

/// Error type shared by sensors, transports and configuration.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NavError {
    #[error("Sweep acquisition failed on {sensor}: {details}")]
    Acquisition { sensor: String, details: String },

    #[error("Command dispatch failed on {transport}: {details}")]
    Dispatch { transport: String, details: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
