//! [`ReplaySweepProvider`] – plays back recorded sweeps from disk.
//!
//! The recording format is JSON lines: one sweep per line, each a JSON array
//! of readings.  Blank lines are ignored.
//!
//! ```text
//! [{"bearing_deg":0.0,"range_mm":812.5,"quality":47},{"bearing_deg":0.9,"range_mm":815.0,"quality":47}]
//! [{"bearing_deg":0.1,"range_mm":809.0,"quality":46}]
//! ```

use std::fs;
use std::io::Write;
use std::path::Path;

use sweepnav_types::{NavError, SweepReading};
use tracing::{debug, info};

use crate::sensor::SweepProvider;

/// Sweep provider backed by a recording.
#[derive(Debug)]
pub struct ReplaySweepProvider {
    sweeps: Vec<Vec<SweepReading>>,
    cursor: usize,
    looping: bool,
}

impl ReplaySweepProvider {
    /// Load every sweep in the JSON-lines file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::InvalidConfig`] if the file cannot be read or a
    /// line is not a valid sweep.
    pub fn open(path: impl AsRef<Path>, looping: bool) -> Result<Self, NavError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            NavError::InvalidConfig(format!("cannot read replay {}: {e}", path.display()))
        })?;

        let mut sweeps = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let sweep: Vec<SweepReading> = serde_json::from_str(line).map_err(|e| {
                NavError::InvalidConfig(format!("{}:{}: {e}", path.display(), idx + 1))
            })?;
            sweeps.push(sweep);
        }

        info!(path = %path.display(), sweeps = sweeps.len(), looping, "replay loaded");
        Ok(Self::from_sweeps(sweeps, looping))
    }

    /// Build a provider from in-memory sweeps.
    pub fn from_sweeps(sweeps: Vec<Vec<SweepReading>>, looping: bool) -> Self {
        Self {
            sweeps,
            cursor: 0,
            looping,
        }
    }

    /// Number of sweeps in the recording.
    pub fn len(&self) -> usize {
        self.sweeps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sweeps.is_empty()
    }
}

impl SweepProvider for ReplaySweepProvider {
    fn id(&self) -> &str {
        "replay"
    }

    fn acquire_sweep(&mut self) -> Result<Vec<SweepReading>, NavError> {
        if self.cursor >= self.sweeps.len() && self.looping && !self.sweeps.is_empty() {
            debug!("replay wrapped to first sweep");
            self.cursor = 0;
        }
        match self.sweeps.get(self.cursor) {
            Some(sweep) => {
                self.cursor += 1;
                Ok(sweep.clone())
            }
            None => Err(NavError::Acquisition {
                sensor: "replay".to_string(),
                details: "end of recording".to_string(),
            }),
        }
    }
}

/// Append one sweep to a JSON-lines recording.
///
/// # Errors
///
/// Returns any I/O error from `writer`.
pub fn write_sweep_line<W: Write>(writer: &mut W, sweep: &[SweepReading]) -> std::io::Result<()> {
    serde_json::to_writer(&mut *writer, sweep)?;
    writer.write_all(b"\n")
}
