//! RPLIDAR sample decoding and sweep assembly.
//!
//! The vendor driver delivers "HQ" measurement nodes in fixed-point form.
//! [`decode_hq_node`] turns one node into a [`SweepReading`];
//! [`ScanAssembler`] groups the decoded stream into complete rotations; and
//! [`NodeStreamProvider`] exposes any [`NodeSource`] as a [`SweepProvider`].
//!
//! Sweep completion is detected when the bearing wraps, i.e. a sample's
//! bearing is smaller than its predecessor's, provided enough samples have
//! been collected.  The assembler has a fixed capacity; samples beyond it are
//! counted and reported with the completed sweep rather than dropped silently.
//!
//! [`ScanStream`] is the wire-level [`NodeSource`]: it issues the `SCAN`
//! request over any byte link, checks the response descriptor and parses the
//! 5-byte measurement nodes that follow.  [`open_serial`] wires it to a USB
//! serial adapter.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use sweepnav_types::{NavError, SweepReading};
use tracing::{debug, info, warn};

use crate::sensor::SweepProvider;

/// Right-shift applied to the raw quality byte.
pub const QUALITY_SHIFT: u8 = 2;
/// Capacity used by the vendor SDK's scan buffer.
pub const DEFAULT_SCAN_CAPACITY: usize = 8192;
/// Minimum samples before a bearing wrap is treated as the end of a sweep.
pub const DEFAULT_MIN_POINTS: usize = 50;

/// One raw HQ measurement node as delivered by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HqNode {
    /// Bearing in Q14 fixed point, 90° per 2^14.
    pub angle_z_q14: u16,
    /// Range in Q2 fixed point millimetres.
    pub dist_mm_q2: u32,
    /// Raw quality byte.
    pub quality: u8,
}

/// Decode one HQ node into a reading.
pub fn decode_hq_node(node: HqNode) -> SweepReading {
    SweepReading {
        bearing_deg: f32::from(node.angle_z_q14) * 90.0 / 16384.0,
        range_mm: node.dist_mm_q2 as f32 / 4.0,
        quality: node.quality >> QUALITY_SHIFT,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ScanAssembler
// ────────────────────────────────────────────────────────────────────────────

/// A sweep produced by [`ScanAssembler`].
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledSweep {
    /// Readings sorted by ascending bearing.
    pub readings: Vec<SweepReading>,
    /// Samples discarded because the buffer was full.
    pub dropped: usize,
}

/// Groups a stream of readings into complete rotations.
#[derive(Debug)]
pub struct ScanAssembler {
    capacity: usize,
    min_points: usize,
    current: Vec<SweepReading>,
    dropped: usize,
    last_bearing: Option<f32>,
}

impl ScanAssembler {
    /// Create an assembler holding at most `capacity` samples per sweep and
    /// requiring `min_points` samples before a wrap completes a sweep.
    pub fn new(capacity: usize, min_points: usize) -> Self {
        Self {
            capacity,
            min_points,
            current: Vec::with_capacity(capacity.min(DEFAULT_SCAN_CAPACITY)),
            dropped: 0,
            last_bearing: None,
        }
    }

    /// Feed one reading.  Returns the finished sweep when `reading` starts a
    /// new rotation.
    pub fn push(&mut self, reading: SweepReading) -> Option<AssembledSweep> {
        let wrapped = self
            .last_bearing
            .is_some_and(|prev| reading.bearing_deg < prev);
        self.last_bearing = Some(reading.bearing_deg);

        let finished = if wrapped && self.current.len() >= self.min_points {
            Some(self.finish())
        } else {
            None
        };

        if self.current.len() < self.capacity {
            self.current.push(reading);
        } else {
            self.dropped += 1;
        }
        finished
    }

    /// Samples collected for the sweep in progress.
    pub fn pending(&self) -> usize {
        self.current.len()
    }

    fn finish(&mut self) -> AssembledSweep {
        let mut readings = std::mem::take(&mut self.current);
        readings.sort_by(|a, b| a.bearing_deg.total_cmp(&b.bearing_deg));
        let dropped = std::mem::take(&mut self.dropped);
        if dropped > 0 {
            warn!(
                dropped,
                capacity = self.capacity,
                "scan buffer overflow; sweep truncated"
            );
        }
        AssembledSweep { readings, dropped }
    }
}

impl Default for ScanAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_CAPACITY, DEFAULT_MIN_POINTS)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// NodeStreamProvider
// ────────────────────────────────────────────────────────────────────────────

/// A blocking source of raw measurement nodes (serial link, capture file, …).
pub trait NodeSource: Send {
    /// Return the next node, or `Ok(None)` when the stream has ended.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Acquisition`] on a read failure.
    fn next_node(&mut self) -> Result<Option<HqNode>, NavError>;
}

/// Adapts a [`NodeSource`] into a [`SweepProvider`] by decoding and
/// assembling nodes until a full rotation is available.
pub struct NodeStreamProvider<S> {
    source: S,
    assembler: ScanAssembler,
}

impl<S: NodeSource> NodeStreamProvider<S> {
    pub fn new(source: S, assembler: ScanAssembler) -> Self {
        Self { source, assembler }
    }
}

impl<S: NodeSource> SweepProvider for NodeStreamProvider<S> {
    fn id(&self) -> &str {
        "rplidar"
    }

    fn acquire_sweep(&mut self) -> Result<Vec<SweepReading>, NavError> {
        loop {
            let Some(node) = self.source.next_node()? else {
                return Err(acquisition_error(format!(
                    "node stream ended with {} samples pending",
                    self.assembler.pending()
                )));
            };
            if let Some(sweep) = self.assembler.push(decode_hq_node(node)) {
                return Ok(sweep.readings);
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Serial scan protocol
// ────────────────────────────────────────────────────────────────────────────

/// USB serial adapter the sensor usually enumerates as.
pub const DEFAULT_LIDAR_DEVICE: &str = "/dev/ttyUSB0";
/// Line speed of A1/A2-class sensors.
pub const DEFAULT_LIDAR_BAUD: u32 = 115_200;

const SYNC_BYTE: u8 = 0xA5;
const SYNC_BYTE2: u8 = 0x5A;
const CMD_SCAN: u8 = 0x20;
const CMD_STOP: u8 = 0x25;
const SCAN_DATA_TYPE: u8 = 0x81;
const MODE_CONTINUOUS: u8 = 0x1;
const DESCRIPTOR_LEN: usize = 7;
const NODE_LEN: usize = 5;
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Response descriptor sent once after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseDescriptor {
    /// Length of one response record in bytes.
    pub record_len: u32,
    /// 0 = single response, 1 = continuous stream.
    pub mode: u8,
    pub data_type: u8,
}

impl ResponseDescriptor {
    /// Parse the 7-byte descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Acquisition`] when the sync bytes are missing.
    pub fn parse(buf: &[u8; DESCRIPTOR_LEN]) -> Result<Self, NavError> {
        if buf[0] != SYNC_BYTE || buf[1] != SYNC_BYTE2 {
            return Err(acquisition_error(format!(
                "bad descriptor sync 0x{:02X} 0x{:02X}",
                buf[0], buf[1]
            )));
        }
        let packed = u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]);
        Ok(Self {
            record_len: packed & 0x3FFF_FFFF,
            mode: (packed >> 30) as u8,
            data_type: buf[6],
        })
    }
}

/// Parse one 5-byte scan node into HQ form.
///
/// Layout: `quality:6 | !start:1 | start:1`, then the Q6 angle with a check
/// bit in bit 0, then the Q2 distance, all little-endian.  Returns `None` when
/// the start bits disagree or the check bit is clear, which means the stream
/// is misaligned.
pub fn parse_scan_node(buf: &[u8; NODE_LEN]) -> Option<HqNode> {
    let start = buf[0] & 0x01;
    let inverted_start = (buf[0] >> 1) & 0x01;
    if start == inverted_start || buf[1] & 0x01 == 0 {
        return None;
    }
    let angle_q6 = u32::from(u16::from_le_bytes([buf[1], buf[2]]) >> 1);
    let dist_q2 = u16::from_le_bytes([buf[3], buf[4]]);
    Some(HqNode {
        // Q6 degrees to Q14 quarter-turns; a full turn wraps to 0.
        angle_z_q14: ((angle_q6 << 8) / 90) as u16,
        dist_mm_q2: u32::from(dist_q2),
        quality: buf[0] & !0x03,
    })
}

/// A running `SCAN` session on a byte link.
///
/// Dropping the stream sends the `STOP` request.
pub struct ScanStream<T: Read + Write> {
    link: T,
    discarded: u64,
}

impl<T: Read + Write> ScanStream<T> {
    /// Send the `SCAN` request and validate the response descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Acquisition`] if the request cannot be written or
    /// the sensor answers with anything but a continuous scan stream.
    pub fn start(mut link: T) -> Result<Self, NavError> {
        link.write_all(&[SYNC_BYTE, CMD_SCAN])
            .and_then(|()| link.flush())
            .map_err(|e| acquisition_error(format!("scan request failed: {e}")))?;

        let mut header = [0u8; DESCRIPTOR_LEN];
        link.read_exact(&mut header)
            .map_err(|e| acquisition_error(format!("no scan descriptor: {e}")))?;
        let descriptor = ResponseDescriptor::parse(&header)?;
        if descriptor.data_type != SCAN_DATA_TYPE
            || descriptor.mode != MODE_CONTINUOUS
            || descriptor.record_len as usize != NODE_LEN
        {
            return Err(acquisition_error(format!(
                "unexpected scan descriptor {descriptor:?}"
            )));
        }

        debug!(?descriptor, "scan stream started");
        Ok(Self { link, discarded: 0 })
    }

    /// Bytes skipped while re-aligning on node boundaries.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Fill `buf` from the link.  `Ok(false)` means the link reached EOF.
    fn fill(&mut self, buf: &mut [u8]) -> Result<bool, NavError> {
        match self.link.read_exact(buf) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(acquisition_error(format!("read failed: {e}"))),
        }
    }
}

impl<T: Read + Write + Send> NodeSource for ScanStream<T> {
    fn next_node(&mut self) -> Result<Option<HqNode>, NavError> {
        let mut frame = [0u8; NODE_LEN];
        if !self.fill(&mut frame)? {
            return Ok(None);
        }
        loop {
            if let Some(node) = parse_scan_node(&frame) {
                return Ok(Some(node));
            }
            self.discarded += 1;
            frame.copy_within(1.., 0);
            if !self.fill(&mut frame[NODE_LEN - 1..])? {
                return Ok(None);
            }
        }
    }
}

impl<T: Read + Write> Drop for ScanStream<T> {
    fn drop(&mut self) {
        if let Err(e) = self
            .link
            .write_all(&[SYNC_BYTE, CMD_STOP])
            .and_then(|()| self.link.flush())
        {
            warn!(error = %e, "scan stop request failed");
        }
        if self.discarded > 0 {
            debug!(discarded = self.discarded, "scan stream closed");
        }
    }
}

/// Open a sensor on a serial adapter and start scanning.
///
/// Spins the motor up by clearing DTR, drops stale input, then starts a
/// [`ScanStream`].
///
/// # Errors
///
/// Returns [`NavError::Acquisition`] if the port cannot be opened or the
/// sensor does not answer the scan request.
pub fn open_serial(
    device: &str,
    baud: u32,
) -> Result<NodeStreamProvider<ScanStream<Box<dyn SerialPort>>>, NavError> {
    let mut port = serialport::new(device, baud)
        .timeout(READ_TIMEOUT)
        .open()
        .map_err(|e| acquisition_error(format!("cannot open {device}: {e}")))?;
    port.write_data_terminal_ready(false)
        .map_err(|e| acquisition_error(format!("cannot start motor on {device}: {e}")))?;
    port.clear(ClearBuffer::Input)
        .map_err(|e| acquisition_error(format!("cannot flush {device}: {e}")))?;

    let stream = ScanStream::start(port)?;
    info!(device, baud, "rplidar scanning");
    Ok(NodeStreamProvider::new(stream, ScanAssembler::default()))
}

fn acquisition_error(details: impl Into<String>) -> NavError {
    NavError::Acquisition {
        sensor: "rplidar".to_string(),
        details: details.into(),
    }
}
