//! [`SerialDispatcher`] – command bytes over a UART link.
//!
//! Opens the device 8N1 without flow control and writes one byte per
//! [`send`][CommandDispatcher::send].

use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use sweepnav_types::NavError;
use tracing::{info, warn};

use crate::dispatcher::{CommandDispatcher, dispatch_error, write_command_byte};

/// Default device of the motor-controller link.
pub const DEFAULT_SERIAL_DEVICE: &str = "/dev/ttyUSB1";
/// Default line speed.
pub const DEFAULT_BAUD: u32 = 9600;

const SUPPORTED_BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];
const WRITE_TIMEOUT: Duration = Duration::from_millis(50);

/// Return `requested` if the link supports it, otherwise [`DEFAULT_BAUD`].
pub fn effective_baud(requested: u32) -> u32 {
    if SUPPORTED_BAUD_RATES.contains(&requested) {
        requested
    } else {
        warn!(
            requested,
            fallback = DEFAULT_BAUD,
            "unsupported baud rate; falling back"
        );
        DEFAULT_BAUD
    }
}

/// Serial transport to the downstream motor controller.
pub struct SerialDispatcher {
    device: String,
    port: Box<dyn SerialPort>,
}

impl SerialDispatcher {
    /// Open `device` at `baud` (see [`effective_baud`]).
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Dispatch`] if the port cannot be opened.
    pub fn open(device: &str, baud: u32) -> Result<Self, NavError> {
        let baud = effective_baud(baud);
        let port = serialport::new(device, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(WRITE_TIMEOUT)
            .open()
            .map_err(|e| dispatch_error("serial", format!("cannot open {device}: {e}")))?;

        info!(device, baud, "serial port opened");
        Ok(Self {
            device: device.to_string(),
            port,
        })
    }
}

impl CommandDispatcher for SerialDispatcher {
    fn id(&self) -> &str {
        "serial"
    }

    fn send(&mut self, byte: u8) -> Result<(), NavError> {
        write_command_byte(&mut self.port, byte)
            .map_err(|e| dispatch_error("serial", format!("write to {} failed: {e}", self.device)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_rates_pass_through() {
        for rate in SUPPORTED_BAUD_RATES {
            assert_eq!(effective_baud(rate), rate);
        }
    }

    #[test]
    fn unsupported_rate_falls_back_to_default() {
        assert_eq!(effective_baud(250_000), DEFAULT_BAUD);
        assert_eq!(effective_baud(0), DEFAULT_BAUD);
    }

    #[test]
    fn opening_missing_device_is_dispatch_error() {
        let result = SerialDispatcher::open("/dev/sweepnav-does-not-exist", 9600);
        assert!(matches!(result, Err(NavError::Dispatch { .. })));
    }
}
