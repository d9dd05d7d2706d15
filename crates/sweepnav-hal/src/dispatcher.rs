//! Generic `CommandDispatcher` trait for the actuation transport.
//!
//! A dispatcher delivers one command byte per cycle to the downstream motor
//! controller.  Drivers implement this trait; the control loop never sees the
//! transport behind it.

use std::io::{self, Write};

use sweepnav_types::NavError;

/// A one-byte-per-cycle command transport (serial link, I2C bus, stub, …).
pub trait CommandDispatcher: Send {
    /// Stable identifier for this transport, e.g. `"serial"` or `"i2c"`.
    fn id(&self) -> &str;

    /// Deliver a single command byte.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Dispatch`] if the byte could not be written.
    fn send(&mut self, byte: u8) -> Result<(), NavError>;
}

/// Write exactly one byte to `writer` and flush it.
///
/// A write that accepts zero bytes is reported as [`io::ErrorKind::WriteZero`].
pub(crate) fn write_command_byte<W: Write + ?Sized>(writer: &mut W, byte: u8) -> io::Result<()> {
    match writer.write(&[byte])? {
        1 => writer.flush(),
        _ => Err(io::Error::new(
            io::ErrorKind::WriteZero,
            "transport accepted no bytes",
        )),
    }
}

/// Map an I/O failure on `transport` into a [`NavError::Dispatch`].
pub(crate) fn dispatch_error(transport: &str, err: impl std::fmt::Display) -> NavError {
    NavError::Dispatch {
        transport: transport.to_string(),
        details: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Ok(0)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_exactly_one_byte() {
        let mut buf = Vec::new();
        write_command_byte(&mut buf, b'F').unwrap();
        write_command_byte(&mut buf, b'S').unwrap();
        assert_eq!(buf, b"FS");
    }

    #[test]
    fn zero_length_write_is_an_error() {
        let err = write_command_byte(&mut ZeroWriter, b'L').unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
    }

    #[test]
    fn io_errors_propagate_and_map_to_dispatch() {
        let err = write_command_byte(&mut BrokenWriter, b'R').unwrap_err();
        let nav = dispatch_error("serial", err);
        assert!(matches!(nav, NavError::Dispatch { ref transport, .. } if transport == "serial"));
        assert!(nav.to_string().contains("unplugged"));
    }
}
