//! [`I2cDispatcher`] – command bytes over a Linux `i2c-dev` bus.
//!
//! The motor controller is an I2C slave; each command is a single-byte write
//! to its address.  The dispatcher itself is only built on Linux; the bus
//! defaults are available everywhere so configuration can name them.

#[cfg(target_os = "linux")]
pub use linux::I2cDispatcher;

/// Default bus device.
pub const DEFAULT_I2C_DEVICE: &str = "/dev/i2c-1";
/// Default slave address of the motor controller.
pub const DEFAULT_I2C_ADDRESS: u16 = 0x08;

#[cfg(target_os = "linux")]
mod linux {
    use std::fs::{File, OpenOptions};
    use std::io;
    use std::os::unix::io::AsRawFd;

    use sweepnav_types::NavError;
    use tracing::info;

    use crate::dispatcher::{CommandDispatcher, dispatch_error, write_command_byte};

    /// `I2C_SLAVE` request from `<linux/i2c-dev.h>`.
    const I2C_SLAVE: u16 = 0x0703;

    /// I2C transport to the downstream motor controller.
    pub struct I2cDispatcher {
        device: String,
        bus: File,
    }

    impl I2cDispatcher {
        /// Open `device` and bind it to slave `address`.
        ///
        /// # Errors
        ///
        /// Returns [`NavError::Dispatch`] if the device cannot be opened or the
        /// slave address cannot be selected.
        pub fn open(device: &str, address: u16) -> Result<Self, NavError> {
            let bus = OpenOptions::new()
                .read(true)
                .write(true)
                .open(device)
                .map_err(|e| dispatch_error("i2c", format!("cannot open {device}: {e}")))?;

            // SAFETY: `bus` is an open descriptor for the lifetime of the call and
            // I2C_SLAVE takes the address by value.
            let rc = unsafe {
                libc::ioctl(
                    bus.as_raw_fd(),
                    I2C_SLAVE as _,
                    libc::c_ulong::from(address),
                )
            };
            if rc < 0 {
                return Err(dispatch_error(
                    "i2c",
                    format!(
                        "cannot select slave 0x{address:02x} on {device}: {}",
                        io::Error::last_os_error()
                    ),
                ));
            }

            info!(device, address = %format!("0x{address:02x}"), "i2c bus opened");
            Ok(Self {
                device: device.to_string(),
                bus,
            })
        }
    }

    impl CommandDispatcher for I2cDispatcher {
        fn id(&self) -> &str {
            "i2c"
        }

        fn send(&mut self, byte: u8) -> Result<(), NavError> {
            write_command_byte(&mut self.bus, byte)
                .map_err(|e| dispatch_error("i2c", format!("write to {} failed: {e}", self.device)))
        }
    }

}
