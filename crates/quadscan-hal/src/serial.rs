//! Serial-port backed [`SerialChannel`] and the host output link.

use std::io::Read;
use std::time::Duration;

use quadscan_types::ScanError;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::info;

use crate::channel::{SerialChannel, fault};

/// Open `path` at `baud_rate` with 8N1 framing and no flow control.
///
/// The read timeout is kept tiny; callers only read what
/// `bytes_to_read` reports, so it is never actually waited on.
///
/// # Errors
///
/// Returns [`ScanError::ChannelFault`] when the port cannot be opened.
pub fn open_port(path: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>, ScanError> {
    let port = serialport::new(path, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(1))
        .open()
        .map_err(|e| fault(path, e))?;

    info!(port = path, baud_rate, "opened serial port");
    Ok(port)
}

/// A LiDAR unit attached to a local serial port.
pub struct SerialPortChannel {
    path: String,
    port: Box<dyn SerialPort>,
}

impl SerialPortChannel {
    /// Open the LiDAR port at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::ChannelFault`] when the port cannot be opened.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, ScanError> {
        Ok(Self {
            path: path.to_string(),
            port: open_port(path, baud_rate)?,
        })
    }
}

impl SerialChannel for SerialPortChannel {
    fn id(&self) -> &str {
        &self.path
    }

    fn available(&mut self) -> Result<usize, ScanError> {
        let pending = self
            .port
            .bytes_to_read()
            .map_err(|e| fault(&self.path, e))?;
        Ok(pending as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ScanError> {
        let n = self.available()?.min(buf.len());
        if n == 0 {
            return Ok(0);
        }
        match self.port.read(&mut buf[..n]) {
            Ok(read) => Ok(read),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(fault(&self.path, e)),
        }
    }
}
