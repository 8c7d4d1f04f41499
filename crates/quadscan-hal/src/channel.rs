//! Generic `SerialChannel` trait for byte sources feeding a frame decoder.
//!
//! Every LiDAR unit is wired to its own channel.  The scheduler only ever
//! talks to this trait, so a physical serial port, a capture replay and the
//! in-memory simulator are interchangeable.

use quadscan_types::ScanError;

/// A non-blocking byte source.
///
/// Implementations must never wait for data: when nothing is buffered,
/// [`SerialChannel::read`] returns `Ok(0)` immediately.
pub trait SerialChannel: Send {
    /// Stable identifier for this channel, e.g. `"/dev/ttyUSB0"`.
    fn id(&self) -> &str;

    /// Number of bytes that can be read right now without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::ChannelFault`] if the underlying device cannot be
    /// queried.
    fn available(&mut self) -> Result<usize, ScanError>;

    /// Read up to `buf.len()` bytes that are already buffered.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::ChannelFault`] on an I/O failure.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ScanError>;

    /// `true` once the channel can never produce data again (end of a
    /// replay).  Live ports are never exhausted.
    fn is_exhausted(&self) -> bool {
        false
    }
}

pub(crate) fn fault(channel: &str, details: impl std::fmt::Display) -> ScanError {
    ScanError::ChannelFault {
        channel: channel.to_string(),
        details: details.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-process channel used only for tests.
    struct FixedChannel {
        id: String,
        data: Vec<u8>,
    }

    impl SerialChannel for FixedChannel {
        fn id(&self) -> &str {
            &self.id
        }

        fn available(&mut self) -> Result<usize, ScanError> {
            Ok(self.data.len())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, ScanError> {
            let n = buf.len().min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data.drain(..n);
            Ok(n)
        }
    }

    #[test]
    fn fixed_channel_reads_then_runs_dry() {
        let mut ch = FixedChannel {
            id: "fixed".to_string(),
            data: vec![1, 2, 3],
        };
        assert_eq!(ch.id(), "fixed");
        assert!(!ch.is_exhausted());

        let mut buf = [0u8; 2];
        assert_eq!(ch.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(ch.available().unwrap(), 1);
        assert_eq!(ch.read(&mut buf).unwrap(), 1);
        assert_eq!(ch.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn fault_names_channel() {
        let err = fault("/dev/ttyUSB3", "device unplugged");
        assert!(err.to_string().contains("/dev/ttyUSB3"));
        assert!(err.to_string().contains("device unplugged"));
    }
}
