use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Serial ports take a concrete timeout; "no timeout" is approximated by a day.
const BLOCKING_SERIAL_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// A connected board stream — implements Read + Write.
///
/// This is the fundamental I/O type returned by transport operations.
/// On hardware it wraps an open serial port. On Unix it can also wrap one end
/// of a socket pair, which tests use in place of a board.
pub struct BoardStream {
    inner: BoardStreamInner,
}

enum BoardStreamInner {
    Serial(Box<dyn serialport::SerialPort>),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for BoardStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            BoardStreamInner::Serial(port) => port.read(buf),
            #[cfg(unix)]
            BoardStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for BoardStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            BoardStreamInner::Serial(port) => port.write(buf),
            #[cfg(unix)]
            BoardStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            BoardStreamInner::Serial(port) => port.flush(),
            #[cfg(unix)]
            BoardStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl BoardStream {
    /// Wrap an already opened and configured serial port.
    pub fn from_serial(port: Box<dyn serialport::SerialPort>) -> Self {
        Self {
            inner: BoardStreamInner::Serial(port),
        }
    }

    /// Create a connected pair of in-memory streams.
    ///
    /// Bytes written to one end are read from the other, which makes the pair
    /// a convenient stand-in for a board in tests.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((
            Self {
                inner: BoardStreamInner::Unix(left),
            },
            Self {
                inner: BoardStreamInner::Unix(right),
            },
        ))
    }

    /// Set read timeout on the underlying stream.
    ///
    /// Serial ports share a single timeout between reads and writes, so on a
    /// serial stream this also bounds writes.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            BoardStreamInner::Serial(port) => {
                port.set_timeout(timeout.unwrap_or(BLOCKING_SERIAL_TIMEOUT))?;
                Ok(())
            }
            #[cfg(unix)]
            BoardStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    ///
    /// Ignored for serial streams; see [`BoardStream::set_read_timeout`].
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            BoardStreamInner::Serial(_) => Ok(()),
            #[cfg(unix)]
            BoardStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new handle to the same device).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            BoardStreamInner::Serial(port) => Ok(Self::from_serial(port.try_clone()?)),
            #[cfg(unix)]
            BoardStreamInner::Unix(stream) => Ok(Self {
                inner: BoardStreamInner::Unix(stream.try_clone()?),
            }),
        }
    }

    /// Unblock readers on every handle of this stream.
    ///
    /// Socket streams are shut down in both directions. Serial ports cannot be
    /// interrupted; readers observe the close on their next read timeout.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            BoardStreamInner::Serial(_) => Ok(()),
            #[cfg(unix)]
            BoardStreamInner::Unix(stream) => match stream.shutdown(std::net::Shutdown::Both) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
                Err(err) => Err(err.into()),
            },
        }
    }

    /// Discard anything buffered in the device driver.
    pub fn clear_buffers(&self) -> Result<()> {
        match &self.inner {
            BoardStreamInner::Serial(port) => {
                port.clear(serialport::ClearBuffer::All)?;
                Ok(())
            }
            #[cfg(unix)]
            BoardStreamInner::Unix(_) => Ok(()),
        }
    }

    /// Name of the underlying serial port, if any.
    pub fn port_name(&self) -> Option<String> {
        match &self.inner {
            BoardStreamInner::Serial(port) => port.name(),
            #[cfg(unix)]
            BoardStreamInner::Unix(_) => None,
        }
    }
}

impl std::fmt::Debug for BoardStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            BoardStreamInner::Serial(port) => f
                .debug_struct("BoardStream")
                .field("type", &"serial")
                .field("port", &port.name())
                .finish(),
            #[cfg(unix)]
            BoardStreamInner::Unix(_) => f.debug_struct("BoardStream").field("type", &"unix").finish(),
        }
    }
}
