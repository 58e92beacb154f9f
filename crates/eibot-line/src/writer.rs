use std::io::{ErrorKind, Write};

use bytes::{BufMut, BytesMut};
use tracing::trace;

use crate::codec::{encode_line, LineConfig, TERMINATOR};
use crate::error::{LineError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Writes complete command lines to any `Write` stream.
pub struct LineWriter<T> {
    inner: T,
    buf: BytesMut,
    config: LineConfig,
}

impl<T: Write> LineWriter<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, LineConfig::default())
    }

    pub fn with_config(inner: T, config: LineConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Send one command line, appending the terminator, and flush.
    pub fn send(&mut self, line: &str) -> Result<()> {
        self.buf.clear();
        encode_line(line, &mut self.buf)?;
        trace!(line, "writing line");
        self.write_buffered()
    }

    /// Send `head`, then `payload` verbatim, then the terminator.
    ///
    /// Used by commands that carry raw binary after their ASCII parameters.
    /// Only `head` is validated; `payload` may contain any byte.
    pub fn send_raw(&mut self, head: &str, payload: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_line(head, &mut self.buf)?;
        self.buf.truncate(self.buf.len() - 1);
        self.buf.reserve(payload.len() + 1);
        self.buf.put_slice(payload);
        self.buf.put_u8(TERMINATOR);
        trace!(head, len = payload.len(), "writing raw line");
        self.write_buffered()
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(LineError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(LineError::Io(err)),
            }
        }

        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(LineError::Io(err)),
            }
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn config(&self) -> &LineConfig {
        &self.config
    }
}
