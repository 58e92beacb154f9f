use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{LineConfig, LineDecoder};
use crate::error::{LineError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;
const READ_CHUNK_SIZE: usize = 256;

/// Reads complete lines from any `Read` stream.
///
/// Handles partial reads internally — callers always get complete lines.
/// Read timeouts surface as `LineError::Io` with `TimedOut` or `WouldBlock`;
/// bytes of a partially received line stay buffered for the next call.
pub struct LineReader<T> {
    inner: T,
    buf: BytesMut,
    decoder: LineDecoder,
    config: LineConfig,
}

impl<T: Read> LineReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, LineConfig::default())
    }

    pub fn with_config(inner: T, config: LineConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            decoder: LineDecoder::new(config.max_line_len),
            config,
        }
    }

    /// Read the next complete, non-empty line (blocking).
    ///
    /// Returns `Err(LineError::ConnectionClosed)` when EOF is reached.
    pub fn read_line(&mut self) -> Result<String> {
        loop {
            if let Some(line) = self.decoder.decode(&mut self.buf)? {
                trace!(%line, "decoded line");
                return Ok(line);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(LineError::Io(err)),
            };

            if read == 0 {
                return Err(LineError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Bytes received but not yet returned as a line.
    pub fn buffered(&self) -> usize {
        self.buf.len()
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

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn read_single_line() {
        let mut reader = LineReader::new(Cursor::new(b"V1.9.5\r".to_vec()));
        assert_eq!(reader.read_line().unwrap(), "V1.9.5");
    }

    #[test]
    fn read_reply_then_ack() {
        let mut reader = LineReader::new(Cursor::new(b"12345\r\nOK\r\n".to_vec()));
        assert_eq!(reader.read_line().unwrap(), "12345");
        assert_eq!(reader.read_line().unwrap(), "OK");
        assert!(matches!(
            reader.read_line().unwrap_err(),
            LineError::ConnectionClosed
        ));
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: b"A,1023,512\r".to_vec(),
            pos: 0,
        };
        let mut reader = LineReader::new(byte_reader);
        assert_eq!(reader.read_line().unwrap(), "A,1023,512");
    }

    #[test]
    fn connection_closed_mid_line() {
        let mut reader = LineReader::new(Cursor::new(b"I,12".to_vec()));
        let err = reader.read_line().unwrap_err();
        assert!(matches!(err, LineError::ConnectionClosed));
    }

    #[test]
    fn oversized_line_then_recovery() {
        let mut wire = vec![b'9'; 40];
        wire.extend_from_slice(b"\rOK\r");
        let cfg = LineConfig {
            max_line_len: 16,
            ..LineConfig::default()
        };
        let mut reader = LineReader::with_config(Cursor::new(wire), cfg);

        let err = reader.read_line().unwrap_err();
        assert!(matches!(err, LineError::LineTooLong { max: 16, .. }));
        assert_eq!(reader.read_line().unwrap(), "OK");
    }

    #[test]
    fn oversized_line_split_across_reads_is_dropped_whole() {
        let reader = StallingReader {
            chunks: vec![
                Ok(b"I,1023,".to_vec()),
                Ok(b"1023,1023".to_vec()),
                Ok(b",1023\r".to_vec()),
                Ok(b"OK\r".to_vec()),
            ],
        };
        let cfg = LineConfig { max_line_len: 12 };
        let mut lines = LineReader::with_config(reader, cfg);

        assert!(matches!(
            lines.read_line().unwrap_err(),
            LineError::LineTooLong { max: 12, .. }
        ));
        assert_eq!(lines.read_line().unwrap(), "OK");
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            bytes: b"OK\r".to_vec(),
            pos: 0,
        };
        let mut lines = LineReader::new(reader);
        assert_eq!(lines.read_line().unwrap(), "OK");
    }

    #[test]
    fn timeout_keeps_partial_line() {
        let reader = StallingReader {
            chunks: vec![
                Ok(b"QB,".to_vec()),
                Err(ErrorKind::TimedOut),
                Ok(b"1\r".to_vec()),
            ],
        };
        let mut lines = LineReader::new(reader);

        let err = lines.read_line().unwrap_err();
        assert!(matches!(err, LineError::Io(e) if e.kind() == ErrorKind::TimedOut));
        assert_eq!(lines.buffered(), 3);
        assert_eq!(lines.read_line().unwrap(), "QB,1");
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_board_stream() {
        use eibot_transport::BoardStream;

        let (left, mut right) = BoardStream::pair().unwrap();
        right
            .set_read_timeout(Some(std::time::Duration::from_secs(5)))
            .unwrap();
        let mut writer = crate::writer::LineWriter::new(left);
        let mut reader = LineReader::new(right);

        writer.send("SP,1").unwrap();
        writer.send("QP").unwrap();

        assert_eq!(reader.read_line().unwrap(), "SP,1");
        assert_eq!(reader.read_line().unwrap(), "QP");
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let n = (self.bytes.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct StallingReader {
        chunks: Vec<std::result::Result<Vec<u8>, ErrorKind>>,
    }

    impl Read for StallingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            match self.chunks.remove(0) {
                Ok(bytes) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Err(kind) => Err(std::io::Error::from(kind)),
            }
        }
    }
}
