use bytes::{Buf, BufMut, BytesMut};

use tracing::trace;

use crate::error::{LineError, Result};

/// Canonical line terminator, in both directions.
pub const TERMINATOR: u8 = b'\r';

/// Line feed is never significant; it is stripped wherever it appears.
const STRAY: u8 = b'\n';

/// Default maximum inbound line length: 1 KiB.
///
/// The longest legitimate reply is an analog packet with 13 channels.
pub const DEFAULT_MAX_LINE: usize = 1024;

/// Encode a command line into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────────────────────┬──────┐
/// │ OPCODE[,param]*  (ASCII)     │ \r   │
/// └──────────────────────────────┴──────┘
/// ```
pub fn encode_line(line: &str, dst: &mut BytesMut) -> Result<()> {
    if !line.is_ascii() || line.bytes().any(|b| b == TERMINATOR || b == STRAY) {
        return Err(LineError::InvalidLine(line.to_string()));
    }
    dst.reserve(line.len() + 1);
    dst.put_slice(line.as_bytes());
    dst.put_u8(TERMINATOR);
    Ok(())
}

/// Splits inbound bytes into lines.
///
/// After an overlong line the decoder drops every byte up to and including
/// the next terminator, however the bytes are chunked, so no fragment of the
/// discarded line is ever returned.
#[derive(Debug, Clone)]
pub struct LineDecoder {
    max_line: usize,
    discarding: bool,
}

impl LineDecoder {
    pub fn new(max_line: usize) -> Self {
        Self {
            max_line,
            discarding: false,
        }
    }

    /// Whether the decoder is skipping the tail of an overlong line.
    pub fn is_discarding(&self) -> bool {
        self.discarding
    }

    /// Decode one line from a buffer.
    ///
    /// Returns `Ok(None)` if the buffer doesn't contain a complete line yet.
    /// On success, consumes the line and its terminator from the buffer. An
    /// overlong line is reported once; its bytes are dropped and decoding
    /// resumes after its terminator.
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        loop {
            if self.discarding {
                match src.iter().position(|&b| b == TERMINATOR) {
                    Some(pos) => {
                        src.advance(pos + 1);
                        self.discarding = false;
                        trace!(dropped = pos, "resynchronized after overlong line");
                    }
                    None => {
                        src.clear();
                        return Ok(None);
                    }
                }
            }

            let leading = src.iter().take_while(|&&b| b == STRAY).count();
            src.advance(leading);

            let Some(pos) = src.iter().position(|&b| b == TERMINATOR) else {
                if src.len() > self.max_line {
                    let size = src.len();
                    src.clear();
                    self.discarding = true;
                    return Err(LineError::LineTooLong {
                        size,
                        max: self.max_line,
                    });
                }
                return Ok(None); // Need more data
            };

            let raw = src.split_to(pos);
            src.advance(1);

            let content: Vec<u8> = raw.iter().copied().filter(|&b| b != STRAY).collect();
            if content.len() > self.max_line {
                return Err(LineError::LineTooLong {
                    size: content.len(),
                    max: self.max_line,
                });
            }
            if content.is_empty() {
                continue;
            }

            return Ok(Some(String::from_utf8_lossy(&content).into_owned()));
        }
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE)
    }
}

/// Configuration for the line codec.
#[derive(Debug, Clone)]
pub struct LineConfig {
    /// Maximum inbound line length in bytes. Default: 1 KiB.
    pub max_line_len: usize,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            max_line_len: DEFAULT_MAX_LINE,
        }
    }
}
