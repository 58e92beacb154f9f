//! Carriage-return terminated ASCII line codec.
//!
//! The board speaks one command per line and answers one reply per line:
//! - outbound lines are ASCII and end with `\r`
//! - inbound lines end with `\r`; a stray `\n` anywhere is ignored
//! - empty inbound lines are skipped
//!
//! Callers always get complete lines, regardless of how the bytes arrive.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{encode_line, LineConfig, LineDecoder, DEFAULT_MAX_LINE, TERMINATOR};
pub use error::{LineError, Result};
pub use reader::LineReader;
pub use writer::LineWriter;
