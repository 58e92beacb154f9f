//! Serial transport for EiBotBoard (EBB) and UBW I/O controllers.
//!
//! This is the lowest layer of eibot. It opens the board's serial port at a
//! fixed baud rate and hands back a [`BoardStream`], a plain duplex byte
//! stream. Everything above it only needs `Read + Write`.
//!
//! On Unix a socket-backed [`BoardStream::pair`] is also available, which
//! stands in for a real board in loopback tests.

pub mod error;
pub mod serial;
pub mod stream;

pub use error::{Result, TransportError};
pub use serial::{LinkConfig, PortInfo, SerialLink, DEFAULT_BAUD_RATE, EBB_PID, EBB_VID};
pub use stream::BoardStream;
