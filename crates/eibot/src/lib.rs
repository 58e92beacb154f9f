//! Host-side client for UBW and EiBotBoard I/O controllers.
//!
//! # Crate Structure
//!
//! - [`transport`] — Serial port access and the `BoardStream` byte stream
//! - [`line`] — Carriage-return terminated ASCII line codec
//! - [`board`] — Command encoding, reply decoding, sessions and push delivery
//!
//! ```no_run
//! use eibot::Ebb;
//!
//! let mut ebb = Ebb::open("/dev/ttyACM0")?;
//! println!("{}", ebb.version()?);
//! ebb.set_pen_state(true)?;
//! ebb.stepper_move(1000, 400, -400)?;
//! # Ok::<(), eibot::BoardError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use eibot_transport::*;
}

/// Re-export line codec types.
pub mod line {
    pub use eibot_line::*;
}

/// Re-export board session types.
pub mod board {
    pub use eibot_board::*;
}

pub use eibot_board::{BoardError, Ebb, ErrorCode, PushPacket, Session, SessionConfig, TimerMode};
