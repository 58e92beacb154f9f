//! Command/response session for UBW and EiBotBoard controllers.
//!
//! A [`Session`] sends one validated [`Command`] at a time and decodes the
//! reply, raising device error sentinels as [`BoardError::Protocol`]. A
//! background thread reads the board continuously, so periodic push packets
//! (`I,...` / `A,...`) can be delivered to a [`PushListener`] or consumed
//! through a [`PushStream`] while commands keep flowing.
//!
//! [`Ebb`] wraps a session with the EiBotBoard motor and pen commands.

pub mod command;
pub mod decode;
pub mod ebb;
pub mod error;
pub mod push;
pub mod session;
pub mod types;
mod ubw;

pub use command::{Command, Param, ParamRange};
pub use decode::decode_reply;
pub use ebb::Ebb;
pub use error::{BoardError, ErrorCode, Result};
#[cfg(feature = "async")]
pub use push::AsyncPushStream;
pub use push::{PushKind, PushListener, PushPacket, PushStream};
pub use session::{Session, SessionConfig};
pub use types::{CurrentReading, PinDirection, Port, PortState, TimerMode};
