use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use eibot_line::LineError;
use eibot_transport::TransportError;
use serde::Serialize;

/// Symbolic error kinds carried in-band by the protocol.
///
/// The `!<digit>` codes are reported by the board. `CommError` and
/// `ResponseError` are synthesized on the host and never appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unused0,
    Unused1,
    TxBufferOverrun,
    RxBufferOverrun,
    MissingParameter,
    NeedCommaNext,
    InvalidParameterValue,
    ExtraParameter,
    UnknownCommand,
    CommError,
    ResponseError,
}

static SENTINELS: LazyLock<HashMap<&'static str, ErrorCode>> = LazyLock::new(|| {
    ErrorCode::ALL
        .iter()
        .map(|code| (code.sentinel(), *code))
        .collect()
});

impl ErrorCode {
    pub const ALL: [ErrorCode; 11] = [
        ErrorCode::Unused0,
        ErrorCode::Unused1,
        ErrorCode::TxBufferOverrun,
        ErrorCode::RxBufferOverrun,
        ErrorCode::MissingParameter,
        ErrorCode::NeedCommaNext,
        ErrorCode::InvalidParameterValue,
        ErrorCode::ExtraParameter,
        ErrorCode::UnknownCommand,
        ErrorCode::CommError,
        ErrorCode::ResponseError,
    ];

    /// Look up the code for a wire sentinel such as `"!4"` or `"CE"`.
    pub fn from_sentinel(sentinel: &str) -> Option<Self> {
        SENTINELS.get(sentinel).copied()
    }

    /// The sentinel string this code is reported with.
    pub fn sentinel(self) -> &'static str {
        match self {
            ErrorCode::Unused0 => "!0",
            ErrorCode::Unused1 => "!1",
            ErrorCode::TxBufferOverrun => "!2",
            ErrorCode::RxBufferOverrun => "!3",
            ErrorCode::MissingParameter => "!4",
            ErrorCode::NeedCommaNext => "!5",
            ErrorCode::InvalidParameterValue => "!6",
            ErrorCode::ExtraParameter => "!7",
            ErrorCode::UnknownCommand => "!8",
            ErrorCode::CommError => "CE",
            ErrorCode::ResponseError => "RE",
        }
    }

    /// Buffer overruns are transient; every other code points at a host bug.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCode::TxBufferOverrun | ErrorCode::RxBufferOverrun)
    }

    /// Whether the code is synthesized on the host rather than sent by the board.
    pub fn is_host_side(self) -> bool {
        matches!(self, ErrorCode::CommError | ErrorCode::ResponseError)
    }

    fn description(self) -> &'static str {
        match self {
            ErrorCode::Unused0 | ErrorCode::Unused1 => "unused error code",
            ErrorCode::TxBufferOverrun => "transmit buffer overrun",
            ErrorCode::RxBufferOverrun => "receive buffer overrun",
            ErrorCode::MissingParameter => "missing parameter",
            ErrorCode::NeedCommaNext => "comma expected",
            ErrorCode::InvalidParameterValue => "invalid parameter value",
            ErrorCode::ExtraParameter => "extra parameter",
            ErrorCode::UnknownCommand => "unknown command",
            ErrorCode::CommError => "communication error",
            ErrorCode::ResponseError => "response error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.sentinel(), self.description())
    }
}

/// Errors that can occur talking to a board.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// A parameter is outside its documented range. Nothing was sent.
    #[error("invalid argument {name}={value}: must be between {min} and {max}")]
    InvalidArgument {
        name: &'static str,
        value: i128,
        min: i64,
        max: i64,
    },

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Line codec error.
    #[error("line error: {0}")]
    Line(#[from] LineError),

    /// The board answered with an error sentinel.
    #[error("board reported {code}: {message}")]
    Protocol { code: ErrorCode, message: String },

    /// A reply could not be decoded into the expected shape.
    #[error("cannot parse response {response:?}: {reason}")]
    ResponseParse { response: String, reason: String },

    /// The read side of the connection ended.
    #[error("board disconnected: {0}")]
    Disconnected(String),

    /// No reply arrived within the configured response timeout.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The reply would share a tag with push packets while a subscription is active.
    #[error("push subscription active; cancel it before polling inputs")]
    PushActive,

    /// The session was closed.
    #[error("session closed")]
    Closed,
}

impl BoardError {
    /// The symbolic error code for this failure, if it has one.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            BoardError::Protocol { code, .. } => Some(*code),
            BoardError::ResponseParse { .. } => Some(ErrorCode::ResponseError),
            BoardError::Transport(_)
            | BoardError::Line(_)
            | BoardError::Disconnected(_)
            | BoardError::Timeout(_)
            | BoardError::Closed => Some(ErrorCode::CommError),
            BoardError::InvalidArgument { .. } | BoardError::PushActive => None,
        }
    }

    pub(crate) fn parse(response: &str, reason: impl Into<String>) -> Self {
        BoardError::ResponseParse {
            response: response.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BoardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_maps_back_from_its_sentinel() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_sentinel(code.sentinel()), Some(code));
        }
    }

    #[test]
    fn unknown_sentinels_do_not_map() {
        assert_eq!(ErrorCode::from_sentinel("!9"), None);
        assert_eq!(ErrorCode::from_sentinel("OK"), None);
        assert_eq!(ErrorCode::from_sentinel(""), None);
    }

    #[test]
    fn only_overruns_are_retryable() {
        let retryable: Vec<_> = ErrorCode::ALL
            .into_iter()
            .filter(|code| code.is_retryable())
            .collect();
        assert_eq!(
            retryable,
            vec![ErrorCode::TxBufferOverrun, ErrorCode::RxBufferOverrun]
        );
    }

    #[test]
    fn error_codes_by_failure_class() {
        let protocol = BoardError::Protocol {
            code: ErrorCode::UnknownCommand,
            message: "Err: Unknown command".into(),
        };
        assert_eq!(protocol.error_code(), Some(ErrorCode::UnknownCommand));
        assert_eq!(
            BoardError::Disconnected("eof".into()).error_code(),
            Some(ErrorCode::CommError)
        );
        assert_eq!(
            BoardError::Line(LineError::ConnectionClosed).error_code(),
            Some(ErrorCode::CommError)
        );
        assert_eq!(
            BoardError::parse("x", "bad").error_code(),
            Some(ErrorCode::ResponseError)
        );
        let invalid = BoardError::InvalidArgument {
            name: "pin",
            value: 9,
            min: 0,
            max: 7,
        };
        assert_eq!(invalid.error_code(), None);
    }

    #[test]
    fn display_includes_bounds() {
        let err = BoardError::InvalidArgument {
            name: "pin",
            value: 9,
            min: 0,
            max: 7,
        };
        assert_eq!(
            err.to_string(),
            "invalid argument pin=9: must be between 0 and 7"
        );
        assert_eq!(
            ErrorCode::MissingParameter.to_string(),
            "!4 (missing parameter)"
        );
    }

    #[test]
    fn error_code_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorCode::RxBufferOverrun).unwrap();
        assert_eq!(json, "\"rx_buffer_overrun\"");
    }
}
