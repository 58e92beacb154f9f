use std::fmt;
use std::io;

use eibot_board::BoardError;
use eibot_line::LineError;
use eibot_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DEVICE_ERROR: i32 = 40;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn line_error(context: &str, err: LineError) -> CliError {
    match err {
        LineError::Io(source) => io_error(context, source),
        LineError::InvalidLine(_) => CliError::new(USAGE, format!("{context}: {err}")),
        LineError::LineTooLong { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        LineError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn board_error(context: &str, err: BoardError) -> CliError {
    match err {
        BoardError::Transport(err) => transport_error(context, err),
        BoardError::Line(err) => line_error(context, err),
        BoardError::Protocol { .. } => CliError::new(DEVICE_ERROR, format!("{context}: {err}")),
        BoardError::ResponseParse { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        BoardError::InvalidArgument { .. } | BoardError::PushActive => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        BoardError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        BoardError::Disconnected(_) | BoardError::Closed => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use eibot_board::ErrorCode;

    use super::*;

    #[test]
    fn device_errors_map_to_device_code() {
        let err = board_error(
            "send failed",
            BoardError::Protocol {
                code: ErrorCode::UnknownCommand,
                message: "Err: Unknown command".into(),
            },
        );
        assert_eq!(err.code, DEVICE_ERROR);
        assert!(err.message.starts_with("send failed: "));
    }

    #[test]
    fn local_failures_keep_their_class() {
        assert_eq!(
            board_error("x", BoardError::Timeout(Duration::from_secs(1))).code,
            TIMEOUT
        );
        assert_eq!(board_error("x", BoardError::PushActive).code, USAGE);
        assert_eq!(
            board_error(
                "x",
                BoardError::InvalidArgument {
                    name: "pin",
                    value: 9,
                    min: 0,
                    max: 7,
                }
            )
            .code,
            USAGE
        );
        assert_eq!(board_error("x", BoardError::Closed).code, FAILURE);
    }

    #[test]
    fn io_kinds_are_classified() {
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(
            board_error("open", BoardError::Transport(TransportError::Io(denied))).code,
            PERMISSION_DENIED
        );

        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert_eq!(line_error("read", LineError::Io(timed_out)).code, TIMEOUT);

        assert_eq!(
            transport_error("open", TransportError::Shutdown).code,
            TRANSPORT_ERROR
        );
    }
}
