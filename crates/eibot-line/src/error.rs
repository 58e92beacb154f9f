/// Errors that can occur during line encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum LineError {
    /// An outbound line is not plain ASCII or embeds a line terminator.
    #[error("invalid command line {0:?} (must be ASCII without CR/LF)")]
    InvalidLine(String),

    /// An inbound line exceeds the configured maximum length.
    #[error("line too long ({size} bytes, max {max})")]
    LineTooLong { size: usize, max: usize },

    /// An I/O error occurred while reading or writing lines.
    #[error("line I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, LineError>;
