use std::path::PathBuf;

/// Errors that can occur in serial transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the serial port at the given path.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: serialport::Error,
    },

    /// Failed to enumerate serial ports.
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(serialport::Error),

    /// A serial port configuration call failed on an open port.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;
