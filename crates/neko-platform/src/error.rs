//! Platform-specific errors

use thiserror::Error;

/// Virtual interface errors
#[derive(Error, Debug)]
pub enum PlatformError {
    /// The system refused the interface settings
    #[error("Interface configuration rejected: {0}")]
    ConfigurationRejected(String),

    /// Reading a packet batch failed
    #[error("Read error: {0}")]
    ReadFailed(String),

    /// Writing a packet batch failed
    #[error("Write error: {0}")]
    WriteFailed(String),

    /// The flow was used after [`close`](crate::PacketFlow::close)
    #[error("Packet flow is closed")]
    Closed,

    /// Replay input line is not a packet
    #[error("Invalid replay input at line {line}: {message}")]
    InvalidReplay {
        /// 1-based line number
        line: usize,
        /// What was wrong
        message: String,
    },

    /// Replay input line is not valid hex
    #[error("Invalid hex at line {line}: {source}")]
    HexDecode {
        /// 1-based line number
        line: usize,
        /// Underlying error
        #[source]
        source: hex::FromHexError,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Platform result type
pub type Result<T> = std::result::Result<T, PlatformError>;
