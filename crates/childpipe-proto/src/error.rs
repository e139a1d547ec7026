//! Error types for protocol operations

use std::io;
use thiserror::Error;

/// Protocol-specific errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Underlying channel read or write failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Inbound line exceeded the codec limit
    #[error("Line too long: {size} bytes (max: {max})")]
    LineTooLong {
        /// Bytes buffered without a terminator
        size: usize,
        /// Maximum allowed line length
        max: usize,
    },

    /// Outbound text would split into more than one line
    #[error("Line contains an embedded newline")]
    EmbeddedNewline,

    /// Reply line was not a decimal count
    #[error("Invalid count reply: {0:?}")]
    InvalidCount(String),
}
