//! Error types for the Childpipe library

use childpipe_proto::ProtocolError;
use std::time::Duration;
use thiserror::Error;

/// Main error type for Childpipe operations
#[derive(Debug, Error)]
pub enum ChildPipeError {
    /// The agent process could not be started
    #[error("Spawn error: {0}")]
    Spawn(String),

    /// Protocol-related errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The agent closed its outbound channel before replying
    #[error("Channel closed by agent")]
    ChannelClosed,

    /// The inbound channel to the agent has already been closed
    #[error("Session already stopped")]
    AlreadyStopped,

    /// Timeout errors
    #[error("Timeout after {duration:?}")]
    Timeout {
        /// Duration that was exceeded
        duration: Duration,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
