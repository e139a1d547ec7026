//! # Childpipe Protocol
//!
//! Control commands, count replies and the line codec spoken between a
//! parent process and a childpipe agent.

#![warn(missing_docs)]

/// Control commands and replies
pub mod message;

/// Line codec for async streams
pub mod codec;

/// Error types for protocol operations
pub mod error;

pub use codec::LineCodec;
pub use error::ProtocolError;
pub use message::{Command, CountReply};
