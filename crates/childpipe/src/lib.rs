//! # Childpipe
//!
//! Parent-side control of childpipe worker agents: spawn an agent with
//! piped stdio channels, poll the work it has done, and stop it.

#![warn(missing_docs)]

pub use childpipe_proto as proto;

/// Error types for the Childpipe library
pub mod error;

/// Child session management
pub mod session;

pub use error::ChildPipeError;
pub use session::{ChildSession, SessionBuilder};

/// Result type alias for Childpipe operations
pub type Result<T> = std::result::Result<T, ChildPipeError>;
