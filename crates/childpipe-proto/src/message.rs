//! Control commands and replies

use crate::ProtocolError;
use std::fmt;

/// Wire text of the counter read-and-reset command
pub const UPDATE: &str = "Update";

/// Wire text of the shutdown command
pub const STOP: &str = "Stop";

/// A command received from the parent on the inbound channel.
///
/// Matching is exact and case-sensitive. Anything other than the two
/// verbs is kept as [`Command::Unrecognized`] so callers can log it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Report the work done since the last report and reset the count
    Update,
    /// Finish the current unit of work and exit
    Stop,
    /// Any other non-empty line; ignored by the agent
    Unrecognized(String),
}

impl Command {
    /// Parse one inbound line.
    ///
    /// Returns `None` for an empty line, which is never dispatched.
    pub fn parse(line: &str) -> Option<Self> {
        match line {
            "" => None,
            UPDATE => Some(Self::Update),
            STOP => Some(Self::Stop),
            other => Some(Self::Unrecognized(other.to_string())),
        }
    }

    /// The text sent on the wire for this command
    pub fn as_line(&self) -> &str {
        match self {
            Self::Update => UPDATE,
            Self::Stop => STOP,
            Self::Unrecognized(text) => text,
        }
    }

    /// Whether this is one of the protocol verbs
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_line())
    }
}

/// Reply to [`Command::Update`]: the pre-reset work count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountReply(pub u64);

impl CountReply {
    /// Decimal wire form, without the terminator
    pub fn to_line(&self) -> String {
        self.0.to_string()
    }

    /// Parse a reply line sent by an agent
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        line.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ProtocolError::InvalidCount(line.to_string()))
    }
}

impl From<CountReply> for u64 {
    fn from(reply: CountReply) -> Self {
        reply.0
    }
}
