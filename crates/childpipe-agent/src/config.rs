//! Agent configuration and channel endpoints

use std::convert::Infallible;
use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// Number of integers in the probed sequence
pub const DEFAULT_LIST_SIZE: usize = 50_000;

/// Work units performed per loop iteration
pub const DEFAULT_WORK_LOAD: usize = 50;

/// Pause between loop iterations, in milliseconds
pub const DEFAULT_SLEEP_MS: u64 = 20;

/// Inbound half of the control channel
pub type InboundChannel = Box<dyn AsyncRead + Unpin + Send>;

/// Outbound half of the control channel
pub type OutboundChannel = Box<dyn AsyncWrite + Unpin + Send>;

/// Runtime settings for one agent process
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Display label used in diagnostics only
    pub identity: String,
    /// Emit debug diagnostics
    pub debug: bool,
    /// Work units per iteration
    pub work_load: usize,
    /// Length of the probed sequence
    pub list_size: usize,
    /// Pause after each iteration
    pub sleep_interval: Duration,
    /// Treat a dead control channel as a shutdown request
    pub shutdown_on_channel_loss: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            identity: "child".to_string(),
            debug: false,
            work_load: DEFAULT_WORK_LOAD,
            list_size: DEFAULT_LIST_SIZE,
            sleep_interval: Duration::from_millis(DEFAULT_SLEEP_MS),
            shutdown_on_channel_loss: true,
        }
    }
}

impl AgentConfig {
    /// Default configuration with the given identity
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Default::default()
        }
    }
}

/// Where one half of the control channel lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSpec {
    /// The process's own stdin (inbound) or stdout (outbound), written `-`
    Stdio,
    /// A named pipe or file
    Path(PathBuf),
}

impl FromStr for ChannelSpec {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "-" => Self::Stdio,
            path => Self::Path(PathBuf::from(path)),
        })
    }
}

impl fmt::Display for ChannelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => f.write_str("-"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl ChannelSpec {
    /// Open this endpoint for reading commands.
    ///
    /// Opening a FIFO blocks until the parent opens the other end.
    pub fn open_inbound(&self) -> io::Result<InboundChannel> {
        match self {
            Self::Stdio => Ok(Box::new(tokio::io::stdin())),
            Self::Path(path) => {
                let file = OpenOptions::new().read(true).open(path)?;
                Ok(Box::new(tokio::fs::File::from_std(file)))
            }
        }
    }

    /// Open this endpoint for writing replies.
    ///
    /// Opening a FIFO blocks until the parent opens the other end.
    pub fn open_outbound(&self) -> io::Result<OutboundChannel> {
        match self {
            Self::Stdio => Ok(Box::new(tokio::io::stdout())),
            Self::Path(path) => {
                let file = OpenOptions::new().write(true).open(path)?;
                Ok(Box::new(tokio::fs::File::from_std(file)))
            }
        }
    }
}
