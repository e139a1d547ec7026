//! # Childpipe Agent
//!
//! A child process that performs simulated work while a parent process
//! polls its progress and stops it over a pair of line-oriented pipes.

#![warn(missing_docs)]

/// Composition root
pub mod agent;

/// Control channel listener
pub mod channel;

/// Configuration and channel endpoints
pub mod config;

/// Shared work counter
pub mod counter;

/// Shutdown signalling
pub mod shutdown;

/// Simulated workload and work loop
pub mod work;

pub use agent::{Agent, AgentReport};
pub use channel::{ControlChannelAgent, ListenerExit, ListenerReport};
pub use config::{AgentConfig, ChannelSpec};
pub use counter::SharedCounter;
pub use shutdown::ShutdownFlag;
pub use work::{ListProbe, WorkLoop, Workload};
