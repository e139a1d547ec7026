//! Child session management

use crate::{ChildPipeError, Result};
use childpipe_proto::{Command, CountReply, LineCodec};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tracing::{debug, info, warn};

/// Channel identifier telling the agent to use its own stdio
const STDIO_CHANNEL: &str = "-";

/// Builder for spawning an agent process
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    /// Agent executable
    program: PathBuf,
    /// Display identity passed to the agent
    identity: String,
    /// Debug flag passed to the agent
    debug: bool,
    /// Extra options appended after the positional arguments
    extra_args: Vec<OsString>,
    /// How long `stop` waits for the process to exit
    stop_timeout: Duration,
}

impl SessionBuilder {
    /// Create a new session builder for the given agent executable
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            identity: "child".to_string(),
            debug: false,
            extra_args: Vec::new(),
            stop_timeout: Duration::from_secs(10),
        }
    }

    /// Set the display identity
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Enable/disable agent debug diagnostics
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Append an extra agent option such as `--sleep-ms`
    pub fn with_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Set how long `stop` waits before killing the agent
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Build the agent argument list
    fn build_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            STDIO_CHANNEL.into(),
            STDIO_CHANNEL.into(),
            self.identity.clone().into(),
            if self.debug { "true" } else { "false" }.into(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Spawn the agent with its stdin and stdout as the control channel.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> Result<ChildSession<ChildStdout, ChildStdin>> {
        let args = self.build_args();
        debug!("Spawning agent: {} {:?}", self.program.display(), args);

        let mut child = tokio::process::Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ChildPipeError::Spawn(format!("{}: {}", self.program.display(), e)))?;

        let writer = child
            .stdin
            .take()
            .ok_or_else(|| ChildPipeError::Spawn("agent stdin not captured".to_string()))?;
        let reader = child
            .stdout
            .take()
            .ok_or_else(|| ChildPipeError::Spawn("agent stdout not captured".to_string()))?;

        info!("Spawned agent {} (pid {:?})", self.identity, child.id());

        let mut session = ChildSession::with_io(reader, writer)
            .with_identity(self.identity)
            .with_stop_timeout(self.stop_timeout);
        session.child = Some(child);
        Ok(session)
    }
}

/// Parent end of one agent's control channel
pub struct ChildSession<R, W> {
    /// Replies from the agent
    reader: R,
    /// Commands to the agent; `None` once closed
    writer: Option<W>,
    /// Line framing for both directions
    codec: LineCodec,
    /// Agent process, when this session spawned it
    child: Option<Child>,
    /// Display identity of the agent
    identity: String,
    /// How long `stop` waits for the process to exit
    stop_timeout: Duration,
}

impl<R, W> ChildSession<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Wrap an already connected channel pair
    pub fn with_io(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer: Some(writer),
            codec: LineCodec::new(),
            child: None,
            identity: "child".to_string(),
            stop_timeout: Duration::from_secs(10),
        }
    }

    fn with_identity(mut self, identity: String) -> Self {
        self.identity = identity;
        self
    }

    fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Display identity of the agent
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// OS process id of a spawned agent
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Send a raw line to the agent
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(ChildPipeError::AlreadyStopped)?;
        self.codec.write_line(writer, line).await?;
        Ok(())
    }

    /// Send a control command to the agent
    pub async fn send_command(&mut self, command: &Command) -> Result<()> {
        debug!("Sending {} to agent {}", command, self.identity);
        self.send_line(command.as_line()).await
    }

    /// Ask for the work done since the previous update
    pub async fn update(&mut self) -> Result<u64> {
        self.send_command(&Command::Update).await?;

        let line = self
            .codec
            .read_line(&mut self.reader)
            .await?
            .ok_or(ChildPipeError::ChannelClosed)?;
        let reply = CountReply::parse(&line)?;

        debug!("Agent {} reported {} iterations", self.identity, reply.0);
        Ok(reply.into())
    }

    /// Send `Stop`, close the command channel and wait for the agent.
    ///
    /// Returns the exit status for spawned agents and `None` for sessions
    /// built with [`ChildSession::with_io`]. An agent that outlives the
    /// stop timeout is killed and reported as [`ChildPipeError::Timeout`].
    pub async fn stop(mut self) -> Result<Option<ExitStatus>> {
        self.send_command(&Command::Stop).await?;
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("Closing command channel to {} failed: {}", self.identity, e);
            }
        }

        let Some(mut child) = self.child.take() else {
            return Ok(None);
        };

        match tokio::time::timeout(self.stop_timeout, child.wait()).await {
            Ok(status) => {
                let status = status?;
                info!("Agent {} exited with {}", self.identity, status);
                Ok(Some(status))
            }
            Err(_) => {
                warn!("Agent {} did not exit within {:?}, killing", self.identity, self.stop_timeout);
                child.kill().await?;
                Err(ChildPipeError::Timeout {
                    duration: self.stop_timeout,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests;
