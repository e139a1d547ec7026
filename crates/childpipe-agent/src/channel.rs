//! Control channel listener
//!
//! Reads one command per line from the parent and answers `Update` with the
//! work done since the previous `Update`.

use crate::counter::SharedCounter;
use crate::shutdown::ShutdownFlag;
use childpipe_proto::{Command, CountReply, LineCodec, ProtocolError};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info};

/// Why the listener stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerExit {
    /// Shutdown was requested before the next read
    Stopped,
    /// The parent closed the inbound channel
    ChannelClosed,
    /// A read or write on the channel failed
    ChannelError(String),
}

impl ListenerExit {
    /// Whether the control channel is gone
    pub fn is_channel_loss(&self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

/// Summary of one listener run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerReport {
    /// Why the loop ended
    pub exit: ListenerExit,
    /// Count replies written to the parent
    pub replies_sent: u64,
    /// Non-empty lines that were not commands, oversized lines included
    pub lines_ignored: u64,
}

/// Owns both channel halves and serves the control protocol
pub struct ControlChannelAgent<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Commands from the parent
    reader: R,
    /// Replies to the parent
    writer: W,
    /// Line framing for both directions
    codec: LineCodec,
    /// Work count read on `Update`
    counter: SharedCounter,
    /// Set on `Stop`
    shutdown: ShutdownFlag,
    /// Label for diagnostics
    identity: String,
    /// Signal shutdown when the channel dies
    shutdown_on_channel_loss: bool,
}

impl<R, W> ControlChannelAgent<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Bind the listener to a channel pair and the shared state
    pub fn new(reader: R, writer: W, counter: SharedCounter, shutdown: ShutdownFlag) -> Self {
        Self {
            reader,
            writer,
            codec: LineCodec::new(),
            counter,
            shutdown,
            identity: String::new(),
            shutdown_on_channel_loss: true,
        }
    }

    /// Set the label used in diagnostics
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Choose whether a dead channel also requests shutdown
    pub fn with_shutdown_on_channel_loss(mut self, enabled: bool) -> Self {
        self.shutdown_on_channel_loss = enabled;
        self
    }

    /// Serve commands until shutdown or channel loss.
    ///
    /// Channel failures end the loop and are reported in the returned
    /// [`ListenerReport`]; they never propagate.
    pub async fn run(mut self) -> ListenerReport {
        info!(child = %self.identity, "Starting control channel listener");

        let mut replies_sent = 0u64;
        let mut lines_ignored = 0u64;

        let exit = loop {
            if self.shutdown.is_set() {
                break ListenerExit::Stopped;
            }

            let line = match self.codec.read_line(&mut self.reader).await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!(child = %self.identity, "Inbound channel closed by parent");
                    break ListenerExit::ChannelClosed;
                }
                Err(ProtocolError::LineTooLong { size, max }) => {
                    lines_ignored += 1;
                    debug!(child = %self.identity, "Ignoring oversized line: {} bytes (max: {})", size, max);
                    continue;
                }
                Err(e) => {
                    error!(child = %self.identity, "Error reading inbound channel: {}", e);
                    break ListenerExit::ChannelError(e.to_string());
                }
            };

            let Some(command) = Command::parse(&line) else {
                continue;
            };

            match command {
                Command::Update => match self.send_count().await {
                    Ok(count) => {
                        replies_sent += 1;
                        debug!(child = %self.identity, count, "Transmitted.");
                    }
                    Err(e) => {
                        error!(child = %self.identity, "Error writing outbound channel: {}", e);
                        break ListenerExit::ChannelError(e.to_string());
                    }
                },
                Command::Stop => {
                    info!(child = %self.identity, "Received Stop from parent");
                    self.shutdown.signal();
                }
                Command::Unrecognized(text) => {
                    lines_ignored += 1;
                    debug!(child = %self.identity, "Ignoring unrecognized line: {:?}", text);
                }
            }
        };

        if exit.is_channel_loss() && self.shutdown_on_channel_loss && !self.shutdown.is_set() {
            info!(child = %self.identity, "Control channel lost, requesting shutdown");
            self.shutdown.signal();
        }

        info!(child = %self.identity, "Control channel listener stopped: {:?}", exit);
        ListenerReport {
            exit,
            replies_sent,
            lines_ignored,
        }
    }

    /// Read-and-reset the counter and write the value back.
    ///
    /// Returns once the reply has been flushed, so the next read never
    /// overlaps a pending write.
    async fn send_count(&mut self) -> Result<u64, ProtocolError> {
        let count = self.counter.get_and_reset();
        let reply = CountReply(count).to_line();
        self.codec.write_line(&mut self.writer, &reply).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{duplex, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::time::{timeout, Duration};

    fn listener<R, W>(reader: R, writer: W) -> (ControlChannelAgent<R, W>, SharedCounter, ShutdownFlag)
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let counter = SharedCounter::new();
        let shutdown = ShutdownFlag::new();
        let agent = ControlChannelAgent::new(reader, writer, counter.clone(), shutdown.clone())
            .with_identity("test");
        (agent, counter, shutdown)
    }

    /// Writer whose every operation fails like a broken pipe
    struct BrokenPipe;

    impl AsyncWrite for BrokenPipe {
        fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_update_before_any_work_reports_zero() {
        let (parent_in, child_out) = duplex(256);
        let input = Cursor::new(b"Update\nStop\n".to_vec());
        let (agent, _counter, shutdown) = listener(input, child_out);

        let report = agent.run().await;

        assert_eq!(report.exit, ListenerExit::Stopped);
        assert_eq!(report.replies_sent, 1);
        assert!(shutdown.is_set());

        let mut replies = BufReader::new(parent_in).lines();
        assert_eq!(replies.next_line().await.unwrap().as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn test_update_reports_then_resets() {
        let (parent_in, child_out) = duplex(256);
        let (mut parent_out, child_in) = duplex(256);
        let (agent, counter, shutdown) = listener(child_in, child_out);
        let task = tokio::spawn(agent.run());
        let mut replies = BufReader::new(parent_in).lines();

        counter.increment();
        counter.increment();
        counter.increment();
        parent_out.write_all(b"Update\n").await.unwrap();
        assert_eq!(replies.next_line().await.unwrap().as_deref(), Some("3"));

        parent_out.write_all(b"Update\n").await.unwrap();
        assert_eq!(replies.next_line().await.unwrap().as_deref(), Some("0"));

        parent_out.write_all(b"Stop\n").await.unwrap();
        let report = timeout(Duration::from_secs(1), task).await.unwrap().unwrap();

        assert_eq!(report.exit, ListenerExit::Stopped);
        assert_eq!(report.replies_sent, 2);
        assert!(shutdown.is_set());
        // the listener has exited, so the reply stream ends
        assert!(replies.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_and_unknown_lines_are_ignored() {
        let input = Cursor::new(b"\nPing\nupdate\n\nStop\nUpdate\n".to_vec());
        let (agent, counter, shutdown) = listener(input, Vec::<u8>::new());
        counter.increment();

        let report = agent.run().await;

        assert_eq!(report.exit, ListenerExit::Stopped);
        assert_eq!(report.replies_sent, 0);
        assert_eq!(report.lines_ignored, 2);
        assert!(shutdown.is_set());
        // nothing read the counter
        assert_eq!(counter.get_and_reset(), 1);
    }

    #[tokio::test]
    async fn test_oversized_line_is_ignored() {
        let (parent_in, child_out) = duplex(256);
        let mut wire = vec![b'x'; 70 * 1024];
        wire.extend_from_slice(b"\nUpdate\nStop\n");
        let (agent, counter, shutdown) = listener(Cursor::new(wire), child_out);
        counter.increment();

        let report = agent.run().await;

        assert_eq!(report.exit, ListenerExit::Stopped);
        assert_eq!(report.replies_sent, 1);
        assert_eq!(report.lines_ignored, 1);
        assert!(shutdown.is_set());

        let mut raw = String::new();
        let mut parent_in = parent_in;
        parent_in.read_to_string(&mut raw).await.unwrap();
        assert_eq!(raw, "1\n");
    }

    #[tokio::test]
    async fn test_reply_wire_format() {
        let (parent_in, child_out) = duplex(256);
        let input = Cursor::new(b"Update\nStop\n".to_vec());
        let (agent, counter, _shutdown) = listener(input, child_out);
        for _ in 0..12 {
            counter.increment();
        }

        agent.run().await;

        let mut raw = String::new();
        let mut parent_in = parent_in;
        parent_in.read_to_string(&mut raw).await.unwrap();
        assert_eq!(raw, "12\n");
    }

    #[tokio::test]
    async fn test_channel_close_requests_shutdown_by_default() {
        let input = Cursor::new(b"Update\n".to_vec());
        let (agent, _counter, shutdown) = listener(input, Vec::<u8>::new());

        let report = agent.run().await;

        assert_eq!(report.exit, ListenerExit::ChannelClosed);
        assert!(shutdown.is_set());
    }

    #[tokio::test]
    async fn test_channel_close_can_leave_worker_running() {
        let input = Cursor::new(Vec::<u8>::new());
        let (agent, _counter, shutdown) = listener(input, Vec::<u8>::new());

        let report = agent.with_shutdown_on_channel_loss(false).run().await;

        assert_eq!(report.exit, ListenerExit::ChannelClosed);
        assert!(!shutdown.is_set());
    }

    #[tokio::test]
    async fn test_write_failure_ends_listener() {
        let input = Cursor::new(b"Update\nUpdate\n".to_vec());
        let (agent, _counter, shutdown) = listener(input, BrokenPipe);

        let report = agent.run().await;

        assert!(matches!(report.exit, ListenerExit::ChannelError(_)));
        assert_eq!(report.replies_sent, 0);
        assert!(shutdown.is_set());
    }

    #[tokio::test]
    async fn test_preset_shutdown_skips_read() {
        // a reader that would block forever
        let (_parent_out, child_in) = duplex(16);
        let (agent, _counter, shutdown) = listener(child_in, Vec::<u8>::new());
        shutdown.signal();

        let report = timeout(Duration::from_secs(1), agent.run()).await.unwrap();
        assert_eq!(report.exit, ListenerExit::Stopped);
    }

    #[test]
    fn test_listener_exit_classification() {
        assert!(!ListenerExit::Stopped.is_channel_loss());
        assert!(ListenerExit::ChannelClosed.is_channel_loss());
        assert!(ListenerExit::ChannelError("broken pipe".into()).is_channel_loss());
    }
}
