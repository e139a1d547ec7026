//! Agent composition root

use crate::channel::{ControlChannelAgent, ListenerReport};
use crate::config::AgentConfig;
use crate::counter::SharedCounter;
use crate::shutdown::ShutdownFlag;
use crate::work::{ListProbe, WorkLoop, Workload};
use anyhow::{anyhow, Context, Result};
use std::thread;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

/// How long runtime teardown waits for blocking I/O threads
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Name of the thread that serves the control channel
pub const LISTENER_THREAD_NAME: &str = "childpipe-listener";

/// Outcome of a complete agent run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReport {
    /// Work loop iterations completed
    pub iterations: u64,
    /// How the control channel listener finished
    pub listener: ListenerReport,
    /// Work counted but never reported to the parent
    pub unreported: u64,
}

/// Wires the counter, shutdown flag, listener and work loop together
pub struct Agent<R, W, L = ListProbe> {
    config: AgentConfig,
    reader: R,
    writer: W,
    workload: L,
}

impl<R, W> Agent<R, W, ListProbe>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Create an agent over a channel pair using the list-probe workload
    pub fn new(config: AgentConfig, reader: R, writer: W) -> Self {
        let workload = ListProbe::new(config.list_size);
        Self {
            config,
            reader,
            writer,
            workload,
        }
    }
}

impl<R, W, L> Agent<R, W, L>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    L: Workload,
{
    /// Replace the simulated workload
    pub fn with_workload<T: Workload>(self, workload: T) -> Agent<R, W, T> {
        Agent {
            config: self.config,
            reader: self.reader,
            writer: self.writer,
            workload,
        }
    }

    /// Run until shutdown.
    ///
    /// The listener runs on a current-thread runtime driven by one
    /// dedicated thread while the work loop runs on the calling thread.
    /// Returns only after the listener has exited and released both
    /// channel halves.
    pub fn run(self) -> Result<AgentReport> {
        let Self {
            config,
            reader,
            writer,
            mut workload,
        } = self;

        let counter = SharedCounter::new();
        let shutdown = ShutdownFlag::new();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build listener runtime")?;

        let listener = ControlChannelAgent::new(reader, writer, counter.clone(), shutdown.clone())
            .with_identity(config.identity.clone())
            .with_shutdown_on_channel_loss(config.shutdown_on_channel_loss);
        let listener_thread = thread::Builder::new()
            .name(LISTENER_THREAD_NAME.to_string())
            .spawn(move || {
                let report = runtime.block_on(listener.run());
                runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
                report
            })
            .context("Failed to spawn listener thread")?;
        debug!(child = %config.identity, "Control channel listener spawned");

        let iterations = WorkLoop::new(counter.clone(), shutdown.clone())
            .with_work_load(config.work_load)
            .with_sleep_interval(config.sleep_interval)
            .run(&mut workload);

        let listener_report = listener_thread
            .join()
            .map_err(|_| anyhow!("Control channel listener panicked"))?;

        let report = AgentReport {
            iterations,
            listener: listener_report,
            unreported: counter.get_and_reset(),
        };
        info!(
            child = %config.identity,
            iterations = report.iterations,
            replies = report.listener.replies_sent,
            "Agent finished: {:?}",
            report.listener.exit
        );
        Ok(report)
    }
}
