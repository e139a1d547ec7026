//! Childpipe Agent Binary
//!
//! Started by a parent process with the outbound and inbound channel
//! identifiers, a display identity and a debug flag.

use anyhow::{Context, Result};
use childpipe_agent::config::{DEFAULT_LIST_SIZE, DEFAULT_SLEEP_MS, DEFAULT_WORK_LOAD};
use childpipe_agent::{Agent, AgentConfig, ChannelSpec};
use clap::Parser;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "childpipe-agent", about = "Pipe-controlled worker agent", version, long_about = None)]
struct Cli {
    /// Outbound channel: `-` for stdout, otherwise a FIFO or file path
    outbound: ChannelSpec,

    /// Inbound channel: `-` for stdin, otherwise a FIFO or file path
    inbound: ChannelSpec,

    /// Display identity used in diagnostics
    identity: String,

    /// `true` enables debug diagnostics; anything else disables them
    #[arg(default_value = "false")]
    debug: String,

    /// Work units per loop iteration
    #[arg(long, default_value_t = DEFAULT_WORK_LOAD)]
    work_load: usize,

    /// Length of the probed sequence
    #[arg(long, default_value_t = DEFAULT_LIST_SIZE)]
    list_size: usize,

    /// Pause between iterations in milliseconds
    #[arg(long, default_value_t = DEFAULT_SLEEP_MS)]
    sleep_ms: u64,

    /// Keep working after the control channel is lost
    #[arg(long)]
    keep_working_on_disconnect: bool,
}

impl Cli {
    fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            identity: self.identity.clone(),
            debug: self.debug == "true",
            work_load: self.work_load,
            list_size: self.list_size,
            sleep_interval: Duration::from_millis(self.sleep_ms),
            shutdown_on_channel_loss: !self.keep_working_on_disconnect,
        }
    }
}

fn main() -> Result<()> {
    if std::env::args_os().len() <= 1 {
        println!("No arguments were given, closing program.");
        return Ok(());
    }

    let cli = Cli::parse();
    let config = cli.agent_config();
    init_tracing(config.debug);

    if let Err(e) = run(&cli, config) {
        error!(child = %cli.identity, "Agent error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn run(cli: &Cli, config: AgentConfig) -> Result<()> {
    debug!(child = %config.identity, "Pipe direction out: {}", cli.outbound);
    debug!(child = %config.identity, "Pipe direction in: {}", cli.inbound);

    let writer = cli
        .outbound
        .open_outbound()
        .with_context(|| format!("Failed to open outbound channel {}", cli.outbound))?;
    let reader = cli
        .inbound
        .open_inbound()
        .with_context(|| format!("Failed to open inbound channel {}", cli.inbound))?;

    let identity = config.identity.clone();
    let report = Agent::new(config, reader, writer).run()?;

    debug!(child = %identity, "Work done but never reported: {}", report.unreported);
    if report.listener.exit.is_channel_loss() {
        info!(child = %identity, "Control channel lost, closing program.");
    } else {
        info!(child = %identity, "The parent process has sent Stop, closing program.");
    }
    Ok(())
}

/// Diagnostics go to stderr; stdout may be the outbound channel.
fn init_tracing(debug: bool) {
    let default_directive = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
