//! Echo probe binary
//!
//! Usage: echo_probe --config probe.json

use anyhow::{Context, Result};
use clap::Parser;
use echo_probe::sender::default_sender_for;
use echo_probe::{DeviceConnectionString, EchoProbe, Outcome, PollerSettings};
use message_sink::{BroadcastSink, MessageSink};
use network::{AmqpConnector, LinkSettings, PlainCredentials};
use probe_config::ProbeConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(name = "echo_probe", about = "Device-to-cloud echo round-trip probe")]
struct Args {
    /// JSON configuration file
    #[clap(long, short, default_value = "probe.json")]
    config: PathBuf,

    /// Log level used when RUST_LOG is unset
    #[clap(long, default_value = "info")]
    log_level: String,

    /// Override the per-partition deadline (seconds)
    #[clap(long)]
    deadline_secs: Option<u64>,

    /// Override the startup delay (milliseconds)
    #[clap(long)]
    startup_delay_ms: Option<u64>,
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).context("Invalid --log-level")?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Local consumer that logs every notice on the bus
fn spawn_notice_logger(bus: &BroadcastSink) -> tokio::task::JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(message) => info!(
                    payload = %String::from_utf8_lossy(&message.payload),
                    properties = ?message.properties,
                    "Notice"
                ),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Notice logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let mut config = ProbeConfig::load(&args.config)?;
    if let Some(ms) = args.startup_delay_ms {
        config.startup_delay = Duration::from_millis(ms);
    }
    info!(config = ?config, "Starting echo probe");

    let device: DeviceConnectionString = config
        .device_connection_string
        .parse()
        .context("Invalid DeviceConnectionString")?;
    let sender = default_sender_for(config.protocol, device).context("Failed to create echo sender")?;

    let connector = AmqpConnector::new(
        config.eh_host.clone(),
        PlainCredentials::new(config.eh_key_name.clone(), config.eh_key.clone()),
        LinkSettings::default(),
    )
    .context("Failed to create AMQP connector")?;

    let bus = Arc::new(BroadcastSink::new("probe-bus"));
    let logger = spawn_notice_logger(&bus);
    bus.connect().await.context("Failed to start local bus")?;

    let mut settings = PollerSettings::default();
    if let Some(secs) = args.deadline_secs {
        settings.deadline = Duration::from_secs(secs);
    }

    let probe = EchoProbe::new(&config, bus.clone(), sender, Arc::new(connector))
        .with_poller_settings(settings);

    let code = match probe.run().await {
        Ok(report) => {
            for partition in &report.partitions {
                info!(
                    partition = partition.partition,
                    outcome = %partition.outcome,
                    received = partition.received,
                    rejected = partition.rejected,
                    "Partition summary"
                );
            }
            info!(outcome = %report.outcome, "Probe finished");
            match report.outcome {
                Outcome::EchoReplyReceived => ExitCode::SUCCESS,
                Outcome::Timeout => ExitCode::from(2),
                _ => ExitCode::from(1),
            }
        }
        Err(e) => {
            error!(error = %e, "Probe failed");
            ExitCode::from(1)
        }
    };

    if let Err(e) = bus.disconnect().await {
        warn!(error = %e, "Local bus shutdown failed");
    }
    drop(probe);
    drop(bus);
    if let Err(e) = logger.await {
        warn!(error = %e, "Notice logger failed");
    }
    Ok(code)
}
