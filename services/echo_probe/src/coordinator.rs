//! Fan-out over all partitions of the stream
//!
//! One poller task per partition, all sharing one completion signal and one
//! start instant. The coordinator joins every task before aggregating, so a
//! report always covers all partitions.

use crate::notice;
use crate::outcome::{duration_ms, Outcome, PartitionReport, ProbeReport};
use crate::partition::PartitionContext;
use crate::poller::{PartitionPoller, PollerSettings};
use crate::signal::CompletionSignal;
use message_sink::MessageSink;
use network::LinkConnector;
use probe_config::ProbeConfig;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info};

pub struct EchoCoordinator {
    config: Arc<ProbeConfig>,
    connector: Arc<dyn LinkConnector>,
    sink: Arc<dyn MessageSink>,
    settings: PollerSettings,
}

impl EchoCoordinator {
    pub fn new(
        config: Arc<ProbeConfig>,
        connector: Arc<dyn LinkConnector>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            config,
            connector,
            sink,
            settings: PollerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PollerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Run every partition to completion, starting now
    pub async fn run(&self) -> ProbeReport {
        self.run_from(chrono::Utc::now().timestamp()).await
    }

    /// Run with an explicit probe start (Unix seconds) for the selector window
    pub async fn run_from(&self, probe_start_secs: i64) -> ProbeReport {
        let started = Instant::now();
        let signal = CompletionSignal::new();
        let count = self.config.partition_count;

        info!(
            partitions = count,
            host = %self.config.eh_host,
            consumer_group = %self.config.consumer_group,
            "Starting echo detection"
        );

        let tasks: Vec<_> = (0..count)
            .map(|index| {
                let ctx = PartitionContext::new(index, self.config.partition_address(index), started);
                let poller = PartitionPoller::new(
                    ctx,
                    probe_start_secs,
                    self.connector.clone(),
                    self.sink.clone(),
                    signal.clone(),
                    self.settings,
                );
                tokio::spawn(poller.run())
            })
            .collect();

        let results = futures::future::join_all(tasks).await;
        let partitions = results
            .into_iter()
            .zip(0..count)
            .map(|(result, index)| {
                result.unwrap_or_else(|e| {
                    error!(partition = index, error = %e, "Poller task failed");
                    PartitionReport {
                        partition: index,
                        outcome: Outcome::ProtocolError,
                        received: 0,
                        rejected: 0,
                        elapsed: started.elapsed(),
                    }
                })
            })
            .collect();

        let report = ProbeReport::from_partitions(partitions);
        for partition in &report.partitions {
            info!(
                partition = partition.partition,
                outcome = %partition.outcome,
                received = partition.received,
                rejected = partition.rejected,
                elapsed_ms = duration_ms(partition.elapsed),
                "Partition result"
            );
        }
        info!(
            outcome = %report.outcome,
            signal = signal.is_set(),
            elapsed_ms = duration_ms(started.elapsed()),
            "Echo detection finished"
        );

        notice::publish(
            self.sink.as_ref(),
            notice::summary_notice(report.outcome, report.partitions.len()),
            "summary",
        )
        .await;
        report
    }
}
