//! One partition's receive lifecycle
//!
//! ```text
//! Bootstrapping → FilterReady → LinkOpen → Polling ⇄ Draining → Finished
//! ```
//!
//! The filter is built before any network call. Polling alternates one
//! `do_work()` step with a short sleep and stops on the shared completion
//! signal or the partition deadline, whichever is observed first. Deliveries
//! already handed back by a step are always classified and settled before
//! the stop condition is re-checked.

use crate::classifier::{classify, Disposition};
use crate::constants::{DEFAULT_PARTITION_DEADLINE, DEFAULT_POLL_QUANTUM};
use crate::error::Result;
use crate::filter::build_filter;
use crate::notice;
use crate::outcome::{duration_ms, Outcome, PartitionReport};
use crate::partition::PartitionContext;
use crate::signal::CompletionSignal;
use message_sink::MessageSink;
use network::{LinkConnector, ReceiverLink, ReceiverOptions};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Deadline and poll quantum for every partition of a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    pub deadline: Duration,
    pub poll_quantum: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_PARTITION_DEADLINE,
            poll_quantum: DEFAULT_POLL_QUANTUM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Bootstrapping,
    FilterReady,
    LinkOpen,
    Polling,
    Draining,
    Finished(Outcome),
}

impl fmt::Display for PollerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollerState::Bootstrapping => f.write_str("Bootstrapping"),
            PollerState::FilterReady => f.write_str("FilterReady"),
            PollerState::LinkOpen => f.write_str("LinkOpen"),
            PollerState::Polling => f.write_str("Polling"),
            PollerState::Draining => f.write_str("Draining"),
            PollerState::Finished(outcome) => write!(f, "Finished({outcome})"),
        }
    }
}

pub struct PartitionPoller {
    ctx: PartitionContext,
    state: PollerState,
    probe_start_secs: i64,
    connector: Arc<dyn LinkConnector>,
    sink: Arc<dyn MessageSink>,
    signal: CompletionSignal,
    settings: PollerSettings,
}

impl PartitionPoller {
    pub fn new(
        ctx: PartitionContext,
        probe_start_secs: i64,
        connector: Arc<dyn LinkConnector>,
        sink: Arc<dyn MessageSink>,
        signal: CompletionSignal,
        settings: PollerSettings,
    ) -> Self {
        Self {
            ctx,
            state: PollerState::Bootstrapping,
            probe_start_secs,
            connector,
            sink,
            signal,
            settings,
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    fn transition(&mut self, next: PollerState) {
        debug!(partition = self.ctx.index, from = %self.state, to = %next, "Poller state change");
        self.state = next;
    }

    fn finish(&mut self, outcome: Outcome) -> PartitionReport {
        self.ctx.finish(outcome);
        self.transition(PollerState::Finished(outcome));
        let report = self.ctx.report();
        info!(
            partition = report.partition,
            outcome = %report.outcome,
            received = report.received,
            rejected = report.rejected,
            elapsed_ms = duration_ms(report.elapsed),
            "Partition finished"
        );
        report
    }

    /// Build the filter and the link options; no network I/O
    fn receiver_options(&mut self) -> Result<ReceiverOptions> {
        let window = build_filter(self.probe_start_secs)?;
        self.transition(PollerState::FilterReady);
        Ok(ReceiverOptions::new(self.ctx.address.clone()).with_filter(window.expression))
    }

    /// Drive the partition to a final outcome
    pub async fn run(mut self) -> PartitionReport {
        let options = match self.receiver_options() {
            Ok(options) => options,
            Err(e) => {
                warn!(partition = self.ctx.index, error = %e, "Filter build failed");
                return self.finish(Outcome::ProtocolError);
            }
        };

        let mut link = match self.connector.open_receiver(options).await {
            Ok(link) => link,
            Err(e) => {
                warn!(partition = self.ctx.index, address = %self.ctx.address, error = %e, "Bootstrap failed");
                return self.finish(Outcome::ProtocolError);
            }
        };
        self.transition(PollerState::LinkOpen);

        let outcome = self.poll(link.as_mut()).await;
        if let Err(e) = link.close().await {
            debug!(partition = self.ctx.index, error = %e, "Link close failed");
        }
        self.finish(outcome)
    }

    async fn poll(&mut self, link: &mut dyn ReceiverLink) -> Outcome {
        self.transition(PollerState::Polling);
        loop {
            let deliveries = match link.do_work().await {
                Ok(deliveries) => deliveries,
                Err(e) => {
                    warn!(partition = self.ctx.index, error = %e, "Link failed while polling");
                    return Outcome::ProtocolError;
                }
            };

            for delivery in deliveries {
                let classification =
                    classify(&mut self.ctx, &delivery.payload, &self.signal, self.sink.as_ref()).await;
                if let Err(e) = link.settle(&delivery, classification.acknowledgement).await {
                    warn!(partition = self.ctx.index, delivery_id = delivery.delivery_id, error = %e, "Settlement failed");
                    return Outcome::ProtocolError;
                }
                if classification.disposition == Disposition::EchoReplyReceived
                    && self.state == PollerState::Polling
                {
                    self.transition(PollerState::Draining);
                }
            }

            tokio::time::sleep(self.settings.poll_quantum).await;

            if self.signal.is_set() {
                return Outcome::EchoReplyReceived;
            }
            if self.ctx.started.elapsed() >= self.settings.deadline {
                info!(partition = self.ctx.index, "No echo reply before the deadline");
                notice::publish(self.sink.as_ref(), notice::timeout_notice(self.ctx.index), "timeout")
                    .await;
                return Outcome::Timeout;
            }
        }
    }
}
