//! Per-partition state owned by one poller

use crate::outcome::{Outcome, PartitionReport};
use tokio::time::Instant;

#[derive(Debug)]
pub struct PartitionContext {
    pub index: u32,
    /// Link address of the partition on the stream endpoint
    pub address: String,
    /// Probe start, shared by all partitions of one probe
    pub started: Instant,
    /// Ordinary (non-reply) messages classified
    pub received: u64,
    /// Unreadable messages rejected
    pub rejected: u64,
    pub reply_seen: bool,
    pub outcome: Option<Outcome>,
}

impl PartitionContext {
    pub fn new(index: u32, address: impl Into<String>, started: Instant) -> Self {
        Self {
            index,
            address: address.into(),
            started,
            received: 0,
            rejected: 0,
            reply_seen: false,
            outcome: None,
        }
    }

    pub fn finish(&mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
    }

    pub fn report(&self) -> PartitionReport {
        PartitionReport {
            partition: self.index,
            outcome: self.outcome.unwrap_or(Outcome::ProtocolError),
            received: self.received,
            rejected: self.rejected,
            elapsed: self.started.elapsed(),
        }
    }
}
