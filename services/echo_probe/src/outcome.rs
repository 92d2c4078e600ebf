//! Partition and probe outcomes

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    EchoReplyReceived,
    Timeout,
    ProtocolError,
    /// Classifier disposition only; never a partition's final outcome
    MalformedMessage,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::EchoReplyReceived => "EchoReplyReceived",
            Outcome::Timeout => "Timeout",
            Outcome::ProtocolError => "ProtocolError",
            Outcome::MalformedMessage => "MalformedMessage",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::EchoReplyReceived)
    }

    /// Combine per-partition outcomes into the probe outcome
    ///
    /// Any reply wins; all timeouts is a timeout; anything else, including an
    /// empty set, is a protocol error.
    pub fn aggregate<I>(outcomes: I) -> Outcome
    where
        I: IntoIterator<Item = Outcome>,
    {
        let mut any = false;
        let mut all_timeout = true;
        for outcome in outcomes {
            any = true;
            match outcome {
                Outcome::EchoReplyReceived => return Outcome::EchoReplyReceived,
                Outcome::Timeout => {}
                _ => all_timeout = false,
            }
        }
        if any && all_timeout {
            Outcome::Timeout
        } else {
            Outcome::ProtocolError
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final state of one partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionReport {
    pub partition: u32,
    pub outcome: Outcome,
    pub received: u64,
    pub rejected: u64,
    pub elapsed: Duration,
}

/// Result of one probe run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub outcome: Outcome,
    pub partitions: Vec<PartitionReport>,
}

impl ProbeReport {
    pub fn from_partitions(mut partitions: Vec<PartitionReport>) -> Self {
        partitions.sort_by_key(|p| p.partition);
        let outcome = Outcome::aggregate(partitions.iter().map(|p| p.outcome));
        Self { outcome, partitions }
    }

    pub fn partition(&self, index: u32) -> Option<&PartitionReport> {
        self.partitions.iter().find(|p| p.partition == index)
    }

    pub fn total_received(&self) -> u64 {
        self.partitions.iter().map(|p| p.received).sum()
    }
}

/// Milliseconds for log fields, saturating instead of truncating
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
