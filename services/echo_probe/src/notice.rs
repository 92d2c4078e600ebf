//! Notices published to the local bus
//!
//! Each notice is a self-contained [`Message`]. Publishing never fails the
//! caller; errors are logged.

use crate::constants::{
    properties, DELIVERY_REJECTED_MARKER, ECHO_REPLY_MARKER, ECHO_REQUEST_MARKER, NOTICE_SOURCE,
    TIMEOUT_MARKER,
};
use crate::error::ProbeError;
use crate::outcome::Outcome;
use message_sink::{Message, MessageSink};
use probe_config::TransportProtocol;
use tracing::{debug, warn};

fn notice(payload: &str) -> Message {
    Message::new_unchecked(payload).with_source(NOTICE_SOURCE)
}

/// Echo request about to be sent upstream
pub fn request_notice(protocol: TransportProtocol) -> Message {
    notice(ECHO_REQUEST_MARKER)
        .with_property(properties::ECHO_REQUEST, ECHO_REQUEST_MARKER)
        .with_property(properties::REQUEST_PROTOCOL, protocol.as_str())
}

/// An inbound message was rejected as unreadable
pub fn rejection_notice() -> Message {
    notice(DELIVERY_REJECTED_MARKER).with_property(DELIVERY_REJECTED_MARKER, ECHO_REPLY_MARKER)
}

/// The echo reply was seen on `partition`
pub fn reply_notice(partition: u32, messages_received: u64) -> Message {
    notice(ECHO_REPLY_MARKER)
        .with_property(properties::ECHO_REPLY, ECHO_REPLY_MARKER)
        .with_property(properties::PARTITION, partition.to_string())
        .with_property(properties::MESSAGES_RECEIVED, messages_received.to_string())
}

/// `partition` reached its deadline
pub fn timeout_notice(partition: u32) -> Message {
    notice(TIMEOUT_MARKER)
        .with_property(properties::TIMEOUT, TIMEOUT_MARKER)
        .with_property(properties::PARTITION, partition.to_string())
}

/// Aggregate probe result
pub fn summary_notice(outcome: Outcome, partitions: usize) -> Message {
    notice(outcome.as_str())
        .with_property(properties::PROBE_RESULT, outcome.as_str())
        .with_property(properties::PARTITIONS, partitions.to_string())
}

/// Publish and log; a failed publish is never propagated
pub async fn publish(sink: &dyn MessageSink, message: Message, kind: &'static str) {
    match sink.send(message).await {
        Ok(()) => debug!(notice = kind, "Published notice"),
        Err(e) => {
            let e = ProbeError::from(e);
            warn!(notice = kind, error = %e, "Notice publish failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use message_sink::test_utils::{CollectorSink, FailingSink};

    #[test]
    fn test_request_notice_layout() {
        let msg = request_notice(TransportProtocol::Http);
        assert_eq!(msg.payload_str(), Some("echo request sent successfully"));
        assert_eq!(msg.property("ECHOREQUEST"), Some("echo request sent successfully"));
        assert_eq!(msg.property("REQUEST_PROTOCOL"), Some("HTTP"));
    }

    #[test]
    fn test_rejection_notice_layout() {
        let msg = rejection_notice();
        assert_eq!(msg.payload_str(), Some("messaging_delivery_rejected"));
        assert_eq!(
            msg.property("messaging_delivery_rejected"),
            Some("echo response received successfully")
        );
    }

    #[test]
    fn test_reply_and_timeout_carry_partition() {
        let reply = reply_notice(1, 7);
        assert_eq!(reply.property("ECHOREPLY"), Some("echo response received successfully"));
        assert_eq!(reply.property("partition"), Some("1"));
        assert_eq!(reply.property("messages_received"), Some("7"));

        let timeout = timeout_notice(3);
        assert_eq!(timeout.payload_str(), Some("poll event hub time out"));
        assert_eq!(timeout.property("TIMEOUT"), Some("poll event hub time out"));
        assert_eq!(timeout.property("partition"), Some("3"));
    }

    #[test]
    fn test_summary_notice() {
        let msg = summary_notice(Outcome::Timeout, 4);
        assert_eq!(msg.payload_str(), Some("Timeout"));
        assert_eq!(msg.property("PROBE_RESULT"), Some("Timeout"));
        assert_eq!(msg.property("partitions"), Some("4"));
    }

    #[tokio::test]
    async fn test_publish_failure_is_swallowed() {
        publish(&FailingSink::default(), timeout_notice(0), "timeout").await;

        let sink = CollectorSink::new();
        publish(&sink, timeout_notice(0), "timeout").await;
        assert_eq!(sink.message_count(), 1);
    }
}
