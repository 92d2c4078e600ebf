//! Inbound message classification
//!
//! Decides the acknowledgement for one delivery, flips the completion signal
//! on an echo reply and publishes the matching local notice.

use crate::constants::{ECHO_REQUEST_MARKER, REJECT_CONDITION, REJECT_DESCRIPTION};
use crate::error::ProbeError;
use crate::notice;
use crate::partition::PartitionContext;
use crate::signal::CompletionSignal;
use codec::AmqpMessage;
use message_sink::MessageSink;
use network::Acknowledgement;
use tracing::{debug, info, warn};

/// What the classifier made of one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    EchoReplyReceived,
    Ordinary,
    MalformedMessage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub acknowledgement: Acknowledgement,
    pub disposition: Disposition,
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

/// First `data` section of an encoded message
pub fn extract_payload(encoded: &[u8]) -> Result<bytes::Bytes, ProbeError> {
    let message = AmqpMessage::decode(encoded).map_err(|e| ProbeError::malformed(e.to_string()))?;
    message
        .first_data()
        .cloned()
        .ok_or_else(|| ProbeError::malformed("message has no data section"))
}

/// Classify one encoded message received on `ctx`'s partition
pub async fn classify(
    ctx: &mut PartitionContext,
    encoded: &[u8],
    signal: &CompletionSignal,
    sink: &dyn MessageSink,
) -> Classification {
    let payload = match extract_payload(encoded) {
        Ok(payload) => payload,
        Err(e) => {
            ctx.rejected += 1;
            warn!(
                partition = ctx.index,
                payload_len = encoded.len(),
                rejected = ctx.rejected,
                error = %e,
                "Rejecting unreadable message"
            );
            notice::publish(sink, notice::rejection_notice(), "rejection").await;
            return Classification {
                acknowledgement: Acknowledgement::reject(REJECT_CONDITION, REJECT_DESCRIPTION),
                disposition: Disposition::MalformedMessage,
            };
        }
    };

    if contains(&payload, ECHO_REQUEST_MARKER.as_bytes()) {
        let first = signal.set();
        ctx.reply_seen = true;
        info!(
            partition = ctx.index,
            payload_len = payload.len(),
            received = ctx.received,
            first,
            "Echo reply received"
        );
        notice::publish(sink, notice::reply_notice(ctx.index, ctx.received), "reply").await;
        return Classification {
            acknowledgement: Acknowledgement::Accept,
            disposition: Disposition::EchoReplyReceived,
        };
    }

    ctx.received += 1;
    debug!(
        partition = ctx.index,
        payload_len = payload.len(),
        received = ctx.received,
        "Ordinary message"
    );
    Classification {
        acknowledgement: Acknowledgement::Accept,
        disposition: Disposition::Ordinary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use message_sink::test_utils::CollectorSink;
    use tokio::time::Instant;

    fn ctx() -> PartitionContext {
        PartitionContext::new(2, "amqps://h/c/ConsumerGroups/$Default/Partitions/2", Instant::now())
    }

    fn encoded(payload: &'static str) -> bytes::Bytes {
        AmqpMessage::with_data(payload).to_bytes()
    }

    #[tokio::test]
    async fn test_reply_sets_signal() {
        let mut ctx = ctx();
        let signal = CompletionSignal::new();
        let sink = CollectorSink::new();

        let result = classify(
            &mut ctx,
            &encoded("device says: echo request sent successfully"),
            &signal,
            &sink,
        )
        .await;

        assert_eq!(result.disposition, Disposition::EchoReplyReceived);
        assert!(result.acknowledgement.is_accept());
        assert!(signal.is_set());
        assert!(ctx.reply_seen);
        assert_eq!(ctx.received, 0);

        let replies = sink.messages_with_payload("echo response received successfully");
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].property("partition"), Some("2"));
    }

    #[tokio::test]
    async fn test_ordinary_message_counts() {
        let mut ctx = ctx();
        let signal = CompletionSignal::new();
        let sink = CollectorSink::new();

        for _ in 0..3 {
            let result = classify(&mut ctx, &encoded("telemetry"), &signal, &sink).await;
            assert_eq!(result.disposition, Disposition::Ordinary);
        }
        assert_eq!(ctx.received, 3);
        assert!(!signal.is_set());
        assert_eq!(sink.message_count(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_message_rejected() {
        let mut ctx = ctx();
        let signal = CompletionSignal::new();
        let sink = CollectorSink::new();

        let result = classify(&mut ctx, &[0xff, 0x00, 0x01], &signal, &sink).await;

        assert_eq!(result.disposition, Disposition::MalformedMessage);
        assert_eq!(
            result.acknowledgement,
            Acknowledgement::reject(
                "Rejected due to failure reading AMQP message",
                "Failed reading message body"
            )
        );
        assert!(!signal.is_set());
        assert_eq!(ctx.rejected, 1);
        assert_eq!(ctx.received, 0);
        assert_eq!(sink.messages_with_payload("messaging_delivery_rejected").len(), 1);
    }

    #[tokio::test]
    async fn test_message_without_data_rejected() {
        let mut ctx = ctx();
        let signal = CompletionSignal::new();
        let sink = CollectorSink::new();
        let message = AmqpMessage {
            body: codec::Body::Value(codec::Value::string(ECHO_REQUEST_MARKER)),
            ..AmqpMessage::default()
        };

        let result = classify(&mut ctx, &message.to_bytes(), &signal, &sink).await;
        assert_eq!(result.disposition, Disposition::MalformedMessage);
        assert!(!signal.is_set());
    }

    #[test]
    fn test_contains() {
        assert!(contains(b"xxabcxx", b"abc"));
        assert!(!contains(b"ab", b"abc"));
        assert!(!contains(b"abc", b""));
    }
}
