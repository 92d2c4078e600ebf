//! Probe markers, notice property names and timing defaults

use std::time::Duration;

/// Payload of the upstream echo request, and the literal an echo reply must contain
pub const ECHO_REQUEST_MARKER: &str = "echo request sent successfully";

/// Payload of the local reply-confirmed notice
pub const ECHO_REPLY_MARKER: &str = "echo response received successfully";

/// Payload and property name of the local rejection notice
pub const DELIVERY_REJECTED_MARKER: &str = "messaging_delivery_rejected";

/// Payload of the local timeout notice
pub const TIMEOUT_MARKER: &str = "poll event hub time out";

/// Rejection condition sent for unreadable messages
pub const REJECT_CONDITION: &str = "Rejected due to failure reading AMQP message";
pub const REJECT_DESCRIPTION: &str = "Failed reading message body";

/// Notice and upstream property names
pub mod properties {
    pub const ECHO_REQUEST: &str = "ECHOREQUEST";
    pub const ECHO_REPLY: &str = "ECHOREPLY";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const REQUEST_PROTOCOL: &str = "REQUEST_PROTOCOL";
    pub const PROBE_RESULT: &str = "PROBE_RESULT";
    pub const PARTITION: &str = "partition";
    pub const PARTITIONS: &str = "partitions";
    pub const MESSAGES_RECEIVED: &str = "messages_received";

    /// Device credentials that must never leave the device
    pub const DEVICE_NAME: &str = "deviceName";
    pub const DEVICE_KEY: &str = "deviceKey";
}

/// Backward margin applied to the probe start when selecting stream events
pub const FILTER_MARGIN_SECS: i64 = 30;

/// Enqueued-time selector on the stream endpoint
pub const ENQUEUED_TIME_SELECTOR: &str = "amqp.annotation.x-opt-enqueuedtimeutc";

/// Hard per-partition deadline
pub const DEFAULT_PARTITION_DEADLINE: Duration = Duration::from_secs(10);

/// Pause between two `do_work()` steps
pub const DEFAULT_POLL_QUANTUM: Duration = Duration::from_millis(10);

/// Bound on one upstream send
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Source tag on notices published by the probe
pub const NOTICE_SOURCE: &str = "echo-probe";
