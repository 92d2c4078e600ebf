//! Error types for the echo probe

use message_sink::SinkError;
use network::TransportError;
use probe_config::{ConfigError, TransportProtocol};
use thiserror::Error;

/// Result type alias for probe operations
pub type Result<T> = std::result::Result<T, ProbeError>;

#[derive(Debug, Error)]
pub enum ProbeError {
    /// Configuration is missing, empty or still a placeholder
    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(#[from] ConfigError),

    /// Secured transport, session or link could not be opened
    #[error("Bootstrap failed: {0}")]
    Bootstrap(#[from] TransportError),

    /// Selector expression could not be built
    #[error("Filter build failed: {reason}")]
    FilterBuild { reason: String },

    /// Inbound message could not be read
    #[error("Malformed message: {reason}")]
    MalformedMessage { reason: String },

    /// Partition deadline passed without an echo reply
    #[error("Partition {partition} timed out after {elapsed_ms}ms")]
    Timeout { partition: u32, elapsed_ms: u64 },

    /// Local bus publish failed
    #[error("Publish failed: {0}")]
    Publish(#[from] SinkError),

    /// Upstream echo request was not confirmed
    #[error("{protocol} echo send failed: {reason}")]
    Send {
        protocol: TransportProtocol,
        reason: String,
    },
}

impl ProbeError {
    pub fn filter_build(reason: impl Into<String>) -> Self {
        Self::FilterBuild {
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    pub fn send(protocol: TransportProtocol, reason: impl ToString) -> Self {
        Self::Send {
            protocol,
            reason: reason.to_string(),
        }
    }

    /// Whether the error stops the probe before any partition starts
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigurationInvalid(_) | Self::Send { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts() {
        let err: ProbeError = ConfigError::Placeholder { key: "EH_KEY" }.into();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("EH_KEY"));
    }

    #[test]
    fn test_send_error_names_protocol() {
        let err = ProbeError::send(TransportProtocol::Mqtt, "CONNACK refused");
        assert_eq!(err.to_string(), "MQTT echo send failed: CONNACK refused");
    }

    #[test]
    fn test_partition_errors_are_not_fatal() {
        assert!(!ProbeError::filter_build("overflow").is_fatal());
        assert!(!ProbeError::Timeout { partition: 2, elapsed_ms: 10_000 }.is_fatal());
    }
}
