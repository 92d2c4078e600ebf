//! Transport Error Types
//!
//! Error handling for TLS transport, SASL authentication, AMQP link
//! establishment and the MQTT publisher.

use codec::{AmqpError, CodecError};
use thiserror::Error;

/// Main transport error type
#[derive(Error, Debug)]
pub enum TransportError {
    /// Network connectivity errors (DNS, TCP)
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Peer closed or reset the connection
    #[error("Connection error: {message} (remote: {remote:?})")]
    Connection {
        message: String,
        remote: Option<String>,
    },

    /// TLS configuration or handshake errors
    #[error("TLS error: {message}")]
    Tls {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Credentials rejected by the peer
    #[error("Authentication rejected: {mechanism}: {message}")]
    Authentication { mechanism: String, message: String },

    /// Peer violated the expected protocol sequence
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Malformed bytes on the wire
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Peer ended the link, session or connection
    #[error("Remote {performative}: {}", describe_condition(.error))]
    Remote {
        performative: &'static str,
        error: Option<AmqpError>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Transport timeout errors
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Generic I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

fn describe_condition(error: &Option<AmqpError>) -> String {
    match error {
        Some(error) => error.to_string(),
        None => "no error condition".to_string(),
    }
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>, remote: Option<&str>) -> Self {
        Self::Connection {
            message: message.into(),
            remote: remote.map(str::to_string),
        }
    }

    /// Create a TLS error with source
    pub fn tls_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Tls {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a TLS error
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls {
            message: message.into(),
            source: None,
        }
    }

    /// Create an authentication error
    pub fn authentication(mechanism: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Authentication {
            mechanism: mechanism.into(),
            message: message.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a remote-close error
    pub fn remote(performative: &'static str, error: Option<AmqpError>) -> Self {
        Self::Remote { performative, error }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|s| s.to_string()),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a timeout error from the wait that elapsed
    pub fn timed_out(operation: impl Into<String>, wait: std::time::Duration) -> Self {
        Self::timeout(operation, u64::try_from(wait.as_millis()).unwrap_or(u64::MAX))
    }

    /// Create an I/O error
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Network { .. }
                | TransportError::Connection { .. }
                | TransportError::Timeout { .. }
        )
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            TransportError::Network { .. } => "network",
            TransportError::Connection { .. } => "connection",
            TransportError::Tls { .. } => "tls",
            TransportError::Authentication { .. } => "authentication",
            TransportError::Protocol { .. } => "protocol",
            TransportError::Codec(_) => "codec",
            TransportError::Remote { .. } => "remote",
            TransportError::Configuration { .. } => "configuration",
            TransportError::Timeout { .. } => "timeout",
            TransportError::Io { .. } => "io",
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(error: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match error.kind() {
            ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                TransportError::connection(error.to_string(), None)
            }
            ErrorKind::UnexpectedEof => TransportError::connection("peer closed the connection", None),
            ErrorKind::TimedOut => TransportError::timeout("io operation", 0),
            _ => TransportError::io("I/O operation failed", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let network_err = TransportError::network("test");
        assert_eq!(network_err.category(), "network");
        assert!(network_err.is_retryable());

        let auth_err = TransportError::authentication("PLAIN", "sasl outcome auth");
        assert_eq!(auth_err.category(), "authentication");
        assert!(!auth_err.is_retryable());
    }

    #[test]
    fn test_remote_error_display() {
        let err = TransportError::remote(
            "detach",
            Some(AmqpError::new("amqp:link:detach-forced", Some("idle".into()))),
        );
        assert_eq!(err.to_string(), "Remote detach: amqp:link:detach-forced: idle");
        assert_eq!(
            TransportError::remote("close", None).to_string(),
            "Remote close: no error condition"
        );
    }

    #[test]
    fn test_timed_out_saturates() {
        let err = TransportError::timed_out("attach", std::time::Duration::from_millis(1500));
        assert!(matches!(err, TransportError::Timeout { timeout_ms: 1500, .. }));

        let err = TransportError::timed_out("attach", std::time::Duration::MAX);
        assert!(matches!(err, TransportError::Timeout { timeout_ms: u64::MAX, .. }));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let transport_err: TransportError = io_err.into();
        assert!(matches!(transport_err, TransportError::Connection { .. }));

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let transport_err: TransportError = io_err.into();
        assert!(matches!(transport_err, TransportError::Io { .. }));
    }
}
