/// Context information for send operations to aid in debugging
#[derive(Debug, Clone, PartialEq)]
pub struct SendContext {
    /// Size of the message payload in bytes
    pub message_size: usize,
    /// Publishing component, if known
    pub source: Option<String>,
}

impl SendContext {
    pub fn new(message_size: usize) -> Self {
        Self {
            message_size,
            source: None,
        }
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SinkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {error} (size: {size}B, source: {source:?})",
            size = context.message_size,
            source = context.source)]
    SendFailed { error: String, context: SendContext },

    #[error("Message too large: {size}B exceeds limit of {limit}B")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("Sink closed")]
    Closed,
}

impl SinkError {
    /// Check if this is a recoverable error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SinkError::SendFailed { .. })
    }

    /// Check if this is a connection-related error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, SinkError::ConnectionFailed(_) | SinkError::Closed)
    }

    /// Create a connection failed error
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        SinkError::ConnectionFailed(msg.into())
    }

    /// Create a send failed error with context
    pub fn send_failed_with_context(msg: impl Into<String>, context: SendContext) -> Self {
        SinkError::SendFailed {
            error: msg.into(),
            context,
        }
    }

    /// Create a message too large error
    pub fn message_too_large(size: usize, limit: usize) -> Self {
        SinkError::MessageTooLarge { size, limit }
    }
}
