//! Local message bus
//!
//! Components publish self-contained [`Message`] values through the
//! [`MessageSink`] trait without knowing who consumes them.

pub mod error;
pub mod message;
pub mod metadata;
pub mod sinks;
pub mod test_utils;

use async_trait::async_trait;
use std::fmt::Debug;

pub use error::{SendContext, SinkError};
pub use message::{current_timestamp_ns, Message, MessageMetadata, DEFAULT_MAX_MESSAGE_SIZE};
pub use metadata::{ConnectionState, SinkMetadata};
pub use sinks::{BroadcastSink, DEFAULT_BUS_CAPACITY};

/// A destination for messages that abstracts away delivery details
#[async_trait]
pub trait MessageSink: Send + Sync + Debug {
    /// Send a single message
    async fn send(&self, message: Message) -> Result<(), SinkError>;

    /// Check if currently connected
    fn is_connected(&self) -> bool;

    /// Establish connection (may be no-op if already connected)
    async fn connect(&self) -> Result<(), SinkError>;

    /// Close connection (may be no-op if not connected)
    async fn disconnect(&self) -> Result<(), SinkError>;

    /// Get sink metadata for debugging/monitoring
    fn metadata(&self) -> SinkMetadata {
        SinkMetadata::default()
    }
}
