//! In-process broadcast bus
//!
//! Every subscriber sees every message published after it subscribed. A
//! publish with no live subscriber is not an error: notices are advisory and
//! the probe result never depends on who is listening.

use crate::{ConnectionState, Message, MessageSink, SendContext, SinkError, SinkMetadata};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default number of messages a slow subscriber may lag behind
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Local message bus backed by `tokio::sync::broadcast`
#[derive(Debug)]
pub struct BroadcastSink {
    sender: broadcast::Sender<Message>,
    name: String,
    connected: AtomicBool,
    messages_sent: AtomicU64,
    messages_unobserved: AtomicU64,
    messages_failed: AtomicU64,
}

impl BroadcastSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, DEFAULT_BUS_CAPACITY)
    }

    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            name: name.into(),
            connected: AtomicBool::new(false),
            messages_sent: AtomicU64::new(0),
            messages_unobserved: AtomicU64::new(0),
            messages_failed: AtomicU64::new(0),
        }
    }

    /// New receiver for messages published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Messages published while nobody was subscribed
    pub fn unobserved_count(&self) -> u64 {
        self.messages_unobserved.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MessageSink for BroadcastSink {
    async fn send(&self, message: Message) -> Result<(), SinkError> {
        if !self.is_connected() {
            self.messages_failed.fetch_add(1, Ordering::Relaxed);
            let context =
                SendContext::new(message.size()).with_source(message.metadata.source.clone());
            return Err(SinkError::send_failed_with_context("Bus not started", context));
        }

        let size = message.size();
        match self.sender.send(message) {
            Ok(receivers) => {
                trace!(bus = %self.name, receivers, size, "Published local message");
            }
            Err(_) => {
                self.messages_unobserved.fetch_add(1, Ordering::Relaxed);
                debug!(bus = %self.name, size, "Published local message with no subscribers");
            }
        }
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn connect(&self) -> Result<(), SinkError> {
        self.connected.store(true, Ordering::Release);
        debug!(bus = %self.name, "Local bus started");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SinkError> {
        self.connected.store(false, Ordering::Release);
        Ok(())
    }

    fn metadata(&self) -> SinkMetadata {
        let state = if self.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
        SinkMetadata {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_failed: self.messages_failed.load(Ordering::Relaxed),
            ..SinkMetadata::new(self.name.clone(), "broadcast").with_state(state)
        }
    }
}
