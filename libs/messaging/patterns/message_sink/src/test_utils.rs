use crate::{ConnectionState, Message, MessageSink, SendContext, SinkError, SinkMetadata};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};

/// A sink that just collects messages for testing with bounded storage
#[derive(Debug)]
pub struct CollectorSink {
    /// Bounded message queue
    messages: Arc<Mutex<VecDeque<Message>>>,
    max_messages: usize,
    connected: AtomicBool,
    fail_on_send: AtomicBool,
    messages_sent: AtomicU64,
    messages_failed: AtomicU64,
    name: String,
}

impl CollectorSink {
    /// Create a connected collector sink with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    /// Create a connected collector sink with specific capacity
    pub fn with_capacity(max_messages: usize) -> Self {
        Self {
            messages: Arc::new(Mutex::new(VecDeque::with_capacity(max_messages))),
            max_messages,
            connected: AtomicBool::new(true),
            fail_on_send: AtomicBool::new(false),
            messages_sent: AtomicU64::new(0),
            messages_failed: AtomicU64::new(0),
            name: "test-collector".to_string(),
        }
    }

    /// Get all received messages
    pub fn received_messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().iter().cloned().collect()
    }

    /// Messages whose payload equals `payload`
    pub fn messages_with_payload(&self, payload: &str) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.payload == payload.as_bytes())
            .cloned()
            .collect()
    }

    /// Get the count of received messages
    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    /// Configure to fail on next send
    pub fn fail_next_send(&self) {
        self.fail_on_send.store(true, Ordering::Relaxed);
    }
}

impl Default for CollectorSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSink for CollectorSink {
    async fn send(&self, message: Message) -> Result<(), SinkError> {
        if !self.is_connected() || self.fail_on_send.swap(false, Ordering::Relaxed) {
            self.messages_failed.fetch_add(1, Ordering::Relaxed);
            let context = SendContext::new(message.size()).with_source(message.metadata.source);
            return Err(SinkError::send_failed_with_context("Simulated failure", context));
        }

        {
            let mut messages = self.messages.lock().unwrap();
            if messages.len() >= self.max_messages {
                messages.pop_front();
            }
            messages.push_back(message);
        }

        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    async fn connect(&self) -> Result<(), SinkError> {
        self.connected.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SinkError> {
        self.connected.store(false, Ordering::Relaxed);
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
            ..SinkMetadata::new(self.name.clone(), "collector").with_state(state)
        }
    }
}

/// A sink that always fails for testing error conditions
#[derive(Debug)]
pub struct FailingSink {
    error_message: String,
}

impl FailingSink {
    pub fn new(error_message: impl Into<String>) -> Self {
        Self {
            error_message: error_message.into(),
        }
    }
}

impl Default for FailingSink {
    fn default() -> Self {
        Self::new("Simulated failure")
    }
}

#[async_trait]
impl MessageSink for FailingSink {
    async fn send(&self, message: Message) -> Result<(), SinkError> {
        let context = SendContext::new(message.size()).with_source(message.metadata.source);
        Err(SinkError::send_failed_with_context(&self.error_message, context))
    }

    fn is_connected(&self) -> bool {
        false
    }

    async fn connect(&self) -> Result<(), SinkError> {
        Err(SinkError::connection_failed(&self.error_message))
    }

    async fn disconnect(&self) -> Result<(), SinkError> {
        Ok(())
    }

    fn metadata(&self) -> SinkMetadata {
        SinkMetadata {
            last_error: Some(self.error_message.clone()),
            ..SinkMetadata::new("failing-sink", "test-failing").with_state(ConnectionState::Failed)
        }
    }
}
