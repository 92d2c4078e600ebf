use crate::SinkError;
use std::collections::BTreeMap;

/// Maximum message size in bytes (256KB, the hub's device message limit)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 256 * 1024;

/// A self-contained local bus message: payload plus string properties
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    /// Raw payload bytes
    pub payload: Vec<u8>,

    /// String key/value properties
    pub properties: BTreeMap<String, String>,

    pub metadata: MessageMetadata,
}

impl Message {
    /// Create a new message with payload, validating size
    pub fn new(payload: impl Into<Vec<u8>>) -> Result<Self, SinkError> {
        Self::new_with_limit(payload, DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a new message with payload and custom size limit
    pub fn new_with_limit(payload: impl Into<Vec<u8>>, max_size: usize) -> Result<Self, SinkError> {
        let payload = payload.into();
        if payload.len() > max_size {
            return Err(SinkError::message_too_large(payload.len(), max_size));
        }

        Ok(Self::new_unchecked(payload))
    }

    /// Create a new message without size validation (for internal use)
    pub fn new_unchecked(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            properties: BTreeMap::new(),
            metadata: MessageMetadata::new(),
        }
    }

    /// Add a property, replacing any previous value for the key
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.metadata.source = Some(source.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Payload as text, if it is valid UTF-8
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Get message size in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageMetadata {
    /// Component that published the message
    pub source: Option<String>,

    /// Wall-clock creation time (nanoseconds since epoch)
    pub timestamp_ns: u64,
}

impl MessageMetadata {
    pub fn new() -> Self {
        Self {
            source: None,
            timestamp_ns: current_timestamp_ns(),
        }
    }
}

/// Wall-clock time in nanoseconds, 0 if the clock is outside the representable range
pub fn current_timestamp_ns() -> u64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .and_then(|ns| u64::try_from(ns).ok())
        .unwrap_or(0)
}
