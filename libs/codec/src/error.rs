//! Codec-level errors for AMQP 1.0 encoding and decoding
//!
//! Each variant carries enough context (offset, expected shape, what was being
//! decoded) to diagnose a malformed peer frame from a single log line.

use thiserror::Error;

/// Decoding errors with diagnostic context
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    /// Buffer ended before the declared value was complete
    #[error("Truncated input: need {need} bytes, got {got} (context: {context})")]
    Truncated {
        need: usize,
        got: usize,
        context: String,
    },

    /// Format code not defined by the AMQP 1.0 type system
    #[error("Invalid format code {code:#04x} at offset {offset}")]
    InvalidFormatCode { code: u8, offset: usize },

    /// Compound value size does not match the bytes its members consumed
    #[error("Size mismatch for {kind}: declared {declared} bytes, consumed {consumed}")]
    SizeMismatch {
        kind: &'static str,
        declared: usize,
        consumed: usize,
    },

    /// String or symbol is not valid UTF-8
    #[error("Invalid UTF-8 in {kind} at offset {offset}")]
    InvalidUtf8 { kind: &'static str, offset: usize },

    /// Described value carries a descriptor this codec does not know
    #[error("Unknown descriptor {descriptor} (context: {context})")]
    UnknownDescriptor { descriptor: String, context: String },

    /// A value had the wrong AMQP type for the field being read
    #[error("Type mismatch for {field}: expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        got: String,
    },

    /// Mandatory composite field was absent or null
    #[error("Missing mandatory field {field} in {composite}")]
    MissingField {
        composite: &'static str,
        field: &'static str,
    },

    /// Frame header is malformed
    #[error("Invalid frame: {reason} (size: {size})")]
    InvalidFrame { reason: String, size: usize },

    /// Frame exceeds the negotiated max-frame-size
    #[error("Frame too large: {size} bytes exceeds limit {limit}")]
    FrameTooLarge { size: usize, limit: usize },
}

impl CodecError {
    /// Create a truncation error with context
    pub fn truncated(need: usize, got: usize, context: impl Into<String>) -> Self {
        Self::Truncated {
            need,
            got,
            context: context.into(),
        }
    }

    /// Create a type mismatch error for a named field
    pub fn type_mismatch(field: impl Into<String>, expected: &'static str, got: impl Into<String>) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected,
            got: got.into(),
        }
    }

    /// Create an unknown descriptor error
    pub fn unknown_descriptor(descriptor: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UnknownDescriptor {
            descriptor: descriptor.into(),
            context: context.into(),
        }
    }

    /// Create an invalid frame error
    pub fn invalid_frame(reason: impl Into<String>, size: usize) -> Self {
        Self::InvalidFrame {
            reason: reason.into(),
            size,
        }
    }
}

/// Result type for codec operations
pub type CodecResult<T> = std::result::Result<T, CodecError>;
