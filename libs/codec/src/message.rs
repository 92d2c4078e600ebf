//! # Message Format
//!
//! Bare message sections as carried in transfer payloads: message annotations,
//! properties, application properties and the body (`data`, `amqp-sequence`
//! or `amqp-value`). Header, delivery annotations and footer are skipped on
//! decode and never produced on encode.

use crate::constants::descriptor;
use crate::error::{CodecError, CodecResult};
use crate::parser::ValueParser;
use crate::performative::{described_list, opt, Fields};
use crate::value::Value;
use bytes::{Bytes, BytesMut};

/// Message annotation carrying the broker enqueue time
pub const ENQUEUED_TIME_ANNOTATION: &str = "x-opt-enqueued-time";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    Empty,
    Data(Vec<Bytes>),
    Sequence(Vec<Vec<Value>>),
    Value(Value),
}

/// Immutable bare-message properties (subset used by this workspace)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Properties {
    pub message_id: Option<Value>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub correlation_id: Option<Value>,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    /// Milliseconds since the Unix epoch
    pub creation_time: Option<i64>,
}

impl Properties {
    fn to_value(&self) -> Value {
        let mut fields = vec![Value::Null; 10];
        fields[0] = opt(self.message_id.clone());
        fields[2] = opt(self.to.clone().map(Value::String));
        fields[3] = opt(self.subject.clone().map(Value::String));
        fields[5] = opt(self.correlation_id.clone());
        fields[6] = opt(self.content_type.clone().map(Value::symbol));
        fields[7] = opt(self.content_encoding.clone().map(Value::symbol));
        fields[9] = opt(self.creation_time.map(Value::Timestamp));
        described_list(descriptor::PROPERTIES, fields)
    }

    fn from_value(value: Value) -> CodecResult<Self> {
        let mut f = Fields::described(value, descriptor::PROPERTIES, "properties")?;
        Ok(Self {
            message_id: f.opt_value(0),
            to: f.opt_string(2, "to")?,
            subject: f.opt_string(3, "subject")?,
            correlation_id: f.opt_value(5),
            content_type: f.opt_string(6, "content-type")?,
            content_encoding: f.opt_string(7, "content-encoding")?,
            creation_time: match f.opt_value(9) {
                Some(Value::Timestamp(ms)) => Some(ms),
                Some(other) => {
                    return Err(CodecError::type_mismatch(
                        "properties.creation-time",
                        "timestamp",
                        other.type_name(),
                    ))
                }
                None => None,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AmqpMessage {
    pub message_annotations: Vec<(Value, Value)>,
    pub properties: Option<Properties>,
    pub application_properties: Vec<(String, Value)>,
    pub body: Body,
}

impl AmqpMessage {
    /// Message with a single `data` body section
    pub fn with_data(payload: impl Into<Bytes>) -> Self {
        Self {
            body: Body::Data(vec![payload.into()]),
            ..Self::default()
        }
    }

    pub fn with_application_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.application_properties.push((key.into(), value.into()));
        self
    }

    pub fn with_message_annotation(mut self, key: impl Into<String>, value: Value) -> Self {
        self.message_annotations.push((Value::symbol(key), value));
        self
    }

    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.properties.get_or_insert_with(Properties::default).message_id = Some(Value::String(id.into()));
        self
    }

    /// First `data` section, if the body is binary
    pub fn first_data(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Data(sections) => sections.first(),
            _ => None,
        }
    }

    pub fn application_property(&self, key: &str) -> Option<&Value> {
        self.application_properties
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    pub fn message_annotation(&self, key: &str) -> Option<&Value> {
        self.message_annotations
            .iter()
            .find_map(|(k, v)| (k.as_str() == Some(key)).then_some(v))
    }

    /// Broker enqueue time in epoch milliseconds
    pub fn enqueued_time(&self) -> Option<i64> {
        match self.message_annotation(ENQUEUED_TIME_ANNOTATION)? {
            Value::Timestamp(ms) => Some(*ms),
            _ => None,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        if !self.message_annotations.is_empty() {
            Value::described(
                descriptor::MESSAGE_ANNOTATIONS,
                Value::Map(self.message_annotations.clone()),
            )
            .encode(buf);
        }
        if let Some(properties) = &self.properties {
            properties.to_value().encode(buf);
        }
        if !self.application_properties.is_empty() {
            let entries = self
                .application_properties
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), v.clone()))
                .collect();
            Value::described(descriptor::APPLICATION_PROPERTIES, Value::Map(entries)).encode(buf);
        }
        match &self.body {
            Body::Empty => {}
            Body::Data(sections) => {
                for section in sections {
                    Value::described(descriptor::DATA, Value::Binary(section.clone())).encode(buf);
                }
            }
            Body::Sequence(sequences) => {
                for sequence in sequences {
                    Value::described(descriptor::AMQP_SEQUENCE, Value::List(sequence.clone())).encode(buf);
                }
            }
            Body::Value(value) => Value::described(descriptor::AMQP_VALUE, value.clone()).encode(buf),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode the sections of a complete (reassembled) transfer payload
    pub fn decode(data: &[u8]) -> CodecResult<Self> {
        let mut parser = ValueParser::new(data);
        let mut message = Self::default();

        while !parser.is_empty() {
            let section = parser.parse_value()?;
            let code = section.descriptor_code().ok_or_else(|| {
                CodecError::type_mismatch("message section", "described", section.type_name())
            })?;
            let Value::Described(_, body) = section else {
                continue;
            };
            match code {
                descriptor::HEADER | descriptor::DELIVERY_ANNOTATIONS | descriptor::FOOTER => {}
                descriptor::MESSAGE_ANNOTATIONS => {
                    message.message_annotations = expect_map(*body, "message-annotations")?;
                }
                descriptor::PROPERTIES => {
                    let value = Value::described(code, *body);
                    message.properties = Some(Properties::from_value(value)?);
                }
                descriptor::APPLICATION_PROPERTIES => {
                    let mut properties = Vec::new();
                    for (key, value) in expect_map(*body, "application-properties")? {
                        match key {
                            Value::String(key) => properties.push((key, value)),
                            other => {
                                return Err(CodecError::type_mismatch(
                                    "application-properties key",
                                    "string",
                                    other.type_name(),
                                ))
                            }
                        }
                    }
                    message.application_properties = properties;
                }
                descriptor::DATA => match *body {
                    Value::Binary(bytes) => message.push_data(bytes)?,
                    other => return Err(CodecError::type_mismatch("data", "binary", other.type_name())),
                },
                descriptor::AMQP_SEQUENCE => match *body {
                    Value::List(items) => message.push_sequence(items)?,
                    other => {
                        return Err(CodecError::type_mismatch("amqp-sequence", "list", other.type_name()))
                    }
                },
                descriptor::AMQP_VALUE => match message.body {
                    Body::Empty => message.body = Body::Value(*body),
                    _ => return Err(mixed_body()),
                },
                other => {
                    return Err(CodecError::unknown_descriptor(format!("{other:#x}"), "message section"))
                }
            }
        }
        Ok(message)
    }

    fn push_data(&mut self, bytes: Bytes) -> CodecResult<()> {
        match &mut self.body {
            Body::Data(sections) => sections.push(bytes),
            Body::Empty => self.body = Body::Data(vec![bytes]),
            _ => return Err(mixed_body()),
        }
        Ok(())
    }

    fn push_sequence(&mut self, items: Vec<Value>) -> CodecResult<()> {
        match &mut self.body {
            Body::Sequence(sections) => sections.push(items),
            Body::Empty => self.body = Body::Sequence(vec![items]),
            _ => return Err(mixed_body()),
        }
        Ok(())
    }
}

fn expect_map(value: Value, field: &'static str) -> CodecResult<Vec<(Value, Value)>> {
    match value {
        Value::Map(entries) => Ok(entries),
        Value::Null => Ok(Vec::new()),
        other => Err(CodecError::type_mismatch(field, "map", other.type_name())),
    }
}

fn mixed_body() -> CodecError {
    CodecError::type_mismatch("body", "sections of one kind", "mixed")
}
