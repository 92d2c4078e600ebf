//! # Performatives
//!
//! Typed views of the nine AMQP 1.0 transport performatives and the composite
//! types they carry (`source`, `target`, `error`, delivery states).
//!
//! Every composite is a described list. Encoding trims trailing nulls so the
//! list carries only the fields that were set; decoding treats missing
//! trailing fields as null.

use crate::constants::{descriptor, SELECTOR_FILTER};
use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use bytes::Bytes;

/// Link role. Encoded as a boolean, `true` for receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    fn to_value(self) -> Value {
        Value::Bool(self == Role::Receiver)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderSettleMode {
    Unsettled = 0,
    Settled = 1,
    Mixed = 2,
}

impl TryFrom<u8> for SenderSettleMode {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unsettled),
            1 => Ok(Self::Settled),
            2 => Ok(Self::Mixed),
            other => Err(CodecError::type_mismatch(
                "sender-settle-mode",
                "0..=2",
                other.to_string(),
            )),
        }
    }
}

/// `First` settles on receipt; `Second` waits for the sender's settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverSettleMode {
    First = 0,
    Second = 1,
}

impl TryFrom<u8> for ReceiverSettleMode {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::First),
            1 => Ok(Self::Second),
            other => Err(CodecError::type_mismatch(
                "receiver-settle-mode",
                "0..=1",
                other.to_string(),
            )),
        }
    }
}

/// `amqp:error:list`
#[derive(Debug, Clone, PartialEq)]
pub struct AmqpError {
    pub condition: String,
    pub description: Option<String>,
    pub info: Option<Value>,
}

impl AmqpError {
    pub fn new(condition: impl Into<String>, description: Option<String>) -> Self {
        Self {
            condition: condition.into(),
            description,
            info: None,
        }
    }

    pub fn to_value(&self) -> Value {
        described_list(
            descriptor::ERROR,
            vec![
                Value::symbol(self.condition.as_str()),
                opt(self.description.clone().map(Value::String)),
                opt(self.info.clone()),
            ],
        )
    }

    pub fn from_value(value: Value) -> CodecResult<Self> {
        let mut fields = Fields::described(value, descriptor::ERROR, "error")?;
        Ok(Self {
            condition: fields.req_string(0, "condition")?,
            description: fields.opt_string(1, "description")?,
            info: fields.opt_value(2),
        })
    }
}

impl std::fmt::Display for AmqpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{}: {}", self.condition, description),
            None => write!(f, "{}", self.condition),
        }
    }
}

/// Outcome or progress of a delivery
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryState {
    Received { section_number: u32, section_offset: u64 },
    Accepted,
    Rejected { error: Option<AmqpError> },
    Released,
    Modified {
        delivery_failed: bool,
        undeliverable_here: bool,
    },
}

impl DeliveryState {
    pub fn rejected(condition: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Rejected {
            error: Some(AmqpError::new(condition, Some(description.into()))),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Received {
                section_number,
                section_offset,
            } => described_list(
                descriptor::RECEIVED,
                vec![Value::Uint(*section_number), Value::Ulong(*section_offset)],
            ),
            Self::Accepted => described_list(descriptor::ACCEPTED, vec![]),
            Self::Rejected { error } => described_list(
                descriptor::REJECTED,
                vec![opt(error.as_ref().map(AmqpError::to_value))],
            ),
            Self::Released => described_list(descriptor::RELEASED, vec![]),
            Self::Modified {
                delivery_failed,
                undeliverable_here,
            } => described_list(
                descriptor::MODIFIED,
                vec![Value::Bool(*delivery_failed), Value::Bool(*undeliverable_here)],
            ),
        }
    }

    pub fn from_value(value: Value) -> CodecResult<Self> {
        let code = value
            .descriptor_code()
            .ok_or_else(|| CodecError::type_mismatch("delivery-state", "described", value.type_name()))?;
        match code {
            descriptor::RECEIVED => {
                let mut fields = Fields::described(value, code, "received")?;
                Ok(Self::Received {
                    section_number: fields.req_u32(0, "section-number")?,
                    section_offset: fields.opt_u64(1, "section-offset")?.unwrap_or(0),
                })
            }
            descriptor::ACCEPTED => Ok(Self::Accepted),
            descriptor::REJECTED => {
                let mut fields = Fields::described(value, code, "rejected")?;
                let error = match fields.opt_value(0) {
                    Some(error) => Some(AmqpError::from_value(error)?),
                    None => None,
                };
                Ok(Self::Rejected { error })
            }
            descriptor::RELEASED => Ok(Self::Released),
            descriptor::MODIFIED => {
                let mut fields = Fields::described(value, code, "modified")?;
                Ok(Self::Modified {
                    delivery_failed: fields.opt_bool(0, "delivery-failed")?.unwrap_or(false),
                    undeliverable_here: fields.opt_bool(1, "undeliverable-here")?.unwrap_or(false),
                })
            }
            other => Err(CodecError::unknown_descriptor(other.to_string(), "delivery-state")),
        }
    }
}

/// `amqp:source:list`. Only the fields a link endpoint needs are modelled
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Source {
    pub address: Option<String>,
    /// Filter set: symbol keys to described filter values
    pub filter: Option<Vec<(Value, Value)>>,
}

impl Source {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            filter: None,
        }
    }

    /// Source carrying a single SQL-like selector filter
    pub fn with_selector(address: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            filter: Some(vec![(
                Value::symbol(SELECTOR_FILTER),
                Value::described_symbol(SELECTOR_FILTER, Value::String(expression.into())),
            )]),
        }
    }

    /// Selector expression, if the filter set carries one
    pub fn selector(&self) -> Option<&str> {
        self.filter.as_ref()?.iter().find_map(|(key, value)| match (key, value) {
            (Value::Symbol(name), Value::Described(_, inner)) if name == SELECTOR_FILTER => inner.as_str(),
            _ => None,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut fields = vec![Value::Null; 8];
        fields[0] = opt(self.address.clone().map(Value::String));
        fields[7] = opt(self.filter.clone().map(Value::Map));
        described_list(descriptor::SOURCE, fields)
    }

    pub fn from_value(value: Value) -> CodecResult<Self> {
        let mut fields = Fields::described(value, descriptor::SOURCE, "source")?;
        let address = fields.opt_string(0, "address")?;
        let filter = match fields.opt_value(7) {
            Some(Value::Map(entries)) => Some(entries),
            Some(other) => return Err(CodecError::type_mismatch("source.filter", "map", other.type_name())),
            None => None,
        };
        Ok(Self { address, filter })
    }
}

/// `amqp:target:list`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Target {
    pub address: Option<String>,
}

impl Target {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
        }
    }

    pub fn to_value(&self) -> Value {
        described_list(descriptor::TARGET, vec![opt(self.address.clone().map(Value::String))])
    }

    pub fn from_value(value: Value) -> CodecResult<Self> {
        let mut fields = Fields::described(value, descriptor::TARGET, "target")?;
        Ok(Self {
            address: fields.opt_string(0, "address")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Open {
    pub container_id: String,
    pub hostname: Option<String>,
    pub max_frame_size: Option<u32>,
    pub channel_max: Option<u16>,
    /// Milliseconds
    pub idle_time_out: Option<u32>,
    pub properties: Option<Value>,
}

impl Open {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            hostname: None,
            max_frame_size: None,
            channel_max: None,
            idle_time_out: None,
            properties: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Begin {
    pub remote_channel: Option<u16>,
    pub next_outgoing_id: u32,
    pub incoming_window: u32,
    pub outgoing_window: u32,
    pub handle_max: Option<u32>,
}

impl Begin {
    pub fn new(incoming_window: u32, outgoing_window: u32) -> Self {
        Self {
            remote_channel: None,
            next_outgoing_id: 0,
            incoming_window,
            outgoing_window,
            handle_max: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attach {
    pub name: String,
    pub handle: u32,
    pub role: Role,
    pub snd_settle_mode: Option<SenderSettleMode>,
    pub rcv_settle_mode: Option<ReceiverSettleMode>,
    pub source: Option<Source>,
    pub target: Option<Target>,
    pub initial_delivery_count: Option<u32>,
    pub max_message_size: Option<u64>,
    pub properties: Option<Value>,
}

impl Attach {
    pub fn new(name: impl Into<String>, handle: u32, role: Role) -> Self {
        Self {
            name: name.into(),
            handle,
            role,
            snd_settle_mode: None,
            rcv_settle_mode: None,
            source: None,
            target: None,
            initial_delivery_count: None,
            max_message_size: None,
            properties: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Flow {
    pub next_incoming_id: Option<u32>,
    pub incoming_window: u32,
    pub next_outgoing_id: u32,
    pub outgoing_window: u32,
    pub handle: Option<u32>,
    pub delivery_count: Option<u32>,
    pub link_credit: Option<u32>,
    pub available: Option<u32>,
    pub drain: bool,
    pub echo: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transfer {
    pub handle: u32,
    pub delivery_id: Option<u32>,
    pub delivery_tag: Option<Bytes>,
    pub message_format: Option<u32>,
    pub settled: Option<bool>,
    pub more: bool,
    pub state: Option<DeliveryState>,
    pub aborted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Disposition {
    pub role: Role,
    pub first: u32,
    pub last: Option<u32>,
    pub settled: bool,
    pub state: Option<DeliveryState>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Detach {
    pub handle: u32,
    pub closed: bool,
    pub error: Option<AmqpError>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct End {
    pub error: Option<AmqpError>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Close {
    pub error: Option<AmqpError>,
}

/// Any transport performative
#[derive(Debug, Clone, PartialEq)]
pub enum Performative {
    Open(Open),
    Begin(Begin),
    Attach(Attach),
    Flow(Flow),
    Transfer(Transfer),
    Disposition(Disposition),
    Detach(Detach),
    End(End),
    Close(Close),
}

impl Performative {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open(_) => "open",
            Self::Begin(_) => "begin",
            Self::Attach(_) => "attach",
            Self::Flow(_) => "flow",
            Self::Transfer(_) => "transfer",
            Self::Disposition(_) => "disposition",
            Self::Detach(_) => "detach",
            Self::End(_) => "end",
            Self::Close(_) => "close",
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Open(open) => described_list(
                descriptor::OPEN,
                vec![
                    Value::String(open.container_id.clone()),
                    opt(open.hostname.clone().map(Value::String)),
                    opt(open.max_frame_size.map(Value::Uint)),
                    opt(open.channel_max.map(Value::Ushort)),
                    opt(open.idle_time_out.map(Value::Uint)),
                    Value::Null,
                    Value::Null,
                    Value::Null,
                    Value::Null,
                    opt(open.properties.clone()),
                ],
            ),
            Self::Begin(begin) => described_list(
                descriptor::BEGIN,
                vec![
                    opt(begin.remote_channel.map(Value::Ushort)),
                    Value::Uint(begin.next_outgoing_id),
                    Value::Uint(begin.incoming_window),
                    Value::Uint(begin.outgoing_window),
                    opt(begin.handle_max.map(Value::Uint)),
                ],
            ),
            Self::Attach(attach) => described_list(
                descriptor::ATTACH,
                vec![
                    Value::String(attach.name.clone()),
                    Value::Uint(attach.handle),
                    attach.role.to_value(),
                    opt(attach.snd_settle_mode.map(|m| Value::Ubyte(m as u8))),
                    opt(attach.rcv_settle_mode.map(|m| Value::Ubyte(m as u8))),
                    opt(attach.source.as_ref().map(Source::to_value)),
                    opt(attach.target.as_ref().map(Target::to_value)),
                    Value::Null,
                    Value::Null,
                    opt(attach.initial_delivery_count.map(Value::Uint)),
                    opt(attach.max_message_size.map(Value::Ulong)),
                    Value::Null,
                    Value::Null,
                    opt(attach.properties.clone()),
                ],
            ),
            Self::Flow(flow) => described_list(
                descriptor::FLOW,
                vec![
                    opt(flow.next_incoming_id.map(Value::Uint)),
                    Value::Uint(flow.incoming_window),
                    Value::Uint(flow.next_outgoing_id),
                    Value::Uint(flow.outgoing_window),
                    opt(flow.handle.map(Value::Uint)),
                    opt(flow.delivery_count.map(Value::Uint)),
                    opt(flow.link_credit.map(Value::Uint)),
                    opt(flow.available.map(Value::Uint)),
                    flag(flow.drain),
                    flag(flow.echo),
                ],
            ),
            Self::Transfer(transfer) => described_list(
                descriptor::TRANSFER,
                vec![
                    Value::Uint(transfer.handle),
                    opt(transfer.delivery_id.map(Value::Uint)),
                    opt(transfer.delivery_tag.clone().map(Value::Binary)),
                    opt(transfer.message_format.map(Value::Uint)),
                    opt(transfer.settled.map(Value::Bool)),
                    flag(transfer.more),
                    Value::Null,
                    opt(transfer.state.as_ref().map(DeliveryState::to_value)),
                    Value::Null,
                    flag(transfer.aborted),
                ],
            ),
            Self::Disposition(disposition) => described_list(
                descriptor::DISPOSITION,
                vec![
                    disposition.role.to_value(),
                    Value::Uint(disposition.first),
                    opt(disposition.last.map(Value::Uint)),
                    flag(disposition.settled),
                    opt(disposition.state.as_ref().map(DeliveryState::to_value)),
                ],
            ),
            Self::Detach(detach) => described_list(
                descriptor::DETACH,
                vec![
                    Value::Uint(detach.handle),
                    flag(detach.closed),
                    opt(detach.error.as_ref().map(AmqpError::to_value)),
                ],
            ),
            Self::End(end) => described_list(
                descriptor::END,
                vec![opt(end.error.as_ref().map(AmqpError::to_value))],
            ),
            Self::Close(close) => described_list(
                descriptor::CLOSE,
                vec![opt(close.error.as_ref().map(AmqpError::to_value))],
            ),
        }
    }

    pub fn from_value(value: Value) -> CodecResult<Self> {
        let code = value
            .descriptor_code()
            .ok_or_else(|| CodecError::type_mismatch("performative", "described", value.type_name()))?;

        let performative = match code {
            descriptor::OPEN => {
                let mut f = Fields::described(value, code, "open")?;
                Self::Open(Open {
                    container_id: f.req_string(0, "container-id")?,
                    hostname: f.opt_string(1, "hostname")?,
                    max_frame_size: f.opt_u32(2, "max-frame-size")?,
                    channel_max: f.opt_u16(3, "channel-max")?,
                    idle_time_out: f.opt_u32(4, "idle-time-out")?,
                    properties: f.opt_value(9),
                })
            }
            descriptor::BEGIN => {
                let mut f = Fields::described(value, code, "begin")?;
                Self::Begin(Begin {
                    remote_channel: f.opt_u16(0, "remote-channel")?,
                    next_outgoing_id: f.req_u32(1, "next-outgoing-id")?,
                    incoming_window: f.req_u32(2, "incoming-window")?,
                    outgoing_window: f.req_u32(3, "outgoing-window")?,
                    handle_max: f.opt_u32(4, "handle-max")?,
                })
            }
            descriptor::ATTACH => {
                let mut f = Fields::described(value, code, "attach")?;
                Self::Attach(Attach {
                    name: f.req_string(0, "name")?,
                    handle: f.req_u32(1, "handle")?,
                    role: f.req_role(2)?,
                    snd_settle_mode: f
                        .opt_ubyte(3, "snd-settle-mode")?
                        .map(SenderSettleMode::try_from)
                        .transpose()?,
                    rcv_settle_mode: f
                        .opt_ubyte(4, "rcv-settle-mode")?
                        .map(ReceiverSettleMode::try_from)
                        .transpose()?,
                    source: f.opt_value(5).map(Source::from_value).transpose()?,
                    target: f.opt_value(6).map(Target::from_value).transpose()?,
                    initial_delivery_count: f.opt_u32(9, "initial-delivery-count")?,
                    max_message_size: f.opt_u64(10, "max-message-size")?,
                    properties: f.opt_value(13),
                })
            }
            descriptor::FLOW => {
                let mut f = Fields::described(value, code, "flow")?;
                Self::Flow(Flow {
                    next_incoming_id: f.opt_u32(0, "next-incoming-id")?,
                    incoming_window: f.req_u32(1, "incoming-window")?,
                    next_outgoing_id: f.req_u32(2, "next-outgoing-id")?,
                    outgoing_window: f.req_u32(3, "outgoing-window")?,
                    handle: f.opt_u32(4, "handle")?,
                    delivery_count: f.opt_u32(5, "delivery-count")?,
                    link_credit: f.opt_u32(6, "link-credit")?,
                    available: f.opt_u32(7, "available")?,
                    drain: f.opt_bool(8, "drain")?.unwrap_or(false),
                    echo: f.opt_bool(9, "echo")?.unwrap_or(false),
                })
            }
            descriptor::TRANSFER => {
                let mut f = Fields::described(value, code, "transfer")?;
                Self::Transfer(Transfer {
                    handle: f.req_u32(0, "handle")?,
                    delivery_id: f.opt_u32(1, "delivery-id")?,
                    delivery_tag: f.opt_binary(2, "delivery-tag")?,
                    message_format: f.opt_u32(3, "message-format")?,
                    settled: f.opt_bool(4, "settled")?,
                    more: f.opt_bool(5, "more")?.unwrap_or(false),
                    state: f.opt_value(7).map(DeliveryState::from_value).transpose()?,
                    aborted: f.opt_bool(9, "aborted")?.unwrap_or(false),
                })
            }
            descriptor::DISPOSITION => {
                let mut f = Fields::described(value, code, "disposition")?;
                Self::Disposition(Disposition {
                    role: f.req_role(0)?,
                    first: f.req_u32(1, "first")?,
                    last: f.opt_u32(2, "last")?,
                    settled: f.opt_bool(3, "settled")?.unwrap_or(false),
                    state: f.opt_value(4).map(DeliveryState::from_value).transpose()?,
                })
            }
            descriptor::DETACH => {
                let mut f = Fields::described(value, code, "detach")?;
                Self::Detach(Detach {
                    handle: f.req_u32(0, "handle")?,
                    closed: f.opt_bool(1, "closed")?.unwrap_or(false),
                    error: f.opt_value(2).map(AmqpError::from_value).transpose()?,
                })
            }
            descriptor::END => {
                let mut f = Fields::described(value, code, "end")?;
                Self::End(End {
                    error: f.opt_value(0).map(AmqpError::from_value).transpose()?,
                })
            }
            descriptor::CLOSE => {
                let mut f = Fields::described(value, code, "close")?;
                Self::Close(Close {
                    error: f.opt_value(0).map(AmqpError::from_value).transpose()?,
                })
            }
            other => return Err(CodecError::unknown_descriptor(format!("{other:#x}"), "performative")),
        };
        Ok(performative)
    }
}

pub(crate) fn opt(value: Option<Value>) -> Value {
    value.unwrap_or(Value::Null)
}

/// Booleans that default to false are omitted rather than sent as `false`
fn flag(value: bool) -> Value {
    if value {
        Value::Bool(true)
    } else {
        Value::Null
    }
}

/// Described list with trailing nulls trimmed
pub(crate) fn described_list(code: u64, mut fields: Vec<Value>) -> Value {
    while fields.last().is_some_and(Value::is_null) {
        fields.pop();
    }
    Value::described(code, Value::List(fields))
}

/// Positional field access over a decoded composite list
pub(crate) struct Fields {
    composite: &'static str,
    fields: Vec<Value>,
}

impl Fields {
    pub(crate) fn described(value: Value, code: u64, composite: &'static str) -> CodecResult<Self> {
        match value {
            Value::Described(descriptor, body) if descriptor.as_ref() == &Value::Ulong(code) => match *body {
                Value::List(fields) => Ok(Self { composite, fields }),
                other => Err(CodecError::type_mismatch(composite, "list", other.type_name())),
            },
            Value::Described(descriptor, _) => Err(CodecError::unknown_descriptor(descriptor.to_string(), composite)),
            other => Err(CodecError::type_mismatch(composite, "described", other.type_name())),
        }
    }

    fn field(&self, name: &str) -> String {
        format!("{}.{}", self.composite, name)
    }

    /// Take a field, mapping absent and null to `None`
    pub(crate) fn opt_value(&mut self, index: usize) -> Option<Value> {
        match self.fields.get_mut(index) {
            Some(slot) if !slot.is_null() => Some(std::mem::replace(slot, Value::Null)),
            _ => None,
        }
    }

    fn mismatch(&self, name: &str, expected: &'static str, got: &Value) -> CodecError {
        CodecError::type_mismatch(self.field(name), expected, got.type_name())
    }

    fn missing(&self, name: &'static str) -> CodecError {
        CodecError::MissingField {
            composite: self.composite,
            field: name,
        }
    }

    pub(crate) fn opt_string(&mut self, index: usize, name: &str) -> CodecResult<Option<String>> {
        match self.opt_value(index) {
            None => Ok(None),
            Some(Value::String(s)) | Some(Value::Symbol(s)) => Ok(Some(s)),
            Some(other) => Err(self.mismatch(name, "string", &other)),
        }
    }

    pub(crate) fn req_string(&mut self, index: usize, name: &'static str) -> CodecResult<String> {
        self.opt_string(index, name)?.ok_or_else(|| self.missing(name))
    }

    pub(crate) fn opt_u32(&mut self, index: usize, name: &str) -> CodecResult<Option<u32>> {
        match self.opt_value(index) {
            None => Ok(None),
            Some(Value::Uint(v)) => Ok(Some(v)),
            Some(other) => Err(self.mismatch(name, "uint", &other)),
        }
    }

    pub(crate) fn req_u32(&mut self, index: usize, name: &'static str) -> CodecResult<u32> {
        self.opt_u32(index, name)?.ok_or_else(|| self.missing(name))
    }

    pub(crate) fn opt_u16(&mut self, index: usize, name: &str) -> CodecResult<Option<u16>> {
        match self.opt_value(index) {
            None => Ok(None),
            Some(Value::Ushort(v)) => Ok(Some(v)),
            Some(other) => Err(self.mismatch(name, "ushort", &other)),
        }
    }

    pub(crate) fn opt_u64(&mut self, index: usize, name: &str) -> CodecResult<Option<u64>> {
        match self.opt_value(index) {
            None => Ok(None),
            Some(Value::Ulong(v)) => Ok(Some(v)),
            Some(other) => Err(self.mismatch(name, "ulong", &other)),
        }
    }

    pub(crate) fn opt_ubyte(&mut self, index: usize, name: &str) -> CodecResult<Option<u8>> {
        match self.opt_value(index) {
            None => Ok(None),
            Some(Value::Ubyte(v)) => Ok(Some(v)),
            Some(other) => Err(self.mismatch(name, "ubyte", &other)),
        }
    }

    pub(crate) fn opt_bool(&mut self, index: usize, name: &str) -> CodecResult<Option<bool>> {
        match self.opt_value(index) {
            None => Ok(None),
            Some(Value::Bool(v)) => Ok(Some(v)),
            Some(other) => Err(self.mismatch(name, "boolean", &other)),
        }
    }

    pub(crate) fn opt_binary(&mut self, index: usize, name: &str) -> CodecResult<Option<Bytes>> {
        match self.opt_value(index) {
            None => Ok(None),
            Some(Value::Binary(v)) => Ok(Some(v)),
            Some(other) => Err(self.mismatch(name, "binary", &other)),
        }
    }

    fn req_role(&mut self, index: usize) -> CodecResult<Role> {
        match self.opt_bool(index, "role")? {
            Some(true) => Ok(Role::Receiver),
            Some(false) => Ok(Role::Sender),
            None => Err(self.missing("role")),
        }
    }
}
