//! # AMQP 1.0 Codec
//!
//! ## Purpose
//!
//! Wire-level encoding and decoding for the AMQP 1.0 subset the probe needs:
//! the primitive and composite type system, frames, transport performatives,
//! SASL frames and bare-message sections.
//!
//! ## Architecture Role
//!
//! ```text
//! [codec] → network/ → services/echo_probe
//!    ↓          ↓
//! Values    TLS, SASL,
//! Frames    connection/session/link state
//! ```
//!
//! ## What This Crate Contains
//! - [`Value`] and its compact encoder, [`ValueParser`] for bounds-checked decoding
//! - [`Frame`] and the incremental [`FrameDecoder`]
//! - [`Performative`] with typed `open`/`begin`/`attach`/... structs
//! - [`SaslFrame`] for the PLAIN handshake
//! - [`AmqpMessage`] sections (annotations, application properties, body)
//!
//! ## What This Crate Does NOT Contain
//! - Sockets, TLS or timeouts (belongs in network/)
//! - Connection, session or link state machines (belongs in network/)

pub mod constants;
pub mod error;
pub mod frame;
pub mod message;
pub mod parser;
pub mod performative;
pub mod sasl;
pub mod value;

pub use constants::{AMQP_HEADER, FRAME_HEADER_SIZE, SASL_HEADER, SELECTOR_FILTER};
pub use error::{CodecError, CodecResult};
pub use frame::{take_protocol_header, Frame, FrameBody, FrameDecoder, FrameType};
pub use message::{AmqpMessage, Body, Properties, ENQUEUED_TIME_ANNOTATION};
pub use parser::{decode_value, ValueParser};
pub use performative::{
    AmqpError, Attach, Begin, Close, DeliveryState, Detach, Disposition, End, Flow, Open, Performative,
    ReceiverSettleMode, Role, SenderSettleMode, Source, Target, Transfer,
};
pub use sasl::{SaslCode, SaslFrame, SaslInit};
pub use value::Value;
