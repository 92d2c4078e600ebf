//! Link abstractions consumed by the probe
//!
//! A [`LinkConnector`] opens [`ReceiverLink`]s; the AMQP implementation lives
//! in [`crate::amqp`], tests substitute scripted links.

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use codec::DeliveryState;

/// Default receiving link name
pub const RECEIVER_LINK_NAME: &str = "receiver-link";

/// Default receiving link target address
pub const RECEIVER_TARGET: &str = "messages/events";

/// A complete (reassembled) message delivery
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub delivery_id: u32,
    pub delivery_tag: Bytes,
    /// Sender already settled; no disposition is expected
    pub settled: bool,
    /// Encoded message sections
    pub payload: Bytes,
}

/// Receiver's verdict on a delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acknowledgement {
    Accept,
    Reject { condition: String, description: String },
}

impl Acknowledgement {
    pub fn reject(condition: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Reject {
            condition: condition.into(),
            description: description.into(),
        }
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }

    pub fn to_delivery_state(&self) -> DeliveryState {
        match self {
            Self::Accept => DeliveryState::Accepted,
            Self::Reject {
                condition,
                description,
            } => DeliveryState::rejected(condition.as_str(), description.as_str()),
        }
    }
}

/// What to attach: the node address plus an optional selector expression
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverOptions {
    pub address: String,
    pub filter: Option<String>,
    pub link_name: String,
    pub target: String,
}

impl ReceiverOptions {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            filter: None,
            link_name: RECEIVER_LINK_NAME.to_string(),
            target: RECEIVER_TARGET.to_string(),
        }
    }

    pub fn with_filter(mut self, expression: impl Into<String>) -> Self {
        self.filter = Some(expression.into());
        self
    }
}

/// An attached receiving link
#[async_trait]
pub trait ReceiverLink: Send {
    /// Source address the link is attached to
    fn address(&self) -> &str;

    /// Advance the protocol one bounded step and return deliveries that completed
    async fn do_work(&mut self) -> Result<Vec<Delivery>>;

    /// Send a settled disposition for an unsettled delivery
    async fn settle(&mut self, delivery: &Delivery, acknowledgement: Acknowledgement) -> Result<()>;

    /// Detach, end, close and shut down the transport. Safe to call twice
    async fn close(&mut self) -> Result<()>;
}

/// Opens receiving links to one endpoint
#[async_trait]
pub trait LinkConnector: Send + Sync {
    async fn open_receiver(&self, options: ReceiverOptions) -> Result<Box<dyn ReceiverLink>>;
}
