//! Network Infrastructure
//!
//! Secured transports and protocol clients used by the echo probe:
//!
//! - [`tls`]: rustls client configuration and TCP/TLS connect
//! - [`sasl`]: SASL PLAIN negotiation
//! - [`amqp`]: AMQP 1.0 connection, session and link state, [`AmqpConnector`]
//! - [`link`]: the [`LinkConnector`]/[`ReceiverLink`] seam the probe polls through
//! - [`mqtt`]: a single-shot MQTT 3.1.1 publisher

pub mod amqp;
pub mod error;
pub mod io;
pub mod link;
pub mod mqtt;
pub mod sasl;
pub mod tls;

pub use amqp::{AmqpConnector, AmqpReceiver, AmqpSender, ConnectionParams, LinkSettings, AMQPS_PORT};
pub use error::{Result, TransportError};
pub use link::{Acknowledgement, Delivery, LinkConnector, ReceiverLink, ReceiverOptions};
pub use mqtt::{MqttConnectOptions, MqttPublisher, MQTTS_PORT};
pub use sasl::PlainCredentials;
