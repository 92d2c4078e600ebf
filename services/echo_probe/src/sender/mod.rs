//! Upstream echo-request send path
//!
//! One [`EchoSender`] per transport protocol. Each performs a single send and
//! returns `Ok(())` only once the hub confirmed it.

pub mod amqp;
pub mod connection_string;
pub mod http;
pub mod mqtt;
pub mod sas;

use crate::constants::{properties, DEFAULT_SEND_TIMEOUT, ECHO_REQUEST_MARKER};
use crate::error::Result;
use async_trait::async_trait;
use message_sink::Message;
use probe_config::TransportProtocol;
use std::sync::Arc;
use std::time::Duration;

pub use amqp::AmqpEchoSender;
pub use connection_string::DeviceConnectionString;
pub use http::HttpEchoSender;
pub use mqtt::MqttEchoSender;

/// The request as sent upstream: payload plus forwarded properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoRequest {
    pub payload: String,
    pub properties: Vec<(String, String)>,
}

impl EchoRequest {
    pub fn new(protocol: TransportProtocol) -> Self {
        Self {
            payload: ECHO_REQUEST_MARKER.to_string(),
            properties: vec![
                (properties::ECHO_REQUEST.to_string(), ECHO_REQUEST_MARKER.to_string()),
                (properties::REQUEST_PROTOCOL.to_string(), protocol.as_str().to_string()),
            ],
        }
    }

    /// Request built from a local bus message; device credentials are dropped
    pub fn from_message(message: &Message) -> Self {
        Self {
            payload: String::from_utf8_lossy(&message.payload).into_owned(),
            properties: message
                .properties
                .iter()
                .filter(|(k, _)| k.as_str() != properties::DEVICE_NAME && k.as_str() != properties::DEVICE_KEY)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v.as_str()))
    }
}

#[async_trait]
pub trait EchoSender: Send + Sync {
    fn protocol(&self) -> TransportProtocol;

    /// Send once and wait for the hub's confirmation
    async fn send(&self, request: &EchoRequest) -> Result<()>;
}

/// Sender for the configured protocol
pub fn sender_for(
    protocol: TransportProtocol,
    device: DeviceConnectionString,
    timeout: Duration,
) -> Result<Arc<dyn EchoSender>> {
    Ok(match protocol {
        TransportProtocol::Http => Arc::new(HttpEchoSender::new(device, timeout)?),
        TransportProtocol::Amqp => Arc::new(AmqpEchoSender::new(device, timeout)),
        TransportProtocol::Mqtt => Arc::new(MqttEchoSender::new(device, timeout)),
    })
}

/// Sender with the default send timeout
pub fn default_sender_for(protocol: TransportProtocol, device: DeviceConnectionString) -> Result<Arc<dyn EchoSender>> {
    sender_for(protocol, device, DEFAULT_SEND_TIMEOUT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::request_notice;

    fn device() -> DeviceConnectionString {
        "HostName=hub.azure-devices.net;DeviceId=dev1;SharedAccessKey=a2V5"
            .parse()
            .unwrap()
    }

    #[test]
    fn test_request_properties() {
        let request = EchoRequest::new(TransportProtocol::Amqp);
        assert_eq!(request.payload, "echo request sent successfully");
        assert_eq!(request.property("ECHOREQUEST"), Some("echo request sent successfully"));
        assert_eq!(request.property("REQUEST_PROTOCOL"), Some("AMQP"));
    }

    #[test]
    fn test_device_credentials_not_forwarded() {
        let message = request_notice(TransportProtocol::Mqtt)
            .with_property("deviceName", "dev1")
            .with_property("deviceKey", "secret");
        let request = EchoRequest::from_message(&message);
        assert_eq!(request.property("deviceName"), None);
        assert_eq!(request.property("deviceKey"), None);
        assert_eq!(request.property("REQUEST_PROTOCOL"), Some("MQTT"));
        assert_eq!(request, EchoRequest {
            payload: "echo request sent successfully".into(),
            properties: vec![
                ("ECHOREQUEST".into(), "echo request sent successfully".into()),
                ("REQUEST_PROTOCOL".into(), "MQTT".into()),
            ],
        });
    }

    #[test]
    fn test_sender_for_selects_protocol() {
        for protocol in [TransportProtocol::Http, TransportProtocol::Amqp, TransportProtocol::Mqtt] {
            let sender = default_sender_for(protocol, device()).unwrap();
            assert_eq!(sender.protocol(), protocol);
        }
    }
}
