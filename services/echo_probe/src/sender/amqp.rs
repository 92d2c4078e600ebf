//! AMQPS device-to-cloud send
//!
//! Authenticates with SASL PLAIN as `<device>@sas.<hub>` using a SAS token as
//! the password, then sends one transfer and waits for it to be accepted.

use super::sas::{token_from_now, DEFAULT_TOKEN_TTL};
use super::{DeviceConnectionString, EchoRequest, EchoSender};
use crate::error::{ProbeError, Result};
use async_trait::async_trait;
use codec::AmqpMessage;
use network::{AmqpConnector, LinkSettings, PlainCredentials};
use probe_config::TransportProtocol;
use std::time::Duration;
use tracing::{debug, info};

pub struct AmqpEchoSender {
    device: DeviceConnectionString,
    timeout: Duration,
}

impl AmqpEchoSender {
    pub fn new(device: DeviceConnectionString, timeout: Duration) -> Self {
        Self { device, timeout }
    }

    /// SASL PLAIN user name for the device
    pub fn sasl_username(&self) -> String {
        format!("{}@sas.{}", self.device.device_id, self.device.hub_name())
    }

    pub fn target(&self) -> String {
        format!("/devices/{}/messages/events", self.device.device_id)
    }

    pub fn build_message(request: &EchoRequest) -> AmqpMessage {
        request
            .properties
            .iter()
            .fold(AmqpMessage::with_data(request.payload.clone().into_bytes()), |message, (k, v)| {
                message.with_application_property(k.as_str(), v.as_str())
            })
    }

    async fn send_once(&self, request: &EchoRequest) -> network::Result<()> {
        let token = token_from_now(
            &self.device.resource_uri(),
            &self.device.shared_access_key,
            DEFAULT_TOKEN_TTL,
        )
        .map_err(|e| network::TransportError::configuration(e.to_string(), Some("SharedAccessKey")))?;

        let settings = LinkSettings {
            connect_timeout: self.timeout,
            ..LinkSettings::default()
        };
        let connector = AmqpConnector::new(
            self.device.host_name.clone(),
            PlainCredentials::new(self.sasl_username(), token),
            settings,
        )?;

        let mut sender = connector.connect_sender(&self.target()).await?;
        debug!(device = %self.device.device_id, "Sender link attached");
        let result = sender.send(&Self::build_message(request)).await;
        if let Err(e) = sender.close().await {
            debug!(error = %e, "Sender close failed");
        }
        result
    }
}

#[async_trait]
impl EchoSender for AmqpEchoSender {
    fn protocol(&self) -> TransportProtocol {
        TransportProtocol::Amqp
    }

    async fn send(&self, request: &EchoRequest) -> Result<()> {
        tokio::time::timeout(self.timeout, self.send_once(request))
            .await
            .map_err(|_| ProbeError::send(TransportProtocol::Amqp, format!("no acceptance within {:?}", self.timeout)))?
            .map_err(|e| ProbeError::send(TransportProtocol::Amqp, e))?;
        info!(device = %self.device.device_id, "Echo request accepted over AMQP");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::Value;

    fn sender() -> AmqpEchoSender {
        let device = "HostName=myhub.azure-devices.net;DeviceId=dev1;SharedAccessKey=a2V5"
            .parse()
            .unwrap();
        AmqpEchoSender::new(device, Duration::from_secs(5))
    }

    #[test]
    fn test_credentials_and_target() {
        let sender = sender();
        assert_eq!(sender.sasl_username(), "dev1@sas.myhub");
        assert_eq!(sender.target(), "/devices/dev1/messages/events");
    }

    #[test]
    fn test_message_carries_properties() {
        let message = AmqpEchoSender::build_message(&EchoRequest::new(TransportProtocol::Amqp));
        assert_eq!(
            message.first_data().map(|d| d.as_ref()),
            Some(&b"echo request sent successfully"[..])
        );
        assert_eq!(
            message.application_property("ECHOREQUEST"),
            Some(&Value::String("echo request sent successfully".into()))
        );
        assert_eq!(
            message.application_property("REQUEST_PROTOCOL"),
            Some(&Value::String("AMQP".into()))
        );
    }
}
