//! MQTTS device-to-cloud send

use super::sas::{token_from_now, DEFAULT_TOKEN_TTL};
use super::{DeviceConnectionString, EchoRequest, EchoSender};
use crate::error::{ProbeError, Result};
use async_trait::async_trait;
use network::{MqttConnectOptions, MqttPublisher};
use probe_config::TransportProtocol;
use std::time::Duration;
use tracing::info;

pub const MQTT_API_VERSION: &str = "2021-04-12";

const KEEP_ALIVE_SECS: u16 = 60;

pub struct MqttEchoSender {
    device: DeviceConnectionString,
    timeout: Duration,
}

fn encode_component(input: &str) -> String {
    // byte_serialize writes spaces as '+', which the hub reads literally
    url::form_urlencoded::byte_serialize(input.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

impl MqttEchoSender {
    pub fn new(device: DeviceConnectionString, timeout: Duration) -> Self {
        Self { device, timeout }
    }

    pub fn connect_options(&self, token: String) -> MqttConnectOptions {
        MqttConnectOptions {
            client_id: self.device.device_id.clone(),
            username: format!(
                "{}/{}/?api-version={MQTT_API_VERSION}",
                self.device.host_name, self.device.device_id
            ),
            password: token,
            keep_alive_secs: KEEP_ALIVE_SECS,
        }
    }

    /// Events topic with the request properties as a URL-encoded property bag
    pub fn topic(&self, request: &EchoRequest) -> String {
        let bag = request
            .properties
            .iter()
            .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("devices/{}/messages/events/{bag}", self.device.device_id)
    }
}

#[async_trait]
impl EchoSender for MqttEchoSender {
    fn protocol(&self) -> TransportProtocol {
        TransportProtocol::Mqtt
    }

    async fn send(&self, request: &EchoRequest) -> Result<()> {
        let token = token_from_now(
            &self.device.resource_uri(),
            &self.device.shared_access_key,
            DEFAULT_TOKEN_TTL,
        )?;
        let publisher = MqttPublisher::new(self.device.host_name.clone(), self.timeout)
            .map_err(|e| ProbeError::send(TransportProtocol::Mqtt, e))?;

        publisher
            .publish(&self.connect_options(token), &self.topic(request), request.payload.as_bytes())
            .await
            .map_err(|e| ProbeError::send(TransportProtocol::Mqtt, e))?;
        info!(device = %self.device.device_id, "Echo request acknowledged over MQTT");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> MqttEchoSender {
        let device = "HostName=hub.azure-devices.net;DeviceId=dev1;SharedAccessKey=a2V5"
            .parse()
            .unwrap();
        MqttEchoSender::new(device, Duration::from_secs(5))
    }

    #[test]
    fn test_topic_property_bag() {
        let topic = sender().topic(&EchoRequest::new(TransportProtocol::Mqtt));
        assert_eq!(
            topic,
            "devices/dev1/messages/events/\
             ECHOREQUEST=echo%20request%20sent%20successfully&REQUEST_PROTOCOL=MQTT"
        );
    }

    #[test]
    fn test_connect_options() {
        let options = sender().connect_options("SharedAccessSignature sr=x".into());
        assert_eq!(options.client_id, "dev1");
        assert_eq!(options.username, "hub.azure-devices.net/dev1/?api-version=2021-04-12");
        assert_eq!(options.keep_alive_secs, 60);
        assert!(!format!("{options:?}").contains("SharedAccessSignature"));
    }

    #[test]
    fn test_encode_component_keeps_plus_literal() {
        assert_eq!(encode_component("a+b c"), "a%2Bb%20c");
    }
}
