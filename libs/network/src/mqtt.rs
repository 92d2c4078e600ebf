//! Minimal MQTT 3.1.1 publisher
//!
//! Enough of the protocol for a single QoS 1 publish: CONNECT, CONNACK,
//! PUBLISH, PUBACK, DISCONNECT.

use crate::tls::{self, TlsSettings};
use crate::{Result, TransportError};
use rustls::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Secure MQTT port
pub const MQTTS_PORT: u16 = 8883;

const CONNECT: u8 = 0x10;
const CONNACK: u8 = 0x20;
const PUBLISH_QOS1: u8 = 0x32;
const PUBACK: u8 = 0x40;
const DISCONNECT: u8 = 0xE0;

/// CONNECT fields for a password-authenticated clean session
#[derive(Clone)]
pub struct MqttConnectOptions {
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub keep_alive_secs: u16,
}

impl std::fmt::Debug for MqttConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttConnectOptions")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("keep_alive_secs", &self.keep_alive_secs)
            .finish_non_exhaustive()
    }
}

pub fn encode_remaining_length(mut len: usize) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
    out
}

fn put_string(body: &mut Vec<u8>, value: &[u8]) {
    body.extend_from_slice(&(value.len() as u16).to_be_bytes());
    body.extend_from_slice(value);
}

fn packet(header: u8, body: Vec<u8>) -> Vec<u8> {
    let mut frame = vec![header];
    frame.extend(encode_remaining_length(body.len()));
    frame.extend(body);
    frame
}

pub fn encode_connect(options: &MqttConnectOptions) -> Vec<u8> {
    let mut body = Vec::new();
    put_string(&mut body, b"MQTT");
    body.push(4); // protocol level 3.1.1
    body.push(0xC2); // username | password | clean session
    body.extend_from_slice(&options.keep_alive_secs.to_be_bytes());
    put_string(&mut body, options.client_id.as_bytes());
    put_string(&mut body, options.username.as_bytes());
    put_string(&mut body, options.password.as_bytes());
    packet(CONNECT, body)
}

pub fn encode_publish_qos1(topic: &str, payload: &[u8], packet_id: u16) -> Vec<u8> {
    let mut body = Vec::new();
    put_string(&mut body, topic.as_bytes());
    body.extend_from_slice(&packet_id.to_be_bytes());
    body.extend_from_slice(payload);
    packet(PUBLISH_QOS1, body)
}

pub fn encode_disconnect() -> Vec<u8> {
    vec![DISCONNECT, 0x00]
}

async fn read_packet<S: AsyncRead + Unpin>(stream: &mut S) -> Result<(u8, Vec<u8>)> {
    let mut first = [0u8; 1];
    stream.read_exact(&mut first).await?;

    let mut multiplier = 1usize;
    let mut remaining = 0usize;
    for _ in 0..4 {
        let mut byte = [0u8; 1];
        stream.read_exact(&mut byte).await?;
        remaining += (byte[0] & 0x7F) as usize * multiplier;
        if byte[0] & 0x80 == 0 {
            let mut body = vec![0u8; remaining];
            stream.read_exact(&mut body).await?;
            return Ok((first[0], body));
        }
        multiplier *= 128;
    }
    Err(TransportError::protocol("MQTT remaining length exceeds four bytes"))
}

/// Connect, publish once at QoS 1, wait for the PUBACK and disconnect
pub async fn publish_once<S>(
    stream: &mut S,
    options: &MqttConnectOptions,
    topic: &str,
    payload: &[u8],
    wait: Duration,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let exchange = async {
        stream.write_all(&encode_connect(options)).await?;
        stream.flush().await?;

        let (header, body) = read_packet(stream).await?;
        if header != CONNACK || body.len() != 2 {
            return Err(TransportError::protocol(format!(
                "expected CONNACK, got packet {header:#04x}"
            )));
        }
        if body[1] != 0 {
            return Err(TransportError::authentication(
                "MQTT",
                format!("CONNACK return code {}", body[1]),
            ));
        }
        debug!(client_id = %options.client_id, "MQTT session accepted");

        let packet_id = 1u16;
        stream.write_all(&encode_publish_qos1(topic, payload, packet_id)).await?;
        stream.flush().await?;

        loop {
            let (header, body) = read_packet(stream).await?;
            if header == PUBACK && body.len() >= 2 && u16::from_be_bytes([body[0], body[1]]) == packet_id {
                break;
            }
            debug!(packet = header, "Ignoring MQTT packet while awaiting PUBACK");
        }

        stream.write_all(&encode_disconnect()).await?;
        stream.flush().await?;
        Ok::<(), TransportError>(())
    };

    tokio::time::timeout(wait, exchange)
        .await
        .map_err(|_| TransportError::timed_out("mqtt publish", wait))?
}

/// Publishes over TLS to one broker host
#[derive(Clone)]
pub struct MqttPublisher {
    host: String,
    port: u16,
    timeout: Duration,
    tls: Arc<ClientConfig>,
}

impl MqttPublisher {
    pub fn new(host: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            host: host.into(),
            port: MQTTS_PORT,
            timeout,
            tls: tls::client_config(TlsSettings::default())?,
        })
    }

    pub async fn publish(&self, options: &MqttConnectOptions, topic: &str, payload: &[u8]) -> Result<()> {
        let mut stream = tls::connect(&self.host, self.port, self.tls.clone(), self.timeout).await?;
        let result = publish_once(&mut stream, options, topic, payload, self.timeout).await;
        if let Err(e) = stream.shutdown().await {
            debug!("MQTT stream shutdown failed: {}", e);
        }
        if result.is_ok() {
            info!(host = %self.host, topic = %topic, "MQTT publish acknowledged");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> MqttConnectOptions {
        MqttConnectOptions {
            client_id: "dev1".into(),
            username: "hub.azure-devices.net/dev1/?api-version=2021-04-12".into(),
            password: "SharedAccessSignature sr=x".into(),
            keep_alive_secs: 60,
        }
    }

    #[test]
    fn test_remaining_length_encoding() {
        assert_eq!(encode_remaining_length(0), vec![0x00]);
        assert_eq!(encode_remaining_length(127), vec![0x7F]);
        assert_eq!(encode_remaining_length(128), vec![0x80, 0x01]);
        assert_eq!(encode_remaining_length(16_383), vec![0xFF, 0x7F]);
    }

    #[test]
    fn test_connect_layout() {
        let packet = encode_connect(&options());
        assert_eq!(packet[0], 0x10);
        // remaining length is one byte for this size
        assert_eq!(&packet[2..8], b"\x00\x04MQTT");
        assert_eq!(packet[8], 4);
        assert_eq!(packet[9], 0xC2);
        assert_eq!(&packet[10..12], &60u16.to_be_bytes());
        assert_eq!(&packet[12..14], &4u16.to_be_bytes());
        assert_eq!(&packet[14..18], b"dev1");
    }

    #[test]
    fn test_publish_layout() {
        let packet = encode_publish_qos1("devices/dev1/messages/events/", b"hi", 1);
        assert_eq!(packet[0], 0x32);
        assert_eq!(packet[1] as usize, packet.len() - 2);
        let topic_len = u16::from_be_bytes([packet[2], packet[3]]) as usize;
        assert_eq!(&packet[4..4 + topic_len], b"devices/dev1/messages/events/");
        assert_eq!(&packet[4 + topic_len..6 + topic_len], &[0, 1]);
        assert_eq!(&packet[6 + topic_len..], b"hi");
    }

    #[tokio::test]
    async fn test_publish_once_against_fake_broker() {
        let (mut client, mut broker) = tokio::io::duplex(4096);
        let server = tokio::spawn(async move {
            let (header, _) = read_packet(&mut broker).await.unwrap();
            assert_eq!(header, CONNECT);
            broker.write_all(&[CONNACK, 0x02, 0x00, 0x00]).await.unwrap();
            let (header, body) = read_packet(&mut broker).await.unwrap();
            assert_eq!(header, PUBLISH_QOS1);
            assert!(body.ends_with(b"payload"));
            broker.write_all(&[PUBACK, 0x02, 0x00, 0x01]).await.unwrap();
            let (header, _) = read_packet(&mut broker).await.unwrap();
            assert_eq!(header, DISCONNECT);
        });

        publish_once(&mut client, &options(), "t", b"payload", Duration::from_secs(1))
            .await
            .unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_connack_is_authentication_error() {
        let (mut client, mut broker) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let _ = read_packet(&mut broker).await;
            let _ = broker.write_all(&[CONNACK, 0x02, 0x00, 0x05]).await;
        });

        let err = publish_once(&mut client, &options(), "t", b"x", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Authentication { .. }));
    }
}
