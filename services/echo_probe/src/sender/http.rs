//! HTTPS device-to-cloud send

use super::sas::{token_from_now, DEFAULT_TOKEN_TTL};
use super::{DeviceConnectionString, EchoRequest, EchoSender};
use crate::error::{ProbeError, Result};
use async_trait::async_trait;
use probe_config::TransportProtocol;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

pub const HTTP_API_VERSION: &str = "2020-03-13";

/// Prefix that marks a header as an application property
pub const APP_PROPERTY_HEADER_PREFIX: &str = "iothub-app-";

pub struct HttpEchoSender {
    device: DeviceConnectionString,
    client: Client,
    base_url: String,
}

impl HttpEchoSender {
    pub fn new(device: DeviceConnectionString, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::send(TransportProtocol::Http, e))?;
        let base_url = format!("https://{}", device.host_name);
        Ok(Self {
            device,
            client,
            base_url,
        })
    }

    /// Send to another base URL (plain-HTTP test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn events_url(&self) -> String {
        format!(
            "{}/devices/{}/messages/events?api-version={HTTP_API_VERSION}",
            self.base_url.trim_end_matches('/'),
            self.device.device_id
        )
    }
}

#[async_trait]
impl EchoSender for HttpEchoSender {
    fn protocol(&self) -> TransportProtocol {
        TransportProtocol::Http
    }

    async fn send(&self, request: &EchoRequest) -> Result<()> {
        let token = token_from_now(
            &self.device.resource_uri(),
            &self.device.shared_access_key,
            DEFAULT_TOKEN_TTL,
        )?;

        let mut builder = self
            .client
            .post(self.events_url())
            .header(reqwest::header::AUTHORIZATION, token)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(request.payload.clone());
        for (key, value) in &request.properties {
            builder = builder.header(format!("{APP_PROPERTY_HEADER_PREFIX}{key}"), value.as_str());
        }

        debug!(device = %self.device.device_id, "Posting echo request");
        let response = builder
            .send()
            .await
            .map_err(|e| ProbeError::send(TransportProtocol::Http, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProbeError::send(
                TransportProtocol::Http,
                format!("hub answered {status}: {body}"),
            ));
        }
        info!(device = %self.device.device_id, status = %status, "Echo request accepted over HTTP");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn device() -> DeviceConnectionString {
        "HostName=hub.azure-devices.net;DeviceId=dev1;SharedAccessKey=a2V5"
            .parse()
            .unwrap()
    }

    #[test]
    fn test_events_url() {
        let sender = HttpEchoSender::new(device(), Duration::from_secs(5)).unwrap();
        assert_eq!(
            sender.events_url(),
            "https://hub.azure-devices.net/devices/dev1/messages/events?api-version=2020-03-13"
        );
    }

    /// One-shot HTTP server answering `status_line`; returns the request head
    async fn serve_once(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let body_len = "echo request sent successfully".len();
                    if request.len() >= head_end + 4 + body_len {
                        break;
                    }
                }
            }
            let response = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn test_posts_properties_as_headers() {
        let (url, server) = serve_once("HTTP/1.1 204 No Content").await;
        let sender = HttpEchoSender::new(device(), Duration::from_secs(5))
            .unwrap()
            .with_base_url(url);

        sender.send(&EchoRequest::new(TransportProtocol::Http)).await.unwrap();

        let request = server.await.unwrap().to_ascii_lowercase();
        assert!(request.starts_with("post /devices/dev1/messages/events?api-version=2020-03-13"));
        assert!(request.contains("iothub-app-echorequest: echo request sent successfully"));
        assert!(request.contains("iothub-app-request_protocol: http"));
        assert!(request.contains("authorization: sharedaccesssignature sr="));
        assert!(request.ends_with("echo request sent successfully"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_send_error() {
        let (url, _server) = serve_once("HTTP/1.1 401 Unauthorized").await;
        let sender = HttpEchoSender::new(device(), Duration::from_secs(5))
            .unwrap()
            .with_base_url(url);

        let err = sender.send(&EchoRequest::new(TransportProtocol::Http)).await.unwrap_err();
        assert!(matches!(err, ProbeError::Send { protocol: TransportProtocol::Http, .. }));
        assert!(err.to_string().contains("401"));
    }
}
