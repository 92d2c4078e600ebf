//! # AMQP 1.0 Client
//!
//! ## Purpose
//!
//! Connection bootstrap for one endpoint: TLS, SASL PLAIN, `open`, `begin`,
//! `attach`. [`AmqpConnector`] produces receiving links for the probe and
//! sending links for the device-to-cloud path.
//!
//! ## Bootstrap Sequence
//!
//! ```text
//! TCP → TLS → SASL header → mechanisms → init(PLAIN) → outcome
//!   → AMQP header → open ⇄ open → begin ⇄ begin → attach ⇄ attach → flow
//! ```
//!
//! Teardown runs in reverse: detach, end, close, TLS shutdown.

mod connection;
mod receiver;
mod sender;

pub use connection::ConnectionParams;
pub use receiver::AmqpReceiver;
pub use sender::AmqpSender;

use crate::link::{LinkConnector, ReceiverLink, ReceiverOptions};
use crate::sasl::PlainCredentials;
use crate::tls::{self, TlsSettings, TlsStream};
use crate::{Result, TransportError};
use async_trait::async_trait;
use rustls::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Secure AMQP port
pub const AMQPS_PORT: u16 = 5671;

/// Timeouts, frame size and flow-control limits for a link
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSettings {
    /// Bound on the whole bootstrap, TCP connect through attach
    pub connect_timeout: Duration,
    /// Bound on each handshake step
    pub io_timeout: Duration,
    /// Bound on the read inside one `do_work()` step
    pub io_wait: Duration,
    pub close_timeout: Duration,
    pub max_frame_size: u32,
    /// Largest delivery reassembled from multi-frame transfers
    pub max_message_size: usize,
    pub incoming_window: u32,
    pub link_credit: u32,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            io_timeout: Duration::from_secs(10),
            io_wait: Duration::from_millis(20),
            close_timeout: Duration::from_secs(1),
            max_frame_size: 256 * 1024,
            max_message_size: 4 * 1024 * 1024,
            incoming_window: 1000,
            link_credit: 1000,
        }
    }
}

/// Opens TLS-secured AMQP links to one host with one set of credentials
#[derive(Clone)]
pub struct AmqpConnector {
    host: String,
    port: u16,
    credentials: PlainCredentials,
    settings: LinkSettings,
    tls: Arc<ClientConfig>,
}

impl std::fmt::Debug for AmqpConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpConnector")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("credentials", &self.credentials)
            .field("settings", &self.settings)
            .finish()
    }
}

impl AmqpConnector {
    pub fn new(host: impl Into<String>, credentials: PlainCredentials, settings: LinkSettings) -> Result<Self> {
        let host = host.into();
        if host.is_empty() {
            return Err(TransportError::configuration("empty host", Some("host")));
        }
        Ok(Self {
            host,
            port: AMQPS_PORT,
            credentials,
            settings,
            tls: tls::client_config(TlsSettings::default())?,
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    fn params(&self) -> ConnectionParams {
        ConnectionParams {
            hostname: self.host.clone(),
            credentials: self.credentials.clone(),
            container_id: format!("probe-{}", uuid::Uuid::new_v4()),
        }
    }

    /// Connect and attach a receiving link.
    ///
    /// TCP and TLS are bounded by `connect_timeout`; the AMQP handshake gets
    /// its own `connect_timeout` inside [`AmqpReceiver::establish`], which
    /// ends the session and connection itself when attaching fails.
    pub async fn connect_receiver(&self, options: &ReceiverOptions) -> Result<AmqpReceiver<TlsStream>> {
        let params = self.params();
        let stream = tls::connect(&self.host, self.port, self.tls.clone(), self.settings.connect_timeout).await?;
        AmqpReceiver::establish(stream, &params, options, &self.settings).await
    }

    /// Connect and attach a sending link to `target`
    pub async fn connect_sender(&self, target: &str) -> Result<AmqpSender<TlsStream>> {
        let params = self.params();
        let stream = tls::connect(&self.host, self.port, self.tls.clone(), self.settings.connect_timeout).await?;
        AmqpSender::establish(stream, &params, target, &self.settings).await
    }
}

#[async_trait]
impl LinkConnector for AmqpConnector {
    async fn open_receiver(&self, options: ReceiverOptions) -> Result<Box<dyn ReceiverLink>> {
        match self.connect_receiver(&options).await {
            Ok(receiver) => {
                info!(host = %self.host, address = %options.address, "Receiver bootstrap complete");
                Ok(Box::new(receiver))
            }
            Err(e) => {
                warn!(host = %self.host, address = %options.address, error = %e, "Receiver bootstrap failed");
                Err(e)
            }
        }
    }
}
