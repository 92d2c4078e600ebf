//! TLS client transport
//!
//! Builds one rustls client configuration (system roots, webpki roots as
//! fallback) and opens `TcpStream → TlsStream` connections under a connect
//! timeout.

use crate::{Result, TransportError};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

/// Client side TLS stream over TCP
pub type TlsStream = tokio_rustls::client::TlsStream<TcpStream>;

/// Root certificate selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsSettings {
    /// Load the platform trust store before falling back to webpki roots
    pub use_system_certs: bool,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            use_system_certs: true,
        }
    }
}

/// Build a client configuration with the ring provider and safe protocol defaults
pub fn client_config(settings: TlsSettings) -> Result<Arc<ClientConfig>> {
    let mut root_store = RootCertStore::empty();

    if settings.use_system_certs {
        let cert_result = rustls_native_certs::load_native_certs();
        for cert in cert_result.certs {
            if let Err(e) = root_store.add(cert) {
                warn!("Failed to add system certificate: {}", e);
            }
        }
        for err in &cert_result.errors {
            warn!("Certificate load error: {}", err);
        }
        debug!("Loaded {} system certificates", root_store.len());
    }

    if root_store.is_empty() {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    let config = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| TransportError::tls_with_source("unsupported protocol versions", e))?
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(Arc::new(config))
}

/// Open a TLS session to `host:port`; TCP connect and handshake share one deadline
pub async fn connect(
    host: &str,
    port: u16,
    config: Arc<ClientConfig>,
    connect_timeout: Duration,
) -> Result<TlsStream> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| TransportError::tls_with_source(format!("invalid server name '{host}'"), e))?;

    let handshake = async {
        let tcp = TcpStream::connect((host, port)).await.map_err(|e| {
            TransportError::network_with_source(format!("TCP connect to {host}:{port} failed"), e)
        })?;
        tcp.set_nodelay(true)?;

        TlsConnector::from(config)
            .connect(server_name, tcp)
            .await
            .map_err(|e| TransportError::tls_with_source(format!("TLS handshake with {host} failed"), e))
    };

    let stream = tokio::time::timeout(connect_timeout, handshake)
        .await
        .map_err(|_| TransportError::timed_out(format!("connect {host}:{port}"), connect_timeout))??;

    info!(host = %host, port, "TLS connection established");
    Ok(stream)
}
