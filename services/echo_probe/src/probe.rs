//! Probe driver
//!
//! Waits for local consumers, announces and sends the echo request, then runs
//! the coordinator. Polling only starts once the hub confirmed the send.

use crate::coordinator::EchoCoordinator;
use crate::error::Result;
use crate::notice;
use crate::outcome::{duration_ms, ProbeReport};
use crate::poller::PollerSettings;
use crate::sender::{EchoRequest, EchoSender};
use message_sink::MessageSink;
use network::LinkConnector;
use probe_config::ProbeConfig;
use std::sync::Arc;
use tracing::{error, info};

pub struct EchoProbe {
    config: Arc<ProbeConfig>,
    sink: Arc<dyn MessageSink>,
    sender: Arc<dyn EchoSender>,
    connector: Arc<dyn LinkConnector>,
    settings: PollerSettings,
}

impl EchoProbe {
    /// Snapshot `config`; later edits to it do not reach this probe
    pub fn new(
        config: &ProbeConfig,
        sink: Arc<dyn MessageSink>,
        sender: Arc<dyn EchoSender>,
        connector: Arc<dyn LinkConnector>,
    ) -> Self {
        Self {
            config: Arc::new(config.clone()),
            sink,
            sender,
            connector,
            settings: PollerSettings::default(),
        }
    }

    pub fn with_poller_settings(mut self, settings: PollerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<ProbeReport> {
        info!(delay_ms = duration_ms(self.config.startup_delay), "Waiting for local consumers");
        tokio::time::sleep(self.config.startup_delay).await;

        let announcement = notice::request_notice(self.config.protocol);
        let request = EchoRequest::from_message(&announcement);
        notice::publish(self.sink.as_ref(), announcement, "request").await;

        if let Err(e) = self.sender.send(&request).await {
            error!(protocol = %self.sender.protocol(), error = %e, "Echo request not confirmed");
            return Err(e);
        }
        info!(protocol = %self.sender.protocol(), "Echo request sent");

        let report = EchoCoordinator::new(self.config.clone(), self.connector.clone(), self.sink.clone())
            .with_settings(self.settings)
            .run()
            .await;
        Ok(report)
    }
}
