//! Scripted links and senders for exercising the probe without a hub

use crate::error::{ProbeError, Result};
use crate::sender::{EchoRequest, EchoSender};
use async_trait::async_trait;
use bytes::Bytes;
use codec::AmqpMessage;
use network::{Acknowledgement, Delivery, LinkConnector, ReceiverLink, ReceiverOptions, TransportError};
use probe_config::TransportProtocol;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Delivery whose payload is a message with one `data` section
pub fn data_delivery(delivery_id: u32, payload: &str) -> Delivery {
    raw_delivery(delivery_id, AmqpMessage::with_data(payload.to_string()).to_bytes())
}

/// Delivery carrying arbitrary bytes
pub fn raw_delivery(delivery_id: u32, payload: impl Into<Bytes>) -> Delivery {
    Delivery {
        delivery_id,
        delivery_tag: Bytes::copy_from_slice(&delivery_id.to_be_bytes()),
        settled: false,
        payload: payload.into(),
    }
}

/// What one partition's link does, with times relative to attach
#[derive(Debug, Clone, Default)]
pub struct ScriptedPartition {
    fail_bootstrap: bool,
    batches: Vec<(Duration, Vec<Delivery>)>,
    detach_at: Option<Duration>,
}

impl ScriptedPartition {
    pub fn failing() -> Self {
        Self {
            fail_bootstrap: true,
            ..Self::default()
        }
    }

    /// Hand back `deliveries` from the first `do_work()` at or after `at`
    pub fn deliver_at(mut self, at: Duration, deliveries: Vec<Delivery>) -> Self {
        self.batches.push((at, deliveries));
        self.batches.sort_by_key(|(at, _)| *at);
        self
    }

    /// Fail `do_work()` with a remote detach from `at` on
    pub fn detach_at(mut self, at: Duration) -> Self {
        self.detach_at = Some(at);
        self
    }
}

#[derive(Debug, Default)]
struct LinkRecord {
    filter: Option<String>,
    settled: Vec<(u32, Acknowledgement)>,
    closed: usize,
}

type Records = Arc<Mutex<HashMap<String, LinkRecord>>>;

/// Connector that opens scripted links keyed by partition address
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    partitions: Mutex<HashMap<String, ScriptedPartition>>,
    records: Records,
    opened: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partition(self, address: impl Into<String>, partition: ScriptedPartition) -> Self {
        self.partitions.lock().unwrap().insert(address.into(), partition);
        self
    }

    /// Number of successfully opened links
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn filter(&self, address: &str) -> Option<String> {
        self.records.lock().unwrap().get(address).and_then(|r| r.filter.clone())
    }

    pub fn settled(&self, address: &str) -> Vec<(u32, Acknowledgement)> {
        self.records
            .lock()
            .unwrap()
            .get(address)
            .map(|r| r.settled.clone())
            .unwrap_or_default()
    }

    pub fn closed(&self, address: &str) -> usize {
        self.records.lock().unwrap().get(address).map(|r| r.closed).unwrap_or(0)
    }
}

#[async_trait]
impl LinkConnector for ScriptedConnector {
    async fn open_receiver(&self, options: ReceiverOptions) -> network::Result<Box<dyn ReceiverLink>> {
        let script = self
            .partitions
            .lock()
            .unwrap()
            .get(&options.address)
            .cloned()
            .ok_or_else(|| TransportError::connection("no such partition", Some(options.address.as_str())))?;

        self.records
            .lock()
            .unwrap()
            .entry(options.address.clone())
            .or_default()
            .filter = options.filter.clone();

        if script.fail_bootstrap {
            return Err(TransportError::authentication("PLAIN", "sasl-outcome auth"));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedLink {
            address: options.address,
            attached: Instant::now(),
            batches: script.batches,
            detach_at: script.detach_at,
            records: self.records.clone(),
        }))
    }
}

struct ScriptedLink {
    address: String,
    attached: Instant,
    batches: Vec<(Duration, Vec<Delivery>)>,
    detach_at: Option<Duration>,
    records: Records,
}

#[async_trait]
impl ReceiverLink for ScriptedLink {
    fn address(&self) -> &str {
        &self.address
    }

    async fn do_work(&mut self) -> network::Result<Vec<Delivery>> {
        let elapsed = self.attached.elapsed();
        if self.detach_at.is_some_and(|at| elapsed >= at) {
            return Err(TransportError::remote("detach", None));
        }
        let ready = self.batches.iter().take_while(|(at, _)| *at <= elapsed).count();
        Ok(self.batches.drain(..ready).flat_map(|(_, batch)| batch).collect())
    }

    async fn settle(&mut self, delivery: &Delivery, acknowledgement: Acknowledgement) -> network::Result<()> {
        self.records
            .lock()
            .unwrap()
            .entry(self.address.clone())
            .or_default()
            .settled
            .push((delivery.delivery_id, acknowledgement));
        Ok(())
    }

    async fn close(&mut self) -> network::Result<()> {
        self.records.lock().unwrap().entry(self.address.clone()).or_default().closed += 1;
        Ok(())
    }
}

/// Sender that records requests and succeeds or fails on demand
#[derive(Debug)]
pub struct RecordingSender {
    protocol: TransportProtocol,
    fail_with: Option<String>,
    sent: Mutex<Vec<(EchoRequest, Instant)>>,
}

impl RecordingSender {
    pub fn new(protocol: TransportProtocol) -> Self {
        Self {
            protocol,
            fail_with: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(protocol: TransportProtocol, reason: impl Into<String>) -> Self {
        Self {
            fail_with: Some(reason.into()),
            ..Self::new(protocol)
        }
    }

    pub fn sent(&self) -> Vec<EchoRequest> {
        self.sent.lock().unwrap().iter().map(|(r, _)| r.clone()).collect()
    }

    /// When each request was sent
    pub fn sent_at(&self) -> Vec<Instant> {
        self.sent.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl EchoSender for RecordingSender {
    fn protocol(&self) -> TransportProtocol {
        self.protocol
    }

    async fn send(&self, request: &EchoRequest) -> Result<()> {
        self.sent.lock().unwrap().push((request.clone(), Instant::now()));
        match &self.fail_with {
            Some(reason) => Err(ProbeError::send(self.protocol, reason)),
            None => Ok(()),
        }
    }
}
