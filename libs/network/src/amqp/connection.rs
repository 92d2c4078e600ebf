//! Connection plus its single session
//!
//! Each link in this crate runs on its own connection, so one session per
//! connection is all the state machine needs.

use super::LinkSettings;
use crate::io::FramedIo;
use crate::sasl::{authenticate_plain, unexpected, PlainCredentials};
use crate::{Result, TransportError};
use bytes::Bytes;
use codec::{
    Attach, Begin, Close, Detach, End, Flow, Frame, FrameBody, Open, Performative, Transfer, AMQP_HEADER,
};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tracing::{debug, info, trace};

/// Who we are and how we authenticate
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    /// Virtual host sent in `sasl-init` and `open`
    pub hostname: String,
    pub credentials: PlainCredentials,
    pub container_id: String,
}

/// Link-level flow state carried in a `flow` frame
#[derive(Debug, Clone, Copy)]
pub(crate) struct LinkFlow {
    pub handle: u32,
    pub delivery_count: u32,
    pub link_credit: u32,
}

#[derive(Debug, Clone)]
struct SessionState {
    next_outgoing_id: u32,
    next_incoming_id: u32,
    incoming_window: u32,
    remaining_incoming_window: u32,
    outgoing_window: u32,
    next_delivery_id: u32,
}

pub(crate) struct Connection<S> {
    io: FramedIo<S>,
    settings: LinkSettings,
    remote_idle_timeout: Option<Duration>,
    remote_max_frame_size: u32,
    session: SessionState,
    closed: bool,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// SASL, protocol header, `open` and `begin`
    pub async fn establish(stream: S, params: &ConnectionParams, settings: &LinkSettings) -> Result<Self> {
        let mut io = FramedIo::new(stream);
        let wait = settings.io_timeout;

        authenticate_plain(&mut io, &params.credentials, &params.hostname, wait).await?;

        io.write_protocol_header(AMQP_HEADER).await?;
        let header = io.read_protocol_header(wait).await?;
        if header != AMQP_HEADER {
            return Err(TransportError::protocol(format!(
                "unexpected AMQP protocol header {header:02x?}"
            )));
        }

        let mut open = Open::new(params.container_id.as_str());
        open.hostname = Some(params.hostname.clone());
        open.max_frame_size = Some(settings.max_frame_size);
        io.set_max_frame_size(settings.max_frame_size);
        io.send(&Frame::amqp(0, Performative::Open(open))).await?;

        let mut connection = Self {
            io,
            settings: settings.clone(),
            remote_idle_timeout: None,
            remote_max_frame_size: u32::MAX,
            session: SessionState {
                next_outgoing_id: 0,
                next_incoming_id: 0,
                incoming_window: settings.incoming_window,
                remaining_incoming_window: settings.incoming_window,
                outgoing_window: settings.incoming_window,
                next_delivery_id: 0,
            },
            closed: false,
        };

        let deadline = Instant::now() + wait;
        let remote_open = match connection.next_performative(deadline, "open").await? {
            (Performative::Open(open), _) => open,
            (other, _) => return Err(unexpected_performative("open", &other)),
        };
        connection.remote_idle_timeout = remote_open
            .idle_time_out
            .filter(|ms| *ms > 0)
            .map(|ms| Duration::from_millis(ms as u64));
        connection.remote_max_frame_size = remote_open.max_frame_size.unwrap_or(u32::MAX);
        debug!(
            remote_container = %remote_open.container_id,
            idle_timeout_ms = remote_open.idle_time_out,
            "Connection opened"
        );

        let begin = Begin::new(connection.session.incoming_window, connection.session.outgoing_window);
        connection.send(Performative::Begin(begin)).await?;
        let deadline = Instant::now() + wait;
        let remote_begin = match connection.next_performative(deadline, "begin").await? {
            (Performative::Begin(begin), _) => begin,
            (other, _) => return Err(unexpected_performative("begin", &other)),
        };
        connection.session.next_incoming_id = remote_begin.next_outgoing_id;
        debug!(incoming_window = connection.session.incoming_window, "Session begun");

        Ok(connection)
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    pub fn remote_max_frame_size(&self) -> u32 {
        self.remote_max_frame_size
    }

    /// Send `attach` and wait for the peer's `attach` on the same link.
    ///
    /// A `detach` in reply means the peer refused the link.
    pub async fn attach(&mut self, attach: Attach) -> Result<Attach> {
        let name = attach.name.clone();
        self.send(Performative::Attach(attach)).await?;

        let deadline = Instant::now() + self.settings.io_timeout;
        loop {
            match self.next_performative(deadline, "attach").await? {
                (Performative::Attach(remote), _) if remote.name == name => {
                    info!(link = %name, handle = remote.handle, "Link attached");
                    return Ok(remote);
                }
                (Performative::Detach(detach), _) => return Err(TransportError::remote("detach", detach.error)),
                (other, _) => trace!(performative = other.name(), "Ignoring frame while attaching"),
            }
        }
    }

    /// Read the next performative before `deadline`, answering heartbeats
    /// along the way. Remote `end` and `close` become errors.
    pub async fn next_performative(
        &mut self,
        deadline: Instant,
        operation: &str,
    ) -> Result<(Performative, Bytes)> {
        loop {
            self.maybe_heartbeat().await?;
            let remaining = deadline.saturating_duration_since(Instant::now());
            let step = match self.heartbeat_interval() {
                Some(interval) => remaining.min(interval),
                None => remaining,
            };
            let frame = match self.io.recv(step, operation).await {
                Ok(frame) => frame,
                Err(TransportError::Timeout { .. }) if Instant::now() < deadline => continue,
                Err(TransportError::Timeout { .. }) => {
                    return Err(TransportError::timed_out(operation, self.settings.io_timeout))
                }
                Err(e) => return Err(e),
            };
            match frame.body {
                FrameBody::Heartbeat => trace!("Heartbeat received"),
                FrameBody::Amqp { performative, payload } => {
                    check_remote_end(&performative)?;
                    return Ok((performative, payload));
                }
                other => return Err(unexpected(operation, &other)),
            }
        }
    }

    /// One bounded read; returns the performatives that arrived.
    pub async fn poll(&mut self) -> Result<Vec<(Performative, Bytes)>> {
        self.maybe_heartbeat().await?;
        let frames = self.io.poll(self.settings.io_wait).await?;
        let mut out = Vec::with_capacity(frames.len());
        for frame in frames {
            match frame.body {
                FrameBody::Heartbeat => trace!("Heartbeat received"),
                FrameBody::Amqp { performative, payload } => out.push((performative, payload)),
                other => return Err(unexpected("performative", &other)),
            }
        }
        Ok(out)
    }

    pub async fn send(&mut self, performative: Performative) -> Result<()> {
        self.io.send(&Frame::amqp(0, performative)).await
    }

    /// Send a single-frame transfer and advance the session counters
    pub async fn send_transfer(&mut self, mut transfer: Transfer, payload: Bytes) -> Result<u32> {
        let delivery_id = self.session.next_delivery_id;
        transfer.delivery_id = Some(delivery_id);
        self.io
            .send(&Frame::amqp_with_payload(0, Performative::Transfer(transfer), payload))
            .await?;
        self.session.next_delivery_id = self.session.next_delivery_id.wrapping_add(1);
        self.session.next_outgoing_id = self.session.next_outgoing_id.wrapping_add(1);
        Ok(delivery_id)
    }

    /// Account for one incoming transfer frame. Returns true once the
    /// session window has dropped to half and needs replenishing.
    pub fn transfer_received(&mut self) -> bool {
        self.session.next_incoming_id = self.session.next_incoming_id.wrapping_add(1);
        self.session.remaining_incoming_window = self.session.remaining_incoming_window.saturating_sub(1);
        self.session.remaining_incoming_window <= self.session.incoming_window / 2
    }

    /// Send a `flow` resetting the session window, optionally with link state
    pub async fn flow(&mut self, link: Option<LinkFlow>) -> Result<()> {
        self.session.remaining_incoming_window = self.session.incoming_window;
        let flow = Flow {
            next_incoming_id: Some(self.session.next_incoming_id),
            incoming_window: self.session.incoming_window,
            next_outgoing_id: self.session.next_outgoing_id,
            outgoing_window: self.session.outgoing_window,
            handle: link.map(|l| l.handle),
            delivery_count: link.map(|l| l.delivery_count),
            link_credit: link.map(|l| l.link_credit),
            ..Flow::default()
        };
        self.send(Performative::Flow(flow)).await
    }

    /// Empty frame once half the peer's idle timeout has passed without output
    pub async fn maybe_heartbeat(&mut self) -> Result<()> {
        if let Some(interval) = self.heartbeat_interval() {
            if self.io.idle_for() >= interval {
                trace!("Sending heartbeat");
                self.io.send(&Frame::heartbeat()).await?;
            }
        }
        Ok(())
    }

    fn heartbeat_interval(&self) -> Option<Duration> {
        self.remote_idle_timeout.map(|timeout| timeout / 2)
    }

    /// Tear down after a failed link setup, handing `error` back to the caller
    pub async fn abandon(&mut self, error: TransportError) -> TransportError {
        debug!(error = %error, "Link setup failed, ending session");
        self.close(None).await;
        error
    }

    /// Best-effort teardown in reverse order: detach, end, close, transport.
    pub async fn close(&mut self, handle: Option<u32>) {
        if self.closed {
            return;
        }
        self.closed = true;

        let result = tokio::time::timeout(self.settings.close_timeout, self.close_sequence(handle)).await;
        match result {
            Ok(Ok(())) => debug!("Connection closed"),
            Ok(Err(e)) => debug!("Close sequence ended early: {}", e),
            Err(_) => debug!("Close sequence timed out"),
        }
        self.io.shutdown().await;
    }

    async fn close_sequence(&mut self, handle: Option<u32>) -> Result<()> {
        if let Some(handle) = handle {
            self.send(Performative::Detach(Detach {
                handle,
                closed: true,
                error: None,
            }))
            .await?;
        }
        self.send(Performative::End(End::default())).await?;
        self.send(Performative::Close(Close::default())).await?;

        loop {
            let frame = self.io.recv(self.settings.close_timeout, "close").await?;
            if let FrameBody::Amqp {
                performative: Performative::Close(_),
                ..
            } = frame.body
            {
                return Ok(());
            }
        }
    }
}

/// Run one bootstrap phase before `deadline`
pub(crate) async fn within<T>(
    deadline: Instant,
    operation: &str,
    budget: Duration,
    work: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout_at(deadline, work)
        .await
        .map_err(|_| TransportError::timed_out(operation, budget))?
}

fn check_remote_end(performative: &Performative) -> Result<()> {
    match performative {
        Performative::End(end) => Err(TransportError::remote("end", end.error.clone())),
        Performative::Close(close) => Err(TransportError::remote("close", close.error.clone())),
        _ => Ok(()),
    }
}

pub(crate) fn unexpected_performative(expected: &str, got: &Performative) -> TransportError {
    TransportError::protocol(format!("expected {expected}, got {}", got.name()))
}
