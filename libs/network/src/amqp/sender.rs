//! Sending link: one unsettled transfer at a time, waiting for the outcome

use super::connection::{unexpected_performative, within, Connection, ConnectionParams};
use super::LinkSettings;
use crate::{Result, TransportError};
use bytes::Bytes;
use codec::{
    AmqpMessage, Attach, DeliveryState, Performative, ReceiverSettleMode, Role, SenderSettleMode, Source, Target,
    Transfer,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tracing::{debug, info};

const LINK_HANDLE: u32 = 0;

pub struct AmqpSender<S> {
    connection: Connection<S>,
    target: String,
    delivery_count: u32,
    /// Credit as last granted by the peer, adjusted for what we sent since
    link_credit: u32,
    closed: bool,
}

impl<S> AmqpSender<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Open a session and attach a sending link to `target`.
    ///
    /// Mirrors the receiver: bounded by `connect_timeout`, and a failed
    /// attach ends the session and closes the connection.
    pub async fn establish(
        stream: S,
        params: &ConnectionParams,
        target: &str,
        settings: &LinkSettings,
    ) -> Result<Self> {
        let budget = settings.connect_timeout;
        let deadline = Instant::now() + budget;
        let mut connection =
            within(deadline, "sender bootstrap", budget, Connection::establish(stream, params, settings)).await?;

        let attached = within(deadline, "sender attach", budget, Self::attach(&mut connection, params, target)).await;
        if let Err(e) = attached {
            return Err(connection.abandon(e).await);
        }

        info!(target = %target, "Sender link open");
        Ok(Self {
            connection,
            target: target.to_string(),
            delivery_count: 0,
            link_credit: 0,
            closed: false,
        })
    }

    async fn attach(connection: &mut Connection<S>, params: &ConnectionParams, target: &str) -> Result<()> {
        let name = format!("sender-{}", params.container_id);
        let mut attach = Attach::new(name, LINK_HANDLE, Role::Sender);
        attach.snd_settle_mode = Some(SenderSettleMode::Unsettled);
        attach.rcv_settle_mode = Some(ReceiverSettleMode::First);
        attach.source = Some(Source::new(params.container_id.as_str()));
        attach.target = Some(Target::new(target));
        attach.initial_delivery_count = Some(0);

        let remote = connection.attach(attach).await?;
        if remote.target.is_none() {
            let deadline = Instant::now() + connection.settings().io_timeout;
            return Err(match connection.next_performative(deadline, "detach").await {
                Ok((Performative::Detach(detach), _)) => TransportError::remote("detach", detach.error),
                Ok((other, _)) => unexpected_performative("detach", &other),
                Err(e) => e,
            });
        }
        Ok(())
    }

    /// Transfer `message` and wait until the peer accepts it
    pub async fn send(&mut self, message: &AmqpMessage) -> Result<()> {
        let deadline = Instant::now() + self.connection.settings().io_timeout;
        self.wait_for_credit(deadline).await?;

        let payload = message.to_bytes();
        if payload.len() + 64 > self.connection.remote_max_frame_size() as usize {
            return Err(TransportError::configuration(
                format!("message of {} bytes exceeds the peer frame size", payload.len()),
                Some("max-frame-size"),
            ));
        }

        let transfer = Transfer {
            handle: LINK_HANDLE,
            delivery_tag: Some(Bytes::copy_from_slice(&self.delivery_count.to_be_bytes())),
            message_format: Some(0),
            settled: Some(false),
            ..Transfer::default()
        };
        let delivery_id = self.connection.send_transfer(transfer, payload).await?;
        self.delivery_count = self.delivery_count.wrapping_add(1);
        self.link_credit = self.link_credit.saturating_sub(1);
        debug!(delivery_id, target = %self.target, "Transfer sent, awaiting disposition");

        loop {
            match self.connection.next_performative(deadline, "disposition").await? {
                (Performative::Disposition(disposition), _)
                    if disposition.role == Role::Receiver
                        && disposition.first <= delivery_id
                        && delivery_id <= disposition.last.unwrap_or(disposition.first) =>
                {
                    return match disposition.state {
                        Some(DeliveryState::Accepted) => Ok(()),
                        Some(DeliveryState::Rejected { error }) => Err(TransportError::remote("disposition", error)),
                        other => Err(TransportError::protocol(format!(
                            "delivery {delivery_id} not accepted: {other:?}"
                        ))),
                    };
                }
                (Performative::Detach(detach), _) => return Err(TransportError::remote("detach", detach.error)),
                (other, _) => debug!(performative = other.name(), "Ignoring frame while awaiting disposition"),
            }
        }
    }

    async fn wait_for_credit(&mut self, deadline: Instant) -> Result<()> {
        while self.link_credit == 0 {
            match self.connection.next_performative(deadline, "flow").await? {
                (Performative::Flow(flow), _) if flow.handle == Some(LINK_HANDLE) => {
                    // credit = delivery-count(rcv) + link-credit(rcv) - delivery-count(snd)
                    let granted = flow
                        .delivery_count
                        .unwrap_or(0)
                        .wrapping_add(flow.link_credit.unwrap_or(0))
                        .wrapping_sub(self.delivery_count);
                    self.link_credit = granted;
                }
                (Performative::Detach(detach), _) => return Err(TransportError::remote("detach", detach.error)),
                (other, _) => debug!(performative = other.name(), "Ignoring frame while awaiting credit"),
            }
        }
        Ok(())
    }

    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.connection.close(Some(LINK_HANDLE)).await;
        Ok(())
    }
}
