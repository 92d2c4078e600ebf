//! Receiving link with session/link flow control and transfer reassembly

use super::connection::{unexpected_performative, within, Connection, ConnectionParams, LinkFlow};
use super::LinkSettings;
use crate::link::{Acknowledgement, Delivery, ReceiverLink, ReceiverOptions};
use crate::{Result, TransportError};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use codec::{Attach, Disposition, Performative, ReceiverSettleMode, Role, Source, Target, Transfer};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

const LINK_HANDLE: u32 = 0;

/// A delivery whose transfer frames are still arriving
struct PartialDelivery {
    delivery_id: u32,
    delivery_tag: Bytes,
    settled: bool,
    payload: BytesMut,
}

pub struct AmqpReceiver<S> {
    connection: Connection<S>,
    address: String,
    delivery_count: u32,
    link_credit: u32,
    partial: Option<PartialDelivery>,
    closed: bool,
}

impl<S> AmqpReceiver<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Authenticate, open, begin and attach a receiving link on `stream`,
    /// then grant the initial link credit.
    ///
    /// The whole handshake is bounded by `connect_timeout`. Once the session
    /// is up, any failure ends the session and closes the connection before
    /// the error is returned.
    pub async fn establish(
        stream: S,
        params: &ConnectionParams,
        options: &ReceiverOptions,
        settings: &LinkSettings,
    ) -> Result<Self> {
        let budget = settings.connect_timeout;
        let deadline = Instant::now() + budget;
        let mut connection =
            within(deadline, "receiver bootstrap", budget, Connection::establish(stream, params, settings)).await?;

        let attached = within(deadline, "receiver attach", budget, Self::attach(&mut connection, options)).await;
        let delivery_count = match attached {
            Ok(delivery_count) => delivery_count,
            Err(e) => return Err(connection.abandon(e).await),
        };

        let mut receiver = Self {
            connection,
            address: options.address.clone(),
            delivery_count,
            link_credit: settings.link_credit,
            partial: None,
            closed: false,
        };
        if let Err(e) = receiver.grant_credit().await {
            receiver.closed = true;
            receiver.connection.close(Some(LINK_HANDLE)).await;
            return Err(e);
        }
        info!(address = %receiver.address, credit = receiver.link_credit, "Receiver link open");
        Ok(receiver)
    }

    /// Attach the link; returns the sender's initial delivery count
    async fn attach(connection: &mut Connection<S>, options: &ReceiverOptions) -> Result<u32> {
        let mut attach = Attach::new(options.link_name.as_str(), LINK_HANDLE, Role::Receiver);
        attach.rcv_settle_mode = Some(ReceiverSettleMode::First);
        attach.source = Some(match &options.filter {
            Some(expression) => Source::with_selector(options.address.as_str(), expression.as_str()),
            None => Source::new(options.address.as_str()),
        });
        attach.target = Some(Target::new(options.target.as_str()));

        let remote = connection.attach(attach).await?;
        if remote.source.is_none() {
            // The peer follows a refusing attach with a detach carrying the reason
            let deadline = Instant::now() + connection.settings().io_timeout;
            return Err(match connection.next_performative(deadline, "detach").await {
                Ok((Performative::Detach(detach), _)) => TransportError::remote("detach", detach.error),
                Ok((other, _)) => unexpected_performative("detach", &other),
                Err(e) => e,
            });
        }
        Ok(remote.initial_delivery_count.unwrap_or(0))
    }

    async fn grant_credit(&mut self) -> Result<()> {
        self.link_credit = self.connection.settings().link_credit;
        let link = LinkFlow {
            handle: LINK_HANDLE,
            delivery_count: self.delivery_count,
            link_credit: self.link_credit,
        };
        self.connection.flow(Some(link)).await
    }

    /// Fold one transfer frame into the current delivery
    fn on_transfer(&mut self, transfer: Transfer, payload: Bytes) -> Result<Option<Delivery>> {
        if transfer.aborted {
            debug!(delivery_id = ?transfer.delivery_id, "Transfer aborted");
            self.partial = None;
            return Ok(None);
        }

        let mut partial = match self.partial.take() {
            Some(partial) => partial,
            None => {
                let delivery_id = transfer
                    .delivery_id
                    .ok_or_else(|| TransportError::protocol("first transfer of a delivery without delivery-id"))?;
                self.delivery_count = self.delivery_count.wrapping_add(1);
                self.link_credit = self.link_credit.saturating_sub(1);
                PartialDelivery {
                    delivery_id,
                    delivery_tag: transfer.delivery_tag.clone().unwrap_or_default(),
                    settled: false,
                    payload: BytesMut::new(),
                }
            }
        };
        partial.settled |= transfer.settled.unwrap_or(false);
        let limit = self.connection.settings().max_message_size;
        if partial.payload.len() + payload.len() > limit {
            return Err(TransportError::protocol(format!(
                "delivery {} exceeds {limit} bytes while reassembling",
                partial.delivery_id
            )));
        }
        partial.payload.extend_from_slice(&payload);

        if transfer.more {
            trace!(
                delivery_id = partial.delivery_id,
                buffered = partial.payload.len(),
                "Partial transfer"
            );
            self.partial = Some(partial);
            return Ok(None);
        }

        Ok(Some(Delivery {
            delivery_id: partial.delivery_id,
            delivery_tag: partial.delivery_tag,
            settled: partial.settled,
            payload: partial.payload.freeze(),
        }))
    }
}

#[async_trait]
impl<S> ReceiverLink for AmqpReceiver<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn address(&self) -> &str {
        &self.address
    }

    async fn do_work(&mut self) -> Result<Vec<Delivery>> {
        if self.closed {
            return Err(TransportError::connection("receiver link is closed", None));
        }

        let mut deliveries = Vec::new();
        let mut window_low = false;
        for (performative, payload) in self.connection.poll().await? {
            match performative {
                Performative::Transfer(transfer) => {
                    window_low |= self.connection.transfer_received();
                    if let Some(delivery) = self.on_transfer(transfer, payload)? {
                        deliveries.push(delivery);
                    }
                }
                Performative::Detach(detach) => {
                    warn!(address = %self.address, "Remote detached receiver link");
                    return Err(TransportError::remote("detach", detach.error));
                }
                Performative::End(end) => return Err(TransportError::remote("end", end.error)),
                Performative::Close(close) => return Err(TransportError::remote("close", close.error)),
                other => trace!(performative = other.name(), "Ignoring frame on receiver"),
            }
        }

        let credit_low = self.link_credit <= self.connection.settings().link_credit / 2;
        if window_low || credit_low {
            trace!(credit = self.link_credit, "Replenishing window and credit");
            self.grant_credit().await?;
        }
        Ok(deliveries)
    }

    async fn settle(&mut self, delivery: &Delivery, acknowledgement: Acknowledgement) -> Result<()> {
        if delivery.settled {
            return Ok(());
        }
        let disposition = Disposition {
            role: Role::Receiver,
            first: delivery.delivery_id,
            last: None,
            settled: true,
            state: Some(acknowledgement.to_delivery_state()),
        };
        self.connection.send(Performative::Disposition(disposition)).await
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.connection.close(Some(LINK_HANDLE)).await;
        info!(address = %self.address, "Receiver link closed");
        Ok(())
    }
}
