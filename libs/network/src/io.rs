//! Framed AMQP I/O over any async byte stream
//!
//! Owns the read buffer and frame decoder for one connection. Reads go
//! through `read_buf`, which is cancel-safe, so a timed-out read never loses
//! bytes.

use crate::{Result, TransportError};
use bytes::BytesMut;
use codec::{take_protocol_header, Frame, FrameDecoder};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::trace;

const READ_CHUNK: usize = 16 * 1024;

pub struct FramedIo<S> {
    stream: S,
    read_buf: BytesMut,
    decoder: FrameDecoder,
    last_sent: Instant,
}

impl<S> FramedIo<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            decoder: FrameDecoder::default(),
            last_sent: Instant::now(),
        }
    }

    /// Apply the max-frame-size we advertised in `open`
    pub fn set_max_frame_size(&mut self, max_frame_size: u32) {
        self.decoder.set_max_frame_size(max_frame_size as usize);
    }

    /// Time since anything was last written
    pub fn idle_for(&self) -> Duration {
        self.last_sent.elapsed()
    }

    pub async fn write_protocol_header(&mut self, header: [u8; 8]) -> Result<()> {
        self.stream.write_all(&header).await?;
        self.stream.flush().await?;
        self.last_sent = Instant::now();
        Ok(())
    }

    pub async fn read_protocol_header(&mut self, wait: Duration) -> Result<[u8; 8]> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(header) = take_protocol_header(&mut self.read_buf) {
                return Ok(header);
            }
            self.fill_until(deadline, "protocol header", wait).await?;
        }
    }

    pub async fn send(&mut self, frame: &Frame) -> Result<()> {
        let bytes = frame.to_bytes();
        trace!(channel = frame.channel, size = bytes.len(), "Sending frame");
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.last_sent = Instant::now();
        Ok(())
    }

    /// Wait up to `wait` for the next complete frame
    pub async fn recv(&mut self, wait: Duration, operation: &str) -> Result<Frame> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(frame) = self.decoder.decode(&mut self.read_buf)? {
                return Ok(frame);
            }
            self.fill_until(deadline, operation, wait).await?;
        }
    }

    /// Decode whatever is buffered, reading at most once (bounded by `wait`)
    /// when nothing is. An elapsed wait yields an empty batch.
    pub async fn poll(&mut self, wait: Duration) -> Result<Vec<Frame>> {
        let mut frames = self.decode_ready()?;
        if !frames.is_empty() {
            return Ok(frames);
        }
        match tokio::time::timeout(wait, self.fill()).await {
            Ok(result) => result?,
            Err(_) => return Ok(frames),
        }
        frames.extend(self.decode_ready()?);
        Ok(frames)
    }

    /// Best-effort TLS close_notify / socket shutdown
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            trace!("Stream shutdown failed: {}", e);
        }
    }

    fn decode_ready(&mut self) -> Result<Vec<Frame>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.decoder.decode(&mut self.read_buf)? {
            frames.push(frame);
        }
        Ok(frames)
    }

    async fn fill(&mut self) -> Result<()> {
        self.read_buf.reserve(READ_CHUNK);
        let read = self.stream.read_buf(&mut self.read_buf).await?;
        if read == 0 {
            return Err(TransportError::connection("peer closed the connection", None));
        }
        trace!(bytes = read, buffered = self.read_buf.len(), "Read from stream");
        Ok(())
    }

    async fn fill_until(&mut self, deadline: Instant, operation: &str, wait: Duration) -> Result<()> {
        tokio::time::timeout_at(deadline, self.fill())
            .await
            .map_err(|_| TransportError::timed_out(operation, wait))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::{Begin, Performative, AMQP_HEADER};

    #[tokio::test]
    async fn test_recv_assembles_split_frame() {
        let (client, mut peer) = tokio::io::duplex(1024);
        let mut io = FramedIo::new(client);

        let bytes = Frame::amqp(0, Performative::Begin(Begin::new(1000, 1000))).to_bytes();
        let (head, tail) = bytes.split_at(6);
        peer.write_all(head).await.unwrap();
        let reader = tokio::spawn(async move {
            let frame = io.recv(Duration::from_secs(1), "begin").await.unwrap();
            (io, frame)
        });
        tokio::task::yield_now().await;
        peer.write_all(tail).await.unwrap();

        let (_io, frame) = reader.await.unwrap();
        assert!(matches!(
            frame.body,
            codec::FrameBody::Amqp {
                performative: Performative::Begin(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_poll_returns_empty_batch_on_quiet_stream() {
        let (client, _peer) = tokio::io::duplex(64);
        let mut io = FramedIo::new(client);
        let frames = io.poll(Duration::from_millis(5)).await.unwrap();
        assert!(frames.is_empty());
    }

    #[tokio::test]
    async fn test_closed_peer_is_connection_error() {
        let (client, peer) = tokio::io::duplex(64);
        drop(peer);
        let mut io = FramedIo::new(client);
        let err = io.recv(Duration::from_secs(1), "open").await.unwrap_err();
        assert!(matches!(err, TransportError::Connection { .. }));
    }

    #[tokio::test]
    async fn test_protocol_header_exchange() {
        let (client, mut peer) = tokio::io::duplex(64);
        let mut io = FramedIo::new(client);
        io.write_protocol_header(AMQP_HEADER).await.unwrap();

        let mut echoed = [0u8; 8];
        peer.read_exact(&mut echoed).await.unwrap();
        peer.write_all(&echoed).await.unwrap();
        assert_eq!(io.read_protocol_header(Duration::from_secs(1)).await.unwrap(), AMQP_HEADER);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_times_out() {
        let (client, _peer) = tokio::io::duplex(64);
        let mut io = FramedIo::new(client);
        let err = io.recv(Duration::from_secs(2), "sasl-outcome").await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout { timeout_ms: 2000, .. }));
    }
}
