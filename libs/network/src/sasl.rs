//! SASL PLAIN negotiation over a framed stream

use crate::io::FramedIo;
use crate::{Result, TransportError};
use codec::{sasl::PLAIN, Frame, FrameBody, SaslCode, SaslFrame, SaslInit, SASL_HEADER};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// Username/password pair for the PLAIN mechanism
#[derive(Clone)]
pub struct PlainCredentials {
    pub username: String,
    pub password: String,
}

impl PlainCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for PlainCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Run the SASL layer: header exchange, mechanism check, `sasl-init`, outcome.
///
/// Any outcome other than `ok` is an authentication rejection.
pub async fn authenticate_plain<S>(
    io: &mut FramedIo<S>,
    credentials: &PlainCredentials,
    hostname: &str,
    wait: Duration,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    io.write_protocol_header(SASL_HEADER).await?;
    let header = io.read_protocol_header(wait).await?;
    if header != SASL_HEADER {
        return Err(TransportError::protocol(format!(
            "unexpected SASL protocol header {header:02x?}"
        )));
    }

    let mechanisms = match io.recv(wait, "sasl-mechanisms").await?.body {
        FrameBody::Sasl(SaslFrame::Mechanisms(mechanisms)) => mechanisms,
        other => return Err(unexpected("sasl-mechanisms", &other)),
    };
    if !mechanisms.iter().any(|m| m == PLAIN) {
        return Err(TransportError::authentication(
            PLAIN,
            format!("peer offers {mechanisms:?}"),
        ));
    }

    let mut init = SaslInit::plain(&credentials.username, &credentials.password);
    init.hostname = Some(hostname.to_string());
    io.send(&Frame::sasl(SaslFrame::Init(init))).await?;

    match io.recv(wait, "sasl-outcome").await?.body {
        FrameBody::Sasl(SaslFrame::Outcome {
            code: SaslCode::Ok, ..
        }) => {
            debug!(username = %credentials.username, "SASL PLAIN accepted");
            Ok(())
        }
        FrameBody::Sasl(SaslFrame::Outcome { code, .. }) => Err(TransportError::authentication(
            PLAIN,
            format!("sasl-outcome {code:?}"),
        )),
        other => Err(unexpected("sasl-outcome", &other)),
    }
}

pub(crate) fn unexpected(expected: &str, got: &FrameBody) -> TransportError {
    let got = match got {
        FrameBody::Heartbeat => "heartbeat".to_string(),
        FrameBody::Amqp { performative, .. } => performative.name().to_string(),
        FrameBody::Sasl(frame) => format!("{frame:?}"),
    };
    TransportError::protocol(format!("expected {expected}, got {got}"))
}
