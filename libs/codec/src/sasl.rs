//! SASL negotiation frames (`sasl-mechanisms`, `sasl-init`, `sasl-outcome`, ...)

use crate::constants::descriptor;
use crate::error::{CodecError, CodecResult};
use crate::performative::{described_list, opt, Fields};
use crate::value::Value;
use bytes::{BufMut, Bytes, BytesMut};

pub const PLAIN: &str = "PLAIN";

/// Result code carried by `sasl-outcome`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslCode {
    Ok = 0,
    Auth = 1,
    Sys = 2,
    SysPerm = 3,
    SysTemp = 4,
}

impl TryFrom<u8> for SaslCode {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ok),
            1 => Ok(Self::Auth),
            2 => Ok(Self::Sys),
            3 => Ok(Self::SysPerm),
            4 => Ok(Self::SysTemp),
            other => Err(CodecError::type_mismatch("sasl-outcome.code", "0..=4", other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaslInit {
    pub mechanism: String,
    pub initial_response: Option<Bytes>,
    pub hostname: Option<String>,
}

impl SaslInit {
    /// PLAIN mechanism with the `\0user\0password` initial response
    pub fn plain(username: &str, password: &str) -> Self {
        let mut response = BytesMut::with_capacity(username.len() + password.len() + 2);
        response.put_u8(0);
        response.put_slice(username.as_bytes());
        response.put_u8(0);
        response.put_slice(password.as_bytes());
        Self {
            mechanism: PLAIN.to_string(),
            initial_response: Some(response.freeze()),
            hostname: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaslFrame {
    Mechanisms(Vec<String>),
    Init(SaslInit),
    Challenge(Bytes),
    Response(Bytes),
    Outcome {
        code: SaslCode,
        additional_data: Option<Bytes>,
    },
}

impl SaslFrame {
    pub fn to_value(&self) -> Value {
        match self {
            Self::Mechanisms(mechanisms) => described_list(
                descriptor::SASL_MECHANISMS,
                vec![Value::Array(mechanisms.iter().map(|m| Value::symbol(m.as_str())).collect())],
            ),
            Self::Init(init) => described_list(
                descriptor::SASL_INIT,
                vec![
                    Value::symbol(init.mechanism.as_str()),
                    opt(init.initial_response.clone().map(Value::Binary)),
                    opt(init.hostname.clone().map(Value::String)),
                ],
            ),
            Self::Challenge(data) => described_list(descriptor::SASL_CHALLENGE, vec![Value::Binary(data.clone())]),
            Self::Response(data) => described_list(descriptor::SASL_RESPONSE, vec![Value::Binary(data.clone())]),
            Self::Outcome {
                code,
                additional_data,
            } => described_list(
                descriptor::SASL_OUTCOME,
                vec![
                    Value::Ubyte(*code as u8),
                    opt(additional_data.clone().map(Value::Binary)),
                ],
            ),
        }
    }

    pub fn from_value(value: Value) -> CodecResult<Self> {
        let code = value
            .descriptor_code()
            .ok_or_else(|| CodecError::type_mismatch("sasl frame", "described", value.type_name()))?;
        match code {
            descriptor::SASL_MECHANISMS => {
                let mut f = Fields::described(value, code, "sasl-mechanisms")?;
                // A multiple field may be a single symbol or an array of them
                let mechanisms = match f.opt_value(0) {
                    Some(Value::Symbol(name)) => vec![name],
                    Some(Value::Array(items)) => items
                        .into_iter()
                        .filter_map(|item| item.as_str().map(str::to_owned))
                        .collect(),
                    Some(other) => {
                        return Err(CodecError::type_mismatch(
                            "sasl-mechanisms.sasl-server-mechanisms",
                            "symbol array",
                            other.type_name(),
                        ))
                    }
                    None => {
                        return Err(CodecError::MissingField {
                            composite: "sasl-mechanisms",
                            field: "sasl-server-mechanisms",
                        })
                    }
                };
                Ok(Self::Mechanisms(mechanisms))
            }
            descriptor::SASL_INIT => {
                let mut f = Fields::described(value, code, "sasl-init")?;
                Ok(Self::Init(SaslInit {
                    mechanism: f.req_string(0, "mechanism")?,
                    initial_response: f.opt_binary(1, "initial-response")?,
                    hostname: f.opt_string(2, "hostname")?,
                }))
            }
            descriptor::SASL_CHALLENGE => {
                let mut f = Fields::described(value, code, "sasl-challenge")?;
                Ok(Self::Challenge(f.opt_binary(0, "challenge")?.unwrap_or_default()))
            }
            descriptor::SASL_RESPONSE => {
                let mut f = Fields::described(value, code, "sasl-response")?;
                Ok(Self::Response(f.opt_binary(0, "response")?.unwrap_or_default()))
            }
            descriptor::SASL_OUTCOME => {
                let mut f = Fields::described(value, code, "sasl-outcome")?;
                let code = f.opt_ubyte(0, "code")?.ok_or(CodecError::MissingField {
                    composite: "sasl-outcome",
                    field: "code",
                })?;
                Ok(Self::Outcome {
                    code: SaslCode::try_from(code)?,
                    additional_data: f.opt_binary(1, "additional-data")?,
                })
            }
            other => Err(CodecError::unknown_descriptor(format!("{other:#x}"), "sasl frame")),
        }
    }
}
