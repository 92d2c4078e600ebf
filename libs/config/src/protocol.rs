//! Upstream transport protocol selector

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Protocol the device uses to send the echo request upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TransportProtocol {
    Mqtt,
    Amqp,
    Http,
}

impl TransportProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportProtocol::Mqtt => "MQTT",
            TransportProtocol::Amqp => "AMQP",
            TransportProtocol::Http => "HTTP",
        }
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MQTT" => Ok(TransportProtocol::Mqtt),
            "AMQP" => Ok(TransportProtocol::Amqp),
            "HTTP" => Ok(TransportProtocol::Http),
            _ => Err(ConfigError::invalid(
                crate::service::keys::DATA_PROTOCOL,
                format!("unsupported protocol '{s}', expected MQTT, AMQP or HTTP"),
            )),
        }
    }
}

impl TryFrom<String> for TransportProtocol {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TransportProtocol> for String {
    fn from(value: TransportProtocol) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("mqtt".parse::<TransportProtocol>().unwrap(), TransportProtocol::Mqtt);
        assert_eq!("Amqp".parse::<TransportProtocol>().unwrap(), TransportProtocol::Amqp);
        assert_eq!("HTTP".parse::<TransportProtocol>().unwrap(), TransportProtocol::Http);
    }

    #[test]
    fn test_unknown_protocol_rejected() {
        let err = "websocket".parse::<TransportProtocol>().unwrap_err();
        assert!(err.to_string().contains("DataProtocol"));
    }

    #[test]
    fn test_display_is_upper_case() {
        assert_eq!(TransportProtocol::Amqp.to_string(), "AMQP");
    }
}
