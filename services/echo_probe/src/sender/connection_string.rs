//! Device connection string: `HostName=…;DeviceId=…;SharedAccessKey=…`

use crate::error::{ProbeError, Result};
use probe_config::service::keys::DEVICE_CONNECTION_STRING;
use probe_config::ConfigError;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, PartialEq, Eq)]
pub struct DeviceConnectionString {
    pub host_name: String,
    pub device_id: String,
    /// Base64 device key
    pub shared_access_key: String,
}

impl DeviceConnectionString {
    /// Hub name, the first label of the host name
    pub fn hub_name(&self) -> &str {
        self.host_name
            .split_once('.')
            .map(|(hub, _)| hub)
            .unwrap_or(&self.host_name)
    }

    /// Resource URI the device's SAS tokens are scoped to
    pub fn resource_uri(&self) -> String {
        format!("{}/devices/{}", self.host_name, self.device_id)
    }
}

impl fmt::Debug for DeviceConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConnectionString")
            .field("host_name", &self.host_name)
            .field("device_id", &self.device_id)
            .field("shared_access_key", &"<redacted>")
            .finish()
    }
}

fn invalid(reason: impl Into<String>) -> ProbeError {
    ConfigError::invalid(DEVICE_CONNECTION_STRING, reason).into()
}

impl FromStr for DeviceConnectionString {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self> {
        let mut host_name = None;
        let mut device_id = None;
        let mut shared_access_key = None;

        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // Base64 keys may end in '=', so split on the first one only
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| invalid(format!("segment '{part}' has no '='")))?;
            let value = value.trim().to_string();
            match key.trim() {
                "HostName" => host_name = Some(value),
                "DeviceId" => device_id = Some(value),
                "SharedAccessKey" => shared_access_key = Some(value),
                _ => {}
            }
        }

        let require = |value: Option<String>, name: &str| {
            value
                .filter(|v| !v.is_empty())
                .ok_or_else(|| invalid(format!("missing {name}")))
        };

        Ok(Self {
            host_name: require(host_name, "HostName")?,
            device_id: require(device_id, "DeviceId")?,
            shared_access_key: require(shared_access_key, "SharedAccessKey")?,
        })
    }
}
