//! Probe Configuration Module
//!
//! Loads the probe's JSON configuration from a file or a string and validates
//! it into an immutable [`ProbeConfig`].

use crate::error::ConfigError;
use crate::protocol::TransportProtocol;
use crate::service::{keys, DEFAULT_CONSUMER_GROUP, DEFAULT_STARTUP_DELAY_MS, PLACEHOLDER};
use anyhow::{Context, Result};
use config_crate::{Config, File, FileFormat};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Integer keys arrive either as JSON numbers or string-encoded
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
enum Scalar {
    Number(u64),
    Text(String),
}

/// Configuration as it appears on disk, before validation
///
/// Keys are matched exactly and in lower case, since file sources may fold
/// key case.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RawProbeConfig {
    #[serde(rename = "DeviceConnectionString", alias = "deviceconnectionstring")]
    device_connection_string: Option<String>,

    #[serde(rename = "EH_HOST", alias = "eh_host")]
    eh_host: Option<String>,

    #[serde(rename = "EH_KEY_NAME", alias = "eh_key_name")]
    eh_key_name: Option<String>,

    #[serde(rename = "EH_KEY", alias = "eh_key")]
    eh_key: Option<String>,

    #[serde(rename = "EH_COMP_NAME", alias = "eh_comp_name")]
    eh_comp_name: Option<String>,

    #[serde(rename = "EH_PARTITION_NUM", alias = "eh_partition_num")]
    eh_partition_num: Option<Scalar>,

    #[serde(rename = "DataProtocol", alias = "dataprotocol")]
    data_protocol: Option<String>,

    #[serde(rename = "EH_CONSUMER_GROUP", alias = "eh_consumer_group")]
    eh_consumer_group: Option<String>,

    #[serde(rename = "StartupDelayMs", alias = "startupdelayms")]
    startup_delay_ms: Option<Scalar>,
}

/// Validated probe configuration
///
/// Cloned into an `Arc` at probe start; the probe never observes later edits
/// to the value it was built from.
#[derive(Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub device_connection_string: String,
    pub eh_host: String,
    pub eh_key_name: String,
    pub eh_key: String,
    pub eh_compatible_name: String,
    pub partition_count: u32,
    pub protocol: TransportProtocol,
    pub consumer_group: String,
    pub startup_delay: Duration,
}

impl fmt::Debug for ProbeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeConfig")
            .field("device_connection_string", &"<redacted>")
            .field("eh_host", &self.eh_host)
            .field("eh_key_name", &self.eh_key_name)
            .field("eh_key", &"<redacted>")
            .field("eh_compatible_name", &self.eh_compatible_name)
            .field("partition_count", &self.partition_count)
            .field("protocol", &self.protocol)
            .field("consumer_group", &self.consumer_group)
            .field("startup_delay", &self.startup_delay)
            .finish()
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
    if value.is_empty() {
        return Err(ConfigError::Missing { key });
    }
    if value == PLACEHOLDER {
        return Err(ConfigError::Placeholder { key });
    }
    Ok(value)
}

fn optional(value: Option<String>, key: &'static str) -> Result<Option<String>, ConfigError> {
    match value.map(|v| v.trim().to_string()) {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) if v == PLACEHOLDER => Err(ConfigError::Placeholder { key }),
        Some(v) => Ok(Some(v)),
    }
}

fn integer(value: Scalar, key: &'static str) -> Result<u64, ConfigError> {
    match value {
        Scalar::Number(n) => Ok(n),
        Scalar::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(ConfigError::Missing { key });
            }
            if text == PLACEHOLDER {
                return Err(ConfigError::Placeholder { key });
            }
            text.parse::<u64>()
                .map_err(|e| ConfigError::invalid(key, format!("'{text}' is not an unsigned integer: {e}")))
        }
    }
}

impl RawProbeConfig {
    /// Check every key and produce the immutable configuration
    pub fn validate(self) -> Result<ProbeConfig, ConfigError> {
        let device_connection_string =
            required(self.device_connection_string, keys::DEVICE_CONNECTION_STRING)?;
        let eh_host = required(self.eh_host, keys::EH_HOST)?;
        let eh_key_name = required(self.eh_key_name, keys::EH_KEY_NAME)?;
        let eh_key = required(self.eh_key, keys::EH_KEY)?;
        let eh_compatible_name = required(self.eh_comp_name, keys::EH_COMP_NAME)?;

        let partitions = self
            .eh_partition_num
            .ok_or(ConfigError::Missing { key: keys::EH_PARTITION_NUM })?;
        let partitions = integer(partitions, keys::EH_PARTITION_NUM)?;
        if partitions == 0 {
            return Err(ConfigError::invalid(
                keys::EH_PARTITION_NUM,
                "partition count must be at least 1",
            ));
        }
        let partition_count = u32::try_from(partitions).map_err(|_| {
            ConfigError::invalid(keys::EH_PARTITION_NUM, format!("{partitions} partitions is out of range"))
        })?;

        let protocol: TransportProtocol =
            required(self.data_protocol, keys::DATA_PROTOCOL)?.parse()?;

        let consumer_group = optional(self.eh_consumer_group, keys::EH_CONSUMER_GROUP)?
            .unwrap_or_else(|| DEFAULT_CONSUMER_GROUP.to_string());

        let startup_delay_ms = match self.startup_delay_ms {
            Some(value) => integer(value, keys::STARTUP_DELAY_MS)?,
            None => DEFAULT_STARTUP_DELAY_MS,
        };

        Ok(ProbeConfig {
            device_connection_string,
            eh_host,
            eh_key_name,
            eh_key,
            eh_compatible_name,
            partition_count,
            protocol,
            consumer_group,
            startup_delay: Duration::from_millis(startup_delay_ms),
        })
    }
}

impl ProbeConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Json).required(true))
            .build()
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

        let raw: RawProbeConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        let probe_config = raw
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        info!(
            path = %path.display(),
            host = %probe_config.eh_host,
            partitions = probe_config.partition_count,
            protocol = %probe_config.protocol,
            "Loaded probe configuration"
        );
        Ok(probe_config)
    }

    /// Parse and validate configuration from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: RawProbeConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        let probe_config = raw.validate()?;
        debug!(partitions = probe_config.partition_count, "Parsed probe configuration");
        Ok(probe_config)
    }

    /// Link address of one partition of the event stream
    pub fn partition_address(&self, partition: u32) -> String {
        format!(
            "amqps://{}/{}/ConsumerGroups/{}/Partitions/{}",
            self.eh_host, self.eh_compatible_name, self.consumer_group, partition
        )
    }
}
