//! Probe defaults
//!
//! Default values used when optional configuration keys are absent.

/// Placeholder value that marks an unset key in shipped configuration templates
pub const PLACEHOLDER: &str = "NULL";

/// Consumer group used when `EH_CONSUMER_GROUP` is absent
pub const DEFAULT_CONSUMER_GROUP: &str = "$Default";

/// Delay before the first send, giving local bus consumers time to subscribe (milliseconds)
pub const DEFAULT_STARTUP_DELAY_MS: u64 = 2_000;

/// JSON keys
pub mod keys {
    pub const DEVICE_CONNECTION_STRING: &str = "DeviceConnectionString";
    pub const EH_HOST: &str = "EH_HOST";
    pub const EH_KEY_NAME: &str = "EH_KEY_NAME";
    pub const EH_KEY: &str = "EH_KEY";
    pub const EH_COMP_NAME: &str = "EH_COMP_NAME";
    pub const EH_PARTITION_NUM: &str = "EH_PARTITION_NUM";
    pub const DATA_PROTOCOL: &str = "DataProtocol";
    pub const EH_CONSUMER_GROUP: &str = "EH_CONSUMER_GROUP";
    pub const STARTUP_DELAY_MS: &str = "StartupDelayMs";
}
