//! # Probe Configuration
//!
//! Loading and validation of the echo probe's JSON configuration.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use probe_config::ProbeConfig;
//! use std::path::Path;
//!
//! let config = ProbeConfig::load(Path::new("probe.json")).unwrap();
//! println!("{} partitions over {}", config.partition_count, config.protocol);
//! ```

pub mod error;
pub mod probe_config;
pub mod protocol;
pub mod service;

// Re-export commonly used types
pub use error::ConfigError;
pub use probe_config::{ProbeConfig, RawProbeConfig};
pub use protocol::TransportProtocol;
