//! Configuration validation errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required key absent or empty
    #[error("Missing configuration value for {key}")]
    Missing { key: &'static str },

    /// Key still carries the template placeholder
    #[error("Configuration value for {key} is the placeholder \"NULL\"")]
    Placeholder { key: &'static str },

    /// Key present but unusable
    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// Source could not be parsed at all
    #[error("Malformed configuration: {0}")]
    Malformed(String),
}

impl ConfigError {
    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }

    /// Key the error refers to, if any
    pub fn key(&self) -> Option<&'static str> {
        match self {
            Self::Missing { key } | Self::Placeholder { key } | Self::Invalid { key, .. } => Some(key),
            Self::Malformed(_) => None,
        }
    }
}
