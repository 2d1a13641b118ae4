//! Error types for cf-ddns.

use thiserror::Error;

/// Result type alias for cf-ddns.
pub type Result<T> = std::result::Result<T, DdnsError>;

/// DDNS error types.
#[derive(Error, Debug)]
pub enum DdnsError {
    /// Configuration error, raised before any network activity.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// Provider-specific error.
    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    /// More than one record matched a hostname.
    #[error("Refusing to update {hostname}: {count} records match")]
    AmbiguousRecords { hostname: String, count: usize },

    /// Zone lookup returned nothing.
    #[error("Zone not found: {0}")]
    ZoneNotFound(String),

    /// External IP could not be determined.
    #[error("IP resolution failed: {0}")]
    Resolution(String),

    /// Stored state exists but could not be read.
    #[error("Failed to read stored IP: {0}")]
    StoreRead(String),

    /// Stored state could not be written.
    #[error("Failed to write stored IP: {0}")]
    StoreWrite(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for DdnsError {
    fn from(e: reqwest::Error) -> Self {
        DdnsError::Network(e.to_string())
    }
}

impl From<toml::de::Error> for DdnsError {
    fn from(e: toml::de::Error) -> Self {
        DdnsError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for DdnsError {
    fn from(e: serde_json::Error) -> Self {
        DdnsError::Serialization(e.to_string())
    }
}
