//! Error types for the DDNS client
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS client
#[derive(Error, Debug)]
pub enum Error {
    /// Address enumeration failed
    #[error("Address source error: {0}")]
    AddressSource(String),

    /// The change notification feed failed or ended
    #[error("Change feed error: {0}")]
    ChangeFeed(String),

    /// The authoritative record could not be read
    #[error("Record source error: {0}")]
    RecordSource(String),

    /// The update sink rejected or failed an update
    #[error("Update sink error: {0}")]
    UpdateSink(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// An external call exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// I/O errors (sockets, child processes, files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML configuration parse errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an address source error
    pub fn address_source(msg: impl Into<String>) -> Self {
        Self::AddressSource(msg.into())
    }

    /// Create a change feed error
    pub fn change_feed(msg: impl Into<String>) -> Self {
        Self::ChangeFeed(msg.into())
    }

    /// Create a record source error
    pub fn record_source(msg: impl Into<String>) -> Self {
        Self::RecordSource(msg.into())
    }

    /// Create an update sink error
    pub fn update_sink(msg: impl Into<String>) -> Self {
        Self::UpdateSink(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error must stop the daemon
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ChangeFeed(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
