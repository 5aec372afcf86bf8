//! Error types for the cfddns updater
//!
//! Every failure that can occur inside a reconciliation cycle is one of these
//! variants. The engine catches them at the nearest enclosing operation (one
//! address family, one zone, one subdomain write) and logs them; none of them
//! terminates the process on its own.

use thiserror::Error;

/// Result type alias for cfddns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the cfddns updater
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failure reaching an echo service or the provider
    #[error("Network error: {0}")]
    Network(String),

    /// Local route probe failed (no route, or the probe is unavailable)
    #[error("Route lookup error: {0}")]
    Lookup(String),

    /// Malformed or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-2xx or unparsable provider response
    #[error("Provider API error (status {status}): {body}")]
    ProviderApi {
        /// HTTP status code, or 0 when the response never arrived
        status: u16,
        /// Response body or parse failure description
        body: String,
    },

    /// An observed address did not parse, or belongs to the wrong family
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Local I/O errors (configuration file, sockets)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a route lookup error
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a provider API error
    pub fn provider_api(status: u16, body: impl Into<String>) -> Self {
        Self::ProviderApi {
            status,
            body: body.into(),
        }
    }

    /// Create an invalid address error
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::InvalidAddress(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
