//! Error types for the OVH DNS reconciler
//!
//! This module defines all error types used throughout the crate.
//!
//! The taxonomy maps onto how a run fails:
//! - [`Error::Config`]: a required key is absent, raised before any network call
//! - [`Error::Transient`]: a read (list/get) or a probe failed, aborts the run
//! - [`Error::Mutation`]: a create/update/delete/refresh failed, aborts the plan
//! - [`Error::PolicyViolation`]: the zone holds more than one managed A record

use thiserror::Error;

/// Result type alias for reconciler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the OVH DNS reconciler
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (missing or invalid keys)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Read-path failure against the registrar (list/get)
    #[error("Transient error: {0}")]
    Transient(String),

    /// A mutation against the registrar failed
    #[error("Mutation failed ({operation} on {record}): {message}")]
    Mutation {
        /// Operation kind (create, update, delete, refresh)
        operation: String,
        /// Record id, subdomain or zone the operation targeted
        record: String,
        /// Underlying failure
        message: String,
    },

    /// More than one managed A record exists for a subdomain
    #[error("Policy violation: subdomain '{sub_domain}' has {} A records ({})", .record_ids.len(), .record_ids.join(", "))]
    PolicyViolation {
        /// The managed subdomain
        sub_domain: String,
        /// Ids of every A record found for it
        record_ids: Vec<String>,
    },

    /// Public IP discovery errors
    #[error("IP source error: {0}")]
    IpSource(String),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors (reading configuration files, binding sockets)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a transient (read-path) error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a mutation error
    pub fn mutation(
        operation: impl Into<String>,
        record: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Mutation {
            operation: operation.into(),
            record: record.into(),
            message: message.into(),
        }
    }

    /// Create an IP source error
    pub fn ip_source(msg: impl Into<String>) -> Self {
        Self::IpSource(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// True for errors raised while validating configuration
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// True for errors that a later run may not hit again
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transient(_) | Self::Http(_) | Self::RateLimited(_) | Self::IpSource(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
