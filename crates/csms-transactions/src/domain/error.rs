//! Transaction service error types.
//!
//! Only [`AuthorizationError`] crosses the HTTP boundary: `Timeout` maps to
//! 504, everything else to 500.

use crate::domain::correlation::CorrelationId;
use std::time::Duration;

/// Correlation table errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorrelationError {
    /// A pending slot with this id already exists
    #[error("correlation id already registered: {0}")]
    DuplicateCorrelationId(CorrelationId),
}

/// Failure of one authorize call
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    /// No verdict arrived within the dispatcher timeout
    #[error("no authentication response for {correlation_id} within {}ms", .timeout.as_millis())]
    Timeout {
        correlation_id: CorrelationId,
        timeout: Duration,
    },

    /// The request could not be published
    #[error("failed to dispatch authentication request: {0}")]
    Dispatch(String),

    /// Any other failure, including slot registration
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthorizationError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<CorrelationError> for AuthorizationError {
    fn from(e: CorrelationError) -> Self {
        Self::Internal(e.to_string())
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid channel setup
    #[error("invalid channels: {0}")]
    InvalidChannels(String),
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}

/// Service-level errors (startup and serving)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Could not subscribe to the response channel
    #[error("bus subscription error: {0}")]
    Subscription(String),

    /// HTTP server failure
    #[error("server error: {0}")]
    Server(String),
}
