//! Error types for the authentication worker

use shared_bus::{BusError, SubscriptionError};
use thiserror::Error;

/// Errors that can occur while serving authentication requests
#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
