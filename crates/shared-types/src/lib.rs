//! # Shared Types Crate
//!
//! Wire messages exchanged between the transaction service and the
//! authentication worker.
//!
//! ## Channels
//!
//! ```text
//! csms-transactions ──auth-request──→ csms-authentication
//!          ↑                                   │
//!          └────────auth-response──────────────┘
//! ```
//!
//! Both channels carry keyed messages. The key is always the correlation id,
//! which is also echoed as `requestId` in the payload.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod auth;

pub use auth::{AuthenticationMessage, AuthenticationResponse, AuthenticationStatus, ParseStatusError};

/// Default channel carrying authentication requests.
pub const AUTH_REQUEST_CHANNEL: &str = "auth-request";

/// Default channel carrying authentication responses.
pub const AUTH_RESPONSE_CHANNEL: &str = "auth-response";

/// Placeholder request id used when a request arrives without one.
pub const UNKNOWN_REQUEST_ID: &str = "unknown";
