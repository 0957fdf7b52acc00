//! # Authentication Messages
//!
//! Request and response payloads for the `auth-request` / `auth-response`
//! channels, plus the verdict enum shared by both services.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// VERDICT
// =============================================================================

/// Outcome of authenticating a driver token.
///
/// Serialized as `ACCEPTED`, `REJECTED`, `UNKNOWN` or `INVALID`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticationStatus {
    /// Token is known and enabled.
    Accepted,
    /// Token is known but disabled.
    Rejected,
    /// Token is well-formed but not in the token table.
    Unknown,
    /// Token failed structural validation (missing, blank, wrong length).
    Invalid,
}

impl AuthenticationStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::Unknown => "UNKNOWN",
            Self::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for AuthenticationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognised status name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown authentication status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for AuthenticationStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACCEPTED" => Ok(Self::Accepted),
            "REJECTED" => Ok(Self::Rejected),
            "UNKNOWN" => Ok(Self::Unknown),
            "INVALID" => Ok(Self::Invalid),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

// =============================================================================
// AUTH-REQUEST CHANNEL
// =============================================================================

/// Request to authenticate a driver token.
/// Sender: csms-transactions | Receiver: csms-authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationMessage {
    /// Correlation id of the waiting authorize call.
    pub request_id: Option<String>,
    /// Driver token as presented at the station. May be absent.
    pub token: Option<String>,
}

impl AuthenticationMessage {
    /// Create a request for the given correlation id and token.
    pub fn new(request_id: impl Into<String>, token: Option<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
            token,
        }
    }
}

// =============================================================================
// AUTH-RESPONSE CHANNEL
// =============================================================================

/// Verdict for a previously published [`AuthenticationMessage`].
/// Sender: csms-authentication | Receiver: csms-transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponse {
    /// Correlation id copied from the request.
    pub request_id: String,
    /// The verdict.
    pub status: AuthenticationStatus,
}

impl AuthenticationResponse {
    pub fn new(request_id: impl Into<String>, status: AuthenticationStatus) -> Self {
        Self {
            request_id: request_id.into(),
            status,
        }
    }
}
