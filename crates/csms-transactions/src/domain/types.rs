//! Station-facing request and response bodies.
//!
//! Kept separate from the bus messages in `shared-types` so the HTTP contract
//! and the internal wire format can evolve independently.

use serde::{Deserialize, Serialize};
use shared_types::AuthenticationStatus;

/// Body of `POST /api/v1/transaction/authorize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    /// Station asking for authorization
    #[serde(default)]
    pub station_uuid: Option<String>,
    /// Driver presenting the token
    #[serde(default)]
    pub driver_identifier: Option<DriverIdentifier>,
}

/// Driver identification presented at the station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverIdentifier {
    /// The driver token
    #[serde(default)]
    pub id: Option<String>,
}

impl AuthorizationRequest {
    pub fn new(station_uuid: impl Into<String>, token: Option<&str>) -> Self {
        Self {
            station_uuid: Some(station_uuid.into()),
            driver_identifier: Some(DriverIdentifier {
                id: token.map(str::to_string),
            }),
        }
    }

    /// The driver token, if one was supplied.
    pub fn driver_token(&self) -> Option<&str> {
        self.driver_identifier.as_ref()?.id.as_deref()
    }
}

/// Body of a successful authorize response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationResponse {
    pub authentication_status: AuthenticationStatus,
}

impl AuthorizationResponse {
    pub fn new(authentication_status: AuthenticationStatus) -> Self {
        Self {
            authentication_status,
        }
    }
}
