//! Worker configuration with validation.

use serde::{Deserialize, Serialize};
use shared_types::{AUTH_REQUEST_CHANNEL, AUTH_RESPONSE_CHANNEL};

/// Shortest accepted driver token, in characters.
pub const MIN_TOKEN_LENGTH: usize = 20;

/// Longest accepted driver token, in characters.
pub const MAX_TOKEN_LENGTH: usize = 80;

/// Authentication worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthenticationConfig {
    /// Channel the worker consumes requests from
    pub request_channel: String,
    /// Channel the worker publishes verdicts to
    pub response_channel: String,
    /// Consumer group shared by all worker instances
    pub group_id: String,
    /// Inclusive lower bound on token length
    pub min_token_length: usize,
    /// Inclusive upper bound on token length
    pub max_token_length: usize,
}

impl Default for AuthenticationConfig {
    fn default() -> Self {
        Self {
            request_channel: AUTH_REQUEST_CHANNEL.to_string(),
            response_channel: AUTH_RESPONSE_CHANNEL.to_string(),
            group_id: "authentication-service".to_string(),
            min_token_length: MIN_TOKEN_LENGTH,
            max_token_length: MAX_TOKEN_LENGTH,
        }
    }
}

impl AuthenticationConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.request_channel.is_empty() || self.response_channel.is_empty() {
            return Err("channel names cannot be empty".into());
        }
        if self.request_channel == self.response_channel {
            return Err("request and response channels must differ".into());
        }
        if self.group_id.is_empty() {
            return Err("group_id cannot be empty".into());
        }
        if self.min_token_length == 0 || self.min_token_length > self.max_token_length {
            return Err(format!(
                "token length bounds {}..={} are invalid",
                self.min_token_length, self.max_token_length
            ));
        }
        Ok(())
    }
}
