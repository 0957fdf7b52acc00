//! Authentication service - validation chain followed by token lookup.

use crate::domain::config::AuthenticationConfig;
use crate::domain::token_table::StaticTokenTable;
use crate::domain::validation::ValidationChain;
use crate::ports::outbound::TokenStatusProvider;
use shared_types::{
    AuthenticationMessage, AuthenticationResponse, AuthenticationStatus, UNKNOWN_REQUEST_ID,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Produces a verdict for each authentication request.
pub struct AuthenticationService {
    validation: ValidationChain,
    tokens: Arc<dyn TokenStatusProvider>,
}

impl AuthenticationService {
    pub fn new(validation: ValidationChain, tokens: Arc<dyn TokenStatusProvider>) -> Self {
        Self { validation, tokens }
    }

    /// Service with the configured length bounds and the built-in token table.
    pub fn from_config(config: &AuthenticationConfig) -> Self {
        Self::new(
            ValidationChain::with_length_bounds(config.min_token_length, config.max_token_length),
            Arc::new(StaticTokenTable::new()),
        )
    }

    /// Look up a token that already passed validation.
    pub fn authenticate(&self, token: &str) -> AuthenticationStatus {
        match self.tokens.token_status(token) {
            Some(true) => AuthenticationStatus::Accepted,
            Some(false) => AuthenticationStatus::Rejected,
            None => AuthenticationStatus::Unknown,
        }
    }

    /// Validate and authenticate one request.
    ///
    /// Invalid requests never reach the token lookup.
    pub fn handle_request(&self, message: &AuthenticationMessage) -> AuthenticationResponse {
        let request_id = message
            .request_id
            .clone()
            .unwrap_or_else(|| UNKNOWN_REQUEST_ID.to_string());

        if let Some(rule) = self.validation.first_failure(message) {
            warn!(request_id = %request_id, rule = rule, "Validation failed for token");
            return AuthenticationResponse::new(request_id, AuthenticationStatus::Invalid);
        }

        let status = self.authenticate(message.token.as_deref().unwrap_or_default());
        debug!(request_id = %request_id, status = %status, "Token authenticated");
        AuthenticationResponse::new(request_id, status)
    }
}

impl Default for AuthenticationService {
    fn default() -> Self {
        Self::from_config(&AuthenticationConfig::default())
    }
}
