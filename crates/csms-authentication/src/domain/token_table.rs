//! Static token table.
//!
//! Placeholder for a real account lookup: a fixed set of known driver tokens
//! and whether each is enabled.

use crate::ports::outbound::TokenStatusProvider;
use std::collections::HashMap;

/// Tokens that exist but are disabled.
const DISABLED_TOKENS: &[&str] = &[
    "DISABLED_suspended-account-driver-token-abc",
    "DISABLED_token-blocked-user-456",
    "DISABLED_expired-trial-driver-token-xyz",
];

/// Tokens that exist and are enabled.
const ENABLED_TOKENS: &[&str] = &[
    "driverABC-1234567890",
    "driver-token-xyz789-authenticated-user-session",
    "ev-charging-driver-token-qwerty123456789",
    "mobile-app-driver-id-987654321-active",
    "verified-driver-session-token-abcdef123456",
    "fleet-manager-driver-id-456789-premium-account-enabled",
    "corporate-fleet-driver-token-long-format-id-12345678",
    "public-charging-driver-session-token-uuid-format-enabled",
];

/// In-memory token → enabled map.
#[derive(Debug, Clone)]
pub struct StaticTokenTable {
    tokens: HashMap<String, bool>,
}

impl StaticTokenTable {
    /// Table with the built-in driver tokens.
    pub fn new() -> Self {
        let tokens = ENABLED_TOKENS
            .iter()
            .map(|t| (t.to_string(), true))
            .chain(DISABLED_TOKENS.iter().map(|t| (t.to_string(), false)))
            .collect();
        Self { tokens }
    }

    /// Table with caller-supplied entries.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        Self {
            tokens: entries.into_iter().map(|(t, e)| (t.into(), e)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Default for StaticTokenTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStatusProvider for StaticTokenTable {
    fn token_status(&self, token: &str) -> Option<bool> {
        self.tokens.get(token).copied()
    }
}
