//! Outbound Ports (Driven Ports)
//!
//! Dependencies the authentication service needs from the outside world.

/// Source of truth for driver-token enablement.
///
/// `Some(true)` means the token is known and enabled, `Some(false)` known but
/// disabled, `None` not known at all.
pub trait TokenStatusProvider: Send + Sync {
    fn token_status(&self, token: &str) -> Option<bool>;
}
