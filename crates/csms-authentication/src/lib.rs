//! # CSMS Authentication Worker
//!
//! Verifies driver tokens on behalf of the transaction service.
//!
//! ## Architecture
//!
//! This crate follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): Validation chain and the static token table
//! - **Ports Layer** (`ports/`): Token-status lookup trait
//! - **Service Layer** (`service.rs`): Validation, then lookup, then verdict
//! - **Handler** (`handler.rs`): Bus consumer loop publishing verdicts
//!
//! ## Request Flow
//!
//! ```text
//! auth-request ──→ AuthRequestHandler
//!                        │
//!                        ▼
//!                 ValidationChain ── invalid ──→ INVALID
//!                        │ valid
//!                        ▼
//!               TokenStatusProvider
//!                 enabled  → ACCEPTED
//!                 disabled → REJECTED
//!                 absent   → UNKNOWN
//!                        │
//!                        ▼
//!                  auth-response (key = correlation id)
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![deny(unsafe_code)]

pub mod domain;
pub mod error;
pub mod handler;
pub mod ports;
pub mod service;

// Re-export public API
pub use domain::config::AuthenticationConfig;
pub use domain::token_table::StaticTokenTable;
pub use domain::validation::{
    AuthenticationValidator, TokenLengthValidator, TokenPresenceValidator, ValidationChain,
};
pub use error::AuthenticationError;
pub use handler::AuthRequestHandler;
pub use ports::outbound::TokenStatusProvider;
pub use service::AuthenticationService;
