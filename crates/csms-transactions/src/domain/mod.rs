//! Domain layer: correlation table, configuration, errors and API types.

pub mod config;
pub mod correlation;
pub mod error;
pub mod pending;
pub mod types;
