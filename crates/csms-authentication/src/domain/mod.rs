//! Domain layer: validation rules, token table and configuration.

pub mod config;
pub mod token_table;
pub mod validation;
