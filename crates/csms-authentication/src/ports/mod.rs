//! Ports for the authentication worker.

pub mod outbound;
