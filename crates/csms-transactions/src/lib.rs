// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! CSMS Transactions - synchronous driver authorization over the message bus.
//!
//! Station-facing HTTP calls need an immediate verdict, but tokens are
//! verified by a separate worker reachable only through the bus. This crate
//! bridges the two with a request/reply correlation engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                        TRANSACTION SERVICE                                  │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  POST /api/v1/transaction/authorize          GET /health                    │
//! │         │                                                                   │
//! │  ┌──────┴──────────────────────────────┐                                    │
//! │  │  Middleware: Trace → CORS → Limit   │                                    │
//! │  └──────┬──────────────────────────────┘                                    │
//! │         │                                                                   │
//! │  ┌──────┴─────────────────────┐      ┌────────────────────────────┐         │
//! │  │     Request Dispatcher     │      │     Response Listener      │         │
//! │  │ register → publish → await │      │  complete_and_remove(id)   │         │
//! │  └──────┬──────────────▲──────┘      └─────────────┬──────────────┘         │
//! │         │              │                           │                        │
//! │  ┌──────┴──────────────┴───────────────────────────┴──────────────┐         │
//! │  │              Correlation Table (DashMap + oneshot)             │         │
//! │  │        bounded by max entries and TTL, swept periodically      │         │
//! │  └────────────────────────────────────────────────────────────────┘         │
//! └─────────┼───────────────────────────────────────────▲───────────────────────┘
//!           │ auth-request                              │ auth-response
//!           ▼                                           │
//!                     csms-authentication worker ───────┘
//! ```
//!
//! # Outcomes
//!
//! - Any verdict, `INVALID` included, is a 200 with `{"authenticationStatus": ...}`
//! - No verdict within the configured timeout is a 504
//! - Any other failure (publish error, registration failure) is a 500
//!
//! # Usage
//!
//! ```ignore
//! use csms_transactions::{TransactionService, TransactionsConfig};
//!
//! let service = TransactionService::new(TransactionsConfig::default(), publisher, subscriber)?;
//! service.start(shutdown_rx).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod ipc;
pub mod middleware;
pub mod service;

// Re-exports for public API
pub use domain::config::TransactionsConfig;
pub use domain::correlation::CorrelationId;
pub use domain::error::{AuthorizationError, ConfigError, CorrelationError, GatewayError};
pub use domain::pending::{CorrelationTable, PendingStats, StatsSnapshot, TableLimits};
pub use domain::types::{AuthorizationRequest, AuthorizationResponse, DriverIdentifier};
pub use ipc::{AuthRequestSender, BusRequestSender, IpcError, RequestDispatcher, ResponseHandler, ResponseListener};
pub use service::{TransactionService, AUTHORIZE_PATH};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
