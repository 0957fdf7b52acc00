//! IPC layer: request dispatch and response correlation over the message bus.
//!
//! - [`RequestDispatcher`] registers a slot, publishes the request and waits
//! - [`ResponseListener`] consumes verdicts and hands them to [`ResponseHandler`]
//! - [`BusRequestSender`] is the production [`AuthRequestSender`]

pub mod bus_adapter;
pub mod dispatcher;
pub mod listener;

pub use bus_adapter::BusRequestSender;
pub use dispatcher::{AuthRequestSender, IpcError, RequestDispatcher};
pub use listener::{ResponseHandler, ResponseListener};
