//! HTTP middleware for the transaction service.
//!
//! Layer order: Request → Tracing → CORS → BodyLimit → Handler

pub mod cors;
pub mod tracing;

pub use cors::create_cors_layer;
pub use tracing::TracingLayer;
