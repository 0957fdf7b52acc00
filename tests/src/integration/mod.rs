//! Cross-crate choreography over HTTP and the bus.

mod degraded;
mod flows;
