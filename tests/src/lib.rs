//! # CSMS Test Suite
//!
//! Cross-crate tests that run the production wiring end to end.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/
//! │   ├── harness.rs        # Stack on an ephemeral port + in-memory bus
//! │   └── integration/
//! │       ├── flows.rs      # Station → API → worker → API verdicts
//! │       └── degraded.rs   # Missing worker, late and stray responses
//! └── benches/
//!     └── correlation_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p csms-tests
//! cargo test -p csms-tests integration::flows
//! cargo bench -p csms-tests
//! ```

pub mod harness;
pub mod integration;

pub use harness::TestStack;
