//! # Shared Bus - Keyed Message Bus for Request/Response Exchanges
//!
//! Transport between the transaction service and the authentication worker.
//! Every message lives on a named channel and carries a key (the correlation
//! id) plus a JSON payload.
//!
//! ## Delivery Model
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Publisher   │                    │   Consumer   │
//! │              │    publish()       │   (group)    │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │  recv() / ack()
//!                  │   Channel    │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe(filter, group)
//! ```
//!
//! - Each consumer group sees every message on its channels.
//! - Within a group, each message goes to one member.
//! - Delivery is at-least-once: consumers must tolerate duplicates.
//!
//! ## Backends
//!
//! - [`InMemoryMessageBus`]: `tokio::sync::broadcast`, single process.
//! - [`RedisStreamBus`]: Redis Streams with consumer groups and `XACK`.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod message;
pub mod publisher;
pub mod redis_streams;
pub mod subscriber;

// Re-export main types
pub use message::{BusMessage, ChannelFilter};
pub use publisher::{BusError, InMemoryMessageBus, MessagePublisher};
pub use redis_streams::{RedisStreamBus, RedisStreamOptions, RedisStreamSubscription};
pub use subscriber::{InMemorySubscription, MessageSubscriber, Subscription, SubscriptionError};

/// Maximum messages to buffer per in-memory consumer group before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
