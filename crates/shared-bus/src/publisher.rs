//! # Message Publisher
//!
//! Defines the publishing side of the bus and the in-memory backend.

use crate::message::{BusMessage, ChannelFilter};
use crate::subscriber::{InMemorySubscription, MessageSubscriber, Subscription, SubscriptionError};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

/// Errors from publishing or encoding messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The backend refused or failed to accept the message.
    #[error("publish failed: {0}")]
    Publish(String),

    /// Could not reach the backend.
    #[error("connection error: {0}")]
    Connection(String),
}

/// Trait for publishing messages to the bus.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish a message to its channel.
    ///
    /// # Returns
    ///
    /// The number of consumer groups the message was handed to, where the
    /// backend can tell. Backends with durable channels return 1 once the
    /// broker has accepted the message.
    async fn publish(&self, message: BusMessage) -> Result<usize, BusError>;

    /// Get the total number of messages published.
    fn messages_published(&self) -> u64;
}

/// Receiver shared by all members of one in-memory consumer group.
pub(crate) type SharedReceiver = Arc<Mutex<broadcast::Receiver<BusMessage>>>;

/// Bookkeeping for one consumer group.
pub(crate) struct ConsumerGroup {
    pub(crate) receiver: SharedReceiver,
    pub(crate) filter: ChannelFilter,
    pub(crate) members: usize,
}

pub(crate) type GroupRegistry = Arc<RwLock<HashMap<String, ConsumerGroup>>>;

/// In-memory implementation of the bus.
///
/// Uses `tokio::sync::broadcast` so that every consumer group receives every
/// message. Members of the same group share one receiver, so each message is
/// handled by one member. Messages published while a group has no members are
/// not retained for it.
pub struct InMemoryMessageBus {
    /// Broadcast sender for messages.
    sender: broadcast::Sender<BusMessage>,

    /// Consumer groups keyed by `group@filter`.
    groups: GroupRegistry,

    /// Total messages published.
    messages_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryMessageBus {
    /// Create a new in-memory bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            groups: Arc::new(RwLock::new(HashMap::new())),
            messages_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Join `group` for the channels matched by `filter`.
    ///
    /// Returns an [`InMemorySubscription`] handle; dropping it leaves the group.
    #[must_use]
    pub fn subscribe_group(&self, filter: ChannelFilter, group: &str) -> InMemorySubscription {
        let group_key = format!("{group}@{}", filter.key());

        let receiver = {
            let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
            let entry = groups
                .entry(group_key.clone())
                .or_insert_with(|| ConsumerGroup {
                    receiver: Arc::new(Mutex::new(self.sender.subscribe())),
                    filter: filter.clone(),
                    members: 0,
                });
            entry.members += 1;
            Arc::clone(&entry.receiver)
        };

        debug!(channels = ?filter.channels, group = group, "New subscription created");

        InMemorySubscription::new(
            receiver,
            filter,
            group.to_string(),
            Arc::clone(&self.groups),
            group_key,
        )
    }

    /// Get the number of consumer groups with at least one member.
    #[must_use]
    pub fn consumer_group_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Count the consumer groups whose filter accepts `message`.
    fn interested_groups(&self, message: &BusMessage) -> usize {
        let groups = self.groups.read().unwrap_or_else(PoisonError::into_inner);
        groups
            .values()
            .filter(|group| group.members > 0 && group.filter.matches(message))
            .count()
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagePublisher for InMemoryMessageBus {
    async fn publish(&self, message: BusMessage) -> Result<usize, BusError> {
        // The publish counter doubles as the delivery id
        let seq = self.messages_published.fetch_add(1, Ordering::Relaxed) + 1;
        let channel = message.channel.clone();
        let key = message.key.clone();
        let interested = self.interested_groups(&message);

        // Groups on other channels still receive and skip the message
        match self.sender.send(message.with_delivery_id(seq.to_string())) {
            Ok(_) if interested > 0 => {
                debug!(
                    channel = %channel,
                    key = %key,
                    receivers = interested,
                    "Message published"
                );
                Ok(interested)
            }
            _ => {
                warn!(channel = %channel, key = %key, "Message dropped (no consumers)");
                Ok(0)
            }
        }
    }

    fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MessageSubscriber for InMemoryMessageBus {
    async fn subscribe(
        &self,
        filter: ChannelFilter,
        group: &str,
    ) -> Result<Box<dyn Subscription>, SubscriptionError> {
        Ok(Box::new(self.subscribe_group(filter, group)))
    }
}
