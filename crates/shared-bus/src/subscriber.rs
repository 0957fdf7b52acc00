//! # Message Subscriber
//!
//! Defines the subscription side of the bus.

use crate::message::{BusMessage, ChannelFilter};
use crate::publisher::{GroupRegistry, SharedReceiver};
use async_trait::async_trait;
use std::sync::PoisonError;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus was closed.
    #[error("message bus closed")]
    Closed,

    /// Could not create the consumer group or reach the backend.
    #[error("subscription failed: {0}")]
    Backend(String),

    /// Acknowledging a delivery failed.
    #[error("ack failed: {0}")]
    Ack(String),

    /// The filter cannot be served by this backend.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}

/// Trait for joining a consumer group on the bus.
#[async_trait]
pub trait MessageSubscriber: Send + Sync {
    /// Join `group` for the channels matched by `filter`.
    async fn subscribe(
        &self,
        filter: ChannelFilter,
        group: &str,
    ) -> Result<Box<dyn Subscription>, SubscriptionError>;
}

/// A handle for receiving messages as a member of a consumer group.
///
/// `Sync` so that consumer loops owning a boxed subscription can borrow
/// themselves across `.await` inside spawned tasks.
#[async_trait]
pub trait Subscription: Send + Sync {
    /// Receive the next message that matches the filter.
    ///
    /// Returns `None` once the bus is closed.
    async fn recv(&mut self) -> Option<BusMessage>;

    /// Acknowledge a message returned by [`Subscription::recv`].
    async fn ack(&mut self, message: &BusMessage) -> Result<(), SubscriptionError>;

    /// Get the filter for this subscription.
    fn filter(&self) -> &ChannelFilter;

    /// Get the consumer group name.
    fn group(&self) -> &str;
}

/// In-memory subscription handle.
///
/// When dropped, the member leaves its group; the group is removed with its
/// last member.
pub struct InMemorySubscription {
    /// Broadcast receiver shared with the other group members.
    receiver: SharedReceiver,

    /// Filter for this subscription.
    filter: ChannelFilter,

    /// Consumer group name.
    group: String,

    /// Reference to group tracking (for cleanup).
    groups: GroupRegistry,

    /// Registry key for this subscription's group.
    group_key: String,
}

impl InMemorySubscription {
    pub(crate) fn new(
        receiver: SharedReceiver,
        filter: ChannelFilter,
        group: String,
        groups: GroupRegistry,
        group_key: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            group,
            groups,
            group_key,
        }
    }

    /// Try to receive the next message without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(message))` - A message was available and matched
    /// - `Ok(None)` - No message available, or another member is receiving
    /// - `Err(SubscriptionError::Closed)` - The channel was closed
    pub fn try_recv(&mut self) -> Result<Option<BusMessage>, SubscriptionError> {
        let Ok(mut receiver) = self.receiver.try_lock() else {
            return Ok(None);
        };

        loop {
            let message = match receiver.try_recv() {
                Ok(m) => m,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&message) {
                return Ok(Some(message));
            }
        }
    }
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn recv(&mut self) -> Option<BusMessage> {
        let mut receiver = self.receiver.lock().await;

        loop {
            let message = match receiver.recv().await {
                Ok(m) => m,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(
                        group = %self.group,
                        lagged = count,
                        "Consumer group lagged, some messages dropped"
                    );
                    continue;
                }
            };

            if self.filter.matches(&message) {
                return Some(message);
            }
            // Message doesn't match filter, continue waiting
        }
    }

    async fn ack(&mut self, _message: &BusMessage) -> Result<(), SubscriptionError> {
        // Broadcast delivery is fire-and-forget; nothing to commit
        Ok(())
    }

    fn filter(&self) -> &ChannelFilter {
        &self.filter
    }

    fn group(&self) -> &str {
        &self.group
    }
}

impl Drop for InMemorySubscription {
    fn drop(&mut self) {
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        let Some(group) = groups.get_mut(&self.group_key) else {
            debug!(group = %self.group_key, "Subscription dropped");
            return;
        };

        group.members = group.members.saturating_sub(1);
        if group.members == 0 {
            groups.remove(&self.group_key);
        }
        debug!(group = %self.group_key, "Subscription dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::{InMemoryMessageBus, MessagePublisher};
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_subscription_recv() {
        let bus = InMemoryMessageBus::new();
        let mut sub = bus.subscribe_group(ChannelFilter::all(), "g");

        bus.publish(BusMessage::new("auth-response", "k", serde_json::json!(1)))
            .await
            .unwrap();

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("message");

        assert_eq!(received.channel, "auth-response");
        assert_eq!(received.payload, serde_json::json!(1));
    }

    #[tokio::test]
    async fn test_subscription_filter() {
        let bus = InMemoryMessageBus::new();

        // Subscribe only to responses
        let mut sub = bus.subscribe_group(ChannelFilter::channel("auth-response"), "g");

        // Request should be filtered
        bus.publish(BusMessage::new("auth-request", "req", serde_json::Value::Null))
            .await
            .unwrap();
        bus.publish(BusMessage::new("auth-response", "resp", serde_json::Value::Null))
            .await
            .unwrap();

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("message");

        assert_eq!(received.key, "resp");
    }

    #[tokio::test]
    async fn test_subscription_drop_cleanup() {
        let bus = InMemoryMessageBus::new();

        {
            let _sub1 = bus.subscribe_group(ChannelFilter::all(), "a");
            let _sub2 = bus.subscribe_group(ChannelFilter::all(), "b");
            let _sub3 = bus.subscribe_group(ChannelFilter::all(), "b");
            assert_eq!(bus.consumer_group_count(), 2);
        }

        // After drop, count should be 0
        assert_eq!(bus.consumer_group_count(), 0);
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = InMemoryMessageBus::new();
        let mut sub = bus.subscribe_group(ChannelFilter::all(), "g");

        assert!(matches!(sub.try_recv(), Ok(None)));
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_bus_dropped() {
        let bus = InMemoryMessageBus::new();
        let mut sub = bus.subscribe_group(ChannelFilter::all(), "g");
        drop(bus);

        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn test_group_name() {
        let bus = InMemoryMessageBus::new();
        let sub = bus.subscribe_group(ChannelFilter::channel("x"), "transaction-service");
        assert_eq!(sub.group(), "transaction-service");
        assert_eq!(sub.filter().channels, vec!["x".to_string()]);
    }
}
