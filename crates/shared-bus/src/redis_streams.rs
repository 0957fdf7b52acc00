//! # Redis Streams Backend
//!
//! Durable bus backend on Redis Streams.
//!
//! | Bus operation | Redis command |
//! |---|---|
//! | publish | `XADD <channel> [MAXLEN ~ n] * key <key> value <json>` |
//! | subscribe | `XGROUP CREATE <channel> <group> $ MKSTREAM` |
//! | recv | `XREADGROUP GROUP <group> <consumer> COUNT n BLOCK ms STREAMS ... >` |
//! | ack | `XACK <channel> <group> <entry-id>` |
//!
//! Entries that are read but never acknowledged stay in the group's pending
//! list, which gives at-least-once delivery.

use crate::message::{BusMessage, ChannelFilter};
use crate::publisher::{BusError, MessagePublisher};
use crate::subscriber::{MessageSubscriber, Subscription, SubscriptionError};
use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::streams::{StreamId, StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client, RedisError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Stream entry field holding the message key.
const KEY_FIELD: &str = "key";
/// Stream entry field holding the JSON payload.
const VALUE_FIELD: &str = "value";

/// Tuning for the Redis Streams backend.
#[derive(Debug, Clone)]
pub struct RedisStreamOptions {
    /// How long one `XREADGROUP` call blocks waiting for entries.
    pub block: Duration,
    /// Maximum entries fetched per `XREADGROUP` call.
    pub batch_size: usize,
    /// Approximate stream length cap applied on publish.
    pub max_len: Option<usize>,
    /// Consumer name within the group. Must be unique per process.
    pub consumer_name: String,
    /// Delay before retrying after a failed read.
    pub retry_delay: Duration,
}

impl Default for RedisStreamOptions {
    fn default() -> Self {
        Self {
            block: Duration::from_secs(1),
            batch_size: 32,
            max_len: Some(100_000),
            consumer_name: format!("consumer-{}", std::process::id()),
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Redis Streams bus.
///
/// Publishing goes through a shared `ConnectionManager`. Every subscription
/// opens its own connection, since a blocking `XREADGROUP` would stall other
/// commands multiplexed on the same socket.
pub struct RedisStreamBus {
    /// Redis client, used to open per-subscription connections.
    client: Client,
    /// Shared, auto-reconnecting connection for publishing.
    connection: ConnectionManager,
    /// Backend tuning.
    options: RedisStreamOptions,
    /// Total messages published.
    messages_published: AtomicU64,
}

impl RedisStreamBus {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Connection` if the URL is invalid or the server is
    /// unreachable.
    pub async fn connect(redis_url: &str, options: RedisStreamOptions) -> Result<Self, BusError> {
        // Do not log redis_url, it may contain credentials
        let client = Client::open(redis_url).map_err(|e| {
            error!(error = %e, "Failed to open Redis client");
            BusError::Connection(format!("failed to open Redis client: {e}"))
        })?;

        let connection = ConnectionManager::new(client.clone()).await.map_err(|e| {
            error!(error = %e, "Failed to connect to Redis");
            BusError::Connection(format!("failed to connect to Redis: {e}"))
        })?;

        info!(consumer = %options.consumer_name, "Connected to Redis Streams bus");

        Ok(Self {
            client,
            connection,
            options,
            messages_published: AtomicU64::new(0),
        })
    }

    /// Get the backend options.
    pub fn options(&self) -> &RedisStreamOptions {
        &self.options
    }
}

#[async_trait]
impl MessagePublisher for RedisStreamBus {
    async fn publish(&self, message: BusMessage) -> Result<usize, BusError> {
        let value = serde_json::to_string(&message.payload)
            .map_err(|e| BusError::Serialization(e.to_string()))?;
        let fields = [(KEY_FIELD, message.key.as_str()), (VALUE_FIELD, value.as_str())];

        let mut conn = self.connection.clone();
        let result: Result<String, RedisError> = match self.options.max_len {
            Some(max_len) => {
                conn.xadd_maxlen(&message.channel, StreamMaxlen::Approx(max_len), "*", &fields)
                    .await
            }
            None => conn.xadd(&message.channel, "*", &fields).await,
        };

        let entry_id = result.map_err(|e| {
            warn!(channel = %message.channel, key = %message.key, error = %e, "XADD failed");
            BusError::Publish(e.to_string())
        })?;

        self.messages_published.fetch_add(1, Ordering::Relaxed);
        debug!(
            channel = %message.channel,
            key = %message.key,
            entry_id = %entry_id,
            "Message published"
        );
        Ok(1)
    }

    fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MessageSubscriber for RedisStreamBus {
    async fn subscribe(
        &self,
        filter: ChannelFilter,
        group: &str,
    ) -> Result<Box<dyn Subscription>, SubscriptionError> {
        if filter.channels.is_empty() {
            return Err(SubscriptionError::InvalidFilter(
                "Redis Streams subscriptions need explicit channels".into(),
            ));
        }

        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| SubscriptionError::Backend(e.to_string()))?;
        ensure_groups(&mut connection, &filter.channels, group).await?;

        info!(
            channels = ?filter.channels,
            group = group,
            consumer = %self.options.consumer_name,
            "Joined Redis Streams consumer group"
        );

        Ok(Box::new(RedisStreamSubscription {
            client: self.client.clone(),
            connection,
            filter,
            group: group.to_string(),
            options: self.options.clone(),
            buffered: VecDeque::new(),
        }))
    }
}

/// Create the consumer group on every channel, tolerating existing groups.
async fn ensure_groups(
    connection: &mut MultiplexedConnection,
    channels: &[String],
    group: &str,
) -> Result<(), SubscriptionError> {
    for channel in channels {
        let created: Result<(), RedisError> =
            connection.xgroup_create_mkstream(channel, group, "$").await;
        match created {
            Ok(()) => debug!(channel = %channel, group = group, "Created consumer group"),
            Err(e) if e.code() == Some("BUSYGROUP") => {}
            Err(e) => return Err(SubscriptionError::Backend(e.to_string())),
        }
    }
    Ok(())
}

/// One member of a Redis Streams consumer group.
pub struct RedisStreamSubscription {
    /// Client used to reconnect after failures.
    client: Client,
    /// Dedicated connection for blocking reads.
    connection: MultiplexedConnection,
    filter: ChannelFilter,
    group: String,
    options: RedisStreamOptions,
    /// Entries fetched by the last read and not yet handed out.
    buffered: VecDeque<BusMessage>,
}

impl RedisStreamSubscription {
    /// Read one batch of new entries into the buffer.
    async fn fill(&mut self) -> Result<(), RedisError> {
        let read_options = StreamReadOptions::default()
            .group(&self.group, &self.options.consumer_name)
            .count(self.options.batch_size)
            .block(self.options.block.as_millis() as usize);
        let ids = vec![">"; self.filter.channels.len()];

        let reply: Option<StreamReadReply> = self
            .connection
            .xread_options(&self.filter.channels, &ids, &read_options)
            .await?;

        for stream in reply.map(|r| r.keys).unwrap_or_default() {
            for entry in stream.ids {
                match decode_entry(&stream.key, &entry) {
                    Some(message) => self.buffered.push_back(message),
                    None => {
                        warn!(
                            channel = %stream.key,
                            entry_id = %entry.id,
                            "Discarding malformed stream entry"
                        );
                        // Malformed entries would otherwise sit in the pending list forever
                        let _: Result<i64, RedisError> = self
                            .connection
                            .xack(&stream.key, &self.group, &[&entry.id])
                            .await;
                    }
                }
            }
        }
        Ok(())
    }

    /// Reopen the dedicated connection and re-create missing groups.
    async fn reconnect(&mut self) {
        match self.client.get_multiplexed_async_connection().await {
            Ok(mut connection) => {
                if let Err(e) = ensure_groups(&mut connection, &self.filter.channels, &self.group).await {
                    warn!(group = %self.group, error = %e, "Failed to restore consumer groups");
                }
                self.connection = connection;
                info!(group = %self.group, "Reconnected to Redis Streams");
            }
            Err(e) => {
                warn!(group = %self.group, error = %e, "Redis reconnect failed");
            }
        }
    }
}

#[async_trait]
impl Subscription for RedisStreamSubscription {
    async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            if let Some(message) = self.buffered.pop_front() {
                return Some(message);
            }

            if let Err(e) = self.fill().await {
                warn!(
                    group = %self.group,
                    error = %e,
                    retry_in_ms = self.options.retry_delay.as_millis() as u64,
                    "XREADGROUP failed"
                );
                tokio::time::sleep(self.options.retry_delay).await;
                self.reconnect().await;
            }
        }
    }

    async fn ack(&mut self, message: &BusMessage) -> Result<(), SubscriptionError> {
        let Some(entry_id) = message.delivery_id.as_deref() else {
            return Ok(());
        };

        let acked: i64 = self
            .connection
            .xack(&message.channel, &self.group, &[entry_id])
            .await
            .map_err(|e| SubscriptionError::Ack(e.to_string()))?;

        if acked == 0 {
            debug!(channel = %message.channel, entry_id = entry_id, "Entry was already acknowledged");
        }
        Ok(())
    }

    fn filter(&self) -> &ChannelFilter {
        &self.filter
    }

    fn group(&self) -> &str {
        &self.group
    }
}

/// Turn a stream entry into a bus message.
fn decode_entry(channel: &str, entry: &StreamId) -> Option<BusMessage> {
    let key: String = entry.get(KEY_FIELD)?;
    let raw: String = entry.get(VALUE_FIELD)?;
    let payload = serde_json::from_str(&raw).ok()?;
    Some(BusMessage::new(channel, key, payload).with_delivery_id(entry.id.clone()))
}
