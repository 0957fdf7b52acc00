//! # Bus Messages
//!
//! The envelope moved by every backend, and the channel filter used when
//! subscribing.

use crate::publisher::BusError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A keyed message on a named channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    /// Channel (topic / stream name) the message belongs to.
    pub channel: String,
    /// Partitioning and correlation key.
    pub key: String,
    /// Message body.
    pub payload: serde_json::Value,
    /// Backend-assigned delivery handle, required for `ack`.
    ///
    /// `None` on messages that have not been delivered yet.
    #[serde(skip)]
    pub delivery_id: Option<String>,
}

impl BusMessage {
    /// Create a message from an already-encoded payload.
    pub fn new(
        channel: impl Into<String>,
        key: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            channel: channel.into(),
            key: key.into(),
            payload,
            delivery_id: None,
        }
    }

    /// Serialize `value` as the payload of a new message.
    pub fn encode<T: Serialize>(
        channel: impl Into<String>,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self, BusError> {
        let payload =
            serde_json::to_value(value).map_err(|e| BusError::Serialization(e.to_string()))?;
        Ok(Self::new(channel, key, payload))
    }

    /// Deserialize the payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, BusError> {
        T::deserialize(&self.payload).map_err(|e| BusError::Serialization(e.to_string()))
    }

    /// Attach the backend delivery handle.
    #[must_use]
    pub fn with_delivery_id(mut self, delivery_id: impl Into<String>) -> Self {
        self.delivery_id = Some(delivery_id.into());
        self
    }
}

/// Filter for subscribing to specific channels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ChannelFilter {
    /// Channels to include. Empty means all channels.
    pub channels: Vec<String>,
}

impl ChannelFilter {
    /// Create a filter that accepts all channels.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for a single channel.
    #[must_use]
    pub fn channel(name: impl Into<String>) -> Self {
        Self {
            channels: vec![name.into()],
        }
    }

    /// Create a filter for several channels.
    #[must_use]
    pub fn channels<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if a message matches this filter.
    #[must_use]
    pub fn matches(&self, message: &BusMessage) -> bool {
        self.channels.is_empty() || self.channels.iter().any(|c| *c == message.channel)
    }

    /// Stable key used to group subscriptions by filter.
    pub(crate) fn key(&self) -> String {
        if self.channels.is_empty() {
            "*".to_string()
        } else {
            self.channels.join(",")
        }
    }
}
