//! Message bus adapter for real IPC communication.
//!
//! Implements [`AuthRequestSender`] on top of any shared-bus publisher, so the
//! same dispatcher runs against the in-memory bus and Redis Streams.

use crate::domain::correlation::CorrelationId;
use crate::ipc::dispatcher::{AuthRequestSender, IpcError};
use async_trait::async_trait;
use shared_bus::{BusError, BusMessage, MessagePublisher};
use shared_types::AuthenticationMessage;
use std::sync::Arc;
use tracing::{debug, warn};

/// Publishes authentication requests to the request channel.
pub struct BusRequestSender {
    /// Shared bus publisher
    publisher: Arc<dyn MessagePublisher>,
    /// Channel the authentication worker consumes
    channel: String,
}

impl BusRequestSender {
    pub fn new(publisher: Arc<dyn MessagePublisher>, channel: impl Into<String>) -> Self {
        Self {
            publisher,
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl AuthRequestSender for BusRequestSender {
    async fn send(
        &self,
        correlation_id: CorrelationId,
        message: AuthenticationMessage,
    ) -> Result<(), IpcError> {
        let message = BusMessage::encode(&self.channel, correlation_id.to_string(), &message)
            .map_err(|e| IpcError::Serialization(e.to_string()))?;

        let receivers = self.publisher.publish(message).await.map_err(|e| match e {
            BusError::Serialization(msg) => IpcError::Serialization(msg),
            other => IpcError::SendFailed(other.to_string()),
        })?;

        if receivers == 0 {
            // Not an error: the worker may attach later, the call will time out
            warn!(
                correlation_id = %correlation_id,
                channel = %self.channel,
                "No consumers for authentication request (is the worker running?)"
            );
        } else {
            debug!(
                correlation_id = %correlation_id,
                receivers = receivers,
                "Authentication request delivered"
            );
        }

        Ok(())
    }
}
