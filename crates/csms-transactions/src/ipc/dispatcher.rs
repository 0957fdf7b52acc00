//! Request dispatcher for the authorize flow.

use crate::domain::correlation::CorrelationId;
use crate::domain::error::AuthorizationError;
use crate::domain::pending::CorrelationTable;
use crate::domain::types::AuthorizationRequest;
use async_trait::async_trait;
use shared_types::{AuthenticationMessage, AuthenticationStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Outbound port for authentication requests
#[async_trait]
pub trait AuthRequestSender: Send + Sync {
    /// Publish a request keyed by its correlation id
    async fn send(
        &self,
        correlation_id: CorrelationId,
        message: AuthenticationMessage,
    ) -> Result<(), IpcError>;
}

/// IPC error types
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("channel closed")]
    ChannelClosed,
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Bridges one authorize call onto the bus and waits for its verdict.
pub struct RequestDispatcher {
    /// Correlation table shared with the response handler
    table: Arc<CorrelationTable>,
    /// Sender for outgoing requests
    sender: Arc<dyn AuthRequestSender>,
    /// How long to wait for a verdict
    timeout: Duration,
}

impl RequestDispatcher {
    pub fn new(
        table: Arc<CorrelationTable>,
        sender: Arc<dyn AuthRequestSender>,
        timeout: Duration,
    ) -> Self {
        Self {
            table,
            sender,
            timeout,
        }
    }

    /// Authorize a driver token.
    ///
    /// A missing or blank token is `INVALID` without touching the bus.
    /// Otherwise the request is published and the verdict awaited for at most
    /// the configured timeout. The slot is released on every exit path,
    /// including when this future is dropped.
    pub async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<AuthenticationStatus, AuthorizationError> {
        let token = match request.driver_token() {
            Some(token) if !token.trim().is_empty() => token,
            _ => {
                debug!(
                    station_uuid = ?request.station_uuid,
                    "Missing driver token, rejecting without dispatch"
                );
                return Ok(AuthenticationStatus::Invalid);
            }
        };

        let correlation_id = CorrelationId::new();
        let rx = self.table.register(correlation_id)?;
        let _guard = SlotGuard {
            table: &self.table,
            correlation_id,
        };

        let message = AuthenticationMessage::new(correlation_id.to_string(), Some(token.to_string()));
        if let Err(e) = self.sender.send(correlation_id, message).await {
            warn!(correlation_id = %correlation_id, error = %e, "Failed to publish authentication request");
            return Err(AuthorizationError::Dispatch(e.to_string()));
        }

        debug!(
            correlation_id = %correlation_id,
            station_uuid = ?request.station_uuid,
            "Sent authentication request"
        );

        // An evicted slot drops its sender; keep waiting out the deadline
        let verdict = async {
            match rx.await {
                Ok(status) => status,
                Err(_) => std::future::pending().await,
            }
        };

        match tokio::time::timeout(self.timeout, verdict).await {
            Ok(status) => Ok(status),
            Err(_) => {
                warn!(
                    correlation_id = %correlation_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Authentication request timed out"
                );
                Err(AuthorizationError::Timeout {
                    correlation_id,
                    timeout: self.timeout,
                })
            }
        }
    }

    /// Get pending request count
    pub fn pending_count(&self) -> usize {
        self.table.len()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Releases a slot when the authorize call ends, however it ends.
struct SlotGuard<'a> {
    table: &'a CorrelationTable,
    correlation_id: CorrelationId,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.table.remove(&self.correlation_id);
    }
}

/// In-process request channel, for wiring without a bus
pub mod channel {
    use super::*;

    /// Outbound request as seen by the receiving end of the channel
    pub type ChannelRequest = (CorrelationId, AuthenticationMessage);

    pub struct ChannelSender(pub mpsc::Sender<ChannelRequest>);

    #[async_trait]
    impl AuthRequestSender for ChannelSender {
        async fn send(
            &self,
            correlation_id: CorrelationId,
            message: AuthenticationMessage,
        ) -> Result<(), IpcError> {
            self.0
                .send((correlation_id, message))
                .await
                .map_err(|_| IpcError::ChannelClosed)
        }
    }

    /// Create a connected sender/receiver pair
    pub fn create_channel(buffer: usize) -> (ChannelSender, mpsc::Receiver<ChannelRequest>) {
        let (tx, rx) = mpsc::channel(buffer);
        (ChannelSender(tx), rx)
    }
}
