//! # Authentication Request Handler
//!
//! Listens on the request channel, asks [`AuthenticationService`] for a verdict
//! and publishes it to the response channel keyed by the same correlation id.
//!
//! ```text
//! csms-transactions
//!       │
//!       │ publishes {requestId, token}
//!       ▼
//! ┌─────────────────┐
//! │  auth-request   │
//! └─────────────────┘
//!       │
//!       │ AuthRequestHandler subscribes (group: authentication-service)
//!       ▼
//! ┌─────────────────────────────────────┐
//! │  AuthRequestHandler                 │
//! │  - Decodes the request              │
//! │  - Runs AuthenticationService       │
//! │  - Publishes {requestId, status}    │
//! │  - Acks the request                 │
//! └─────────────────────────────────────┘
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  auth-response  │
//! └─────────────────┘
//! ```

use crate::error::AuthenticationError;
use crate::service::AuthenticationService;
use shared_bus::{BusMessage, MessagePublisher, Subscription};
use shared_types::AuthenticationMessage;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Bus consumer that answers authentication requests.
pub struct AuthRequestHandler {
    /// Verdict logic
    service: Arc<AuthenticationService>,
    /// Subscription on the request channel
    subscription: Box<dyn Subscription>,
    /// Publisher for verdicts
    publisher: Arc<dyn MessagePublisher>,
    /// Channel verdicts are published to
    response_channel: String,
}

impl AuthRequestHandler {
    pub fn new(
        service: Arc<AuthenticationService>,
        subscription: Box<dyn Subscription>,
        publisher: Arc<dyn MessagePublisher>,
        response_channel: impl Into<String>,
    ) -> Self {
        Self {
            service,
            subscription,
            publisher,
            response_channel: response_channel.into(),
        }
    }

    /// Start processing requests.
    ///
    /// Runs until the bus closes. Should be spawned as a background task.
    #[instrument(skip(self), name = "auth_request_handler")]
    pub async fn run(mut self) {
        info!(
            channels = ?self.subscription.filter().channels,
            group = %self.subscription.group(),
            "Started listening for authentication requests"
        );

        while let Some(message) = self.subscription.recv().await {
            if let Err(e) = self.process(&message).await {
                error!(key = %message.key, error = %e, "Failed to answer authentication request");
            }

            // Requests are never redelivered; an unanswered caller times out
            if let Err(e) = self.subscription.ack(&message).await {
                warn!(key = %message.key, error = %e, "Failed to ack request");
            }
        }

        error!("Request channel closed, shutting down");
    }

    /// Answer one request message.
    ///
    /// Undecodable payloads are logged and dropped; there is no request id to
    /// answer them with.
    pub async fn process(&self, message: &BusMessage) -> Result<(), AuthenticationError> {
        let request: AuthenticationMessage = match message.decode() {
            Ok(request) => request,
            Err(e) => {
                warn!(key = %message.key, error = %e, "Discarding malformed authentication request");
                return Ok(());
            }
        };

        debug!(
            key = %message.key,
            request_id = ?request.request_id,
            "Received authentication request"
        );

        let response = self.service.handle_request(&request);
        let key = if request.request_id.is_some() {
            response.request_id.clone()
        } else {
            message.key.clone()
        };

        let reply = BusMessage::encode(self.response_channel.as_str(), key, &response)?;
        let receivers = self.publisher.publish(reply).await?;

        debug!(
            request_id = %response.request_id,
            status = %response.status,
            receivers = receivers,
            "Published authentication response"
        );
        Ok(())
    }
}
