//! Response side of the correlation engine.

use crate::domain::correlation::CorrelationId;
use crate::domain::pending::CorrelationTable;
use shared_bus::{BusMessage, Subscription};
use shared_types::AuthenticationResponse;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Routes verdicts to their waiting authorize calls
#[derive(Clone)]
pub struct ResponseHandler {
    table: Arc<CorrelationTable>,
}

impl ResponseHandler {
    pub fn new(table: Arc<CorrelationTable>) -> Self {
        Self { table }
    }

    /// Complete the matching slot. Returns false if the response was discarded.
    pub fn on_response(&self, response: &AuthenticationResponse) -> bool {
        let Ok(correlation_id) = CorrelationId::parse(&response.request_id) else {
            self.table
                .stats()
                .total_unmatched
                .fetch_add(1, Ordering::Relaxed);
            warn!(
                request_id = %response.request_id,
                "Received response for unknown or expired correlation id"
            );
            return false;
        };

        if self.table.complete_and_remove(correlation_id, response.status) {
            true
        } else {
            warn!(
                correlation_id = %correlation_id,
                status = %response.status,
                "Received response for unknown or expired correlation id"
            );
            false
        }
    }
}

/// Consumes the response channel and feeds the [`ResponseHandler`]
pub struct ResponseListener {
    handler: ResponseHandler,
    subscription: Box<dyn Subscription>,
}

impl ResponseListener {
    pub fn new(handler: ResponseHandler, subscription: Box<dyn Subscription>) -> Self {
        Self {
            handler,
            subscription,
        }
    }

    /// Run the listener loop until the bus closes
    #[instrument(skip(self), name = "response_listener")]
    pub async fn run(mut self) {
        info!(
            channels = ?self.subscription.filter().channels,
            group = %self.subscription.group(),
            "Started listening for authentication responses"
        );

        while let Some(message) = self.subscription.recv().await {
            self.handle_message(&message);

            if let Err(e) = self.subscription.ack(&message).await {
                warn!(key = %message.key, error = %e, "Failed to ack response");
            }
        }

        warn!("Response subscription closed, stopping listener");
    }

    fn handle_message(&self, message: &BusMessage) {
        match message.decode::<AuthenticationResponse>() {
            Ok(response) => {
                if self.handler.on_response(&response) {
                    debug!(key = %message.key, status = %response.status, "Delivered verdict");
                }
            }
            Err(e) => {
                warn!(key = %message.key, error = %e, "Dropping malformed authentication response");
            }
        }
    }
}
