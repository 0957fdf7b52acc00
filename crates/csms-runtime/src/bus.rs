//! Bus backend selection.

use crate::config::{BusBackend, BusConfig};
use shared_bus::{BusError, InMemoryMessageBus, MessagePublisher, MessageSubscriber, RedisStreamBus, RedisStreamOptions};
use std::sync::Arc;
use tracing::{info, warn};

/// Publisher and subscriber halves of one connected bus
#[derive(Clone)]
pub struct BusHandles {
    pub publisher: Arc<dyn MessagePublisher>,
    pub subscriber: Arc<dyn MessageSubscriber>,
}

impl BusHandles {
    /// Handles backed by a single in-memory bus
    pub fn in_memory(bus: Arc<InMemoryMessageBus>) -> Self {
        Self {
            publisher: bus.clone(),
            subscriber: bus,
        }
    }
}

/// Connect to the configured backend.
///
/// For Redis, candidate URLs are tried in order and the first reachable one
/// wins.
pub async fn connect(config: &BusConfig) -> Result<BusHandles, BusError> {
    match config.backend {
        BusBackend::Memory => {
            info!("Using in-memory message bus");
            Ok(BusHandles::in_memory(Arc::new(InMemoryMessageBus::new())))
        }
        BusBackend::Redis => {
            let mut last_error = None;
            for (index, url) in config.urls.iter().enumerate() {
                // URLs may carry credentials, log the position only
                match RedisStreamBus::connect(url, RedisStreamOptions::default()).await {
                    Ok(bus) => {
                        info!(candidate = index, "Using Redis Streams message bus");
                        let bus = Arc::new(bus);
                        return Ok(BusHandles {
                            publisher: bus.clone(),
                            subscriber: bus,
                        });
                    }
                    Err(e) => {
                        warn!(candidate = index, error = %e, "Redis endpoint unreachable, trying next");
                        last_error = Some(e);
                    }
                }
            }
            Err(last_error
                .unwrap_or_else(|| BusError::Connection("no Redis endpoints configured".into())))
        }
    }
}
