//! Test stack: the real runtime on an ephemeral port over the in-memory bus.

use std::sync::Arc;

use anyhow::{Context, Result};
use csms_runtime::{BusHandles, CsmsRuntime, RunningServices, RuntimeConfig};
use csms_transactions::AUTHORIZE_PATH;
use serde_json::{json, Value};
use shared_bus::InMemoryMessageBus;
use tokio::net::TcpListener;

/// A running runtime plus a handle on its bus
pub struct TestStack {
    pub base_url: String,
    pub bus: Arc<InMemoryMessageBus>,
    pub client: reqwest::Client,
    runtime: CsmsRuntime,
    running: RunningServices,
}

impl TestStack {
    /// Start with the given configuration; host and port are ignored.
    pub async fn start(config: RuntimeConfig) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind ephemeral port")?;
        let bus = Arc::new(InMemoryMessageBus::new());

        let runtime = CsmsRuntime::new(config);
        let running = runtime
            .start_with(BusHandles::in_memory(bus.clone()), listener)
            .await?;

        let stack = Self {
            base_url: format!("http://{}", running.local_addr),
            bus,
            client: reqwest::Client::new(),
            runtime,
            running,
        };

        // The service subscribes to responses before it starts accepting
        stack.health().await.context("Stack did not become ready")?;
        Ok(stack)
    }

    pub fn authorize_url(&self) -> String {
        format!("{}{}", self.base_url, AUTHORIZE_PATH)
    }

    /// POST an authorize request for `token` from a fixed station.
    pub async fn authorize(&self, token: Option<&str>) -> Result<reqwest::Response> {
        let body = json!({
            "stationUuid": "3f2504e0-4f89-11d3-9a0c-0305e82c3301",
            "driverIdentifier": {"id": token},
        });
        self.client
            .post(self.authorize_url())
            .json(&body)
            .send()
            .await
            .context("Authorize request failed")
    }

    /// GET /health as JSON
    pub async fn health(&self) -> Result<Value> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .context("Health request failed")?;
        response.json().await.context("Health body is not JSON")
    }

    /// Shut down and wait for the services to stop
    pub async fn stop(self) -> Result<()> {
        self.runtime.shutdown();
        self.running
            .gateway
            .await
            .context("Transaction service task panicked")??;
        if let Some(worker) = self.running.worker {
            worker.await.context("Authentication worker task panicked")?;
        }
        Ok(())
    }
}
