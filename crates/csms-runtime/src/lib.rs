//! # CSMS Runtime Library
//!
//! Wires the transaction service and the authentication worker onto one bus.
//! The main entry point is the `main.rs` binary; the library is exposed so the
//! end-to-end suite can run the exact production wiring.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults + `CSMS_*` environment)
//! 2. Connect the bus backend
//! 3. Start the authentication worker, if enabled
//! 4. Start the transaction service (response listener, sweep, HTTP)
//! 5. Wait for shutdown

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod bus;
pub mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use csms_authentication::{AuthRequestHandler, AuthenticationError, AuthenticationService};
use csms_transactions::{GatewayError, TransactionService};
use shared_bus::ChannelFilter;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub use bus::BusHandles;
pub use config::{BusBackend, BusConfig, RuntimeConfig, RuntimeConfigError};

/// Tasks started by [`CsmsRuntime::start`]
pub struct RunningServices {
    /// Address the HTTP API is bound to
    pub local_addr: SocketAddr,
    /// Transaction service; completes after shutdown or on server error
    pub gateway: JoinHandle<Result<(), GatewayError>>,
    /// In-process worker, if enabled
    pub worker: Option<JoinHandle<()>>,
}

/// The runtime orchestrating both services.
pub struct CsmsRuntime {
    config: RuntimeConfig,
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,
    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,
}

impl CsmsRuntime {
    pub fn new(config: RuntimeConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Connect the configured bus and start on the configured address.
    pub async fn start(&self) -> Result<RunningServices> {
        let handles = bus::connect(&self.config.bus)
            .await
            .context("Failed to connect message bus")?;

        let addr = self.config.transactions.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;

        self.start_with(handles, listener).await
    }

    /// Start on an already connected bus and bound listener.
    pub async fn start_with(
        &self,
        handles: BusHandles,
        listener: TcpListener,
    ) -> Result<RunningServices> {
        info!("===========================================");
        info!("  CSMS Authorization Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");
        self.config.log_summary();

        let worker = if self.config.worker_enabled {
            Some(
                self.start_worker(&handles)
                    .await
                    .context("Failed to start authentication worker")?,
            )
        } else {
            info!("Authentication worker disabled, expecting a remote worker");
            None
        };

        let service = TransactionService::new(
            self.config.transactions.clone(),
            handles.publisher,
            handles.subscriber,
        )
        .context("Failed to create transaction service")?;

        let local_addr = listener.local_addr().context("Listener has no address")?;
        let gateway = tokio::spawn(service.serve(listener, self.shutdown_rx.clone()));

        info!(addr = %local_addr, "CSMS runtime started");
        Ok(RunningServices {
            local_addr,
            gateway,
            worker,
        })
    }

    /// Subscribe the worker before the gateway can publish anything.
    async fn start_worker(&self, handles: &BusHandles) -> Result<JoinHandle<()>, AuthenticationError> {
        let config = &self.config.authentication;
        config.validate().map_err(AuthenticationError::Config)?;

        let subscription = handles
            .subscriber
            .subscribe(ChannelFilter::channel(config.request_channel.clone()), &config.group_id)
            .await?;

        let handler = AuthRequestHandler::new(
            Arc::new(AuthenticationService::from_config(config)),
            subscription,
            Arc::clone(&handles.publisher),
            config.response_channel.clone(),
        );

        let mut shutdown = self.shutdown_rx.clone();
        Ok(tokio::spawn(async move {
            tokio::select! {
                _ = handler.run() => {}
                _ = shutdown.wait_for(|stop| *stop) => {
                    info!("[authentication] Shutdown signal received");
                }
            }
        }))
    }

    /// Signal every service to stop.
    pub fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}
