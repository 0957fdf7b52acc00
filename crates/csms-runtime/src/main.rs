//! # CSMS Authorization Runtime
//!
//! Entry point for the station-facing authorization API.
//!
//! ```text
//! station ──POST /api/v1/transaction/authorize──→ csms-transactions
//!                                                   │          ↑
//!                                          auth-request   auth-response
//!                                                   ↓          │
//!                                                csms-authentication
//! ```
//!
//! Logging is controlled with `RUST_LOG` (default `info`). Everything else is
//! configured through `CSMS_*` variables, see [`csms_runtime::RuntimeConfig`].

use anyhow::{Context, Result};
use csms_runtime::{CsmsRuntime, RuntimeConfig};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = RuntimeConfig::from_env().context("Failed to load configuration")?;

    let runtime = CsmsRuntime::new(config);
    let mut running = runtime.start().await?;

    info!("CSMS runtime is running. Press Ctrl+C to stop.");
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
        }
        result = &mut running.gateway => {
            // Server ended on its own; stop the worker too
            runtime.shutdown();
            if let Ok(Err(e)) = &result {
                error!(error = %e, "Transaction service failed");
            }
            return result
                .context("Transaction service task panicked")?
                .context("Transaction service exited");
        }
    }

    runtime.shutdown();
    running
        .gateway
        .await
        .context("Transaction service task panicked")?
        .context("Transaction service failed")?;
    if let Some(worker) = running.worker {
        worker.await.context("Authentication worker task panicked")?;
    }

    info!("Shutdown complete");
    Ok(())
}
