//! # Hub Runtime
//!
//! Entry point for the hub History service.
//!
//! ## Flow
//!
//! ```text
//! Things ──ValuePublished──→ Event Bus ──→ HistoryBusAdapter ──→ HistoryService
//!                                                                    │
//!                                          flush ticker ──save_changes┘
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging and metrics
//! 2. Load configuration from the environment
//! 3. Open the bucket store and start the History service
//! 4. Start the bus adapter and the flush ticker
//! 5. Wait for Ctrl+C, then shut down gracefully

use anyhow::{Context, Result};
use hub_runtime::{HubConfig, HubRuntime};
use hub_telemetry::{init_telemetry, TelemetryConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::from_env();
    let metrics = init_telemetry(&telemetry).context("Failed to initialize telemetry")?;
    let metrics = telemetry.metrics_enabled.then_some(metrics);

    let config = HubConfig::from_env().context("Failed to load configuration")?;

    info!("===========================================");
    info!("  Hub History Service v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let runtime = HubRuntime::new(config, metrics)?;
    runtime.start()?;

    info!(
        data_dir = %runtime.config().storage.data_dir.display(),
        "Hub is running. Press Ctrl+C to stop."
    );
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    runtime.shutdown().await
}
