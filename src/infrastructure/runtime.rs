//! Long-running service mode: payout dispatcher and reservation sweeper.

use tokio::signal;
use tracing::{info, warn};

use super::bootstrap::{build_bookie, build_gateway};
use super::config::settings::Config;
use crate::application::{PayoutSettings, SweeperSettings};
use crate::error::{ConfigError, Result};

/// Run the background services until Ctrl-C.
///
/// # Errors
/// Returns an error if storage or the payment gateway cannot be built.
pub async fn run(config: &Config) -> Result<()> {
    let bookie = build_bookie(config)?;
    let gateway = build_gateway(config)?.ok_or(ConfigError::MissingField {
        field: "wallet.url",
    })?;

    let dispatcher = bookie
        .dispatcher(gateway, PayoutSettings::from(&config.payout))
        .start();
    let sweeper = bookie
        .sweeper(SweeperSettings::from(&config.sweeper))
        .start();
    info!(
        queued = bookie.pending_payouts().await.unwrap_or_default(),
        "bookie running"
    );

    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");

    sweeper.shutdown().await;
    dispatcher.shutdown().await;
    info!("bookie stopped");
    Ok(())
}
