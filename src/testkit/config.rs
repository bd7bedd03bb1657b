//! Canonical test configurations.
//!
//! Single source of truth for settings used across tests.

use std::time::Duration;

use crate::application::{PayoutSettings, SweeperSettings};

/// Dispatcher settings with a 1% fee and short timeouts.
pub fn payout() -> PayoutSettings {
    PayoutSettings {
        fee_percent: 1,
        payment_timeout: Duration::from_millis(500),
        poll_interval: Duration::from_millis(20),
        claim_grace: Duration::from_millis(500),
    }
}

/// Sweeper settings with a one-minute funding window and no margin.
pub fn sweeper() -> SweeperSettings {
    SweeperSettings {
        interval: Duration::from_millis(20),
        funding_window: Duration::from_secs(60),
        expiry_margin: Duration::ZERO,
    }
}
