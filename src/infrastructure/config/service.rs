//! Service configuration for storage, payouts, reservation expiry and the
//! Lightning wallet.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::adapter::outbound::lnurl::LnurlSettings;
use crate::application::{PayoutSettings, SweeperSettings};
use crate::domain::Msats;

/// Which ledger store backs the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    /// Ephemeral; everything is lost on exit.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// SQLite file path, or `:memory:`.
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,
}

fn default_database_url() -> String {
    "bookie.db".to_string()
}

const fn default_pool_size() -> u32 {
    8
}

const fn default_busy_timeout_ms() -> u32 {
    5_000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: default_database_url(),
            pool_size: default_pool_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Payout dispatcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PayoutConfig {
    /// House fee withheld from winnings, in percent (default: 1).
    #[serde(default = "default_fee_percent")]
    pub fee_percent: u8,
    /// Upper bound on one payment attempt in seconds (default: 5).
    #[serde(default = "default_payment_timeout_secs")]
    pub payment_timeout_secs: u64,
    /// Fallback queue poll interval in milliseconds (default: 1000).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Seconds a payout claim is trusted beyond the payment timeout before
    /// it is treated as interrupted (default: 30).
    #[serde(default = "default_claim_grace_secs")]
    pub claim_grace_secs: u64,
}

const fn default_fee_percent() -> u8 {
    1
}

const fn default_payment_timeout_secs() -> u64 {
    5
}

const fn default_poll_interval_ms() -> u64 {
    1_000
}

const fn default_claim_grace_secs() -> u64 {
    30
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            fee_percent: default_fee_percent(),
            payment_timeout_secs: default_payment_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            claim_grace_secs: default_claim_grace_secs(),
        }
    }
}

impl From<&PayoutConfig> for PayoutSettings {
    fn from(config: &PayoutConfig) -> Self {
        Self {
            fee_percent: config.fee_percent,
            payment_timeout: Duration::from_secs(config.payment_timeout_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            claim_grace: Duration::from_secs(config.claim_grace_secs),
        }
    }
}

/// Reservation expiry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Lifetime of a funding invoice (default: 3600).
    #[serde(default = "default_funding_window_secs")]
    pub funding_window_secs: u64,
    /// Grace period after invoice expiry (default: 300).
    #[serde(default = "default_expiry_margin_secs")]
    pub expiry_margin_secs: u64,
}

const fn default_sweep_interval_secs() -> u64 {
    60
}

const fn default_funding_window_secs() -> u64 {
    3_600
}

const fn default_expiry_margin_secs() -> u64 {
    300
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            funding_window_secs: default_funding_window_secs(),
            expiry_margin_secs: default_expiry_margin_secs(),
        }
    }
}

impl From<&SweeperConfig> for SweeperSettings {
    fn from(config: &SweeperConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.sweep_interval_secs),
            funding_window: Duration::from_secs(config.funding_window_secs),
            expiry_margin: Duration::from_secs(config.expiry_margin_secs),
        }
    }
}

/// LNURL-pay client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LnurlConfig {
    #[serde(default = "default_fee_reserve_min_msat")]
    pub fee_reserve_min_msat: u64,
    #[serde(default = "default_fee_reserve_percent")]
    pub fee_reserve_percent: u8,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

const fn default_fee_reserve_min_msat() -> u64 {
    2_000
}

const fn default_fee_reserve_percent() -> u8 {
    1
}

const fn default_http_timeout_secs() -> u64 {
    5
}

impl Default for LnurlConfig {
    fn default() -> Self {
        Self {
            fee_reserve_min_msat: default_fee_reserve_min_msat(),
            fee_reserve_percent: default_fee_reserve_percent(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl From<&LnurlConfig> for LnurlSettings {
    fn from(config: &LnurlConfig) -> Self {
        Self {
            fee_reserve_min: Msats::new(config.fee_reserve_min_msat),
            fee_reserve_percent: config.fee_reserve_percent,
            http_timeout: Duration::from_secs(config.http_timeout_secs),
        }
    }
}

/// LNbits wallet backend.
///
/// The admin key is loaded from `BOOKIE_WALLET_ADMIN_KEY` at runtime, never
/// from the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConfig {
    /// Base URL of the LNbits instance. Payouts are disabled without one.
    #[serde(default)]
    pub url: Option<String>,
    /// Per-wallet admin keys, keyed by the wallet id owning competitions.
    #[serde(default)]
    pub keys: HashMap<String, String>,
    #[serde(skip)]
    pub admin_key: Option<String>,
}
