//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings.
//! Configuration is loaded from a TOML file with environment variable
//! overrides for secrets like `BOOKIE_WALLET_ADMIN_KEY`.
//!
//! # Example
//!
//! ```no_run
//! use bookie::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use url::Url;

use super::logging::LoggingConfig;
use super::service::{
    DatabaseConfig, LnurlConfig, PayoutConfig, StoreBackend, SweeperConfig, WalletConfig,
};
use crate::error::{ConfigError, Result};

/// Environment variable holding the default wallet admin key.
pub const WALLET_ADMIN_KEY_ENV: &str = "BOOKIE_WALLET_ADMIN_KEY";

/// Main application configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub payout: PayoutConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
    #[serde(default)]
    pub lnurl: LnurlConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;

        // Secrets come from the environment only.
        config.wallet.admin_key = std::env::var(WALLET_ADMIN_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty());

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is malformed, or fails
    /// validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Check values are within acceptable ranges.
    ///
    /// # Errors
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.database.backend == StoreBackend::Sqlite && self.database.url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "database.url",
            }
            .into());
        }
        if self.database.pool_size == 0 {
            return Err(invalid("database.pool_size", "must be greater than 0"));
        }
        if self.payout.fee_percent > 100 {
            return Err(invalid("payout.fee_percent", "must be between 0 and 100"));
        }
        if self.payout.payment_timeout_secs == 0 {
            return Err(invalid("payout.payment_timeout_secs", "must be greater than 0"));
        }
        if self.payout.poll_interval_ms == 0 {
            return Err(invalid("payout.poll_interval_ms", "must be greater than 0"));
        }
        if self.sweeper.sweep_interval_secs == 0 {
            return Err(invalid("sweeper.sweep_interval_secs", "must be greater than 0"));
        }
        if self.lnurl.fee_reserve_percent > 100 {
            return Err(invalid("lnurl.fee_reserve_percent", "must be between 0 and 100"));
        }
        if self.lnurl.http_timeout_secs == 0 {
            return Err(invalid("lnurl.http_timeout_secs", "must be greater than 0"));
        }
        if let Some(url) = &self.wallet.url {
            let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidValue {
                field: "wallet.url",
                reason: e.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(invalid("wallet.url", "must be an http(s) url"));
            }
        }
        Ok(())
    }

    /// Initialize the global tracing subscriber.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}

fn invalid(field: &'static str, reason: &str) -> crate::error::Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse_toml("").unwrap();
        assert_eq!(config.database.backend, StoreBackend::Sqlite);
        assert_eq!(config.database.url, "bookie.db");
        assert_eq!(config.payout.fee_percent, 1);
        assert_eq!(config.payout.payment_timeout_secs, 5);
        assert_eq!(config.sweeper.sweep_interval_secs, 60);
        assert_eq!(config.sweeper.funding_window_secs, 3_600);
        assert_eq!(config.sweeper.expiry_margin_secs, 300);
        assert_eq!(config.lnurl.fee_reserve_min_msat, 2_000);
        assert_eq!(config.lnurl.fee_reserve_percent, 1);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::parse_toml(
            r#"
            [database]
            backend = "memory"

            [payout]
            fee_percent = 5
            poll_interval_ms = 250

            [wallet]
            url = "https://lnbits.example.com/"
            keys = { owner = "k1" }
            "#,
        )
        .unwrap();
        assert_eq!(config.database.backend, StoreBackend::Memory);
        assert_eq!(config.payout.fee_percent, 5);
        assert_eq!(config.payout.poll_interval_ms, 250);
        assert_eq!(config.wallet.keys.get("owner").map(String::as_str), Some("k1"));
    }

    #[test]
    fn fee_above_hundred_is_rejected() {
        let err = Config::parse_toml("[payout]\nfee_percent = 101").unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue {
                field: "payout.fee_percent",
                ..
            })
        ));
    }

    #[test]
    fn non_http_wallet_url_is_rejected() {
        let err = Config::parse_toml("[wallet]\nurl = \"ftp://x\"").unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue {
                field: "wallet.url",
                ..
            })
        ));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Config::parse_toml("[payout").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Parse(_))));
    }
}
