//! Handler for the `config` command group.

use std::path::Path;

use super::output;
use crate::infrastructure::config::settings::Config;

/// Execute `config check` against an already loaded configuration.
pub fn execute_check(path: Option<&Path>, config: &Config) {
    output::section("Configuration");
    match path {
        Some(path) => output::field("File", path.display()),
        None => output::field("File", "(defaults)"),
    }

    output::section("Database");
    output::field("Backend", format!("{:?}", config.database.backend).to_lowercase());
    output::field("Url", &config.database.url);

    output::section("Payouts");
    output::field("Fee", format!("{}%", config.payout.fee_percent));
    output::field("Timeout", format!("{}s", config.payout.payment_timeout_secs));
    output::field("Claim grace", format!("{}s", config.payout.claim_grace_secs));
    output::field(
        "Fee reserve",
        format!(
            "max({} msat, {}%)",
            config.lnurl.fee_reserve_min_msat, config.lnurl.fee_reserve_percent
        ),
    );

    output::section("Reservations");
    output::field(
        "Expire after",
        format!(
            "{}s + {}s",
            config.sweeper.funding_window_secs, config.sweeper.expiry_margin_secs
        ),
    );

    output::section("Wallet");
    match &config.wallet.url {
        Some(url) => output::field("Url", url),
        None => output::warning("no wallet configured; `run` will refuse to start"),
    }
    output::field("Admin key", if config.wallet.admin_key.is_some() { "set" } else { "unset" });
    output::field("Wallet keys", config.wallet.keys.len());

    output::success("configuration is valid");
}
