//! Infrastructure bootstrap helpers for runtime wiring.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use url::Url;

use crate::adapter::outbound::lnbits::{LnbitsWallet, WalletKeys};
use crate::adapter::outbound::lnurl::{LnurlGateway, LnurlSettings};
use crate::adapter::outbound::memory::{MemoryLedgerStore, MemoryPayoutQueue};
use crate::adapter::outbound::sqlite::database::connection::{
    create_pool, enable_wal, run_migrations,
};
use crate::adapter::outbound::sqlite::{SqliteLedgerStore, SqlitePayoutQueue};
use crate::application::Bookie;
use crate::domain::AccountId;
use crate::error::{ConfigError, Result};
use crate::infrastructure::config::service::StoreBackend;
use crate::infrastructure::config::settings::Config;
use crate::port::{LedgerStore, PaymentGateway, PayoutQueue};

/// Open the configured store and payout queue.
///
/// # Errors
/// Returns an error if the database cannot be opened or migrated.
pub fn build_storage(config: &Config) -> Result<(Arc<dyn LedgerStore>, Arc<dyn PayoutQueue>)> {
    match config.database.backend {
        StoreBackend::Memory => {
            warn!("using in-memory ledger; nothing will be persisted");
            Ok((
                Arc::new(MemoryLedgerStore::new()),
                Arc::new(MemoryPayoutQueue::new()),
            ))
        }
        StoreBackend::Sqlite => {
            let pool = create_pool(
                &config.database.url,
                config.database.pool_size,
                config.database.busy_timeout_ms,
            )?;
            run_migrations(&pool)?;
            if config.database.url != ":memory:" {
                enable_wal(&pool)?;
            }
            info!(database = %config.database.url, "ledger database ready");
            Ok((
                Arc::new(SqliteLedgerStore::new(pool.clone())),
                Arc::new(SqlitePayoutQueue::new(pool)),
            ))
        }
    }
}

/// Build the ledger facade over the configured storage.
///
/// # Errors
/// See [`build_storage`].
pub fn build_bookie(config: &Config) -> Result<Bookie> {
    let (store, queue) = build_storage(config)?;
    Ok(Bookie::new(store, queue))
}

/// Build the payment gateway, or `None` when no wallet is configured.
///
/// # Errors
/// Returns an error if the wallet url is invalid or an HTTP client cannot be
/// constructed.
pub fn build_gateway(config: &Config) -> Result<Option<Arc<dyn PaymentGateway>>> {
    let Some(url) = &config.wallet.url else {
        return Ok(None);
    };
    let base_url = wallet_base_url(url)?;
    let keys: WalletKeys = config
        .wallet
        .keys
        .iter()
        .map(|(wallet, key)| (AccountId::new(wallet.as_str()), key.clone()))
        .collect();
    if keys.is_empty() && config.wallet.admin_key.is_none() {
        warn!("wallet configured without any admin key; payouts will fail");
    }
    let wallet = LnbitsWallet::new(
        base_url,
        config.wallet.admin_key.clone(),
        keys,
        Duration::from_secs(config.lnurl.http_timeout_secs),
    )?;
    let gateway = LnurlGateway::new(Arc::new(wallet), LnurlSettings::from(&config.lnurl))?;
    Ok(Some(Arc::new(gateway)))
}

/// Parse the wallet url, making sure relative API paths join under it.
fn wallet_base_url(url: &str) -> Result<Url> {
    let mut normalized = url.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized).map_err(|e| {
        ConfigError::InvalidValue {
            field: "wallet.url",
            reason: e.to_string(),
        }
        .into()
    })
}
