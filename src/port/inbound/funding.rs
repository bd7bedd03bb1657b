//! Payment confirmations from the wallet service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{AccountId, Msats};

/// Tag the wallet service attaches to invoices issued for ticket purchases.
pub const FUNDING_TAG: &str = "bookie";

/// A settled incoming invoice, as reported by the wallet service.
///
/// `extra` carries the metadata attached when the invoice was issued:
/// `tag`, `choice` and `reward_target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaidInvoice {
    pub payment_hash: String,
    pub wallet: AccountId,
    pub amount: Msats,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub extra: Value,
}

impl PaidInvoice {
    /// Whether the invoice was issued for a ticket purchase.
    #[must_use]
    pub fn is_funding(&self) -> bool {
        self.extra.get("tag").and_then(Value::as_str) == Some(FUNDING_TAG)
    }

    #[must_use]
    pub fn choice(&self) -> Option<i64> {
        self.extra.get("choice").and_then(Value::as_i64)
    }

    #[must_use]
    pub fn reward_target(&self) -> Option<&str> {
        self.extra.get("reward_target").and_then(Value::as_str)
    }
}
