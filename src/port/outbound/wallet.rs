//! Lightning wallet backend port.

use async_trait::async_trait;

use super::gateway::PaymentReceipt;
use crate::domain::{AccountId, Msats};
use crate::error::PaymentError;

/// Fields of a BOLT11 invoice the gateway checks before paying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInvoice {
    pub payment_hash: String,
    pub amount: Msats,
}

#[async_trait]
pub trait WalletBackend: Send + Sync {
    async fn decode_invoice(&self, bolt11: &str) -> Result<DecodedInvoice, PaymentError>;

    /// Pay an invoice from `wallet`, refusing if it asks for more than
    /// `max_amount`.
    async fn pay_invoice(
        &self,
        wallet: &AccountId,
        bolt11: &str,
        max_amount: Msats,
        memo: &str,
    ) -> Result<PaymentReceipt, PaymentError>;

    /// Move funds between two wallets of the same backend.
    async fn internal_transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Msats,
        memo: &str,
    ) -> Result<PaymentReceipt, PaymentError>;
}
