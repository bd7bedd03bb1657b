//! Outgoing payment port.

use async_trait::async_trait;

use crate::domain::{AccountId, Msats, RewardDestination};
use crate::error::PaymentError;

/// Proof of a completed outgoing payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub payment_hash: String,
    /// What actually left the wallet, net of the routing fee reserve.
    pub amount_sent: Msats,
}

/// Sends rewards and refunds to bettor-supplied destinations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Pay `amount` from the `payer` wallet to `destination`.
    ///
    /// The gateway may send less than `amount` to cover routing fees, but
    /// never more.
    async fn pay(
        &self,
        payer: &AccountId,
        destination: &RewardDestination,
        amount: Msats,
        memo: &str,
    ) -> Result<PaymentReceipt, PaymentError>;
}
