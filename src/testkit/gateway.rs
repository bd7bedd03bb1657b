//! Scripted payment gateway.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{AccountId, Msats, RewardDestination};
use crate::error::PaymentError;
use crate::port::{PaymentGateway, PaymentReceipt};

/// A payment the gateway was asked to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPayment {
    pub payer: AccountId,
    pub destination: RewardDestination,
    pub amount: Msats,
    pub memo: String,
}

/// Replays queued outcomes in order, then succeeds with the full amount.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Result<(), PaymentError>>>,
    calls: Mutex<Vec<RecordedPayment>>,
    delay: Option<Duration>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that takes `delay` to answer every call.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Fail the next call with `error`.
    pub fn fail_next(&self, error: PaymentError) {
        self.script.lock().push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<RecordedPayment> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn pay(
        &self,
        payer: &AccountId,
        destination: &RewardDestination,
        amount: Msats,
        memo: &str,
    ) -> Result<PaymentReceipt, PaymentError> {
        self.calls.lock().push(RecordedPayment {
            payer: payer.clone(),
            destination: destination.clone(),
            amount,
            memo: memo.to_string(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or(Ok(()))?;
        Ok(PaymentReceipt {
            payment_hash: format!("hash-{}", memo.len()),
            amount_sent: amount,
        })
    }
}
