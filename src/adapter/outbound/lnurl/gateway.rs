//! LNURL-pay payment gateway.
//!
//! Resolves the destination to a BOLT11 invoice through the LNURL-pay
//! protocol (LUD-06, LUD-12 comments, LUD-16 addresses) and has the wallet
//! backend pay it. Internal destinations skip the protocol entirely.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::domain::money::fee_reserve;
use crate::domain::{AccountId, Msats, RewardDestination};
use crate::error::{Error, PaymentError, Result};
use crate::port::{PaymentGateway, PaymentReceipt, WalletBackend};

const PAY_REQUEST_TAG: &str = "payRequest";

/// Tunables for outgoing LNURL payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LnurlSettings {
    /// Lower bound of the routing fee reserve.
    pub fee_reserve_min: Msats,
    /// Routing fee reserve as a percentage of the payment.
    pub fee_reserve_percent: u8,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
}

impl Default for LnurlSettings {
    fn default() -> Self {
        Self {
            fee_reserve_min: Msats::new(2_000),
            fee_reserve_percent: 1,
            http_timeout: Duration::from_secs(5),
        }
    }
}

/// Parameters returned by the first LNURL-pay request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayParams {
    tag: String,
    callback: String,
    min_sendable: u64,
    max_sendable: u64,
    #[serde(default)]
    comment_allowed: u64,
}

#[derive(Debug, Deserialize)]
struct CallbackResponse {
    pr: String,
}

/// [`PaymentGateway`] speaking LNURL-pay over HTTP.
pub struct LnurlGateway {
    client: Client,
    wallet: Arc<dyn WalletBackend>,
    settings: LnurlSettings,
}

impl LnurlGateway {
    /// Build a gateway with its own HTTP client.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(wallet: Arc<dyn WalletBackend>, settings: LnurlSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.http_timeout)
            .build()
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(Self {
            client,
            wallet,
            settings,
        })
    }

    fn http_error(&self, err: reqwest::Error) -> PaymentError {
        if err.is_timeout() {
            PaymentError::Timeout(self.settings.http_timeout)
        } else {
            PaymentError::from(err)
        }
    }

    /// GET a URL and decode the JSON body, turning LNURL `ERROR` replies into
    /// rejections.
    async fn get_json(&self, url: Url, endpoint: &'static str) -> std::result::Result<Value, PaymentError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.http_error(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PaymentError::InvalidResponse {
                endpoint,
                reason: format!("HTTP {status}"),
            });
        }
        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                PaymentError::Timeout(self.settings.http_timeout)
            } else {
                PaymentError::InvalidResponse {
                    endpoint,
                    reason: format!("body is not JSON: {e}"),
                }
            }
        })?;
        if !body.is_object() {
            return Err(PaymentError::InvalidResponse {
                endpoint,
                reason: "body is not a JSON object".into(),
            });
        }
        if body.get("status").and_then(Value::as_str) == Some("ERROR") {
            let reason = body
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("no reason given");
            return Err(PaymentError::Rejected(reason.to_string()));
        }
        Ok(body)
    }

    async fn pay_params(&self, url: Url) -> std::result::Result<PayParams, PaymentError> {
        let body = self.get_json(url, "lnurlp").await?;
        let params: PayParams =
            serde_json::from_value(body).map_err(|e| PaymentError::InvalidResponse {
                endpoint: "lnurlp",
                reason: e.to_string(),
            })?;
        if params.tag != PAY_REQUEST_TAG {
            return Err(PaymentError::InvalidResponse {
                endpoint: "lnurlp",
                reason: format!("unexpected tag {:?}, should be payRequest", params.tag),
            });
        }
        Ok(params)
    }

    async fn request_invoice(
        &self,
        params: &PayParams,
        amount: Msats,
        memo: &str,
    ) -> std::result::Result<String, PaymentError> {
        let mut callback =
            Url::parse(&params.callback).map_err(|e| PaymentError::InvalidResponse {
                endpoint: "lnurlp",
                reason: format!("unparsable callback: {e}"),
            })?;
        {
            let mut query = callback.query_pairs_mut();
            query.append_pair("amount", &amount.value().to_string());
            if !memo.is_empty() && memo.chars().count() as u64 <= params.comment_allowed {
                query.append_pair("comment", memo);
            }
        }
        let body = self.get_json(callback, "callback").await?;
        let response: CallbackResponse =
            serde_json::from_value(body).map_err(|e| PaymentError::InvalidResponse {
                endpoint: "callback",
                reason: e.to_string(),
            })?;
        Ok(response.pr)
    }

    async fn pay_lnurl(
        &self,
        payer: &AccountId,
        url: Url,
        amount: Msats,
        memo: &str,
    ) -> std::result::Result<PaymentReceipt, PaymentError> {
        let reserve = fee_reserve(
            amount,
            self.settings.fee_reserve_min,
            self.settings.fee_reserve_percent,
        );
        let net = amount
            .checked_sub(reserve)
            .filter(|net| *net > Msats::ZERO)
            .ok_or(PaymentError::AmountTooSmall { amount })?;
        debug!(%amount, %reserve, %net, "deducted routing fee reserve");

        let params = self.pay_params(url).await?;
        let min = Msats::new(params.min_sendable);
        let max = Msats::new(params.max_sendable);
        if net < min {
            return Err(PaymentError::BelowMinimum { amount: net, min });
        }
        if net > max {
            return Err(PaymentError::AboveMaximum { amount: net, max });
        }

        let invoice = self.request_invoice(&params, net, memo).await?;
        let decoded = self.wallet.decode_invoice(&invoice).await?;
        if decoded.amount > net {
            return Err(PaymentError::InvoiceAmountMismatch {
                requested: net,
                invoiced: decoded.amount,
            });
        }

        info!(payer = %payer, amount = %net, payment_hash = %decoded.payment_hash, "paying lnurl invoice");
        let receipt = self
            .wallet
            .pay_invoice(payer, &invoice, amount, memo)
            .await?;
        Ok(PaymentReceipt {
            payment_hash: receipt.payment_hash,
            amount_sent: net,
        })
    }
}

#[async_trait]
impl PaymentGateway for LnurlGateway {
    async fn pay(
        &self,
        payer: &AccountId,
        destination: &RewardDestination,
        amount: Msats,
        memo: &str,
    ) -> std::result::Result<PaymentReceipt, PaymentError> {
        match destination {
            RewardDestination::Internal(target) => {
                if amount == Msats::ZERO {
                    return Err(PaymentError::AmountTooSmall { amount });
                }
                info!(payer = %payer, target = %target, %amount, "internal transfer");
                self.wallet
                    .internal_transfer(payer, target, amount, memo)
                    .await
            }
            external => {
                let url = external
                    .discovery_url()?
                    .ok_or_else(|| PaymentError::Rejected("destination has no lnurl".into()))?;
                self.pay_lnurl(payer, url, amount, memo).await
            }
        }
    }
}
