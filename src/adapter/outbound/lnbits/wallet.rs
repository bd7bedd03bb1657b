//! LNbits REST wallet backend.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::domain::{AccountId, Msats};
use crate::error::{Error, PaymentError, Result};
use crate::port::{DecodedInvoice, PaymentReceipt, WalletBackend};

const API_KEY_HEADER: &str = "X-Api-Key";

/// Per-wallet admin keys, keyed by the account that owns competitions.
pub type WalletKeys = HashMap<AccountId, String>;

/// [`WalletBackend`] for an LNbits instance.
pub struct LnbitsWallet {
    client: Client,
    base_url: Url,
    /// Key used for calls not tied to a wallet, and for wallets without an
    /// entry in `keys`.
    default_key: Option<String>,
    keys: WalletKeys,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct DecodeResponse {
    payment_hash: String,
    amount_msat: u64,
}

#[derive(Debug, Serialize)]
struct CreateInvoice<'a> {
    out: bool,
    amount: u64,
    memo: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatedInvoice {
    #[serde(alias = "payment_request")]
    bolt11: String,
}

#[derive(Debug, Deserialize)]
struct PaidResponse {
    payment_hash: String,
}

impl LnbitsWallet {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        base_url: Url,
        default_key: Option<String>,
        keys: WalletKeys,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(Self {
            client,
            base_url,
            default_key,
            keys,
            timeout,
        })
    }

    fn key_for(&self, wallet: &AccountId) -> std::result::Result<&str, PaymentError> {
        self.keys
            .get(wallet)
            .or(self.default_key.as_ref())
            .map(String::as_str)
            .ok_or_else(|| PaymentError::UnknownWallet(wallet.clone()))
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, PaymentError> {
        self.base_url
            .join(path)
            .map_err(|e| PaymentError::Wallet(format!("bad wallet url: {e}")))
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        key: &str,
        body: &serde_json::Value,
    ) -> std::result::Result<T, PaymentError> {
        let response = self
            .client
            .post(self.endpoint(path)?)
            .header(API_KEY_HEADER, key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PaymentError::Timeout(self.timeout)
                } else {
                    PaymentError::from(e)
                }
            })?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PaymentError::Wallet(format!("{path} returned {status}: {detail}")));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| PaymentError::Wallet(format!("{path} returned malformed body: {e}")))
    }
}

#[async_trait]
impl WalletBackend for LnbitsWallet {
    async fn decode_invoice(&self, bolt11: &str) -> std::result::Result<DecodedInvoice, PaymentError> {
        let key = self
            .default_key
            .as_deref()
            .or_else(|| self.keys.values().next().map(String::as_str))
            .ok_or_else(|| PaymentError::Wallet("no wallet key configured".into()))?;
        let decoded: DecodeResponse = self
            .post("api/v1/payments/decode", key, &json!({ "data": bolt11 }))
            .await?;
        Ok(DecodedInvoice {
            payment_hash: decoded.payment_hash,
            amount: Msats::new(decoded.amount_msat),
        })
    }

    async fn pay_invoice(
        &self,
        wallet: &AccountId,
        bolt11: &str,
        max_amount: Msats,
        memo: &str,
    ) -> std::result::Result<PaymentReceipt, PaymentError> {
        let key = self.key_for(wallet)?;
        let decoded = self.decode_invoice(bolt11).await?;
        if decoded.amount > max_amount {
            return Err(PaymentError::InvoiceAmountMismatch {
                requested: max_amount,
                invoiced: decoded.amount,
            });
        }
        debug!(wallet = %wallet, payment_hash = %decoded.payment_hash, "paying invoice");
        let paid: PaidResponse = self
            .post(
                "api/v1/payments",
                key,
                &json!({
                    "out": true,
                    "bolt11": bolt11,
                    "extra": { "tag": "bookie", "comment": memo }
                }),
            )
            .await?;
        Ok(PaymentReceipt {
            payment_hash: paid.payment_hash,
            amount_sent: decoded.amount,
        })
    }

    async fn internal_transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Msats,
        memo: &str,
    ) -> std::result::Result<PaymentReceipt, PaymentError> {
        let sats = amount.floor_sats();
        if sats.is_zero() {
            return Err(PaymentError::AmountTooSmall { amount });
        }
        let receiver_key = self
            .keys
            .get(to)
            .ok_or_else(|| PaymentError::UnknownWallet(to.clone()))?;
        let request = CreateInvoice {
            out: false,
            amount: sats.value(),
            memo,
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| PaymentError::Wallet(e.to_string()))?;
        let invoice: CreatedInvoice = self.post("api/v1/payments", receiver_key, &body).await?;
        let receipt = self
            .pay_invoice(from, &invoice.bolt11, sats.to_msats(), memo)
            .await?;
        Ok(PaymentReceipt {
            payment_hash: receipt.payment_hash,
            amount_sent: sats.to_msats(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn wallet(server: &MockServer) -> LnbitsWallet {
        let mut keys = WalletKeys::new();
        keys.insert(AccountId::new("payer"), "payer-admin".into());
        keys.insert(AccountId::new("bettor"), "bettor-admin".into());
        LnbitsWallet::new(
            Url::parse(&server.base_url()).unwrap(),
            None,
            keys,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn pays_decoded_invoice_with_wallet_key() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/payments/decode");
                then.status(200)
                    .json_body(json!({ "payment_hash": "abc", "amount_msat": 5_000 }));
            })
            .await;
        let pay = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/payments")
                    .header("X-Api-Key", "payer-admin");
                then.status(201).json_body(json!({ "payment_hash": "abc" }));
            })
            .await;

        let receipt = wallet(&server)
            .pay_invoice(&AccountId::new("payer"), "lnbc50n1x", Msats::new(6_000), "m")
            .await
            .unwrap();

        pay.assert_async().await;
        assert_eq!(receipt.payment_hash, "abc");
        assert_eq!(receipt.amount_sent, Msats::new(5_000));
    }

    #[tokio::test]
    async fn refuses_invoice_above_maximum() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/payments/decode");
                then.status(200)
                    .json_body(json!({ "payment_hash": "abc", "amount_msat": 9_000 }));
            })
            .await;

        let err = wallet(&server)
            .pay_invoice(&AccountId::new("payer"), "lnbc90n1x", Msats::new(6_000), "m")
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::InvoiceAmountMismatch { .. }));
    }

    #[tokio::test]
    async fn unknown_payer_is_rejected_without_requests() {
        let server = MockServer::start_async().await;

        let err = wallet(&server)
            .pay_invoice(&AccountId::new("stranger"), "lnbc1", Msats::new(1), "m")
            .await
            .unwrap_err();

        assert_eq!(err, PaymentError::UnknownWallet(AccountId::new("stranger")));
    }

    #[tokio::test]
    async fn backend_errors_carry_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/payments/decode");
                then.status(400).body("bad invoice");
            })
            .await;

        let err = wallet(&server)
            .decode_invoice("garbage")
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Wallet(msg) if msg.contains("400")));
    }
}
