use std::time::Duration;

use thiserror::Error;

use crate::domain::error::DomainError;
use crate::domain::{AccountId, CompetitionId, Msats, Sats, TicketId};

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Requests the ledger refuses. Nothing is mutated when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("competition {0} does not exist")]
    CompetitionNotFound(CompetitionId),

    #[error("ticket {0} does not exist")]
    TicketNotFound(TicketId),

    #[error("competition {0} is already completed")]
    AlreadyCompleted(CompetitionId),

    #[error("choice {choice} is out of range for {choices} choices")]
    InvalidChoice { choice: i64, choices: usize },

    #[error("choice {choice} has no stake and cannot win")]
    ZeroStakeChoice { choice: usize },

    #[error("competition {0} is closed for new tickets")]
    CompetitionClosed(CompetitionId),

    #[error("competition {0} has no tickets left")]
    SoldOut(CompetitionId),

    #[error("amount {amount} is outside the allowed range {min}..={max}")]
    AmountOutOfBounds { amount: Sats, min: Sats, max: Sats },

    #[error("account {account} does not own competition {competition}")]
    NotOwner {
        account: AccountId,
        competition: CompetitionId,
    },

    #[error("competition {competition} cannot be modified: {reason}")]
    NotEditable {
        competition: CompetitionId,
        reason: &'static str,
    },
}

/// Reasons a single payout attempt failed.
///
/// The rendered message is stored on the ticket as its failure reason.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("invalid reward destination: {0}")]
    Destination(#[from] DomainError),

    #[error("cannot compute payout: {0}")]
    Payout(DomainError),

    #[error("payment is negative or zero after deducting routing fees")]
    AmountTooSmall { amount: Msats },

    #[error("payment of {amount} is below the receiver minimum of {min}")]
    BelowMinimum { amount: Msats, min: Msats },

    #[error("payment of {amount} is above the receiver maximum of {max}")]
    AboveMaximum { amount: Msats, max: Msats },

    #[error("receiver rejected the payment: {0}")]
    Rejected(String),

    #[error("payout not possible: {0}")]
    NotPayable(String),

    #[error("unexpected response from {endpoint}: {reason}")]
    InvalidResponse {
        endpoint: &'static str,
        reason: String,
    },

    #[error("invoice amount {invoiced} is higher than requested {requested}")]
    InvoiceAmountMismatch { requested: Msats, invoiced: Msats },

    #[error("request failed: {0}")]
    Http(String),

    #[error("wallet backend error: {0}")]
    Wallet(String),

    #[error("no wallet key configured for account {0}")]
    UnknownWallet(AccountId),

    #[error("payment timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("parse error: {0}")]
    Parse(String),

    /// A record the caller just wrote could not be read back, or a bookkeeping
    /// loop could not make progress.
    #[error("internal consistency error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the ledger rejection carried by this error, if any.
    #[must_use]
    pub fn as_ledger(&self) -> Option<&LedgerError> {
        match self {
            Error::Ledger(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_error_messages_are_operator_readable() {
        let err = PaymentError::BelowMinimum {
            amount: Msats::new(500),
            min: Msats::new(1000),
        };
        assert_eq!(
            err.to_string(),
            "payment of 500 msat is below the receiver minimum of 1000 msat"
        );
    }

    #[test]
    fn ledger_errors_convert_into_crate_error() {
        let err: Error = LedgerError::AlreadyCompleted(CompetitionId::new("c1")).into();
        assert_eq!(
            err.as_ledger(),
            Some(&LedgerError::AlreadyCompleted(CompetitionId::new("c1")))
        );
        assert_eq!(err.to_string(), "competition c1 is already completed");
    }
}
