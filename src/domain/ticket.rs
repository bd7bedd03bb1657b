//! Tickets and their settlement state machine.
//!
//! ```text
//! PENDING_FUNDING -> FUNDED
//! FUNDED -> WON_UNSETTLED | LOST | CANCELLED_UNSETTLED
//! WON_UNSETTLED | WON_PAYMENT_FAILED -> WON_PAYING -> WON_PAID | WON_PAYMENT_FAILED
//! CANCELLED_UNSETTLED | CANCELLED_PAYMENT_FAILED -> CANCELLED_PAYING -> CANCELLED_PAID | CANCELLED_PAYMENT_FAILED
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::{AccountId, CompetitionId, Msats, Sats, TicketId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketState {
    PendingFunding,
    Funded,
    WonUnsettled,
    Lost,
    CancelledUnsettled,
    WonPaying,
    CancelledPaying,
    WonPaymentFailed,
    CancelledPaymentFailed,
    WonPaid,
    CancelledPaid,
}

impl TicketState {
    pub const ALL: [TicketState; 11] = [
        Self::PendingFunding,
        Self::Funded,
        Self::WonUnsettled,
        Self::Lost,
        Self::CancelledUnsettled,
        Self::WonPaying,
        Self::CancelledPaying,
        Self::WonPaymentFailed,
        Self::CancelledPaymentFailed,
        Self::WonPaid,
        Self::CancelledPaid,
    ];

    /// States after which a competition may be considered fully settled.
    pub const TERMINAL: [TicketState; 5] = [
        Self::Lost,
        Self::WonPaid,
        Self::WonPaymentFailed,
        Self::CancelledPaid,
        Self::CancelledPaymentFailed,
    ];

    /// States a ticket captured in a decided pool can be in.
    pub const DECIDED: [TicketState; 5] = [
        Self::WonUnsettled,
        Self::WonPaying,
        Self::WonPaid,
        Self::WonPaymentFailed,
        Self::Lost,
    ];

    /// States of a refunded ticket.
    pub const REFUNDED: [TicketState; 4] = [
        Self::CancelledUnsettled,
        Self::CancelledPaying,
        Self::CancelledPaid,
        Self::CancelledPaymentFailed,
    ];

    /// Funded states that still need settlement or payout work. A competition
    /// with none of these left is fully settled.
    pub const OUTSTANDING: [TicketState; 5] = [
        Self::Funded,
        Self::WonUnsettled,
        Self::CancelledUnsettled,
        Self::WonPaying,
        Self::CancelledPaying,
    ];

    /// States in which the dispatcher is currently paying.
    pub const PAYING: [TicketState; 2] = [Self::WonPaying, Self::CancelledPaying];

    /// States that failed to pay and may be retried.
    pub const PAYMENT_FAILED: [TicketState; 2] =
        [Self::WonPaymentFailed, Self::CancelledPaymentFailed];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingFunding => "PENDING_FUNDING",
            Self::Funded => "FUNDED",
            Self::WonUnsettled => "WON_UNSETTLED",
            Self::Lost => "LOST",
            Self::CancelledUnsettled => "CANCELLED_UNSETTLED",
            Self::WonPaying => "WON_PAYING",
            Self::CancelledPaying => "CANCELLED_PAYING",
            Self::WonPaymentFailed => "WON_PAYMENT_FAILED",
            Self::CancelledPaymentFailed => "CANCELLED_PAYMENT_FAILED",
            Self::WonPaid => "WON_PAID",
            Self::CancelledPaid => "CANCELLED_PAID",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }

    /// Whether the stake has been paid in.
    #[must_use]
    pub fn is_funded(self) -> bool {
        self != Self::PendingFunding
    }

    /// The `_PAYING` state the dispatcher claims this ticket into, if any.
    #[must_use]
    pub const fn claim(self) -> Option<TicketState> {
        match self {
            Self::WonUnsettled | Self::WonPaymentFailed => Some(Self::WonPaying),
            Self::CancelledUnsettled | Self::CancelledPaymentFailed => Some(Self::CancelledPaying),
            _ => None,
        }
    }

    /// Outcome of a successful payment from a `_PAYING` state.
    #[must_use]
    pub const fn paid(self) -> Option<TicketState> {
        match self {
            Self::WonPaying => Some(Self::WonPaid),
            Self::CancelledPaying => Some(Self::CancelledPaid),
            _ => None,
        }
    }

    /// Outcome of a failed payment from a `_PAYING` state.
    #[must_use]
    pub const fn failed(self) -> Option<TicketState> {
        match self {
            Self::WonPaying => Some(Self::WonPaymentFailed),
            Self::CancelledPaying => Some(Self::CancelledPaymentFailed),
            _ => None,
        }
    }

    /// Whether this is a refund path state.
    #[must_use]
    pub fn is_refund(self) -> bool {
        Self::REFUNDED.contains(&self)
    }
}

impl fmt::Display for TicketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| DomainError::UnknownState {
                kind: "ticket",
                value: s.to_string(),
            })
    }
}

/// A ticket record as held by the ledger store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub account: AccountId,
    pub competition: CompetitionId,
    pub amount: Sats,
    pub choice: usize,
    /// Where rewards and refunds are sent, as given by the bettor.
    pub reward_target: String,
    pub reward_msat: Msats,
    pub reward_failure: Option<String>,
    pub reward_payment_hash: Option<String>,
    pub state: TicketState,
    pub time: DateTime<Utc>,
    /// When the dispatcher last claimed this ticket for payment.
    pub claimed_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// A fresh ticket in the given initial state.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: TicketId,
        account: AccountId,
        competition: CompetitionId,
        amount: Sats,
        choice: usize,
        reward_target: impl Into<String>,
        state: TicketState,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account,
            competition,
            amount,
            choice,
            reward_target: reward_target.into(),
            reward_msat: Msats::ZERO,
            reward_failure: None,
            reward_payment_hash: None,
            state,
            time,
            claimed_at: None,
        }
    }

    /// Copy of this ticket claimed for payment at `now`.
    #[must_use]
    pub fn claimed(&self, state: TicketState, now: DateTime<Utc>) -> Self {
        Self {
            state,
            reward_failure: None,
            claimed_at: Some(now),
            ..self.clone()
        }
    }

    /// Copy of this ticket after a successful payment.
    #[must_use]
    pub fn with_payment(&self, state: TicketState, sent: Msats, payment_hash: String) -> Self {
        Self {
            state,
            reward_msat: sent,
            reward_payment_hash: Some(payment_hash),
            reward_failure: None,
            ..self.clone()
        }
    }

    /// Copy of this ticket after a failed payment.
    #[must_use]
    pub fn with_failure(&self, state: TicketState, reason: String) -> Self {
        Self {
            state,
            reward_failure: Some(reason),
            ..self.clone()
        }
    }
}
