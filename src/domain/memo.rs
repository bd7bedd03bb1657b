//! Payment memos linking Lightning payments to tickets.
//!
//! Funding invoices carry `BookieTicketId:<competition>.<ticket>`; outgoing
//! payouts carry `BookieReward:` or `BookieRefund:` with the same suffix.

use std::fmt;
use std::str::FromStr;

use super::error::DomainError;
use super::{CompetitionId, TicketId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoKind {
    /// Incoming stake for a ticket.
    Funding,
    /// Outgoing winnings.
    Reward,
    /// Outgoing refund of a cancelled stake.
    Refund,
}

impl MemoKind {
    const fn prefix(self) -> &'static str {
        match self {
            Self::Funding => "BookieTicketId:",
            Self::Reward => "BookieReward:",
            Self::Refund => "BookieRefund:",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentMemo {
    pub kind: MemoKind,
    pub competition: CompetitionId,
    pub ticket: TicketId,
}

impl PaymentMemo {
    #[must_use]
    pub fn new(kind: MemoKind, competition: CompetitionId, ticket: TicketId) -> Self {
        Self {
            kind,
            competition,
            ticket,
        }
    }
}

impl fmt::Display for PaymentMemo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}.{}", self.kind.prefix(), self.competition, self.ticket)
    }
}

impl FromStr for PaymentMemo {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || DomainError::MalformedMemo(s.to_string());
        let (kind, rest) = [MemoKind::Funding, MemoKind::Reward, MemoKind::Refund]
            .into_iter()
            .find_map(|kind| s.strip_prefix(kind.prefix()).map(|rest| (kind, rest)))
            .ok_or_else(malformed)?;
        let (competition, ticket) = rest.split_once('.').ok_or_else(malformed)?;
        if competition.is_empty() || ticket.is_empty() {
            return Err(malformed());
        }
        Ok(Self::new(kind, competition.into(), ticket.into()))
    }
}
