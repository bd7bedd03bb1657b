//! Competitions: the pool of mutually-exclusive choices tickets are bought against.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::{AccountId, CompetitionId, Sats, TicketState};

/// Lifecycle state of a competition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompetitionState {
    /// Accepting tickets.
    Open,
    /// Winner declared, payouts in progress.
    Settling,
    /// Every ticket reached a terminal state.
    Settled,
}

impl CompetitionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Settling => "SETTLING",
            Self::Settled => "SETTLED",
        }
    }
}

impl fmt::Display for CompetitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompetitionState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Self::Open),
            "SETTLING" => Ok(Self::Settling),
            "SETTLED" => Ok(Self::Settled),
            other => Err(DomainError::UnknownState {
                kind: "competition",
                value: other.to_string(),
            }),
        }
    }
}

/// How an operator resolves a competition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The choice at this index won.
    Winner(usize),
    /// No winner; every stake is refunded.
    Cancelled,
}

impl Resolution {
    /// Stored sentinel for "no winner".
    pub const CANCELLED_SENTINEL: i64 = -1;

    /// Interpret an operator-supplied choice index, where `-1` cancels.
    ///
    /// Returns `None` for negative values other than the sentinel.
    #[must_use]
    pub fn from_index(index: i64) -> Option<Self> {
        if index == Self::CANCELLED_SENTINEL {
            Some(Self::Cancelled)
        } else {
            usize::try_from(index).ok().map(Self::Winner)
        }
    }

    #[must_use]
    pub fn winner(self) -> Option<usize> {
        match self {
            Self::Winner(index) => Some(index),
            Self::Cancelled => None,
        }
    }

    /// State a funded ticket on `choice` settles into.
    #[must_use]
    pub fn outcome(self, choice: usize) -> TicketState {
        match self {
            Self::Winner(index) if index == choice => TicketState::WonUnsettled,
            Self::Winner(_) => TicketState::Lost,
            Self::Cancelled => TicketState::CancelledUnsettled,
        }
    }
}

/// One outcome of a competition and the stake accumulated on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub title: String,
    #[serde(default)]
    pub total: Sats,
}

impl Choice {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            total: Sats::ZERO,
        }
    }
}

/// A competition record as held by the ledger store.
///
/// `version` is bumped by every successful conditional write and is the guard
/// for all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competition {
    pub id: CompetitionId,
    pub account: AccountId,
    pub name: String,
    pub info: String,
    pub banner: String,
    pub closing_datetime: DateTime<Utc>,
    /// Remaining ticket capacity.
    pub amount_tickets: u32,
    pub sold: u32,
    pub min_bet: Sats,
    pub max_bet: Sats,
    pub choices: Vec<Choice>,
    /// `None` while open, and after a cancellation.
    pub winning_choice: Option<usize>,
    pub state: CompetitionState,
    pub version: u64,
    pub time: DateTime<Utc>,
}

impl Competition {
    /// Sum of every choice total.
    #[must_use]
    pub fn total_pool(&self) -> Sats {
        self.choices.iter().map(|c| c.total).sum()
    }

    /// Running total staked on a choice, if the index is valid.
    #[must_use]
    pub fn choice_total(&self, index: usize) -> Option<Sats> {
        self.choices.get(index).map(|c| c.total)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == CompetitionState::Open
    }

    /// Whether new tickets may be sold at `now`.
    #[must_use]
    pub fn accepts_tickets(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && now < self.closing_datetime
    }

    /// How the competition was resolved, once it has left `Open`.
    #[must_use]
    pub fn resolution(&self) -> Option<Resolution> {
        match (self.state, self.winning_choice) {
            (CompetitionState::Open, _) => None,
            (_, Some(index)) => Some(Resolution::Winner(index)),
            (_, None) => Some(Resolution::Cancelled),
        }
    }

    /// Stored form of the winning choice, `-1` meaning unset or cancelled.
    #[must_use]
    pub fn winning_choice_index(&self) -> i64 {
        self.winning_choice
            .and_then(|i| i64::try_from(i).ok())
            .unwrap_or(Resolution::CANCELLED_SENTINEL)
    }
}

/// Operator request to open a new competition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompetition {
    pub account: AccountId,
    pub name: String,
    #[serde(default)]
    pub info: String,
    #[serde(default)]
    pub banner: String,
    pub closing_datetime: DateTime<Utc>,
    pub amount_tickets: u32,
    pub min_bet: Sats,
    pub max_bet: Sats,
    pub choices: Vec<String>,
}

impl NewCompetition {
    /// Check the request describes a usable pool.
    ///
    /// # Errors
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::EmptyName);
        }
        if self.choices.len() < 2 {
            return Err(DomainError::TooFewChoices {
                count: self.choices.len(),
            });
        }
        if let Some(index) = self.choices.iter().position(|t| t.trim().is_empty()) {
            return Err(DomainError::EmptyChoiceTitle { index });
        }
        if self.min_bet.is_zero() || self.min_bet > self.max_bet {
            return Err(DomainError::InvalidBetBounds {
                min: self.min_bet.value(),
                max: self.max_bet.value(),
            });
        }
        if self.amount_tickets == 0 {
            return Err(DomainError::ZeroCapacity);
        }
        Ok(())
    }

    /// Build the initial open record.
    ///
    /// # Errors
    /// Returns an error if [`validate`](Self::validate) fails.
    pub fn into_competition(
        self,
        id: CompetitionId,
        now: DateTime<Utc>,
    ) -> Result<Competition, DomainError> {
        self.validate()?;
        Ok(Competition {
            id,
            account: self.account,
            name: self.name,
            info: self.info,
            banner: self.banner,
            closing_datetime: self.closing_datetime,
            amount_tickets: self.amount_tickets,
            sold: 0,
            min_bet: self.min_bet,
            max_bet: self.max_bet,
            choices: self.choices.into_iter().map(Choice::new).collect(),
            winning_choice: None,
            state: CompetitionState::Open,
            version: 0,
            time: now,
        })
    }
}

/// Editable fields of an open competition that has not sold anything yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionUpdate {
    pub name: Option<String>,
    pub info: Option<String>,
    pub banner: Option<String>,
    pub closing_datetime: Option<DateTime<Utc>>,
    pub amount_tickets: Option<u32>,
    pub min_bet: Option<Sats>,
    pub max_bet: Option<Sats>,
}

impl CompetitionUpdate {
    /// Apply the update to a copy of `competition`, validating the result.
    ///
    /// # Errors
    /// Returns an error if the edited competition would be invalid.
    pub fn apply(&self, competition: &Competition) -> Result<Competition, DomainError> {
        let mut next = competition.clone();
        if let Some(name) = &self.name {
            next.name.clone_from(name);
        }
        if let Some(info) = &self.info {
            next.info.clone_from(info);
        }
        if let Some(banner) = &self.banner {
            next.banner.clone_from(banner);
        }
        if let Some(closing) = self.closing_datetime {
            next.closing_datetime = closing;
        }
        if let Some(amount) = self.amount_tickets {
            next.amount_tickets = amount;
        }
        if let Some(min) = self.min_bet {
            next.min_bet = min;
        }
        if let Some(max) = self.max_bet {
            next.max_bet = max;
        }

        if next.name.trim().is_empty() {
            return Err(DomainError::EmptyName);
        }
        if next.min_bet.is_zero() || next.min_bet > next.max_bet {
            return Err(DomainError::InvalidBetBounds {
                min: next.min_bet.value(),
                max: next.max_bet.value(),
            });
        }
        if next.amount_tickets == 0 {
            return Err(DomainError::ZeroCapacity);
        }
        Ok(next)
    }
}
