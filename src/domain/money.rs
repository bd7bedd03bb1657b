//! Monetary amounts and pari-mutuel payout arithmetic.
//!
//! Stakes are whole satoshis; rewards are computed in millisatoshis so the
//! proportional split loses as little as possible to rounding. All
//! arithmetic is integer-only with `u128` intermediates.

use std::fmt;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Millisatoshis per satoshi.
pub const MSATS_PER_SAT: u64 = 1000;

/// Whole-satoshi amount used for stakes and choice totals.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Sats(u64);

impl Sats {
    pub const ZERO: Sats = Sats(0);

    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Convert to millisatoshis.
    #[must_use]
    pub const fn to_msats(self) -> Msats {
        Msats(self.0.saturating_mul(MSATS_PER_SAT))
    }

    #[must_use]
    pub fn checked_add(self, other: Sats) -> Option<Sats> {
        self.0.checked_add(other.0).map(Sats)
    }
}

impl fmt::Display for Sats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sat", self.0)
    }
}

impl Add for Sats {
    type Output = Sats;

    fn add(self, rhs: Sats) -> Sats {
        Sats(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Sats {
    fn add_assign(&mut self, rhs: Sats) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl std::iter::Sum for Sats {
    fn sum<I: Iterator<Item = Sats>>(iter: I) -> Sats {
        iter.fold(Sats::ZERO, |acc, s| acc + s)
    }
}

/// Millisatoshi amount used for rewards and payment requests.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Msats(u64);

impl Msats {
    pub const ZERO: Msats = Msats(0);

    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Whole satoshis, rounded down.
    #[must_use]
    pub const fn floor_sats(self) -> Sats {
        Sats(self.0 / MSATS_PER_SAT)
    }

    #[must_use]
    pub fn checked_sub(self, other: Msats) -> Option<Msats> {
        self.0.checked_sub(other.0).map(Msats)
    }
}

impl fmt::Display for Msats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} msat", self.0)
    }
}

/// Share of a pari-mutuel pool owed to one winning stake, in the same unit as
/// the inputs: `floor(pool * stake * (100 - fee) / (winning_total * 100))`.
///
/// # Errors
/// Returns an error if the winning total is zero, the fee exceeds 100 or the
/// result does not fit in a `u64`.
pub fn pari_mutuel_share(
    pool: u64,
    stake: u64,
    winning_total: u64,
    fee_percent: u8,
) -> Result<u64, DomainError> {
    if fee_percent > 100 {
        return Err(DomainError::InvalidFeePercent { fee_percent });
    }
    if winning_total == 0 {
        return Err(DomainError::EmptyWinningPool);
    }

    let numerator = u128::from(pool)
        .checked_mul(u128::from(stake))
        .and_then(|v| v.checked_mul(u128::from(100 - fee_percent)))
        .ok_or(DomainError::AmountOverflow)?;
    let denominator = u128::from(winning_total) * 100;

    u64::try_from(numerator / denominator).map_err(|_| DomainError::AmountOverflow)
}

/// Reward for a winning ticket in millisatoshis.
///
/// # Errors
/// See [`pari_mutuel_share`].
pub fn winning_reward(
    pool: Sats,
    stake: Sats,
    winning_total: Sats,
    fee_percent: u8,
) -> Result<Msats, DomainError> {
    pari_mutuel_share(
        pool.to_msats().value(),
        stake.value(),
        winning_total.value(),
        fee_percent,
    )
    .map(Msats)
}

/// Routing fee held back from an outgoing Lightning payment:
/// `max(min_fee, amount * percent / 100)`.
#[must_use]
pub fn fee_reserve(amount: Msats, min_fee: Msats, percent: u8) -> Msats {
    let proportional = u128::from(amount.0) * u128::from(percent) / 100;
    let proportional = u64::try_from(proportional).unwrap_or(u64::MAX);
    Msats(proportional.max(min_fee.0))
}
