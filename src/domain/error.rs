//! Domain validation errors for core domain types.
//!
//! These errors are returned by constructors and parsers that validate
//! inputs before they reach the ledger.
//!
//! # Examples
//!
//! ```
//! use bookie::domain::error::DomainError;
//! use bookie::domain::RewardDestination;
//!
//! let result = "not a destination".parse::<RewardDestination>();
//! assert!(matches!(result, Err(DomainError::MalformedDestination { .. })));
//! ```

use thiserror::Error;

/// Errors that occur when domain invariants are violated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Competitions need a name.
    #[error("competition name cannot be empty")]
    EmptyName,

    /// A pari-mutuel pool needs at least two outcomes.
    #[error("competition needs at least two choices, got {count}")]
    TooFewChoices {
        /// Number of choices that were provided.
        count: usize,
    },

    /// Choice titles must be non-empty.
    #[error("choice {index} has an empty title")]
    EmptyChoiceTitle {
        /// Index of the offending choice.
        index: usize,
    },

    /// Bet bounds must be positive and ordered.
    #[error("invalid bet bounds: min {min} max {max}")]
    InvalidBetBounds {
        /// Lower bound in sats.
        min: u64,
        /// Upper bound in sats.
        max: u64,
    },

    /// A competition must sell at least one ticket.
    #[error("ticket capacity must be positive")]
    ZeroCapacity,

    /// The fee must be a percentage.
    #[error("fee percent must be at most 100, got {fee_percent}")]
    InvalidFeePercent {
        /// The fee that was provided.
        fee_percent: u8,
    },

    /// The winning pool is empty, so shares cannot be computed.
    #[error("winning choice total is zero")]
    EmptyWinningPool,

    /// Arithmetic left the representable range.
    #[error("amount overflow")]
    AmountOverflow,

    /// The reward destination could not be understood.
    #[error("malformed reward destination '{input}': {reason}")]
    MalformedDestination {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A stored state string did not match any known state.
    #[error("unknown {kind} state '{value}'")]
    UnknownState {
        /// Which state machine the value belongs to.
        kind: &'static str,
        /// The unrecognised value.
        value: String,
    },

    /// A payment memo did not follow the expected format.
    #[error("malformed payment memo '{0}'")]
    MalformedMemo(String),
}
