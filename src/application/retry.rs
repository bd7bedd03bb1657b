//! Optimistic concurrency for competition records.
//!
//! Every competition write goes through [`update_competition_with`]: read the
//! record, compute the next value with a pure closure, write it guarded on the
//! version that was read, and start over if someone else wrote first.

use tracing::trace;

use crate::domain::{Competition, CompetitionId};
use crate::error::{Error, LedgerError, Result};
use crate::port::LedgerStore;

/// Upper bound on attempts. Every failed attempt means another writer made
/// progress, so this only trips under pathological contention.
pub const MAX_CAS_ATTEMPTS: usize = 1_000;

/// Result of a conditional competition update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    /// The closure produced a new record and it was written.
    Updated(Competition),
    /// The closure declined to change the record read last.
    Unchanged(Competition),
}

impl CasOutcome {
    #[must_use]
    pub fn competition(&self) -> &Competition {
        match self {
            Self::Updated(c) | Self::Unchanged(c) => c,
        }
    }

    #[must_use]
    pub fn into_competition(self) -> Competition {
        match self {
            Self::Updated(c) | Self::Unchanged(c) => c,
        }
    }

    #[must_use]
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }
}

/// Apply `change` to the stored competition until the write wins.
///
/// `change` returns `Ok(None)` to leave the record as is, or an error to
/// abort without writing. It may run several times and must not have side
/// effects. The version of the returned record is set here.
///
/// # Errors
/// Returns [`LedgerError::CompetitionNotFound`] if the record is absent,
/// whatever `change` rejects with, or a store error.
pub async fn update_competition_with<F>(
    store: &dyn LedgerStore,
    id: &CompetitionId,
    mut change: F,
) -> Result<CasOutcome>
where
    F: FnMut(&Competition) -> Result<Option<Competition>> + Send,
{
    for attempt in 0..MAX_CAS_ATTEMPTS {
        let current = store
            .competition(id)
            .await?
            .ok_or_else(|| LedgerError::CompetitionNotFound(id.clone()))?;
        let Some(mut next) = change(&current)? else {
            return Ok(CasOutcome::Unchanged(current));
        };
        next.version = current.version + 1;
        if store.update_competition(&next, current.version).await? {
            return Ok(CasOutcome::Updated(next));
        }
        trace!(competition = %id, attempt, "competition changed concurrently, retrying");
        tokio::task::yield_now().await;
    }
    Err(Error::Internal(format!(
        "update of competition {id} did not converge after {MAX_CAS_ATTEMPTS} attempts"
    )))
}
