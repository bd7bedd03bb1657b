//! Persistence port for competitions and tickets.
//!
//! Every mutating call is a conditional write: it reports whether the guard
//! held instead of failing, and callers decide whether to retry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    AccountId, Competition, CompetitionId, CompetitionState, Resolution, Ticket, TicketId,
    TicketState,
};
use crate::error::Result;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a new competition.
    async fn insert_competition(&self, competition: &Competition) -> Result<()>;

    async fn competition(&self, id: &CompetitionId) -> Result<Option<Competition>>;

    async fn competitions_by_account(&self, account: &AccountId) -> Result<Vec<Competition>>;

    async fn competitions_in_state(&self, state: CompetitionState) -> Result<Vec<Competition>>;

    /// Replace a competition if its stored `version` still equals
    /// `expected_version`. `next.version` is written as given.
    ///
    /// Returns `false` when the guard did not hold.
    async fn update_competition(&self, next: &Competition, expected_version: u64) -> Result<bool>;

    /// Delete a competition and all of its tickets. Returns `false` if absent.
    async fn delete_competition(&self, id: &CompetitionId) -> Result<bool>;

    /// Insert a ticket unless one with the same id exists.
    ///
    /// Returns `false` when the id was already taken.
    async fn insert_ticket(&self, ticket: &Ticket) -> Result<bool>;

    async fn ticket(&self, id: &TicketId) -> Result<Option<Ticket>>;

    async fn tickets_by_account(&self, account: &AccountId) -> Result<Vec<Ticket>>;

    async fn competition_tickets(&self, competition: &CompetitionId) -> Result<Vec<Ticket>>;

    /// Tickets of every competition currently in one of `states`.
    async fn tickets_in_states(&self, states: &[TicketState]) -> Result<Vec<Ticket>>;

    /// Tickets of one competition currently in one of `states`.
    async fn competition_tickets_in_states(
        &self,
        competition: &CompetitionId,
        states: &[TicketState],
    ) -> Result<Vec<Ticket>>;

    /// Number of tickets of one competition in one of `states`.
    async fn count_competition_tickets(
        &self,
        competition: &CompetitionId,
        states: &[TicketState],
    ) -> Result<usize>;

    /// Overwrite the mutable fields of a ticket if its stored state is still
    /// `expected`.
    async fn update_ticket(&self, ticket: &Ticket, expected: TicketState) -> Result<bool>;

    /// Move every `_PAYING` ticket claimed before `claimed_before` to its
    /// `_PAYMENT_FAILED` state with `reason`, in one atomic write. Claims made
    /// after the cutoff are left alone. Returns the tickets moved.
    async fn fail_stale_claims(
        &self,
        claimed_before: DateTime<Utc>,
        reason: &str,
    ) -> Result<Vec<Ticket>>;

    /// Delete a ticket if its stored state is still `expected`.
    async fn delete_ticket(&self, id: &TicketId, expected: TicketState) -> Result<bool>;

    /// Move every `FUNDED` ticket of the competition to its outcome in one
    /// atomic write: the winning choice to `WON_UNSETTLED`, others to `LOST`,
    /// or everything to `CANCELLED_UNSETTLED`. Returns the tickets moved, in
    /// their new state.
    async fn assign_outcomes(
        &self,
        competition: &CompetitionId,
        resolution: Resolution,
    ) -> Result<Vec<Ticket>>;

    /// Delete `PENDING_FUNDING` tickets of the competition, only those created
    /// before `created_before` when given. Returns the number deleted.
    async fn delete_pending_tickets(
        &self,
        competition: &CompetitionId,
        created_before: Option<DateTime<Utc>>,
    ) -> Result<usize>;
}
