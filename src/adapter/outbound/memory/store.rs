//! In-memory ledger store for tests and ephemeral runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::{
    AccountId, Competition, CompetitionId, CompetitionState, Resolution, Ticket, TicketId,
    TicketState,
};
use crate::error::Result;
use crate::port::LedgerStore;

/// [`LedgerStore`] over two locked maps. Each call takes the lock once, so
/// every conditional write is atomic.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    competitions: RwLock<HashMap<CompetitionId, Competition>>,
    tickets: RwLock<HashMap<TicketId, Ticket>>,
}

impl MemoryLedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn collect_tickets(&self, keep: impl Fn(&Ticket) -> bool) -> Vec<Ticket> {
        let mut found: Vec<Ticket> = self
            .tickets
            .read()
            .values()
            .filter(|t| keep(t))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)));
        found
    }

    fn collect_competitions(&self, keep: impl Fn(&Competition) -> bool) -> Vec<Competition> {
        let mut found: Vec<Competition> = self
            .competitions
            .read()
            .values()
            .filter(|c| keep(c))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)));
        found
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert_competition(&self, competition: &Competition) -> Result<()> {
        self.competitions
            .write()
            .insert(competition.id.clone(), competition.clone());
        Ok(())
    }

    async fn competition(&self, id: &CompetitionId) -> Result<Option<Competition>> {
        Ok(self.competitions.read().get(id).cloned())
    }

    async fn competitions_by_account(&self, account: &AccountId) -> Result<Vec<Competition>> {
        Ok(self.collect_competitions(|c| &c.account == account))
    }

    async fn competitions_in_state(&self, state: CompetitionState) -> Result<Vec<Competition>> {
        Ok(self.collect_competitions(|c| c.state == state))
    }

    async fn update_competition(&self, next: &Competition, expected_version: u64) -> Result<bool> {
        let mut competitions = self.competitions.write();
        match competitions.get_mut(&next.id) {
            Some(current) if current.version == expected_version => {
                *current = next.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_competition(&self, id: &CompetitionId) -> Result<bool> {
        let mut competitions = self.competitions.write();
        self.tickets.write().retain(|_, t| &t.competition != id);
        Ok(competitions.remove(id).is_some())
    }

    async fn insert_ticket(&self, ticket: &Ticket) -> Result<bool> {
        let mut tickets = self.tickets.write();
        if tickets.contains_key(&ticket.id) {
            return Ok(false);
        }
        tickets.insert(ticket.id.clone(), ticket.clone());
        Ok(true)
    }

    async fn ticket(&self, id: &TicketId) -> Result<Option<Ticket>> {
        Ok(self.tickets.read().get(id).cloned())
    }

    async fn tickets_by_account(&self, account: &AccountId) -> Result<Vec<Ticket>> {
        Ok(self.collect_tickets(|t| &t.account == account))
    }

    async fn competition_tickets(&self, competition: &CompetitionId) -> Result<Vec<Ticket>> {
        Ok(self.collect_tickets(|t| &t.competition == competition))
    }

    async fn tickets_in_states(&self, states: &[TicketState]) -> Result<Vec<Ticket>> {
        Ok(self.collect_tickets(|t| states.contains(&t.state)))
    }

    async fn competition_tickets_in_states(
        &self,
        competition: &CompetitionId,
        states: &[TicketState],
    ) -> Result<Vec<Ticket>> {
        Ok(self.collect_tickets(|t| &t.competition == competition && states.contains(&t.state)))
    }

    async fn count_competition_tickets(
        &self,
        competition: &CompetitionId,
        states: &[TicketState],
    ) -> Result<usize> {
        Ok(self
            .tickets
            .read()
            .values()
            .filter(|t| &t.competition == competition && states.contains(&t.state))
            .count())
    }

    async fn update_ticket(&self, ticket: &Ticket, expected: TicketState) -> Result<bool> {
        let mut tickets = self.tickets.write();
        match tickets.get_mut(&ticket.id) {
            Some(current) if current.state == expected => {
                *current = ticket.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail_stale_claims(
        &self,
        claimed_before: DateTime<Utc>,
        reason: &str,
    ) -> Result<Vec<Ticket>> {
        let mut tickets = self.tickets.write();
        let mut failed = Vec::new();
        for ticket in tickets.values_mut() {
            let stale = ticket.claimed_at.map_or(true, |at| at < claimed_before);
            let Some(next) = ticket.state.failed().filter(|_| stale) else {
                continue;
            };
            ticket.state = next;
            ticket.reward_failure = Some(reason.to_string());
            failed.push(ticket.clone());
        }
        failed.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)));
        Ok(failed)
    }

    async fn delete_ticket(&self, id: &TicketId, expected: TicketState) -> Result<bool> {
        let mut tickets = self.tickets.write();
        if tickets.get(id).is_some_and(|t| t.state == expected) {
            tickets.remove(id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn assign_outcomes(
        &self,
        competition: &CompetitionId,
        resolution: Resolution,
    ) -> Result<Vec<Ticket>> {
        let mut tickets = self.tickets.write();
        let mut moved = Vec::new();
        for ticket in tickets
            .values_mut()
            .filter(|t| &t.competition == competition && t.state == TicketState::Funded)
        {
            ticket.state = resolution.outcome(ticket.choice);
            moved.push(ticket.clone());
        }
        moved.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)));
        Ok(moved)
    }

    async fn delete_pending_tickets(
        &self,
        competition: &CompetitionId,
        created_before: Option<DateTime<Utc>>,
    ) -> Result<usize> {
        let mut tickets = self.tickets.write();
        let before = tickets.len();
        tickets.retain(|_, t| {
            let expired = &t.competition == competition
                && t.state == TicketState::PendingFunding
                && created_before.map_or(true, |cutoff| t.time < cutoff);
            !expired
        });
        Ok(before - tickets.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Sats;

    fn ticket(id: &str, choice: usize, state: TicketState) -> Ticket {
        Ticket::new(
            TicketId::new(id),
            AccountId::new("w"),
            CompetitionId::new("c"),
            Sats::new(100),
            choice,
            "wallet:payee",
            state,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn update_ticket_is_guarded_by_state() {
        let store = MemoryLedgerStore::new();
        let t = ticket("t1", 0, TicketState::WonUnsettled);
        assert!(store.insert_ticket(&t).await.unwrap());
        assert!(!store.insert_ticket(&t).await.unwrap());

        let mut paying = t.clone();
        paying.state = TicketState::WonPaying;
        assert!(store
            .update_ticket(&paying, TicketState::WonUnsettled)
            .await
            .unwrap());
        assert!(!store
            .update_ticket(&paying, TicketState::WonUnsettled)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn assign_outcomes_only_touches_funded() {
        let store = MemoryLedgerStore::new();
        store.insert_ticket(&ticket("a", 0, TicketState::Funded)).await.unwrap();
        store.insert_ticket(&ticket("b", 1, TicketState::Funded)).await.unwrap();
        store
            .insert_ticket(&ticket("p", 0, TicketState::PendingFunding))
            .await
            .unwrap();

        let moved = store
            .assign_outcomes(&CompetitionId::new("c"), Resolution::Winner(0))
            .await
            .unwrap();

        assert_eq!(moved.len(), 2);
        let state = |id: &str| store.tickets.read()[&TicketId::new(id)].state;
        assert_eq!(state("a"), TicketState::WonUnsettled);
        assert_eq!(state("b"), TicketState::Lost);
        assert_eq!(state("p"), TicketState::PendingFunding);
    }

    #[tokio::test]
    async fn fresh_claims_survive_stale_claim_sweep() {
        let store = MemoryLedgerStore::new();
        let now = Utc::now();
        let old = ticket("old", 0, TicketState::WonUnsettled)
            .claimed(TicketState::WonPaying, now - chrono::Duration::minutes(5));
        let fresh = ticket("fresh", 0, TicketState::CancelledUnsettled)
            .claimed(TicketState::CancelledPaying, now);
        store.insert_ticket(&old).await.unwrap();
        store.insert_ticket(&fresh).await.unwrap();

        let failed = store
            .fail_stale_claims(now - chrono::Duration::minutes(1), "gone")
            .await
            .unwrap();

        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, TicketId::new("old"));
        let get = |id: &str| store.tickets.read()[&TicketId::new(id)].clone();
        assert_eq!(get("old").state, TicketState::WonPaymentFailed);
        assert_eq!(get("old").reward_failure.as_deref(), Some("gone"));
        assert_eq!(get("fresh").state, TicketState::CancelledPaying);
    }
}
