//! Competition lifecycle: creation, administration and settlement.
//!
//! Completing a competition moves it `OPEN -> SETTLING` and then runs
//! [`Settlement::finish_settlement`], which
//!
//! 1. drops outstanding reservations,
//! 2. assigns every funded ticket its outcome in one atomic write,
//! 3. re-aggregates choice totals from exactly the tickets captured,
//! 4. refunds stakes that were funded after the assignment,
//! 5. queues every payout and refund,
//! 6. marks the competition `SETTLED` if nothing is left to pay.
//!
//! Each step is idempotent so an interrupted settlement can be resumed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::retry::update_competition_with;
use super::scheduler::PayoutScheduler;
use crate::domain::{
    AccountId, Competition, CompetitionId, CompetitionState, CompetitionUpdate, NewCompetition,
    Resolution, Sats, Ticket, TicketState,
};
use crate::error::{Error, LedgerError, Result};
use crate::port::LedgerStore;

/// Failure reason recorded on payouts found half-done at startup.
pub const INTERRUPTED_PAYOUT_REASON: &str = "payout interrupted before completion";

/// Every state a ticket can be in once the competition was resolved.
const ASSIGNED: [TicketState; 9] = [
    TicketState::WonUnsettled,
    TicketState::WonPaying,
    TicketState::WonPaid,
    TicketState::WonPaymentFailed,
    TicketState::Lost,
    TicketState::CancelledUnsettled,
    TicketState::CancelledPaying,
    TicketState::CancelledPaid,
    TicketState::CancelledPaymentFailed,
];

pub struct Settlement {
    store: Arc<dyn LedgerStore>,
    scheduler: PayoutScheduler,
}

impl Settlement {
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, scheduler: PayoutScheduler) -> Self {
        Self { store, scheduler }
    }

    /// Open a new competition.
    ///
    /// # Errors
    /// Returns a domain error if the request is invalid, or a store error.
    pub async fn create(&self, request: NewCompetition, now: DateTime<Utc>) -> Result<Competition> {
        let competition = request.into_competition(CompetitionId::generate(), now)?;
        self.store.insert_competition(&competition).await?;
        info!(
            competition = %competition.id,
            account = %competition.account,
            choices = competition.choices.len(),
            closing = %competition.closing_datetime,
            "competition created"
        );
        Ok(competition)
    }

    /// Declare the winning choice, or `-1` to cancel and refund everything.
    ///
    /// # Errors
    /// Returns [`LedgerError::AlreadyCompleted`] if another completion won,
    /// [`LedgerError::InvalidChoice`] or [`LedgerError::ZeroStakeChoice`] for
    /// an unusable winner. Nothing is changed in those cases.
    pub async fn complete(&self, id: &CompetitionId, winning_choice: i64) -> Result<Competition> {
        let closed = update_competition_with(self.store.as_ref(), id, |c| {
            if !c.is_open() {
                return Err(LedgerError::AlreadyCompleted(c.id.clone()).into());
            }
            let resolution =
                Resolution::from_index(winning_choice).ok_or_else(|| LedgerError::InvalidChoice {
                    choice: winning_choice,
                    choices: c.choices.len(),
                })?;
            if let Resolution::Winner(index) = resolution {
                let total = c
                    .choice_total(index)
                    .ok_or_else(|| LedgerError::InvalidChoice {
                        choice: winning_choice,
                        choices: c.choices.len(),
                    })?;
                if total.is_zero() {
                    return Err(LedgerError::ZeroStakeChoice { choice: index }.into());
                }
            }
            let mut next = c.clone();
            next.state = CompetitionState::Settling;
            next.winning_choice = resolution.winner();
            Ok(Some(next))
        })
        .await?
        .into_competition();

        info!(
            competition = %closed.id,
            winning_choice = closed.winning_choice_index(),
            pool = %closed.total_pool(),
            sold = closed.sold,
            "competition completed"
        );
        self.finish_settlement(&closed, false).await
    }

    /// Drive a `SETTLING` competition through reconciliation and payout
    /// queuing. With `recovering` set, outcomes are only assigned if no ticket
    /// was assigned before, so a resumed settlement never grows the pool.
    ///
    /// # Errors
    /// Returns a store error, or [`Error::Internal`] if the competition is
    /// still open.
    pub async fn finish_settlement(
        &self,
        competition: &Competition,
        recovering: bool,
    ) -> Result<Competition> {
        let id = &competition.id;
        let resolution = competition.resolution().ok_or_else(|| {
            Error::Internal(format!("competition {id} is open and cannot be settled"))
        })?;

        let dropped = self.store.delete_pending_tickets(id, None).await?;
        if dropped > 0 {
            info!(competition = %id, count = dropped, "dropped unfunded reservations");
        }

        let already_assigned = recovering
            && self.store.count_competition_tickets(id, &ASSIGNED).await? > 0;
        let captured = if already_assigned {
            None
        } else {
            let captured = self.store.assign_outcomes(id, resolution).await?;
            info!(competition = %id, tickets = captured.len(), "outcomes assigned");
            Some(captured)
        };

        self.reconcile_totals(id, resolution, captured).await?;
        self.refund_late_arrivals(id).await?;

        let payable = self
            .store
            .competition_tickets_in_states(
                id,
                &[TicketState::WonUnsettled, TicketState::CancelledUnsettled],
            )
            .await?;
        let queued = self
            .scheduler
            .enqueue_all(payable.iter().map(|t| &t.id).collect::<Vec<_>>())
            .await?;
        info!(competition = %id, payouts = queued, "payouts queued");

        self.settle_if_complete(id)
            .await?
            .ok_or_else(|| LedgerError::CompetitionNotFound(id.clone()).into())
    }

    /// Replace the running choice totals with sums over the tickets that make
    /// up the pool: those `captured` by the outcome assignment, or when
    /// resuming, every ticket in a pool state.
    async fn reconcile_totals(
        &self,
        id: &CompetitionId,
        resolution: Resolution,
        captured: Option<Vec<Ticket>>,
    ) -> Result<()> {
        let pool = match captured {
            Some(captured) => captured,
            None => {
                let pool_states: &[TicketState] = match resolution {
                    Resolution::Winner(_) => &TicketState::DECIDED,
                    Resolution::Cancelled => &TicketState::REFUNDED,
                };
                self.store.competition_tickets_in_states(id, pool_states).await?
            }
        };

        let mut running = Vec::new();
        let outcome = update_competition_with(self.store.as_ref(), id, |c| {
            if c.is_open() {
                return Err(Error::Internal(format!("competition {id} reopened")));
            }
            running = c.choices.iter().map(|ch| ch.total).collect();
            let totals = aggregate(&pool, c.choices.len());
            if running == totals {
                return Ok(None);
            }
            let mut next = c.clone();
            for (choice, total) in next.choices.iter_mut().zip(totals) {
                choice.total = total;
            }
            Ok(Some(next))
        })
        .await?;

        let reconciled = outcome.competition();
        for (index, (before, choice)) in running.iter().zip(&reconciled.choices).enumerate() {
            if *before != choice.total {
                warn!(
                    competition = %id,
                    choice = index,
                    running = %before,
                    reconciled = %choice.total,
                    "choice total corrected from ticket records"
                );
            }
        }
        Ok(())
    }

    /// Refund tickets that were funded after outcomes were assigned.
    async fn refund_late_arrivals(&self, id: &CompetitionId) -> Result<()> {
        let late = self
            .store
            .competition_tickets_in_states(id, &[TicketState::Funded])
            .await?;
        for ticket in late {
            let refund = Ticket {
                state: TicketState::CancelledUnsettled,
                ..ticket
            };
            if self.store.update_ticket(&refund, TicketState::Funded).await? {
                warn!(
                    ticket_id = %refund.id,
                    competition = %id,
                    amount = %refund.amount,
                    "late stake will be refunded"
                );
            }
        }
        Ok(())
    }

    /// Move a `SETTLING` competition to `SETTLED` once no ticket needs more
    /// work. Returns the competition as stored afterwards, or `None` if it no
    /// longer exists.
    ///
    /// # Errors
    /// Returns a store error.
    pub async fn settle_if_complete(&self, id: &CompetitionId) -> Result<Option<Competition>> {
        let outstanding = self
            .store
            .count_competition_tickets(id, &TicketState::OUTSTANDING)
            .await?;
        if outstanding > 0 {
            return self.store.competition(id).await;
        }
        let outcome = match update_competition_with(self.store.as_ref(), id, |c| {
            if c.state != CompetitionState::Settling {
                return Ok(None);
            }
            let mut next = c.clone();
            next.state = CompetitionState::Settled;
            Ok(Some(next))
        })
        .await
        {
            Ok(outcome) => outcome,
            Err(e) if matches!(e.as_ledger(), Some(LedgerError::CompetitionNotFound(_))) => {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        if outcome.is_updated() {
            info!(competition = %id, "competition settled");
        }
        Ok(Some(outcome.into_competition()))
    }

    /// Resume every settlement that was interrupted.
    ///
    /// # Errors
    /// Returns a store error.
    pub async fn resume_settlements(&self) -> Result<usize> {
        let settling = self
            .store
            .competitions_in_state(CompetitionState::Settling)
            .await?;
        let count = settling.len();
        for competition in settling {
            info!(competition = %competition.id, "resuming settlement");
            self.finish_settlement(&competition, true).await?;
        }
        Ok(count)
    }

    /// Fail and re-queue payouts whose claim was taken before
    /// `claimed_before`. A live dispatcher finishes every payment within its
    /// timeout, so a claim older than that belongs to a process that died
    /// mid-payment.
    ///
    /// # Errors
    /// Returns a store error.
    pub async fn recover_stuck_payouts(&self, claimed_before: DateTime<Utc>) -> Result<usize> {
        let stuck = self
            .store
            .fail_stale_claims(claimed_before, INTERRUPTED_PAYOUT_REASON)
            .await?;
        for ticket in &stuck {
            warn!(
                ticket_id = %ticket.id,
                competition = %ticket.competition,
                claimed_at = ?ticket.claimed_at,
                "interrupted payout re-queued"
            );
        }
        self.scheduler
            .enqueue_all(stuck.iter().map(|t| &t.id).collect::<Vec<_>>())
            .await
    }

    /// Queue every failed payout again, for one competition or all of them.
    ///
    /// # Errors
    /// Returns a store error.
    pub async fn retry_failed_payouts(&self, competition: Option<&CompetitionId>) -> Result<usize> {
        let failed = match competition {
            Some(id) => {
                self.require(id).await?;
                self.store
                    .competition_tickets_in_states(id, &TicketState::PAYMENT_FAILED)
                    .await?
            }
            None => {
                self.store
                    .tickets_in_states(&TicketState::PAYMENT_FAILED)
                    .await?
            }
        };
        let queued = self
            .scheduler
            .enqueue_all(failed.iter().map(|t| &t.id).collect::<Vec<_>>())
            .await?;
        info!(count = queued, "failed payouts re-queued");
        Ok(queued)
    }

    /// Edit an open competition that has no tickets yet.
    ///
    /// # Errors
    /// Returns [`LedgerError::NotOwner`] or [`LedgerError::NotEditable`], or a
    /// domain error if the edit is invalid.
    pub async fn update(
        &self,
        id: &CompetitionId,
        account: &AccountId,
        update: &CompetitionUpdate,
    ) -> Result<Competition> {
        let tickets = self.store.count_competition_tickets(id, &TicketState::ALL).await?;
        let outcome = update_competition_with(self.store.as_ref(), id, |c| {
            ensure_owner(c, account)?;
            if !c.is_open() {
                return Err(not_editable(c, "competition is closed"));
            }
            if c.sold > 0 || tickets > 0 {
                return Err(not_editable(c, "tickets were already reserved or sold"));
            }
            Ok(Some(update.apply(c)?))
        })
        .await?;
        info!(competition = %id, "competition updated");
        Ok(outcome.into_competition())
    }

    /// Delete a competition that either never took a stake or is fully
    /// settled, along with its tickets.
    ///
    /// # Errors
    /// Returns [`LedgerError::NotOwner`] or [`LedgerError::NotEditable`].
    pub async fn delete(&self, id: &CompetitionId, account: &AccountId) -> Result<()> {
        let competition = self.require(id).await?;
        ensure_owner(&competition, account)?;
        match competition.state {
            CompetitionState::Open => {
                let funded = self
                    .store
                    .count_competition_tickets(id, &funded_states())
                    .await?;
                if funded > 0 {
                    return Err(not_editable(&competition, "competition has funded tickets"));
                }
            }
            CompetitionState::Settling => {
                return Err(not_editable(&competition, "payouts are in progress"));
            }
            CompetitionState::Settled => {}
        }
        self.store.delete_competition(id).await?;
        info!(competition = %id, "competition deleted");
        Ok(())
    }

    async fn require(&self, id: &CompetitionId) -> Result<Competition> {
        self.store
            .competition(id)
            .await?
            .ok_or_else(|| LedgerError::CompetitionNotFound(id.clone()).into())
    }
}

fn ensure_owner(competition: &Competition, account: &AccountId) -> Result<()> {
    if &competition.account != account {
        return Err(LedgerError::NotOwner {
            account: account.clone(),
            competition: competition.id.clone(),
        }
        .into());
    }
    Ok(())
}

fn not_editable(competition: &Competition, reason: &'static str) -> Error {
    LedgerError::NotEditable {
        competition: competition.id.clone(),
        reason,
    }
    .into()
}

fn funded_states() -> Vec<TicketState> {
    TicketState::ALL
        .into_iter()
        .filter(|s| s.is_funded())
        .collect()
}

/// Per-choice stake sums over `tickets`.
fn aggregate(tickets: &[Ticket], choices: usize) -> Vec<Sats> {
    let mut totals = vec![Sats::ZERO; choices];
    for ticket in tickets {
        match totals.get_mut(ticket.choice) {
            Some(total) => *total += ticket.amount,
            None => warn!(ticket_id = %ticket.id, choice = ticket.choice, "ticket choice out of range"),
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::outbound::memory::{MemoryLedgerStore, MemoryPayoutQueue};
    use crate::application::stake::StakeAccumulator;
    use crate::domain::{Msats, TicketId};
    use crate::port::PayoutQueue;
    use crate::testkit::domain::{competition, new_competition, ticket_request};
    use chrono::Utc;

    struct Fixture {
        store: Arc<MemoryLedgerStore>,
        queue: Arc<MemoryPayoutQueue>,
        stake: StakeAccumulator,
        settlement: Settlement,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryLedgerStore::new());
        let queue = Arc::new(MemoryPayoutQueue::new());
        store
            .insert_competition(&competition("c1", &["A", "B"]))
            .await
            .unwrap();
        let scheduler = PayoutScheduler::new(queue.clone());
        Fixture {
            stake: StakeAccumulator::new(store.clone(), scheduler.clone()),
            settlement: Settlement::new(store.clone(), scheduler),
            store,
            queue,
        }
    }

    async fn fund(f: &Fixture, id: &str, amount: u64, choice: i64) {
        f.stake
            .fund_ticket(&ticket_request(id, "c1", amount, choice), Utc::now())
            .await
            .unwrap();
    }

    async fn state_of(f: &Fixture, id: &str) -> TicketState {
        f.store.ticket(&TicketId::new(id)).await.unwrap().unwrap().state
    }

    fn cid() -> CompetitionId {
        CompetitionId::new("c1")
    }

    #[tokio::test]
    async fn create_assigns_id_and_opens() {
        let f = fixture().await;
        let created = f
            .settlement
            .create(new_competition(&["Yes", "No"]), Utc::now())
            .await
            .unwrap();
        assert_eq!(created.state, CompetitionState::Open);
        assert_eq!(created.id.as_str().len(), 22);
        assert!(f.store.competition(&created.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn completion_splits_winners_and_losers() {
        let f = fixture().await;
        fund(&f, "t1", 100, 0).await;
        fund(&f, "t2", 300, 1).await;

        let settled = f.settlement.complete(&cid(), 0).await.unwrap();

        assert_eq!(settled.state, CompetitionState::Settling);
        assert_eq!(settled.winning_choice, Some(0));
        assert_eq!(state_of(&f, "t1").await, TicketState::WonUnsettled);
        assert_eq!(state_of(&f, "t2").await, TicketState::Lost);
        let head = f.queue.peek().await.unwrap().unwrap();
        assert_eq!(head.ticket, TicketId::new("t1"));
        assert_eq!(f.queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn cancellation_refunds_every_stake() {
        let f = fixture().await;
        fund(&f, "t1", 100, 0).await;
        fund(&f, "t2", 300, 1).await;

        f.settlement
            .complete(&cid(), Resolution::CANCELLED_SENTINEL)
            .await
            .unwrap();

        assert_eq!(state_of(&f, "t1").await, TicketState::CancelledUnsettled);
        assert_eq!(state_of(&f, "t2").await, TicketState::CancelledUnsettled);
        assert_eq!(f.queue.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn cancelling_an_empty_competition_settles_it() {
        let f = fixture().await;
        let settled = f.settlement.complete(&cid(), -1).await.unwrap();
        assert_eq!(settled.state, CompetitionState::Settled);
    }

    #[tokio::test]
    async fn second_completion_is_rejected() {
        let f = fixture().await;
        fund(&f, "t1", 100, 0).await;
        f.settlement.complete(&cid(), 0).await.unwrap();

        let err = f.settlement.complete(&cid(), 0).await.unwrap_err();
        assert_eq!(err.as_ledger(), Some(&LedgerError::AlreadyCompleted(cid())));
    }

    #[tokio::test]
    async fn winner_without_stake_leaves_competition_open() {
        let f = fixture().await;
        fund(&f, "t1", 100, 0).await;

        let err = f.settlement.complete(&cid(), 1).await.unwrap_err();

        assert_eq!(
            err.as_ledger(),
            Some(&LedgerError::ZeroStakeChoice { choice: 1 })
        );
        let c = f.store.competition(&cid()).await.unwrap().unwrap();
        assert!(c.is_open());
        assert_eq!(state_of(&f, "t1").await, TicketState::Funded);
    }

    #[tokio::test]
    async fn out_of_range_winner_is_rejected() {
        let f = fixture().await;
        for choice in [2, -2] {
            let err = f.settlement.complete(&cid(), choice).await.unwrap_err();
            assert_eq!(
                err.as_ledger(),
                Some(&LedgerError::InvalidChoice { choice, choices: 2 })
            );
        }
    }

    #[tokio::test]
    async fn totals_are_rebuilt_from_ticket_records() {
        let f = fixture().await;
        fund(&f, "t1", 100, 0).await;
        fund(&f, "t2", 300, 1).await;
        let mut drifted = f.store.competition(&cid()).await.unwrap().unwrap();
        drifted.choices[1].total = Sats::new(999);
        drifted.version += 1;
        f.store
            .update_competition(&drifted, drifted.version - 1)
            .await
            .unwrap();

        let settled = f.settlement.complete(&cid(), 0).await.unwrap();

        assert_eq!(settled.choices[0].total, Sats::new(100));
        assert_eq!(settled.choices[1].total, Sats::new(300));
    }

    #[tokio::test]
    async fn settlement_drops_unfunded_reservations() {
        let f = fixture().await;
        fund(&f, "t1", 100, 0).await;
        f.stake
            .reserve_ticket(&ticket_request("t2", "c1", 100, 1), Utc::now())
            .await
            .unwrap();

        f.settlement.complete(&cid(), 0).await.unwrap();

        assert!(f.store.ticket(&TicketId::new("t2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resumed_settlement_refunds_late_fundings() {
        let f = fixture().await;
        fund(&f, "t1", 100, 0).await;
        f.settlement.complete(&cid(), 0).await.unwrap();
        // A funding that slipped in after outcomes were assigned.
        let late = crate::domain::Ticket::new(
            TicketId::new("t9"),
            AccountId::new("bettor"),
            cid(),
            Sats::new(50),
            0,
            "wallet:bettor",
            TicketState::Funded,
            Utc::now(),
        );
        f.store.insert_ticket(&late).await.unwrap();

        let resumed = f.settlement.resume_settlements().await.unwrap();

        assert_eq!(resumed, 1);
        assert_eq!(state_of(&f, "t9").await, TicketState::CancelledUnsettled);
        assert_eq!(state_of(&f, "t1").await, TicketState::WonUnsettled);
        let c = f.store.competition(&cid()).await.unwrap().unwrap();
        assert_eq!(c.choices[0].total, Sats::new(100));
    }

    #[tokio::test]
    async fn settles_once_nothing_is_outstanding() {
        let f = fixture().await;
        fund(&f, "t1", 100, 0).await;
        f.settlement.complete(&cid(), 0).await.unwrap();
        let won = f.store.ticket(&TicketId::new("t1")).await.unwrap().unwrap();
        let paid = won.with_payment(TicketState::WonPaid, Msats::new(99_000), "h".into());
        f.store
            .update_ticket(&paid, TicketState::WonUnsettled)
            .await
            .unwrap();

        let c = f.settlement.settle_if_complete(&cid()).await.unwrap().unwrap();
        assert_eq!(c.state, CompetitionState::Settled);
    }

    #[tokio::test]
    async fn failed_payouts_keep_competition_settled() {
        let f = fixture().await;
        fund(&f, "t1", 100, 0).await;
        f.settlement.complete(&cid(), 0).await.unwrap();
        let won = f.store.ticket(&TicketId::new("t1")).await.unwrap().unwrap();
        let failed = won.with_failure(TicketState::WonPaymentFailed, "no route".into());
        f.store
            .update_ticket(&failed, TicketState::WonUnsettled)
            .await
            .unwrap();

        let c = f.settlement.settle_if_complete(&cid()).await.unwrap().unwrap();
        assert_eq!(c.state, CompetitionState::Settled);

        while let Some(head) = f.queue.peek().await.unwrap() {
            f.queue.ack(head.seq).await.unwrap();
        }
        assert_eq!(f.settlement.retry_failed_payouts(Some(&cid())).await.unwrap(), 1);
        assert_eq!(f.queue.len().await.unwrap(), 1);
    }

    async fn claim(f: &Fixture, id: &str, at: chrono::DateTime<Utc>) {
        let won = f.store.ticket(&TicketId::new(id)).await.unwrap().unwrap();
        let paying = won.claimed(TicketState::WonPaying, at);
        assert!(f
            .store
            .update_ticket(&paying, TicketState::WonUnsettled)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn stale_claims_are_failed_and_requeued() {
        let f = fixture().await;
        fund(&f, "t1", 100, 0).await;
        f.settlement.complete(&cid(), 0).await.unwrap();
        let now = Utc::now();
        claim(&f, "t1", now - chrono::Duration::minutes(5)).await;

        let recovered = f
            .settlement
            .recover_stuck_payouts(now - chrono::Duration::minutes(1))
            .await
            .unwrap();

        assert_eq!(recovered, 1);
        let t = f.store.ticket(&TicketId::new("t1")).await.unwrap().unwrap();
        assert_eq!(t.state, TicketState::WonPaymentFailed);
        assert_eq!(t.reward_failure.as_deref(), Some(INTERRUPTED_PAYOUT_REASON));
        let head = f.queue.peek().await.unwrap().unwrap();
        assert_eq!(head.ticket, TicketId::new("t1"));
    }

    #[tokio::test]
    async fn payout_in_flight_is_not_recovered() {
        let f = fixture().await;
        fund(&f, "t1", 100, 0).await;
        f.settlement.complete(&cid(), 0).await.unwrap();
        while let Some(head) = f.queue.peek().await.unwrap() {
            f.queue.ack(head.seq).await.unwrap();
        }
        let now = Utc::now();
        claim(&f, "t1", now).await;

        let recovered = f
            .settlement
            .recover_stuck_payouts(now - chrono::Duration::minutes(1))
            .await
            .unwrap();

        assert_eq!(recovered, 0);
        assert_eq!(state_of(&f, "t1").await, TicketState::WonPaying);
        assert_eq!(f.queue.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn settling_a_deleted_competition_is_a_no_op() {
        let f = fixture().await;
        let gone = CompetitionId::new("gone");
        assert!(f.settlement.settle_if_complete(&gone).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cancelled_totals_exclude_stakes_refunded_on_arrival() {
        let f = fixture().await;
        fund(&f, "t1", 100, 0).await;
        // Refunded by the funding path while the competition was closing.
        let refunded = Ticket::new(
            TicketId::new("t9"),
            AccountId::new("bettor"),
            cid(),
            Sats::new(50),
            0,
            "wallet:bettor",
            TicketState::CancelledUnsettled,
            Utc::now(),
        );
        f.store.insert_ticket(&refunded).await.unwrap();

        let cancelled = f
            .settlement
            .complete(&cid(), Resolution::CANCELLED_SENTINEL)
            .await
            .unwrap();

        assert_eq!(cancelled.choices[0].total, Sats::new(100));
        assert_eq!(cancelled.total_pool(), Sats::new(100));
        assert_eq!(state_of(&f, "t9").await, TicketState::CancelledUnsettled);
    }

    #[tokio::test]
    async fn only_owner_may_edit_before_any_sale() {
        let f = fixture().await;
        let edit = CompetitionUpdate {
            name: Some("Renamed".into()),
            ..CompetitionUpdate::default()
        };

        let err = f
            .settlement
            .update(&cid(), &AccountId::new("mallory"), &edit)
            .await
            .unwrap_err();
        assert!(matches!(err.as_ledger(), Some(LedgerError::NotOwner { .. })));

        let renamed = f
            .settlement
            .update(&cid(), &AccountId::new("owner"), &edit)
            .await
            .unwrap();
        assert_eq!(renamed.name, "Renamed");

        fund(&f, "t1", 100, 0).await;
        let err = f
            .settlement
            .update(&cid(), &AccountId::new("owner"), &edit)
            .await
            .unwrap_err();
        assert!(matches!(err.as_ledger(), Some(LedgerError::NotEditable { .. })));
    }

    #[tokio::test]
    async fn delete_follows_lifecycle() {
        let f = fixture().await;
        let owner = AccountId::new("owner");
        fund(&f, "t1", 100, 0).await;

        let err = f.settlement.delete(&cid(), &owner).await.unwrap_err();
        assert!(matches!(err.as_ledger(), Some(LedgerError::NotEditable { .. })));

        f.settlement.complete(&cid(), 0).await.unwrap();
        let err = f.settlement.delete(&cid(), &owner).await.unwrap_err();
        assert!(matches!(err.as_ledger(), Some(LedgerError::NotEditable { .. })));

        let won = f.store.ticket(&TicketId::new("t1")).await.unwrap().unwrap();
        let paid = won.with_payment(TicketState::WonPaid, Msats::new(99_000), "h".into());
        f.store
            .update_ticket(&paid, TicketState::WonUnsettled)
            .await
            .unwrap();
        f.settlement.settle_if_complete(&cid()).await.unwrap();

        f.settlement.delete(&cid(), &owner).await.unwrap();
        assert!(f.store.competition(&cid()).await.unwrap().is_none());
        assert!(f.store.ticket(&TicketId::new("t1")).await.unwrap().is_none());
    }
}
