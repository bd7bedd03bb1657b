//! The ledger facade.
//!
//! [`Bookie`] wires the stake accumulator, settlement and payout scheduler
//! over one store and one queue, and is the entry point for every caller:
//! the CLI, payment listeners and tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::dispatcher::{PayoutDispatcher, PayoutSettings};
use super::funding;
use super::scheduler::PayoutScheduler;
use super::settlement::Settlement;
use super::stake::{StakeAccumulator, TicketRequest};
use super::sweeper::{ExpirySweeper, SweeperSettings};
use crate::domain::{
    AccountId, Competition, CompetitionId, CompetitionState, CompetitionUpdate, NewCompetition,
    Ticket, TicketId,
};
use crate::error::{LedgerError, Result};
use crate::port::{LedgerStore, PaidInvoice, PaymentGateway, PayoutQueue};

pub struct Bookie {
    store: Arc<dyn LedgerStore>,
    scheduler: PayoutScheduler,
    stake: StakeAccumulator,
    settlement: Arc<Settlement>,
}

impl Bookie {
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, queue: Arc<dyn PayoutQueue>) -> Self {
        let scheduler = PayoutScheduler::new(queue);
        Self {
            stake: StakeAccumulator::new(store.clone(), scheduler.clone()),
            settlement: Arc::new(Settlement::new(store.clone(), scheduler.clone())),
            store,
            scheduler,
        }
    }

    /// A dispatcher paying out of this ledger's queue.
    #[must_use]
    pub fn dispatcher(
        &self,
        gateway: Arc<dyn PaymentGateway>,
        settings: PayoutSettings,
    ) -> PayoutDispatcher {
        PayoutDispatcher::new(
            self.store.clone(),
            self.scheduler.clone(),
            gateway,
            self.settlement.clone(),
            settings,
        )
    }

    #[must_use]
    pub fn sweeper(&self, settings: SweeperSettings) -> ExpirySweeper {
        ExpirySweeper::new(self.store.clone(), settings)
    }

    /// # Errors
    /// Returns a domain error if the request is invalid.
    pub async fn create(&self, request: NewCompetition) -> Result<Competition> {
        self.settlement.create(request, Utc::now()).await
    }

    /// Resolve a competition; `-1` cancels it. See [`Settlement::complete`].
    ///
    /// # Errors
    /// Returns the rejection if the competition cannot be completed.
    pub async fn complete(&self, id: &CompetitionId, winning_choice: i64) -> Result<Competition> {
        self.settlement.complete(id, winning_choice).await
    }

    /// # Errors
    /// See [`Settlement::update`].
    pub async fn update_competition(
        &self,
        id: &CompetitionId,
        account: &AccountId,
        update: &CompetitionUpdate,
    ) -> Result<Competition> {
        self.settlement.update(id, account, update).await
    }

    /// # Errors
    /// See [`Settlement::delete`].
    pub async fn delete_competition(&self, id: &CompetitionId, account: &AccountId) -> Result<()> {
        self.settlement.delete(id, account).await
    }

    /// # Errors
    /// See [`StakeAccumulator::reserve_ticket`].
    pub async fn reserve_ticket(&self, request: &TicketRequest) -> Result<Ticket> {
        self.stake.reserve_ticket(request, Utc::now()).await
    }

    /// # Errors
    /// See [`StakeAccumulator::fund_ticket`].
    pub async fn fund_ticket(&self, request: &TicketRequest) -> Result<Ticket> {
        self.stake.fund_ticket(request, Utc::now()).await
    }

    /// Book a confirmed incoming payment. Payments that were not issued for a
    /// ticket are ignored and yield `None`.
    ///
    /// # Errors
    /// See [`StakeAccumulator::fund_ticket`].
    pub async fn on_payment_confirmed(
        &self,
        invoice: &PaidInvoice,
        now: DateTime<Utc>,
    ) -> Result<Option<Ticket>> {
        let Some(request) = funding::ticket_request(invoice) else {
            debug!(payment_hash = %invoice.payment_hash, "ignoring unrelated payment");
            return Ok(None);
        };
        self.stake.fund_ticket(&request, now).await.map(Some)
    }

    /// Queue a ticket for payout again. Safe to call for any ticket; the
    /// dispatcher skips tickets that are not payable.
    ///
    /// # Errors
    /// Returns [`LedgerError::TicketNotFound`] for unknown tickets.
    pub async fn enqueue_payout(&self, id: &TicketId) -> Result<Ticket> {
        let ticket = self
            .store
            .ticket(id)
            .await?
            .ok_or_else(|| LedgerError::TicketNotFound(id.clone()))?;
        self.scheduler.enqueue(id).await?;
        Ok(ticket)
    }

    /// # Errors
    /// See [`Settlement::retry_failed_payouts`].
    pub async fn retry_failed_payouts(&self, competition: Option<&CompetitionId>) -> Result<usize> {
        self.settlement.retry_failed_payouts(competition).await
    }

    /// Fail and re-queue payouts whose claim is older than a dispatcher with
    /// `settings` could still hold it. Safe while a dispatcher is running.
    ///
    /// # Errors
    /// See [`Settlement::recover_stuck_payouts`].
    pub async fn recover_stuck_payouts(&self, settings: &PayoutSettings) -> Result<usize> {
        let cutoff = settings.stale_claim_cutoff(Utc::now())?;
        self.settlement.recover_stuck_payouts(cutoff).await
    }

    /// # Errors
    /// Returns a store error.
    pub async fn competition(&self, id: &CompetitionId) -> Result<Option<Competition>> {
        self.store.competition(id).await
    }

    /// # Errors
    /// Returns a store error.
    pub async fn competitions(&self, account: &AccountId) -> Result<Vec<Competition>> {
        self.store.competitions_by_account(account).await
    }

    /// # Errors
    /// Returns a store error.
    pub async fn competitions_in_state(&self, state: CompetitionState) -> Result<Vec<Competition>> {
        self.store.competitions_in_state(state).await
    }

    /// # Errors
    /// Returns a store error.
    pub async fn ticket(&self, id: &TicketId) -> Result<Option<Ticket>> {
        self.store.ticket(id).await
    }

    /// # Errors
    /// Returns a store error.
    pub async fn tickets(&self, account: &AccountId) -> Result<Vec<Ticket>> {
        self.store.tickets_by_account(account).await
    }

    /// # Errors
    /// Returns a store error.
    pub async fn competition_tickets(&self, id: &CompetitionId) -> Result<Vec<Ticket>> {
        self.store.competition_tickets(id).await
    }

    /// Number of payouts waiting in the queue.
    ///
    /// # Errors
    /// Returns a queue error.
    pub async fn pending_payouts(&self) -> Result<usize> {
        self.scheduler.queue().len().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::outbound::memory::{MemoryLedgerStore, MemoryPayoutQueue};
    use crate::application::ProcessOutcome;
    use crate::domain::{Msats, Resolution, RewardDestination, Sats, TicketState};
    use crate::error::PaymentError;
    use crate::testkit::config;
    use crate::testkit::domain::{new_competition, ticket_request};
    use crate::testkit::gateway::ScriptedGateway;
    use serde_json::json;
    use std::time::Duration;

    fn bookie() -> Bookie {
        Bookie::new(
            Arc::new(MemoryLedgerStore::new()),
            Arc::new(MemoryPayoutQueue::new()),
        )
    }

    async fn open(b: &Bookie) -> CompetitionId {
        b.create(new_competition(&["A", "B"])).await.unwrap().id
    }

    async fn buy(b: &Bookie, c: &CompetitionId, id: &str, amount: u64, choice: i64) {
        b.fund_ticket(&ticket_request(id, c.as_str(), amount, choice))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn winner_is_paid_pool_minus_fee() {
        let b = bookie();
        let c = open(&b).await;
        buy(&b, &c, "a", 100, 0).await;
        buy(&b, &c, "b", 300, 1).await;
        b.complete(&c, 0).await.unwrap();

        let gateway = Arc::new(ScriptedGateway::new());
        let dispatcher = b.dispatcher(gateway.clone(), config::payout());
        assert_eq!(dispatcher.drain().await.unwrap(), 1);

        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].amount, Msats::new(396_000));
        assert_eq!(calls[0].payer, AccountId::new("owner"));
        assert_eq!(
            calls[0].destination,
            RewardDestination::Internal(AccountId::new("bettor"))
        );
        assert_eq!(calls[0].memo, format!("BookieReward:{c}.a"));

        let a = b.ticket(&TicketId::new("a")).await.unwrap().unwrap();
        assert_eq!(a.state, TicketState::WonPaid);
        assert_eq!(a.reward_msat, Msats::new(396_000));
        let lost = b.ticket(&TicketId::new("b")).await.unwrap().unwrap();
        assert_eq!(lost.state, TicketState::Lost);
        let settled = b.competition(&c).await.unwrap().unwrap();
        assert_eq!(settled.state, CompetitionState::Settled);
    }

    #[tokio::test]
    async fn failed_payout_is_recorded_and_retried() {
        let b = bookie();
        let c = open(&b).await;
        buy(&b, &c, "a", 100, 0).await;
        b.complete(&c, Resolution::CANCELLED_SENTINEL).await.unwrap();

        let gateway = Arc::new(ScriptedGateway::new());
        gateway.fail_next(PaymentError::Rejected("no route".into()));
        let dispatcher = b.dispatcher(gateway.clone(), config::payout());
        dispatcher.drain().await.unwrap();

        let t = b.ticket(&TicketId::new("a")).await.unwrap().unwrap();
        assert_eq!(t.state, TicketState::CancelledPaymentFailed);
        assert!(t.reward_failure.as_deref().unwrap().contains("no route"));

        b.enqueue_payout(&TicketId::new("a")).await.unwrap();
        dispatcher.drain().await.unwrap();

        let t = b.ticket(&TicketId::new("a")).await.unwrap().unwrap();
        assert_eq!(t.state, TicketState::CancelledPaid);
        assert_eq!(t.reward_msat, Msats::new(100_000));
        assert_eq!(t.reward_failure, None);
        assert_eq!(gateway.calls()[1].memo, format!("BookieRefund:{c}.a"));
    }

    #[tokio::test]
    async fn slow_payment_times_out() {
        let b = bookie();
        let c = open(&b).await;
        buy(&b, &c, "a", 100, 0).await;
        b.complete(&c, 0).await.unwrap();

        let gateway = Arc::new(ScriptedGateway::slow(Duration::from_secs(2)));
        let dispatcher = b.dispatcher(gateway, config::payout());
        let outcome = dispatcher.process(&TicketId::new("a")).await.unwrap();

        assert!(matches!(outcome, ProcessOutcome::Failed { .. }));
        let t = b.ticket(&TicketId::new("a")).await.unwrap().unwrap();
        assert_eq!(t.state, TicketState::WonPaymentFailed);
    }

    #[tokio::test]
    async fn redelivered_payout_is_not_paid_twice() {
        let b = bookie();
        let c = open(&b).await;
        buy(&b, &c, "a", 100, 0).await;
        b.complete(&c, 0).await.unwrap();
        let gateway = Arc::new(ScriptedGateway::new());
        let dispatcher = b.dispatcher(gateway.clone(), config::payout());

        dispatcher.process(&TicketId::new("a")).await.unwrap();
        let again = dispatcher.process(&TicketId::new("a")).await.unwrap();

        assert_eq!(again, ProcessOutcome::Skipped);
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn recovery_leaves_payout_in_flight_alone() {
        let b = bookie();
        let c = open(&b).await;
        buy(&b, &c, "a", 100, 0).await;
        buy(&b, &c, "b", 300, 1).await;
        b.complete(&c, 0).await.unwrap();
        let gateway = Arc::new(ScriptedGateway::slow(Duration::from_millis(200)));
        let dispatcher = b.dispatcher(gateway.clone(), config::payout());

        let paying = tokio::spawn(async move { dispatcher.drain().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let claimed = b.ticket(&TicketId::new("a")).await.unwrap().unwrap();
        assert_eq!(claimed.state, TicketState::WonPaying);
        assert!(claimed.claimed_at.is_some());

        assert_eq!(b.recover_stuck_payouts(&config::payout()).await.unwrap(), 0);
        assert_eq!(paying.await.unwrap().unwrap(), 1);

        assert_eq!(gateway.calls().len(), 1);
        let a = b.ticket(&TicketId::new("a")).await.unwrap().unwrap();
        assert_eq!(a.state, TicketState::WonPaid);
        assert_eq!(b.pending_payouts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn payment_finishing_after_claim_release_is_kept() {
        let b = bookie();
        let c = open(&b).await;
        buy(&b, &c, "a", 100, 0).await;
        b.complete(&c, 0).await.unwrap();
        let gateway = Arc::new(ScriptedGateway::slow(Duration::from_millis(200)));
        let dispatcher = b.dispatcher(gateway.clone(), config::payout());

        let paying = tokio::spawn(async move { dispatcher.drain().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let released = b
            .settlement
            .recover_stuck_payouts(Utc::now() + chrono::Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(released, 1);
        paying.await.unwrap().unwrap();

        assert_eq!(gateway.calls().len(), 1);
        let a = b.ticket(&TicketId::new("a")).await.unwrap().unwrap();
        assert_eq!(a.state, TicketState::WonPaid);
        assert_eq!(a.reward_msat, Msats::new(99_000));
        assert_eq!(a.reward_failure, None);
        assert_eq!(b.pending_payouts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn payout_for_deleted_competition_does_not_block_queue() {
        let b = bookie();
        let orphan = Ticket::new(
            TicketId::new("orphan"),
            AccountId::new("bettor"),
            CompetitionId::new("ghost"),
            Sats::new(100),
            0,
            "wallet:bettor",
            TicketState::CancelledUnsettled,
            Utc::now(),
        );
        b.store.insert_ticket(&orphan).await.unwrap();
        b.enqueue_payout(&orphan.id).await.unwrap();
        let c = open(&b).await;
        buy(&b, &c, "good", 100, 0).await;
        b.complete(&c, 0).await.unwrap();

        let gateway = Arc::new(ScriptedGateway::new());
        let dispatcher = b.dispatcher(gateway.clone(), config::payout());
        assert_eq!(dispatcher.drain().await.unwrap(), 2);

        let orphan = b.ticket(&TicketId::new("orphan")).await.unwrap().unwrap();
        assert_eq!(orphan.state, TicketState::CancelledPaymentFailed);
        assert_eq!(
            orphan.reward_failure.as_deref(),
            Some("payout not possible: competition ghost no longer exists")
        );
        let good = b.ticket(&TicketId::new("good")).await.unwrap().unwrap();
        assert_eq!(good.state, TicketState::WonPaid);
        assert_eq!(gateway.calls().len(), 1);
        assert_eq!(b.pending_payouts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn payment_confirmation_funds_ticket() {
        let b = bookie();
        let c = open(&b).await;
        let invoice = PaidInvoice {
            payment_hash: "ph".into(),
            wallet: AccountId::new("owner"),
            amount: Msats::new(250_000),
            memo: Some(format!("BookieTicketId:{c}.t1")),
            extra: json!({ "tag": "bookie", "choice": 1, "reward_target": "wallet:bettor" }),
        };

        let ticket = b.on_payment_confirmed(&invoice, Utc::now()).await.unwrap().unwrap();

        assert_eq!(ticket.state, TicketState::Funded);
        let comp = b.competition(&c).await.unwrap().unwrap();
        assert_eq!(comp.choices[1].total.value(), 250);
        assert_eq!(comp.sold, 1);
    }

    #[tokio::test]
    async fn enqueue_unknown_ticket_fails() {
        let b = bookie();
        let err = b.enqueue_payout(&TicketId::new("nope")).await.unwrap_err();
        assert_eq!(
            err.as_ledger(),
            Some(&LedgerError::TicketNotFound(TicketId::new("nope")))
        );
    }
}
