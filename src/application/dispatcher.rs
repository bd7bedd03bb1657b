//! Payout dispatcher.
//!
//! A single background task drains the payout queue. For each entry it claims
//! the ticket into its `_PAYING` state, sends the reward or refund, and records
//! the outcome. Queue entries are acknowledged only after the outcome is
//! stored, so a crash re-delivers the entry and the claim stops it from being
//! paid twice. A claim carries its timestamp; only claims older than the
//! payment timeout plus a grace period are treated as interrupted.
//!
//! ```text
//! settlement / funding --push--> PayoutQueue --peek--> PayoutDispatcher
//!                                     ^                      |
//!                                     +--------ack-----------+
//!                                                            |
//!                                                   PaymentGateway::pay
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::scheduler::PayoutScheduler;
use super::settlement::Settlement;
use crate::domain::money::winning_reward;
use crate::domain::{
    Competition, MemoKind, Msats, PaymentMemo, RewardDestination, Ticket, TicketId, TicketState,
};
use crate::error::{Error, PaymentError, Result};
use crate::port::{LedgerStore, PaymentGateway, PaymentReceipt};

/// Dispatcher tuning.
#[derive(Debug, Clone)]
pub struct PayoutSettings {
    /// House fee withheld from winnings, in percent.
    pub fee_percent: u8,
    /// Upper bound on a single payment attempt.
    pub payment_timeout: Duration,
    /// How often the queue is polled when nobody signals new work.
    pub poll_interval: Duration,
    /// Extra time a claim is trusted beyond `payment_timeout` before its
    /// payout counts as interrupted.
    pub claim_grace: Duration,
}

impl Default for PayoutSettings {
    fn default() -> Self {
        Self {
            fee_percent: 1,
            payment_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(1_000),
            claim_grace: Duration::from_secs(30),
        }
    }
}

impl PayoutSettings {
    /// Age after which a `_PAYING` claim belongs to a dead dispatcher.
    #[must_use]
    pub fn stale_claim_after(&self) -> Duration {
        self.payment_timeout + self.claim_grace
    }

    /// Claims taken before this instant are stale.
    ///
    /// # Errors
    /// Returns an error if the configured durations do not fit a timestamp.
    pub fn stale_claim_cutoff(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let age = chrono::Duration::from_std(self.stale_claim_after())
            .map_err(|e| Error::Internal(format!("claim age out of range: {e}")))?;
        now.checked_sub_signed(age)
            .ok_or_else(|| Error::Internal("claim age out of range".into()))
    }
}

/// What became of one queued payout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The ticket was missing or not payable; nothing was sent.
    Skipped,
    Paid { amount: Msats, payment_hash: String },
    Failed { reason: String },
}

/// Handle for controlling the dispatcher lifecycle.
pub struct PayoutDispatcherHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl PayoutDispatcherHandle {
    /// Stop after the payout in flight, if any, and wait for the task to end.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            error!(error = %e, "payout dispatcher task failed");
        }
    }
}

pub struct PayoutDispatcher {
    store: Arc<dyn LedgerStore>,
    scheduler: PayoutScheduler,
    gateway: Arc<dyn PaymentGateway>,
    settlement: Arc<Settlement>,
    settings: PayoutSettings,
}

impl PayoutDispatcher {
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        scheduler: PayoutScheduler,
        gateway: Arc<dyn PaymentGateway>,
        settlement: Arc<Settlement>,
        settings: PayoutSettings,
    ) -> Self {
        Self {
            store,
            scheduler,
            gateway,
            settlement,
            settings,
        }
    }

    /// Spawn the dispatcher.
    ///
    /// Before taking work it resumes interrupted settlements. Payouts whose
    /// claim has gone stale are failed and re-queued at start and then once
    /// per claim lifetime.
    pub fn start(self) -> PayoutDispatcherHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let dispatcher = Arc::new(self);

        let task = tokio::spawn(async move {
            dispatcher.recover_stale_claims().await;
            dispatcher.resume_settlements().await;
            let wake = dispatcher.scheduler.wake().clone();
            let stale_after = dispatcher.settings.stale_claim_after();
            let mut last_recovery = Instant::now();
            info!(
                fee_percent = dispatcher.settings.fee_percent,
                timeout_ms = dispatcher.settings.payment_timeout.as_millis(),
                stale_after_ms = stale_after.as_millis(),
                "payout dispatcher started"
            );

            loop {
                if last_recovery.elapsed() >= stale_after {
                    dispatcher.recover_stale_claims().await;
                    last_recovery = Instant::now();
                }
                if let Err(e) = dispatcher.drain().await {
                    error!(error = %e, "payout queue drain failed, will retry");
                }
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("payout dispatcher shutting down");
                        break;
                    }
                    () = wake.notified() => {}
                    () = tokio::time::sleep(dispatcher.settings.poll_interval) => {}
                }
            }
        });

        PayoutDispatcherHandle { shutdown_tx, task }
    }

    async fn recover_stale_claims(&self) {
        let recovered = match self.settings.stale_claim_cutoff(Utc::now()) {
            Ok(cutoff) => self.settlement.recover_stuck_payouts(cutoff).await,
            Err(e) => Err(e),
        };
        match recovered {
            Ok(0) => {}
            Ok(n) => warn!(count = n, "re-queued interrupted payouts"),
            Err(e) => error!(error = %e, "stuck payout recovery failed"),
        }
    }

    async fn resume_settlements(&self) {
        match self.settlement.resume_settlements().await {
            Ok(0) => {}
            Ok(n) => info!(count = n, "resumed interrupted settlements"),
            Err(e) => error!(error = %e, "settlement recovery failed"),
        }
    }

    /// Process queued payouts until every entry has been tried once. Returns
    /// how many entries were handled.
    ///
    /// An entry that cannot be processed is moved to the back of the queue
    /// and retried on the next drain, so it never holds up the entries
    /// behind it.
    ///
    /// # Errors
    /// Returns a queue error.
    pub async fn drain(&self) -> Result<usize> {
        let queue = self.scheduler.queue();
        let mut handled = 0;
        let mut deferred = HashSet::new();
        while let Some(entry) = queue.peek().await? {
            if deferred.contains(&entry.ticket) {
                break;
            }
            match self.process(&entry.ticket).await {
                Ok(outcome) => {
                    queue.ack(entry.seq).await?;
                    debug!(ticket_id = %entry.ticket, seq = entry.seq, ?outcome, "payout processed");
                    handled += 1;
                }
                Err(e) => {
                    error!(
                        ticket_id = %entry.ticket,
                        seq = entry.seq,
                        error = %e,
                        "payout processing failed, deferring"
                    );
                    queue.push(&entry.ticket).await?;
                    deferred.insert(entry.ticket);
                }
            }
        }
        Ok(handled)
    }

    /// Pay one ticket if it is payable.
    ///
    /// # Errors
    /// Returns a store error. Payment failures are recorded on the ticket and
    /// reported as [`ProcessOutcome::Failed`].
    pub async fn process(&self, id: &TicketId) -> Result<ProcessOutcome> {
        let Some(ticket) = self.store.ticket(id).await? else {
            debug!(ticket_id = %id, "queued ticket no longer exists");
            return Ok(ProcessOutcome::Skipped);
        };
        let Some(paying) = ticket.state.claim() else {
            debug!(ticket_id = %id, state = %ticket.state, "ticket not payable");
            return Ok(ProcessOutcome::Skipped);
        };
        let claimed = ticket.claimed(paying, Utc::now());
        if !self.store.update_ticket(&claimed, ticket.state).await? {
            debug!(ticket_id = %id, "ticket claimed elsewhere");
            return Ok(ProcessOutcome::Skipped);
        }

        let competition = self.store.competition(&claimed.competition).await?;
        let result = match competition {
            Some(competition) => self.pay(&claimed, &competition).await,
            None => Err(PaymentError::NotPayable(format!(
                "competition {} no longer exists",
                claimed.competition
            ))),
        };

        let (next, outcome) = match result {
            Ok(receipt) => {
                let state = paying.paid().unwrap_or(paying);
                info!(
                    ticket_id = %id,
                    competition = %claimed.competition,
                    amount = %receipt.amount_sent,
                    refund = paying.is_refund(),
                    "payout sent"
                );
                (
                    claimed.with_payment(state, receipt.amount_sent, receipt.payment_hash.clone()),
                    ProcessOutcome::Paid {
                        amount: receipt.amount_sent,
                        payment_hash: receipt.payment_hash,
                    },
                )
            }
            Err(e) => {
                let state = paying.failed().unwrap_or(paying);
                let reason = e.to_string();
                warn!(
                    ticket_id = %id,
                    competition = %claimed.competition,
                    error = %reason,
                    "payout failed"
                );
                (
                    claimed.with_failure(state, reason.clone()),
                    ProcessOutcome::Failed { reason },
                )
            }
        };

        if !self.store.update_ticket(&next, paying).await? {
            self.record_released_outcome(&next, paying).await?;
        }
        match self.settlement.settle_if_complete(&claimed.competition).await {
            Ok(Some(_)) => {}
            Ok(None) => debug!(competition = %claimed.competition, "competition gone, nothing to settle"),
            Err(e) => warn!(
                competition = %claimed.competition,
                error = %e,
                "settlement check failed, resumed at next start"
            ),
        }
        Ok(outcome)
    }

    /// Store the outcome of a payout whose claim was released by stale claim
    /// recovery while the payment was in flight. A completed payment replaces
    /// the recorded failure so the re-queued entry is skipped.
    async fn record_released_outcome(&self, next: &Ticket, paying: TicketState) -> Result<()> {
        let released = paying.failed().filter(|_| paying.paid() == Some(next.state));
        if let Some(failed) = released {
            if self.store.update_ticket(next, failed).await? {
                warn!(
                    ticket_id = %next.id,
                    competition = %next.competition,
                    "payout completed after its claim was released, recorded as paid"
                );
                return Ok(());
            }
        }
        error!(ticket_id = %next.id, state = %next.state, "ticket changed while its payout was in flight");
        Ok(())
    }

    async fn pay(
        &self,
        ticket: &Ticket,
        competition: &Competition,
    ) -> std::result::Result<PaymentReceipt, PaymentError> {
        let (kind, amount) = if ticket.state.is_refund() {
            (MemoKind::Refund, ticket.amount.to_msats())
        } else {
            (MemoKind::Reward, self.reward(ticket, competition)?)
        };
        let destination: RewardDestination = ticket.reward_target.parse()?;
        let memo = PaymentMemo::new(kind, competition.id.clone(), ticket.id.clone()).to_string();

        tokio::time::timeout(
            self.settings.payment_timeout,
            self.gateway
                .pay(&competition.account, &destination, amount, &memo),
        )
        .await
        .map_err(|_| PaymentError::Timeout(self.settings.payment_timeout))?
    }

    fn reward(&self, ticket: &Ticket, competition: &Competition) -> std::result::Result<Msats, PaymentError> {
        if competition.winning_choice != Some(ticket.choice) {
            return Err(PaymentError::NotPayable(format!(
                "ticket choice {} did not win",
                ticket.choice
            )));
        }
        let winning_total = competition
            .choice_total(ticket.choice)
            .unwrap_or_default();
        winning_reward(
            competition.total_pool(),
            ticket.amount,
            winning_total,
            self.settings.fee_percent,
        )
        .map_err(PaymentError::Payout)
    }
}
