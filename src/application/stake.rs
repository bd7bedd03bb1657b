//! Stake accumulation: reserving and funding tickets while a competition is
//! open.
//!
//! Capacity is consumed when a reservation is made, and the stake is booked
//! onto the chosen choice when the reservation is funded. Both writes go
//! through the competition's version guard, so concurrent purchases never
//! lose an update.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::retry::update_competition_with;
use super::scheduler::PayoutScheduler;
use crate::domain::{
    AccountId, CompetitionId, DomainError, RewardDestination, Sats, Ticket, TicketId, TicketState,
};
use crate::error::{Error, LedgerError, Result};
use crate::port::LedgerStore;

/// Upper bound on re-reads when a ticket row changes under us.
const MAX_TICKET_ATTEMPTS: usize = 16;

/// A ticket purchase, either being invoiced or being paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRequest {
    /// Ticket id; the funding payment hash.
    pub id: TicketId,
    pub competition: CompetitionId,
    pub account: AccountId,
    pub amount: Sats,
    /// Choice index as supplied by the bettor.
    pub choice: i64,
    pub reward_target: String,
}

/// Books ticket reservations and fundings against competitions.
pub struct StakeAccumulator {
    store: Arc<dyn LedgerStore>,
    scheduler: PayoutScheduler,
}

impl StakeAccumulator {
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, scheduler: PayoutScheduler) -> Self {
        Self { store, scheduler }
    }

    /// Hold one unit of capacity for a ticket whose invoice is being issued.
    ///
    /// Reserving the same id twice returns the existing reservation.
    ///
    /// # Errors
    /// Returns a [`LedgerError`] if the competition is missing, closed or sold
    /// out, or if the amount, choice or destination is invalid.
    pub async fn reserve_ticket(&self, request: &TicketRequest, now: DateTime<Utc>) -> Result<Ticket> {
        let competition = self
            .store
            .competition(&request.competition)
            .await?
            .ok_or_else(|| LedgerError::CompetitionNotFound(request.competition.clone()))?;
        if !competition.accepts_tickets(now) {
            return Err(LedgerError::CompetitionClosed(competition.id).into());
        }
        if competition.amount_tickets == 0 {
            return Err(LedgerError::SoldOut(competition.id).into());
        }
        if request.amount < competition.min_bet || request.amount > competition.max_bet {
            return Err(LedgerError::AmountOutOfBounds {
                amount: request.amount,
                min: competition.min_bet,
                max: competition.max_bet,
            }
            .into());
        }
        let choice = checked_choice(request.choice, competition.choices.len())?;
        request.reward_target.parse::<RewardDestination>()?;

        let pending = Ticket::new(
            request.id.clone(),
            request.account.clone(),
            request.competition.clone(),
            request.amount,
            choice,
            request.reward_target.clone(),
            TicketState::PendingFunding,
            now,
        );
        if !self.store.insert_ticket(&pending).await? {
            return self
                .store
                .ticket(&request.id)
                .await?
                .ok_or_else(|| Error::Internal(format!("ticket {} vanished", request.id)));
        }

        let reserved = update_competition_with(self.store.as_ref(), &request.competition, |c| {
            if !c.accepts_tickets(now) {
                return Err(LedgerError::CompetitionClosed(c.id.clone()).into());
            }
            if c.amount_tickets == 0 {
                return Err(LedgerError::SoldOut(c.id.clone()).into());
            }
            let mut next = c.clone();
            next.amount_tickets -= 1;
            Ok(Some(next))
        })
        .await;

        match reserved {
            Ok(outcome) => {
                debug!(
                    ticket_id = %pending.id,
                    competition = %pending.competition,
                    remaining = outcome.competition().amount_tickets,
                    "ticket reserved"
                );
                Ok(pending)
            }
            Err(e) => {
                self.store
                    .delete_ticket(&pending.id, TicketState::PendingFunding)
                    .await?;
                Err(e)
            }
        }
    }

    /// Record a confirmed stake payment.
    ///
    /// Idempotent: a ticket that is already funded is returned unchanged. A
    /// payment that lands after the competition stopped accepting stakes is
    /// refunded instead of being booked.
    ///
    /// # Errors
    /// Returns [`LedgerError::CompetitionNotFound`] or
    /// [`LedgerError::InvalidChoice`] for payments that cannot be attributed,
    /// or a store error.
    pub async fn fund_ticket(&self, request: &TicketRequest, now: DateTime<Utc>) -> Result<Ticket> {
        let competition = self
            .store
            .competition(&request.competition)
            .await?
            .ok_or_else(|| LedgerError::CompetitionNotFound(request.competition.clone()))?;
        let choice = checked_choice(request.choice, competition.choices.len())?;

        let Some((ticket, reserved)) = self.materialize(request, choice, now).await? else {
            return self
                .store
                .ticket(&request.id)
                .await?
                .ok_or_else(|| Error::Internal(format!("ticket {} vanished", request.id)));
        };

        let amount = ticket.amount;
        let booked = update_competition_with(self.store.as_ref(), &ticket.competition, |c| {
            if !c.is_open() {
                return Ok(None);
            }
            let mut next = c.clone();
            let slot = next.choices.get_mut(choice).ok_or_else(|| LedgerError::InvalidChoice {
                choice: request.choice,
                choices: c.choices.len(),
            })?;
            slot.total = slot
                .total
                .checked_add(amount)
                .ok_or(DomainError::AmountOverflow)?;
            next.sold = next.sold.saturating_add(1);
            if !reserved {
                next.amount_tickets = next.amount_tickets.saturating_sub(1);
            }
            Ok(Some(next))
        })
        .await?;

        if booked.is_updated() {
            info!(
                ticket_id = %ticket.id,
                competition = %ticket.competition,
                choice,
                amount = %amount,
                "ticket funded"
            );
            return Ok(ticket);
        }
        self.refund_late_arrival(ticket).await
    }

    /// Bring the ticket row to `FUNDED`. Returns the funded ticket and whether
    /// it consumed a reservation, or `None` if it was already funded.
    async fn materialize(
        &self,
        request: &TicketRequest,
        choice: usize,
        now: DateTime<Utc>,
    ) -> Result<Option<(Ticket, bool)>> {
        for _ in 0..MAX_TICKET_ATTEMPTS {
            match self.store.ticket(&request.id).await? {
                Some(existing) if existing.state == TicketState::PendingFunding => {
                    let funded = Ticket {
                        account: request.account.clone(),
                        amount: request.amount,
                        choice,
                        reward_target: request.reward_target.clone(),
                        state: TicketState::Funded,
                        ..existing
                    };
                    if self
                        .store
                        .update_ticket(&funded, TicketState::PendingFunding)
                        .await?
                    {
                        return Ok(Some((funded, true)));
                    }
                }
                Some(existing) => {
                    debug!(ticket_id = %existing.id, state = %existing.state, "duplicate funding ignored");
                    return Ok(None);
                }
                None => {
                    let funded = Ticket::new(
                        request.id.clone(),
                        request.account.clone(),
                        request.competition.clone(),
                        request.amount,
                        choice,
                        request.reward_target.clone(),
                        TicketState::Funded,
                        now,
                    );
                    if self.store.insert_ticket(&funded).await? {
                        return Ok(Some((funded, false)));
                    }
                }
            }
        }
        Err(Error::Internal(format!(
            "ticket {} kept changing while being funded",
            request.id
        )))
    }

    /// Refund a stake that arrived after the competition left `OPEN`, unless
    /// settlement already captured it.
    async fn refund_late_arrival(&self, ticket: Ticket) -> Result<Ticket> {
        let refund = Ticket {
            state: TicketState::CancelledUnsettled,
            ..ticket.clone()
        };
        if self.store.update_ticket(&refund, TicketState::Funded).await? {
            warn!(
                ticket_id = %ticket.id,
                competition = %ticket.competition,
                amount = %ticket.amount,
                "stake arrived after competition closed, refunding"
            );
            self.scheduler.enqueue(&ticket.id).await?;
            return Ok(refund);
        }
        self.store
            .ticket(&ticket.id)
            .await?
            .ok_or_else(|| Error::Internal(format!("ticket {} vanished", ticket.id)))
    }
}

fn checked_choice(choice: i64, choices: usize) -> Result<usize> {
    usize::try_from(choice)
        .ok()
        .filter(|c| *c < choices)
        .ok_or_else(|| LedgerError::InvalidChoice { choice, choices }.into())
}
